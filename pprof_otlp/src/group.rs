//! Group OTLP samples by the values of selected attributes.

use otlp_parse::{KeyValue, Profile, Sample};
use std::collections::BTreeMap;
use thiserror::Error;

/// Group for samples with no non-empty value for the requested keys.
pub const DEFAULT_GROUP: &str = "root";

#[derive(Error, Debug, PartialEq, Eq)]
pub enum GroupError {
    #[error("no attribute keys to group by")]
    NoKeys,

    #[error("sample {sample} references non-existent attribute {attribute}")]
    AttributeOutOfRange { sample: usize, attribute: i32 },
}

pub type Result<T> = std::result::Result<T, GroupError>;

/// Group `samples` by the values of their attributes whose key is in `keys`.
///
/// A sample's group name is the rendered non-empty values of its matching
/// attributes, taken in attribute index order and joined with `/`. Samples
/// without any such value land in [`DEFAULT_GROUP`]. Neither the samples nor
/// the attribute table are modified.
pub fn group_by_attributes<'a>(
    samples: &'a [Sample],
    attributes: &[KeyValue],
    keys: &[&str],
) -> Result<BTreeMap<String, Vec<&'a Sample>>> {
    if keys.is_empty() {
        return Err(GroupError::NoKeys);
    }

    let mut groups: BTreeMap<String, Vec<&Sample>> = BTreeMap::new();
    for (position, sample) in samples.iter().enumerate() {
        let name = group_name(position, sample, attributes, keys)?;
        groups.entry(name).or_default().push(sample);
    }
    Ok(groups)
}

/// Group every sample of `profile`.
pub fn group_profile<'a>(
    profile: &'a Profile,
    keys: &[&str],
) -> Result<BTreeMap<String, Vec<&'a Sample>>> {
    group_by_attributes(&profile.sample, &profile.attribute_table, keys)
}

fn group_name(
    position: usize,
    sample: &Sample,
    attributes: &[KeyValue],
    keys: &[&str],
) -> Result<String> {
    let mut indices = sample.attribute_indices.clone();
    indices.sort_unstable();

    let mut parts = Vec::new();
    for attribute in indices {
        let kv = usize::try_from(attribute)
            .ok()
            .and_then(|i| attributes.get(i))
            .ok_or(GroupError::AttributeOutOfRange {
                sample: position,
                attribute,
            })?;
        if !keys.contains(&kv.key.as_str()) {
            continue;
        }
        let part = kv
            .value
            .as_ref()
            .map(ToString::to_string)
            .unwrap_or_default();
        if !part.is_empty() {
            parts.push(part);
        }
    }

    let name = parts.join("/");
    if name.is_empty() {
        Ok(DEFAULT_GROUP.to_string())
    } else {
        Ok(name)
    }
}
