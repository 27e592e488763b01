//! Plain-text report of an OTLP profile, with samples grouped by attribute.
//!
//! Each sample is printed with its values, its attributes and its stack, one
//! function per line. The indent grows one step per frame, plus one more step
//! after each location, so inlined frames stand apart from their callers.

use crate::group::{GroupError, group_profile};
use otlp_parse::{Profile, Sample};
use std::io::{self, Write};
use thiserror::Error;

/// Attribute keys the report groups by unless told otherwise.
pub const DEFAULT_GROUP_KEYS: [&str; 2] = ["thread.name", "process.pid"];

#[derive(Error, Debug)]
pub enum ReportError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("grouping error: {0}")]
    Group(#[from] GroupError),
}

pub type Result<T> = std::result::Result<T, ReportError>;

/// Write a report of `profile` with samples grouped by `keys`.
pub fn write_report<W: Write>(mut writer: W, profile: &Profile, keys: &[&str]) -> Result<()> {
    writeln!(
        writer,
        "profile time_nanos={} duration_nanos={} period={}",
        profile.time_nanos, profile.duration_nanos, profile.period
    )?;

    let groups = group_profile(profile, keys)?;
    for (name, samples) in &groups {
        writeln!(writer, "== {} ({} samples) ==", name, samples.len())?;
        for sample in samples {
            write_sample(&mut writer, profile, sample)?;
        }
    }
    Ok(())
}

fn write_sample<W: Write>(writer: &mut W, profile: &Profile, sample: &Sample) -> io::Result<()> {
    write!(writer, "sample value={:?}", sample.value)?;
    for &index in &sample.attribute_indices {
        if let Some(attribute) = profile.attribute(index) {
            match &attribute.value {
                Some(value) => write!(writer, " {}={}", attribute.key, value)?,
                None => write!(writer, " {}", attribute.key)?,
            }
        }
    }
    writeln!(writer)?;

    let Some(locations) = profile.sample_locations(sample) else {
        return writeln!(writer, "  <invalid location range>");
    };

    let mut indent = String::from("  ");
    for &index in locations {
        match profile.location(index) {
            None => writeln!(writer, "{}<missing location {}>", indent, index)?,
            Some(location) if location.line.is_empty() => {
                writeln!(writer, "{}{:#x}", indent, location.address)?
            }
            Some(location) => {
                for line in &location.line {
                    let name = profile
                        .function(line.function_index)
                        .and_then(|f| profile.function_name(f))
                        .filter(|name| !name.is_empty())
                        .unwrap_or("??");
                    writeln!(writer, "{}{}", indent, name)?;
                    indent.push_str("  ");
                }
            }
        }
        indent.push_str("  ");
    }
    Ok(())
}
