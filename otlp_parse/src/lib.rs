//! OTLP (OpenTelemetry) profiles parser library.
//!
//! This library models the table-indexed OTLP profiles representation, reads
//! it from its JSON encoding, checks cross-table referential integrity and
//! writes it back out.
//!
//! Every entity in a [`Profile`] is stored once in a shared table and referenced
//! elsewhere by its zero-based `i32` index. Index 0 of the string table is the
//! empty string.
//!
//! # Example
//!
//! ```no_run
//! use std::fs::File;
//! use otlp_parse::ExportProfilesServiceRequest;
//!
//! let file = File::open("profiles.json").unwrap();
//! let request = ExportProfilesServiceRequest::parse(file).unwrap();
//!
//! for profile in request.profiles() {
//!     println!("Samples: {}", profile.sample.len());
//!     println!("Functions: {}", profile.function_table.len());
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::{Read, Write};
use thiserror::Error;

/// Errors that can occur during OTLP parsing.
#[derive(Error, Debug)]
pub enum ParseError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid profile {profile}: {source}")]
    InvalidProfile {
        profile: usize,
        #[source]
        source: ProfileError,
    },
}

/// Result type for OTLP parsing operations.
pub type Result<T> = std::result::Result<T, ParseError>;

/// Referential integrity violations found inside a single [`Profile`].
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ProfileError {
    #[error("string table must start with the empty string")]
    MissingEmptyString,

    #[error("{entity} {index} references non-existent string {strindex}")]
    InvalidStringReference {
        entity: &'static str,
        index: usize,
        strindex: i32,
    },

    #[error("location {location} line {line} references non-existent function {function}")]
    InvalidFunctionReference {
        location: usize,
        line: usize,
        function: i32,
    },

    #[error("location {location} references non-existent mapping {mapping}")]
    InvalidMappingReference { location: usize, mapping: i32 },

    #[error("location index {position} references non-existent location {location}")]
    InvalidLocationReference { position: usize, location: i32 },

    #[error("sample {sample} location range {start}+{length} exceeds {available} location indices")]
    InvalidLocationRange {
        sample: usize,
        start: i32,
        length: i32,
        available: usize,
    },

    #[error("{entity} {index} references non-existent attribute {attribute}")]
    InvalidAttributeReference {
        entity: &'static str,
        index: usize,
        attribute: i32,
    },

    #[error("sample {sample} references non-existent link {link}")]
    InvalidLinkReference { sample: usize, link: i32 },
}

/// Errors that can occur during OTLP writing.
#[derive(Error, Debug)]
pub enum WriteError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for OTLP writing operations.
pub type WriteResult<T> = std::result::Result<T, WriteError>;

// ============================================================================
// Common types
// ============================================================================

/// A typed attribute value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AnyValue {
    StringValue(String),
    BoolValue(bool),
    IntValue(i64),
    DoubleValue(f64),
    ArrayValue(ArrayValue),
}

impl AnyValue {
    /// The string payload, if this is a string value.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            AnyValue::StringValue(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for AnyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnyValue::StringValue(s) => f.write_str(s),
            AnyValue::BoolValue(b) => write!(f, "{}", b),
            AnyValue::IntValue(i) => write!(f, "{}", i),
            AnyValue::DoubleValue(d) => write!(f, "{}", d),
            AnyValue::ArrayValue(array) => {
                for (i, value) in array.values.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "{}", value)?;
                }
                Ok(())
            }
        }
    }
}

/// A list of values.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArrayValue {
    pub values: Vec<AnyValue>,
}

/// Key/value attribute.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeyValue {
    pub key: String,
    pub value: Option<AnyValue>,
}

impl KeyValue {
    /// Build a string-valued attribute.
    pub fn string(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: Some(AnyValue::StringValue(value.into())),
        }
    }
}

/// Resource the profiles were collected from.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Resource {
    pub attributes: Vec<KeyValue>,
    pub dropped_attributes_count: u32,
}

/// Instrumentation scope that produced the profiles.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InstrumentationScope {
    pub name: String,
    pub version: String,
}

// ============================================================================
// Envelope types
// ============================================================================

/// Top-level export message.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ExportProfilesServiceRequest {
    pub resource_profiles: Vec<ResourceProfiles>,
}

/// Profiles grouped by resource.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ResourceProfiles {
    pub resource: Option<Resource>,
    pub scope_profiles: Vec<ScopeProfiles>,
    pub schema_url: String,
}

/// Profiles grouped by instrumentation scope.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ScopeProfiles {
    pub scope: Option<InstrumentationScope>,
    pub profiles: Vec<Profile>,
    pub schema_url: String,
}

// ============================================================================
// Profile tables
// ============================================================================

/// Sample or period type, as string table indices.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ValueType {
    pub type_strindex: i32,
    pub unit_strindex: i32,
}

/// A function entry in the function table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Function {
    pub name_strindex: i32,
    pub system_name_strindex: i32,
    pub filename_strindex: i32,
    pub start_line: i64,
}

/// A memory mapping entry in the mapping table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Mapping {
    pub memory_start: u64,
    pub memory_limit: u64,
    pub file_offset: u64,
    pub filename_strindex: i32,
    pub attribute_indices: Vec<i32>,
    pub has_functions: bool,
    pub has_filenames: bool,
    pub has_line_numbers: bool,
    pub has_inline_frames: bool,
}

/// Source line of a (possibly inlined) frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Line {
    pub function_index: i32,
    pub line: i64,
    pub column: i64,
}

/// A location entry in the location table.
///
/// `line` holds inlined frames in source order. An absent `mapping_index`
/// means the location has no known mapping.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Location {
    pub mapping_index: Option<i32>,
    pub address: u64,
    pub line: Vec<Line>,
    pub is_folded: bool,
    pub attribute_indices: Vec<i32>,
}

/// Unit attached to all attributes with a given key.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AttributeUnit {
    pub attribute_key_strindex: i32,
    pub unit_strindex: i32,
}

/// Link from a sample to a trace span.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Link {
    pub trace_id: String,
    pub span_id: String,
}

/// A sample. Its stack is `location_indices[start..start + length]`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Sample {
    pub locations_start_index: i32,
    pub locations_length: i32,
    pub value: Vec<i64>,
    pub attribute_indices: Vec<i32>,
    pub link_index: Option<i32>,
    pub timestamps_unix_nano: Vec<u64>,
}

/// A profile with all of its lookup tables.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Profile {
    pub sample_type: Vec<ValueType>,
    pub sample: Vec<Sample>,
    pub mapping_table: Vec<Mapping>,
    pub location_table: Vec<Location>,
    pub location_indices: Vec<i32>,
    pub function_table: Vec<Function>,
    pub attribute_table: Vec<KeyValue>,
    pub attribute_units: Vec<AttributeUnit>,
    pub link_table: Vec<Link>,
    pub string_table: Vec<String>,
    pub time_nanos: i64,
    pub duration_nanos: i64,
    pub period_type: Option<ValueType>,
    pub period: i64,
    pub comment_strindices: Vec<i32>,
}

fn slot(index: i32) -> Option<usize> {
    usize::try_from(index).ok()
}

impl Profile {
    /// Resolve a string table index.
    pub fn string(&self, strindex: i32) -> Option<&str> {
        slot(strindex)
            .and_then(|i| self.string_table.get(i))
            .map(String::as_str)
    }

    /// Resolve a function table index.
    pub fn function(&self, index: i32) -> Option<&Function> {
        slot(index).and_then(|i| self.function_table.get(i))
    }

    /// Resolve a mapping table index.
    pub fn mapping(&self, index: i32) -> Option<&Mapping> {
        slot(index).and_then(|i| self.mapping_table.get(i))
    }

    /// Resolve a location table index.
    pub fn location(&self, index: i32) -> Option<&Location> {
        slot(index).and_then(|i| self.location_table.get(i))
    }

    /// Resolve an attribute table index.
    pub fn attribute(&self, index: i32) -> Option<&KeyValue> {
        slot(index).and_then(|i| self.attribute_table.get(i))
    }

    /// Name of a function, resolved through the string table.
    pub fn function_name(&self, function: &Function) -> Option<&str> {
        self.string(function.name_strindex)
    }

    /// The slice of `location_indices` making up a sample's stack.
    pub fn sample_locations(&self, sample: &Sample) -> Option<&[i32]> {
        let start = slot(sample.locations_start_index)?;
        let length = slot(sample.locations_length)?;
        self.location_indices.get(start..start.checked_add(length)?)
    }

    /// Check that every cross-table reference points at an existing entry.
    pub fn validate(&self) -> std::result::Result<(), ProfileError> {
        if self.string_table.first().map(String::as_str) != Some("") {
            return Err(ProfileError::MissingEmptyString);
        }

        let check_string = |entity: &'static str, index: usize, strindex: i32| {
            if self.string(strindex).is_none() {
                return Err(ProfileError::InvalidStringReference {
                    entity,
                    index,
                    strindex,
                });
            }
            Ok(())
        };
        let check_attributes = |entity: &'static str, index: usize, attributes: &[i32]| {
            for &attribute in attributes {
                if self.attribute(attribute).is_none() {
                    return Err(ProfileError::InvalidAttributeReference {
                        entity,
                        index,
                        attribute,
                    });
                }
            }
            Ok(())
        };

        for (i, value_type) in self.sample_type.iter().chain(&self.period_type).enumerate() {
            check_string("value type", i, value_type.type_strindex)?;
            check_string("value type", i, value_type.unit_strindex)?;
        }

        for (i, &strindex) in self.comment_strindices.iter().enumerate() {
            check_string("comment", i, strindex)?;
        }

        for (i, function) in self.function_table.iter().enumerate() {
            check_string("function", i, function.name_strindex)?;
            check_string("function", i, function.system_name_strindex)?;
            check_string("function", i, function.filename_strindex)?;
        }

        for (i, mapping) in self.mapping_table.iter().enumerate() {
            check_string("mapping", i, mapping.filename_strindex)?;
            check_attributes("mapping", i, &mapping.attribute_indices)?;
        }

        for (i, unit) in self.attribute_units.iter().enumerate() {
            check_string("attribute unit", i, unit.attribute_key_strindex)?;
            check_string("attribute unit", i, unit.unit_strindex)?;
        }

        for (i, location) in self.location_table.iter().enumerate() {
            if let Some(mapping) = location.mapping_index {
                if self.mapping(mapping).is_none() {
                    return Err(ProfileError::InvalidMappingReference {
                        location: i,
                        mapping,
                    });
                }
            }
            for (j, line) in location.line.iter().enumerate() {
                if self.function(line.function_index).is_none() {
                    return Err(ProfileError::InvalidFunctionReference {
                        location: i,
                        line: j,
                        function: line.function_index,
                    });
                }
            }
            check_attributes("location", i, &location.attribute_indices)?;
        }

        for (position, &location) in self.location_indices.iter().enumerate() {
            if self.location(location).is_none() {
                return Err(ProfileError::InvalidLocationReference { position, location });
            }
        }

        for (i, sample) in self.sample.iter().enumerate() {
            if self.sample_locations(sample).is_none() {
                return Err(ProfileError::InvalidLocationRange {
                    sample: i,
                    start: sample.locations_start_index,
                    length: sample.locations_length,
                    available: self.location_indices.len(),
                });
            }
            check_attributes("sample", i, &sample.attribute_indices)?;
            if let Some(link) = sample.link_index {
                if slot(link).and_then(|l| self.link_table.get(l)).is_none() {
                    return Err(ProfileError::InvalidLinkReference { sample: i, link });
                }
            }
        }

        Ok(())
    }
}

// ============================================================================
// Reading and writing
// ============================================================================

impl ExportProfilesServiceRequest {
    /// Parse a JSON-encoded export request from any `Read`-able source.
    ///
    /// Every contained profile is validated before returning.
    pub fn parse<R: Read>(reader: R) -> Result<Self> {
        let request: ExportProfilesServiceRequest = serde_json::from_reader(reader)?;
        request.validate()?;
        Ok(request)
    }

    /// Validate every profile in the request, in envelope order.
    pub fn validate(&self) -> Result<()> {
        for (profile, p) in self.profiles().enumerate() {
            p.validate()
                .map_err(|source| ParseError::InvalidProfile { profile, source })?;
        }
        Ok(())
    }

    /// Wrap a single profile in a request with one resource and one scope.
    pub fn single(
        resource: Option<Resource>,
        scope: Option<InstrumentationScope>,
        profile: Profile,
    ) -> Self {
        Self {
            resource_profiles: vec![ResourceProfiles {
                resource,
                scope_profiles: vec![ScopeProfiles {
                    scope,
                    profiles: vec![profile],
                    schema_url: String::new(),
                }],
                schema_url: String::new(),
            }],
        }
    }

    /// Iterate over every profile across all resources and scopes.
    pub fn profiles(&self) -> impl Iterator<Item = &Profile> {
        self.resource_profiles
            .iter()
            .flat_map(|r| &r.scope_profiles)
            .flat_map(|s| &s.profiles)
    }

    /// Write this request as a single line of JSON.
    pub fn write<W: Write>(&self, mut writer: W) -> WriteResult<()> {
        serde_json::to_writer(&mut writer, self)?;
        writeln!(writer)?;
        Ok(())
    }

    /// Write this request as indented JSON.
    pub fn write_pretty<W: Write>(&self, mut writer: W) -> WriteResult<()> {
        serde_json::to_writer_pretty(&mut writer, self)?;
        writeln!(writer)?;
        Ok(())
    }
}
