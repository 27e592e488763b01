//! Translate pprof profiles into OTLP indexed profiles.
//!
//! The pprof object graph links samples, locations, mappings and functions by
//! reference. The OTLP representation stores every entity once in a shared
//! table and refers to it by index. [`Translator`] walks the graph in a fixed
//! order (functions, then mappings, then samples) and appends to the tables
//! held by a [`ProfileBuilder`].
//!
//! Deduplication:
//!
//! - strings by exact value,
//! - functions by display name only (system name and filename are ignored,
//!   so two functions sharing a name collapse into the first one converted),
//! - mappings by `(start, limit, offset)`.
//!
//! Locations and attributes are never deduplicated: each sample appends its
//! own contiguous run of locations and its own attribute entries.
//!
//! # Example
//!
//! ```no_run
//! use pprof_otlp::pprof::Profile;
//! use pprof_otlp::translate::Translator;
//! use std::fs::File;
//!
//! let source = Profile::parse(File::open("profile.json").unwrap()).unwrap();
//! let translation = Translator::new().translate(&source).unwrap();
//! println!("Locations: {}", translation.profile.location_table.len());
//! ```

use crate::interner::StringInterner;
use crate::pprof;
use indexmap::IndexMap;
use otlp_parse::{
    AnyValue, ArrayValue, AttributeUnit, Function, KeyValue, Line, Location, Mapping, Profile,
    Sample, ValueType,
};
use std::fmt;
use thiserror::Error;
use tracing::{debug, warn};

/// Kind of pprof entity named in a [`TranslateError::DanglingReference`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Function,
    Mapping,
    Location,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            EntityKind::Function => "function",
            EntityKind::Mapping => "mapping",
            EntityKind::Location => "location",
        })
    }
}

/// Errors that abort a translation.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum TranslateError {
    #[error("sample {sample} has no locations")]
    EmptySample { sample: usize },

    #[error("{referrer} references non-existent {kind} #{index}")]
    DanglingReference {
        kind: EntityKind,
        referrer: String,
        index: usize,
    },

    #[error("{table} table exceeds the maximum index")]
    TableOverflow { table: &'static str },
}

pub type Result<T> = std::result::Result<T, TranslateError>;

/// Convert a table length or position into an OTLP index.
pub(crate) fn table_index(position: usize, table: &'static str) -> Result<i32> {
    i32::try_from(position).map_err(|_| TranslateError::TableOverflow { table })
}

/// Non-fatal conditions noticed during translation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Diagnostic {
    /// The location's mapping was not found in the mapping table, so the
    /// location was emitted without a mapping index.
    UnresolvedMapping { location_id: u64, mapping_id: u64 },
    /// The sample carried timestamps, which are not carried over.
    DroppedTimestamps { sample: usize, count: usize },
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::UnresolvedMapping {
                location_id,
                mapping_id,
            } => write!(
                f,
                "location {} references mapping {} missing from the mapping table",
                location_id, mapping_id
            ),
            Diagnostic::DroppedTimestamps { sample, count } => {
                write!(f, "dropped {} timestamps of sample {}", count, sample)
            }
        }
    }
}

/// Translation settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslateConfig {
    /// Placed between the values of a multi-valued string label.
    pub label_separator: String,
    /// Emit numeric labels as integer attributes, with their units.
    pub numeric_labels: bool,
    /// Carry over sample types, period, timing and comments.
    pub profile_metadata: bool,
}

impl Default for TranslateConfig {
    fn default() -> Self {
        Self {
            label_separator: ",".to_string(),
            numeric_labels: true,
            profile_metadata: true,
        }
    }
}

/// Result of a successful translation.
#[derive(Debug, Clone, PartialEq)]
pub struct Translation {
    pub profile: Profile,
    pub diagnostics: Vec<Diagnostic>,
}

type MappingKey = (u64, u64, u64);

/// The in-progress OTLP profile.
///
/// Every table is append-only. Indices handed out by the `add_*` methods stay
/// valid in the profile returned by [`ProfileBuilder::finish`].
#[derive(Debug)]
pub struct ProfileBuilder {
    config: TranslateConfig,
    strings: StringInterner,
    // Keyed by name string index.
    functions: IndexMap<i32, Function>,
    mappings: IndexMap<MappingKey, Mapping>,
    // Attribute key string index to unit string index.
    attribute_units: IndexMap<i32, i32>,
    profile: Profile,
    diagnostics: Vec<Diagnostic>,
}

impl ProfileBuilder {
    pub fn new(config: TranslateConfig) -> Self {
        Self {
            config,
            strings: StringInterner::new(),
            functions: IndexMap::new(),
            mappings: IndexMap::new(),
            attribute_units: IndexMap::new(),
            profile: Profile::default(),
            diagnostics: Vec::new(),
        }
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// Return the function table index for a function with this name,
    /// converting and appending `function` if no such function exists yet.
    pub fn add_function(&mut self, function: &pprof::Function) -> Result<i32> {
        let name_strindex = self.strings.intern(&function.name)?;
        if let Some(existing) = self.functions.get_index_of(&name_strindex) {
            return table_index(existing, "function");
        }
        let index = table_index(self.functions.len(), "function")?;
        let converted = Function {
            name_strindex,
            system_name_strindex: self.strings.intern(&function.system_name)?,
            filename_strindex: self.strings.intern(&function.filename)?,
            start_line: function.start_line,
        };
        self.functions.insert(name_strindex, converted);
        Ok(index)
    }

    /// Return the mapping table index for this address range, converting and
    /// appending `mapping` if the range is new.
    pub fn add_mapping(&mut self, mapping: &pprof::Mapping) -> Result<i32> {
        let key = (mapping.start, mapping.limit, mapping.offset);
        if let Some(existing) = self.mappings.get_index_of(&key) {
            return table_index(existing, "mapping");
        }
        let index = table_index(self.mappings.len(), "mapping")?;
        let converted = Mapping {
            memory_start: mapping.start,
            memory_limit: mapping.limit,
            file_offset: mapping.offset,
            filename_strindex: self.strings.intern(&mapping.file)?,
            attribute_indices: Vec::new(),
            has_functions: mapping.has_functions,
            has_filenames: mapping.has_filenames,
            has_line_numbers: mapping.has_line_numbers,
            has_inline_frames: mapping.has_inline_frames,
        };
        self.mappings.insert(key, converted);
        Ok(index)
    }

    fn find_mapping(&self, mapping: &pprof::Mapping) -> Option<i32> {
        self.mappings
            .get_index_of(&(mapping.start, mapping.limit, mapping.offset))
            .and_then(|i| i32::try_from(i).ok())
    }

    // Appends to the location table only; the caller owns `location_indices`.
    fn add_location(&mut self, source: &pprof::Profile, location: &pprof::Location) -> Result<i32> {
        let mapping_index = match location.mapping {
            None => None,
            Some(r) => {
                let mapping = source
                    .mapping(r)
                    .ok_or_else(|| TranslateError::DanglingReference {
                        kind: EntityKind::Mapping,
                        referrer: format!("location {}", location.id),
                        index: r.0,
                    })?;
                let found = self.find_mapping(mapping);
                if found.is_none() {
                    let diagnostic = Diagnostic::UnresolvedMapping {
                        location_id: location.id,
                        mapping_id: mapping.id,
                    };
                    warn!("{}", diagnostic);
                    self.diagnostics.push(diagnostic);
                }
                found
            }
        };

        let mut lines = Vec::with_capacity(location.line.len());
        for (i, line) in location.line.iter().enumerate() {
            let function = source
                .function(line.function)
                .ok_or_else(|| TranslateError::DanglingReference {
                    kind: EntityKind::Function,
                    referrer: format!("location {} line {}", location.id, i),
                    index: line.function.0,
                })?;
            lines.push(Line {
                function_index: self.add_function(function)?,
                line: line.line,
                column: line.column,
            });
        }

        let index = table_index(self.profile.location_table.len(), "location")?;
        self.profile.location_table.push(Location {
            mapping_index,
            address: location.address,
            line: lines,
            is_folded: location.is_folded,
            attribute_indices: Vec::new(),
        });
        Ok(index)
    }

    /// Convert a sample, appending its locations as one contiguous run and
    /// its labels as fresh attributes. `position` is the sample's index in
    /// `source`, used in errors and diagnostics.
    pub fn add_sample(
        &mut self,
        source: &pprof::Profile,
        position: usize,
        sample: &pprof::Sample,
    ) -> Result<()> {
        if sample.location.is_empty() {
            return Err(TranslateError::EmptySample { sample: position });
        }

        let start = table_index(self.profile.location_table.len(), "location")?;
        for &r in &sample.location {
            let location = source
                .location(r)
                .ok_or_else(|| TranslateError::DanglingReference {
                    kind: EntityKind::Location,
                    referrer: format!("sample {}", position),
                    index: r.0,
                })?;
            let index = self.add_location(source, location)?;
            self.profile.location_indices.push(index);
        }
        let length = table_index(sample.location.len(), "location")?;
        debug_assert_eq!(
            self.profile.location_indices.len(),
            self.profile.location_table.len()
        );

        let attribute_indices = self.add_labels(sample)?;

        if !sample.timestamps.is_empty() {
            let diagnostic = Diagnostic::DroppedTimestamps {
                sample: position,
                count: sample.timestamps.len(),
            };
            debug!("{}", diagnostic);
            self.diagnostics.push(diagnostic);
        }

        self.profile.sample.push(Sample {
            locations_start_index: start,
            locations_length: length,
            value: sample.value.clone(),
            attribute_indices,
            link_index: None,
            timestamps_unix_nano: Vec::new(),
        });
        Ok(())
    }

    fn add_labels(&mut self, sample: &pprof::Sample) -> Result<Vec<i32>> {
        let mut indices = Vec::with_capacity(sample.label.len() + sample.num_label.len());

        for (key, values) in &sample.label {
            let joined = values.join(self.config.label_separator.as_str());
            indices.push(self.push_attribute(KeyValue::string(key.clone(), joined))?);
        }

        if self.config.numeric_labels {
            for (key, values) in &sample.num_label {
                let value = match values.as_slice() {
                    [single] => AnyValue::IntValue(*single),
                    _ => AnyValue::ArrayValue(ArrayValue {
                        values: values.iter().map(|v| AnyValue::IntValue(*v)).collect(),
                    }),
                };
                indices.push(self.push_attribute(KeyValue {
                    key: key.clone(),
                    value: Some(value),
                })?);

                let unit = sample
                    .num_unit
                    .get(key)
                    .and_then(|units| units.iter().find(|u| !u.is_empty()));
                if let Some(unit) = unit {
                    self.add_attribute_unit(key, unit)?;
                }
            }
        }

        Ok(indices)
    }

    fn push_attribute(&mut self, attribute: KeyValue) -> Result<i32> {
        let index = table_index(self.profile.attribute_table.len(), "attribute")?;
        self.profile.attribute_table.push(attribute);
        Ok(index)
    }

    // First unit seen for a key wins.
    fn add_attribute_unit(&mut self, key: &str, unit: &str) -> Result<()> {
        let key_strindex = self.strings.intern(key)?;
        if self.attribute_units.contains_key(&key_strindex) {
            return Ok(());
        }
        let unit_strindex = self.strings.intern(unit)?;
        self.attribute_units.insert(key_strindex, unit_strindex);
        Ok(())
    }

    fn value_type(&mut self, value_type: &pprof::ValueType) -> Result<ValueType> {
        Ok(ValueType {
            type_strindex: self.strings.intern(&value_type.kind)?,
            unit_strindex: self.strings.intern(&value_type.unit)?,
        })
    }

    /// Copy sample types, period, timing and comments from `source`.
    pub fn add_metadata(&mut self, source: &pprof::Profile) -> Result<()> {
        for value_type in &source.sample_type {
            let converted = self.value_type(value_type)?;
            self.profile.sample_type.push(converted);
        }
        self.profile.period_type = source
            .period_type
            .as_ref()
            .map(|value_type| self.value_type(value_type))
            .transpose()?;
        self.profile.period = source.period;
        self.profile.time_nanos = source.time_nanos;
        self.profile.duration_nanos = source.duration_nanos;
        for comment in &source.comments {
            let strindex = self.strings.intern(comment)?;
            self.profile.comment_strindices.push(strindex);
        }
        Ok(())
    }

    /// Seal the tables into the finished profile.
    pub fn finish(self) -> Translation {
        let mut profile = self.profile;
        profile.string_table = self.strings.into_table();
        profile.function_table = self.functions.into_values().collect();
        profile.mapping_table = self.mappings.into_values().collect();
        profile.attribute_units = self
            .attribute_units
            .into_iter()
            .map(|(attribute_key_strindex, unit_strindex)| AttributeUnit {
                attribute_key_strindex,
                unit_strindex,
            })
            .collect();
        Translation {
            profile,
            diagnostics: self.diagnostics,
        }
    }
}

/// Drives a full pprof to OTLP translation.
#[derive(Debug, Clone, Default)]
pub struct Translator {
    config: TranslateConfig,
}

impl Translator {
    /// Create a translator with the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: TranslateConfig) -> Self {
        Self { config }
    }

    /// Translate `source` in one pass.
    ///
    /// Functions are converted first, then mappings, then samples in input
    /// order. Any error aborts the whole translation.
    pub fn translate(&self, source: &pprof::Profile) -> Result<Translation> {
        let mut builder = ProfileBuilder::new(self.config.clone());

        for function in &source.function {
            builder.add_function(function)?;
        }
        debug!(
            functions = builder.functions.len(),
            strings = builder.strings.len(),
            "converted functions"
        );

        for mapping in &source.mapping {
            builder.add_mapping(mapping)?;
        }
        debug!(
            mappings = builder.mappings.len(),
            strings = builder.strings.len(),
            "converted mappings"
        );

        for (position, sample) in source.sample.iter().enumerate() {
            builder.add_sample(source, position, sample)?;
        }
        debug!(
            samples = builder.profile.sample.len(),
            locations = builder.profile.location_table.len(),
            attributes = builder.profile.attribute_table.len(),
            "converted samples"
        );

        if self.config.profile_metadata {
            builder.add_metadata(source)?;
        }

        Ok(builder.finish())
    }
}

/// Translate with the default configuration.
pub fn to_otlp(source: &pprof::Profile) -> Result<Translation> {
    Translator::new().translate(source)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pprof::{FunctionRef, LocationRef, MappingRef};

    fn function(id: u64, name: &str, filename: &str) -> pprof::Function {
        pprof::Function {
            id,
            name: name.to_string(),
            filename: filename.to_string(),
            ..Default::default()
        }
    }

    fn mapping(id: u64, start: u64, limit: u64, offset: u64, file: &str) -> pprof::Mapping {
        pprof::Mapping {
            id,
            start,
            limit,
            offset,
            file: file.to_string(),
            ..Default::default()
        }
    }

    fn location(id: u64, mapping: usize, functions: &[usize]) -> pprof::Location {
        pprof::Location {
            id,
            mapping: Some(MappingRef(mapping)),
            address: 0x1000 + id,
            line: functions
                .iter()
                .enumerate()
                .map(|(i, &f)| pprof::Line {
                    function: FunctionRef(f),
                    line: 10 * (i as i64 + 1),
                    column: 0,
                })
                .collect(),
            is_folded: false,
        }
    }

    fn sample(locations: &[usize], value: i64) -> pprof::Sample {
        pprof::Sample {
            location: locations.iter().map(|&l| LocationRef(l)).collect(),
            value: vec![value],
            ..Default::default()
        }
    }

    fn labelled(mut sample: pprof::Sample, key: &str, values: &[&str]) -> pprof::Sample {
        sample.label.insert(
            key.to_string(),
            values.iter().map(|v| v.to_string()).collect(),
        );
        sample
    }

    fn single_location_profile() -> pprof::Profile {
        pprof::Profile {
            function: vec![function(1, "f", "a.go")],
            mapping: vec![mapping(1, 0x1000, 0x2000, 0, "")],
            location: vec![location(1, 0, &[0])],
            sample: vec![labelled(sample(&[0], 5), "thread.name", &["t1"])],
            ..Default::default()
        }
    }

    #[test]
    fn end_to_end_single_location() {
        let translation = to_otlp(&single_location_profile()).unwrap();
        let profile = &translation.profile;

        assert_eq!(profile.string_table, vec!["", "f", "a.go"]);
        assert_eq!(profile.function_table.len(), 1);
        assert_eq!(profile.function_table[0].name_strindex, 1);
        assert_eq!(profile.function_table[0].system_name_strindex, 0);
        assert_eq!(profile.function_table[0].filename_strindex, 2);
        assert_eq!(profile.mapping_table.len(), 1);
        assert_eq!(profile.mapping_table[0].memory_start, 0x1000);
        assert_eq!(profile.mapping_table[0].memory_limit, 0x2000);
        assert!(profile.mapping_table[0].attribute_indices.is_empty());
        assert_eq!(profile.location_table.len(), 1);
        assert_eq!(profile.location_table[0].mapping_index, Some(0));
        assert_eq!(profile.location_indices, vec![0]);

        assert_eq!(profile.sample.len(), 1);
        let s = &profile.sample[0];
        assert_eq!(s.locations_start_index, 0);
        assert_eq!(s.locations_length, 1);
        assert_eq!(s.value, vec![5]);
        assert_eq!(s.link_index, None);
        assert!(s.timestamps_unix_nano.is_empty());

        assert_eq!(profile.attribute_table.len(), 1);
        assert_eq!(profile.attribute_table[0].key, "thread.name");
        assert_eq!(
            profile.attribute_table[0].value,
            Some(AnyValue::StringValue("t1".to_string()))
        );
        assert_eq!(s.attribute_indices, vec![0]);

        assert!(profile.attribute_units.is_empty());
        assert!(profile.link_table.is_empty());
        assert!(translation.diagnostics.is_empty());
        assert_eq!(profile.validate(), Ok(()));
    }

    #[test]
    fn functions_dedup_by_name_only() {
        let source = pprof::Profile {
            function: vec![function(1, "f", "a.go"), function(2, "f", "b.go")],
            mapping: vec![mapping(1, 0x1000, 0x2000, 0, "")],
            location: vec![location(1, 0, &[1])],
            sample: vec![sample(&[0], 1)],
            ..Default::default()
        };
        let profile = to_otlp(&source).unwrap().profile;

        // The second function's filename is lost.
        assert_eq!(profile.function_table.len(), 1);
        assert_eq!(
            profile.string(profile.function_table[0].filename_strindex),
            Some("a.go")
        );
        assert!(!profile.string_table.iter().any(|s| s == "b.go"));
        assert_eq!(profile.location_table[0].line[0].function_index, 0);
    }

    #[test]
    fn first_function_resolves_to_index_zero() {
        let source = pprof::Profile {
            function: vec![
                function(1, "main", "main.go"),
                function(2, "work", "work.go"),
            ],
            location: vec![pprof::Location {
                id: 1,
                line: vec![
                    pprof::Line {
                        function: FunctionRef(0),
                        line: 1,
                        column: 0,
                    },
                    pprof::Line {
                        function: FunctionRef(1),
                        line: 2,
                        column: 0,
                    },
                ],
                ..Default::default()
            }],
            sample: vec![sample(&[0], 1)],
            ..Default::default()
        };
        let profile = to_otlp(&source).unwrap().profile;

        assert_eq!(profile.function_table.len(), 2);
        let lines = &profile.location_table[0].line;
        assert_eq!(lines[0].function_index, 0);
        assert_eq!(lines[1].function_index, 1);
    }

    #[test]
    fn mappings_dedup_by_range() {
        let source = pprof::Profile {
            function: vec![function(1, "f", "a.go")],
            mapping: vec![
                mapping(1, 0x1000, 0x2000, 0x10, "/bin/first"),
                mapping(2, 0x1000, 0x2000, 0x10, "/bin/second"),
                mapping(3, 0x1000, 0x2000, 0x20, "/bin/third"),
            ],
            location: vec![location(1, 1, &[0]), location(2, 2, &[0])],
            sample: vec![sample(&[0, 1], 1)],
            ..Default::default()
        };
        let profile = to_otlp(&source).unwrap().profile;

        assert_eq!(profile.mapping_table.len(), 2);
        assert_eq!(
            profile.string(profile.mapping_table[0].filename_strindex),
            Some("/bin/first")
        );
        assert!(!profile.string_table.iter().any(|s| s == "/bin/second"));
        assert_eq!(profile.location_table[0].mapping_index, Some(0));
        assert_eq!(profile.location_table[1].mapping_index, Some(1));
    }

    #[test]
    fn location_ranges_are_contiguous() {
        let source = pprof::Profile {
            function: vec![
                function(1, "a", ""),
                function(2, "b", ""),
                function(3, "c", ""),
            ],
            mapping: vec![mapping(1, 0, 0x1000, 0, "")],
            location: vec![
                location(1, 0, &[0]),
                location(2, 0, &[1]),
                location(3, 0, &[2]),
            ],
            sample: vec![sample(&[0, 1], 1), sample(&[2], 2), sample(&[0, 1, 2], 3)],
            ..Default::default()
        };
        let profile = to_otlp(&source).unwrap().profile;

        let ranges: Vec<(i32, i32)> = profile
            .sample
            .iter()
            .map(|s| (s.locations_start_index, s.locations_length))
            .collect();
        assert_eq!(ranges, vec![(0, 2), (2, 1), (3, 3)]);

        let mut next = 0;
        for (start, length) in ranges {
            assert_eq!(start, next);
            next = start + length;
        }
        assert_eq!(next as usize, profile.location_table.len());
        assert_eq!(profile.location_indices, (0..6).collect::<Vec<i32>>());
        assert_eq!(profile.validate(), Ok(()));
    }

    #[test]
    fn lines_keep_count_and_order() {
        let source = pprof::Profile {
            function: vec![
                function(1, "outer", ""),
                function(2, "mid", ""),
                function(3, "inner", ""),
            ],
            mapping: vec![mapping(1, 0, 0x1000, 0, "")],
            location: vec![location(1, 0, &[2, 1, 0])],
            sample: vec![sample(&[0], 1)],
            ..Default::default()
        };
        let profile = to_otlp(&source).unwrap().profile;

        let lines = &profile.location_table[0].line;
        assert_eq!(lines.len(), 3);
        let names: Vec<&str> = lines
            .iter()
            .map(|l| {
                let function = profile.function(l.function_index).unwrap();
                profile.function_name(function).unwrap()
            })
            .collect();
        assert_eq!(names, vec!["inner", "mid", "outer"]);
        let numbers: Vec<i64> = lines.iter().map(|l| l.line).collect();
        assert_eq!(numbers, vec![10, 20, 30]);
    }

    #[test]
    fn attributes_are_not_deduplicated() {
        let mut source = single_location_profile();
        source.sample = vec![
            labelled(sample(&[0], 1), "thread.name", &["main"]),
            labelled(sample(&[0], 2), "thread.name", &["main"]),
        ];
        let profile = to_otlp(&source).unwrap().profile;

        assert_eq!(profile.attribute_table.len(), 2);
        assert_eq!(profile.attribute_table[0], profile.attribute_table[1]);
        assert_eq!(profile.sample[0].attribute_indices, vec![0]);
        assert_eq!(profile.sample[1].attribute_indices, vec![1]);
        // Locations are not shared between samples either.
        assert_eq!(profile.location_table.len(), 2);
    }

    #[test]
    fn multi_valued_labels_are_joined() {
        let mut source = single_location_profile();
        source.sample = vec![labelled(sample(&[0], 1), "tags", &["a", "b", "c"])];

        let profile = to_otlp(&source).unwrap().profile;
        assert_eq!(
            profile.attribute_table[0].value,
            Some(AnyValue::StringValue("a,b,c".to_string()))
        );

        let translator = Translator::with_config(TranslateConfig {
            label_separator: ";".to_string(),
            ..Default::default()
        });
        let profile = translator.translate(&source).unwrap().profile;
        assert_eq!(
            profile.attribute_table[0].value,
            Some(AnyValue::StringValue("a;b;c".to_string()))
        );
    }

    #[test]
    fn empty_sample_fails_with_its_position() {
        let mut source = single_location_profile();
        source.sample.push(sample(&[], 1));

        let result = to_otlp(&source);
        assert_eq!(result, Err(TranslateError::EmptySample { sample: 1 }));
    }

    #[test]
    fn dangling_location_fails() {
        let mut source = single_location_profile();
        source.sample = vec![sample(&[0, 4], 1)];

        let result = to_otlp(&source);
        assert!(matches!(
            result,
            Err(TranslateError::DanglingReference {
                kind: EntityKind::Location,
                ref referrer,
                index: 4,
            }) if referrer == "sample 0"
        ));
    }

    #[test]
    fn dangling_function_fails() {
        let mut source = single_location_profile();
        source.location = vec![location(7, 0, &[3])];

        let err = to_otlp(&source).unwrap_err();
        assert_eq!(
            err.to_string(),
            "location 7 line 0 references non-existent function #3"
        );
    }

    #[test]
    fn location_without_mapping_has_no_index() {
        let mut source = single_location_profile();
        source.location[0].mapping = None;

        let translation = to_otlp(&source).unwrap();
        assert_eq!(translation.profile.location_table[0].mapping_index, None);
        assert!(translation.diagnostics.is_empty());
    }

    #[test]
    fn unconverted_mapping_is_reported() {
        let source = single_location_profile();
        let mut builder = ProfileBuilder::new(TranslateConfig::default());

        let index = builder.add_location(&source, &source.location[0]).unwrap();
        assert_eq!(index, 0);
        assert_eq!(
            builder.diagnostics(),
            &[Diagnostic::UnresolvedMapping {
                location_id: 1,
                mapping_id: 1
            }]
        );

        let translation = builder.finish();
        assert_eq!(translation.profile.location_table[0].mapping_index, None);
        // The line still converted its function on demand.
        assert_eq!(translation.profile.function_table.len(), 1);
    }

    #[test]
    fn numeric_labels_carry_units() {
        let mut source = single_location_profile();
        let s = &mut source.sample[0];
        s.num_label.insert("bytes".to_string(), vec![512]);
        s.num_label.insert("ids".to_string(), vec![1, 2]);
        s.num_unit
            .insert("bytes".to_string(), vec!["byte".to_string()]);

        let profile = to_otlp(&source).unwrap().profile;

        assert_eq!(profile.attribute_table.len(), 3);
        assert_eq!(profile.attribute_table[1].key, "bytes");
        assert_eq!(
            profile.attribute_table[1].value,
            Some(AnyValue::IntValue(512))
        );
        assert_eq!(
            profile.attribute_table[2].value,
            Some(AnyValue::ArrayValue(ArrayValue {
                values: vec![AnyValue::IntValue(1), AnyValue::IntValue(2)]
            }))
        );
        assert_eq!(profile.sample[0].attribute_indices, vec![0, 1, 2]);

        assert_eq!(profile.attribute_units.len(), 1);
        let unit = profile.attribute_units[0];
        assert_eq!(profile.string(unit.attribute_key_strindex), Some("bytes"));
        assert_eq!(profile.string(unit.unit_strindex), Some("byte"));
        assert_eq!(profile.validate(), Ok(()));
    }

    #[test]
    fn numeric_labels_can_be_disabled() {
        let mut source = single_location_profile();
        let s = &mut source.sample[0];
        s.num_label.insert("bytes".to_string(), vec![512]);

        let translator = Translator::with_config(TranslateConfig {
            numeric_labels: false,
            ..Default::default()
        });
        let profile = translator.translate(&source).unwrap().profile;
        assert_eq!(profile.attribute_table.len(), 1);
        assert!(profile.attribute_units.is_empty());
    }

    #[test]
    fn timestamps_are_dropped_with_diagnostic() {
        let mut source = single_location_profile();
        source.sample[0].timestamps = vec![100, 200];

        let translation = to_otlp(&source).unwrap();
        let sample = &translation.profile.sample[0];
        assert!(sample.timestamps_unix_nano.is_empty());
        assert_eq!(
            translation.diagnostics,
            vec![Diagnostic::DroppedTimestamps {
                sample: 0,
                count: 2
            }]
        );
    }

    #[test]
    fn metadata_is_interned_after_samples() {
        let mut source = single_location_profile();
        source.sample_type = vec![pprof::ValueType {
            kind: "cpu".to_string(),
            unit: "nanoseconds".to_string(),
        }];
        source.period_type = Some(pprof::ValueType {
            kind: "cpu".to_string(),
            unit: "nanoseconds".to_string(),
        });
        source.period = 10_000_000;
        source.time_nanos = 1_700_000_000_000_000_000;
        source.duration_nanos = 1_000_000_000;
        source.comments = vec!["note".to_string()];

        let profile = to_otlp(&source).unwrap().profile;
        assert_eq!(
            profile.string_table,
            vec!["", "f", "a.go", "cpu", "nanoseconds", "note"]
        );
        assert_eq!(
            profile.sample_type,
            vec![ValueType {
                type_strindex: 3,
                unit_strindex: 4
            }]
        );
        assert_eq!(profile.period_type, Some(profile.sample_type[0]));
        assert_eq!(profile.period, 10_000_000);
        assert_eq!(profile.time_nanos, 1_700_000_000_000_000_000);
        assert_eq!(profile.duration_nanos, 1_000_000_000);
        assert_eq!(profile.comment_strindices, vec![5]);

        let translator = Translator::with_config(TranslateConfig {
            profile_metadata: false,
            ..Default::default()
        });
        let bare = translator.translate(&source).unwrap().profile;
        assert_eq!(bare.string_table, vec!["", "f", "a.go"]);
        assert!(bare.sample_type.is_empty());
        assert_eq!(bare.period, 0);
    }

    #[test]
    fn empty_profile_translates() {
        let profile = to_otlp(&pprof::Profile::default()).unwrap().profile;

        assert_eq!(profile.string_table, vec![""]);
        assert!(profile.sample.is_empty());
        assert!(profile.location_indices.is_empty());
        assert_eq!(profile.validate(), Ok(()));
    }

    #[test]
    fn table_index_overflow() {
        assert_eq!(table_index(7, "string"), Ok(7));
        assert_eq!(
            table_index(i32::MAX as usize + 1, "location"),
            Err(TranslateError::TableOverflow { table: "location" })
        );
    }
}
