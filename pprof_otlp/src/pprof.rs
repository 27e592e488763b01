//! The pprof object graph consumed by the translator.
//!
//! Entities live in per-kind arenas owned by [`Profile`] and refer to each
//! other by arena position ([`FunctionRef`], [`MappingRef`], [`LocationRef`]).
//! The opaque `id` carried by each entity is kept for display only.
//!
//! Profiles are loaded from JSON. Gzip and zstd compressed input is detected
//! by its magic bytes and decompressed transparently.
//!
//! # Example
//!
//! ```no_run
//! use pprof_otlp::pprof::Profile;
//! use std::fs::File;
//!
//! let profile = Profile::parse(File::open("profile.json.gz").unwrap()).unwrap();
//! println!("Samples: {}", profile.sample.len());
//! ```

use crate::output::decompressed;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::Read;
use thiserror::Error;

/// Errors that can occur while loading a pprof profile.
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, LoadError>;

/// Position of a [`Function`] in [`Profile::function`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FunctionRef(pub usize);

/// Position of a [`Mapping`] in [`Profile::mapping`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MappingRef(pub usize);

/// Position of a [`Location`] in [`Profile::location`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LocationRef(pub usize);

/// Sample or period type.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValueType {
    #[serde(rename = "type")]
    pub kind: String,
    pub unit: String,
}

/// A source-level function.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Function {
    pub id: u64,
    pub name: String,
    pub system_name: String,
    pub filename: String,
    pub start_line: i64,
}

/// A mapped binary image, covering addresses in `[start, limit)`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Mapping {
    pub id: u64,
    pub start: u64,
    pub limit: u64,
    pub offset: u64,
    pub file: String,
    pub build_id: String,
    pub has_functions: bool,
    pub has_filenames: bool,
    pub has_line_numbers: bool,
    pub has_inline_frames: bool,
}

/// One (possibly inlined) frame of a location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Line {
    pub function: FunctionRef,
    #[serde(default)]
    pub line: i64,
    #[serde(default)]
    pub column: i64,
}

/// A program counter, with the frames inlined at it in source order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Location {
    pub id: u64,
    pub mapping: Option<MappingRef>,
    pub address: u64,
    pub line: Vec<Line>,
    pub is_folded: bool,
}

/// A recorded stack with its values and labels.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Sample {
    pub location: Vec<LocationRef>,
    pub value: Vec<i64>,
    pub label: IndexMap<String, Vec<String>>,
    pub num_label: IndexMap<String, Vec<i64>>,
    pub num_unit: IndexMap<String, Vec<String>>,
    pub timestamps: Vec<u64>,
}

/// A complete pprof profile.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Profile {
    pub sample_type: Vec<ValueType>,
    pub sample: Vec<Sample>,
    pub mapping: Vec<Mapping>,
    pub location: Vec<Location>,
    pub function: Vec<Function>,
    pub comments: Vec<String>,
    pub time_nanos: i64,
    pub duration_nanos: i64,
    pub period_type: Option<ValueType>,
    pub period: i64,
}

impl Profile {
    /// Load a profile from any `Read`-able source.
    pub fn parse<R: Read>(mut reader: R) -> Result<Self> {
        let mut data = Vec::new();
        reader.read_to_end(&mut data)?;
        Self::from_slice(&data)
    }

    /// Load a profile from an in-memory buffer.
    pub fn from_slice(data: &[u8]) -> Result<Self> {
        let data = decompressed(data)?;
        Ok(serde_json::from_slice(&data)?)
    }

    pub fn function(&self, r: FunctionRef) -> Option<&Function> {
        self.function.get(r.0)
    }

    pub fn mapping(&self, r: MappingRef) -> Option<&Mapping> {
        self.mapping.get(r.0)
    }

    pub fn location(&self, r: LocationRef) -> Option<&Location> {
        self.location.get(r.0)
    }
}

impl fmt::Display for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "function {} name={} system_name={} filename={} start_line={}",
            self.id, self.name, self.system_name, self.filename, self.start_line
        )
    }
}

impl fmt::Display for Mapping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "mapping {} [{:#x}, {:#x}) offset={:#x} file={}",
            self.id, self.start, self.limit, self.offset, self.file
        )?;
        let flags = [
            (self.has_functions, "functions"),
            (self.has_filenames, "filenames"),
            (self.has_line_numbers, "line_numbers"),
            (self.has_inline_frames, "inline_frames"),
        ];
        let set: Vec<&str> = flags
            .iter()
            .filter(|(on, _)| *on)
            .map(|(_, name)| *name)
            .collect();
        if !set.is_empty() {
            write!(f, " has={}", set.join(","))?;
        }
        Ok(())
    }
}

impl fmt::Display for Line {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "function#{}:{}:{}",
            self.function.0, self.line, self.column
        )
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "location {} address={:#x}", self.id, self.address)?;
        match self.mapping {
            Some(m) => write!(f, " mapping#{}", m.0)?,
            None => f.write_str(" mapping=none")?,
        }
        if self.is_folded {
            f.write_str(" folded")?;
        }
        for line in &self.line {
            write!(f, " {}", line)?;
        }
        Ok(())
    }
}
