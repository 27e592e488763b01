//! pprof to OTLP profile conversion and tools.
//!
//! This crate converts pprof profiles, loaded as an object graph, into the
//! table-indexed OTLP (OpenTelemetry) profiles format.
//!
//! # Modules
//!
//! - [`pprof`] - The pprof object graph and its loader
//! - [`interner`] - String table interning
//! - [`translate`] - The pprof to OTLP translation engine
//! - [`group`] - Group OTLP samples by attribute values
//! - [`report`] - Plain-text rendering of OTLP profiles
//! - [`output`] - Encoded, optionally compressed, export requests
//! - [`logging`] - Logging setup for the binaries
//!
//! # Example
//!
//! ```no_run
//! use pprof_otlp::output::{self, Compression, Encoding};
//! use pprof_otlp::pprof::Profile;
//! use pprof_otlp::translate::to_otlp;
//! use std::fs::File;
//! use std::io::BufWriter;
//!
//! let source = Profile::parse(File::open("profile.json").unwrap()).unwrap();
//! let translation = to_otlp(&source).unwrap();
//!
//! let request = output::wrap_profile(translation.profile, Vec::new());
//! let writer = BufWriter::new(File::create("profiles.json").unwrap());
//! output::write_request(writer, &request, Encoding::Json, Compression::None).unwrap();
//! ```

pub mod group;
pub mod interner;
pub mod logging;
pub mod output;
pub mod pprof;
pub mod report;
pub mod translate;

// Re-export otlp_parse for convenience
pub use otlp_parse;
