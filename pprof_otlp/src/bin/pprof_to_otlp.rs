//! Convert pprof profiles to the OTLP profiles format.
//!
//! This binary reads a pprof profile object graph (JSON, optionally gzip or
//! zstd compressed) and writes an OTLP `ExportProfilesServiceRequest`
//! containing the translated profile.
//!
//! # Usage
//!
//! ```bash
//! pprof_to_otlp profile.json -o profiles.json
//! pprof_to_otlp profile.json.gz --encoding postcard --compression zstd
//! pprof_to_otlp profile.json -r service.name=checkout -v
//! ```

use clap::{Parser, ValueEnum};
use otlp_parse::KeyValue;
use pprof_otlp::logging;
use pprof_otlp::output::{self, Compression, Encoding};
use pprof_otlp::pprof::Profile;
use pprof_otlp::translate::{TranslateConfig, Translator};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::info;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Format {
    /// Single-line JSON
    Json,
    /// Indented JSON
    JsonPretty,
    /// Compact postcard binary
    Postcard,
}

impl From<Format> for Encoding {
    fn from(f: Format) -> Self {
        match f {
            Format::Json => Encoding::Json,
            Format::JsonPretty => Encoding::JsonPretty,
            Format::Postcard => Encoding::Postcard,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Codec {
    None,
    Gzip,
    Zstd,
}

impl From<Codec> for Compression {
    fn from(c: Codec) -> Self {
        match c {
            Codec::None => Compression::None,
            Codec::Gzip => Compression::Gzip,
            Codec::Zstd => Compression::Zstd,
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "pprof_to_otlp")]
#[command(about = "Convert pprof profiles to the OTLP profiles format")]
#[command(version)]
struct Args {
    /// Input pprof profile (JSON object graph, optionally gzip or zstd compressed)
    input: PathBuf,

    /// Output file (defaults to the input filename with an .otlp extension)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Output encoding
    #[arg(short, long, value_enum, default_value = "json")]
    encoding: Format,

    /// Output compression
    #[arg(short, long, value_enum, default_value = "none")]
    compression: Codec,

    /// Separator between the values of multi-valued labels
    #[arg(long, default_value = ",")]
    label_separator: String,

    /// Do not convert numeric labels
    #[arg(long)]
    no_numeric_labels: bool,

    /// Do not copy sample types, period, timing and comments
    #[arg(long)]
    no_metadata: bool,

    /// Resource attribute to attach, as key=value (repeatable)
    #[arg(short, long = "resource-attribute", value_parser = parse_attribute)]
    resource_attributes: Vec<KeyValue>,

    /// Fail if the translation reports any diagnostic
    #[arg(long)]
    deny_diagnostics: bool,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn parse_attribute(s: &str) -> Result<KeyValue, String> {
    match s.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok(KeyValue::string(key, value)),
        _ => Err(format!("expected key=value, got '{}'", s)),
    }
}

fn default_output(input: &Path, encoding: Format, compression: Codec) -> PathBuf {
    let extension = match encoding {
        Format::Json | Format::JsonPretty => "otlp.json",
        Format::Postcard => "otlp.bin",
    };
    let suffix = match compression {
        Codec::None => "",
        Codec::Gzip => ".gz",
        Codec::Zstd => ".zst",
    };
    let mut path = input.to_path_buf();
    path.set_extension(format!("{}{}", extension, suffix));
    path
}

fn run(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    logging::init_logging(args.verbose)?;

    // Determine output path
    let output_path = args
        .output
        .clone()
        .unwrap_or_else(|| default_output(&args.input, args.encoding, args.compression));

    // Read input file
    let input_file = File::open(&args.input).map_err(|e| {
        format!(
            "Failed to open input file '{}': {}",
            args.input.display(),
            e
        )
    })?;
    let source = Profile::parse(BufReader::new(input_file))?;
    info!(
        functions = source.function.len(),
        mappings = source.mapping.len(),
        locations = source.location.len(),
        samples = source.sample.len(),
        "loaded pprof profile"
    );

    let translator = Translator::with_config(TranslateConfig {
        label_separator: args.label_separator,
        numeric_labels: !args.no_numeric_labels,
        profile_metadata: !args.no_metadata,
    });
    let translation = translator.translate(&source)?;

    if args.deny_diagnostics && !translation.diagnostics.is_empty() {
        return Err(format!(
            "translation reported {} diagnostics, first: {}",
            translation.diagnostics.len(),
            translation.diagnostics[0]
        )
        .into());
    }

    let request = output::wrap_profile(translation.profile, args.resource_attributes);

    // Create output file
    let output_file = File::create(&output_path).map_err(|e| {
        format!(
            "Failed to create output file '{}': {}",
            output_path.display(),
            e
        )
    })?;
    let mut writer = BufWriter::new(output_file);
    output::write_request(
        &mut writer,
        &request,
        args.encoding.into(),
        args.compression.into(),
    )?;
    writer.flush()?;

    eprintln!(
        "Converted '{}' -> '{}'",
        args.input.display(),
        output_path.display()
    );

    Ok(())
}

fn main() -> ExitCode {
    let args = Args::parse();

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
