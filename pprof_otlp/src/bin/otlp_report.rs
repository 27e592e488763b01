//! Print a plain-text report of OTLP profiles.
//!
//! Samples are grouped by the values of selected attributes, and each
//! sample's stack is printed one function per line.
//!
//! # Usage
//!
//! ```bash
//! otlp_report profiles.json
//! otlp_report profiles.json.gz --group-by thread.name
//! ```

use clap::Parser;
use pprof_otlp::logging;
use pprof_otlp::output;
use pprof_otlp::report::{DEFAULT_GROUP_KEYS, write_report};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::debug;

#[derive(Parser, Debug)]
#[command(name = "otlp_report")]
#[command(about = "Print OTLP profiles grouped by attribute")]
#[command(version)]
struct Args {
    /// OTLP profiles file (JSON, optionally gzip or zstd compressed)
    input: PathBuf,

    /// Attribute key to group samples by (repeatable)
    #[arg(short, long = "group-by")]
    group_by: Vec<String>,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn run(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    logging::init_logging(args.verbose)?;

    let input_file = File::open(&args.input).map_err(|e| {
        format!(
            "Failed to open input file '{}': {}",
            args.input.display(),
            e
        )
    })?;
    let request = output::read_request(BufReader::new(input_file))?;

    let keys: Vec<&str> = if args.group_by.is_empty() {
        DEFAULT_GROUP_KEYS.to_vec()
    } else {
        args.group_by.iter().map(String::as_str).collect()
    };
    debug!(?keys, "grouping samples");

    let stdout = std::io::stdout();
    let mut writer = BufWriter::new(stdout.lock());
    for (i, profile) in request.profiles().enumerate() {
        writeln!(writer, "#### profile {}", i)?;
        write_report(&mut writer, profile, &keys)?;
    }
    writer.flush()?;

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
