use otlp_parse::ExportProfilesServiceRequest;
use std::env;
use std::fs::File;
use std::io::BufReader;
use std::process::ExitCode;

fn main() -> ExitCode {
    let args: Vec<String> = env::args().collect();

    if args.len() != 2 {
        eprintln!("Usage: {} <profiles.json>", args[0]);
        return ExitCode::from(2);
    }

    let path = &args[1];

    let file = match File::open(path) {
        Ok(f) => f,
        Err(e) => {
            eprintln!("Error opening '{}': {}", path, e);
            return ExitCode::FAILURE;
        }
    };

    match ExportProfilesServiceRequest::parse(BufReader::new(file)) {
        Ok(request) => {
            println!("Valid OTLP profiles file: {}", path);
            println!("  Resources: {}", request.resource_profiles.len());
            for (i, profile) in request.profiles().enumerate() {
                println!("  Profile {}:", i);
                println!("    Strings: {}", profile.string_table.len());
                println!("    Functions: {}", profile.function_table.len());
                println!("    Mappings: {}", profile.mapping_table.len());
                println!("    Locations: {}", profile.location_table.len());
                println!("    Attributes: {}", profile.attribute_table.len());
                println!("    Samples: {}", profile.sample.len());
                if !profile.attribute_units.is_empty() {
                    println!("    Attribute units: {}", profile.attribute_units.len());
                }
                if !profile.link_table.is_empty() {
                    println!("    Links: {}", profile.link_table.len());
                }
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Invalid OTLP profiles file '{}': {}", path, e);
            ExitCode::FAILURE
        }
    }
}
