use clap::{Parser, Subcommand};
use serde_json::Value;

use query_sanitizer::query::{sanitize_with_report, Meta, RawInput};
use query_sanitizer::security::Permissions;

#[derive(Parser)]
#[command(name = "sanitize-cli")]
#[command(about = "Inspect how query strings are normalized", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Normalize a query string and print the resulting query
    Sanitize {
        /// Query string, e.g. 'fields=id,title&sort=-id'
        query: String,

        /// Permission filter (JSON object) to merge into the filter
        #[arg(short, long)]
        permissions: Option<String>,
    },
    /// List the recognized metadata options
    MetaOptions,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Sanitize { query, permissions } => {
            let permissions = permissions.as_deref().map(parse_permissions).transpose()?;
            let report = sanitize_with_report(&RawInput::from_query_str(&query), permissions.as_ref());

            println!("{}", serde_json::to_string_pretty(&report.query)?);
            for degradation in &report.degraded {
                eprintln!("degraded {}: {}", degradation.field, degradation.reason);
            }
        }
        Commands::MetaOptions => {
            for meta in Meta::ALL {
                println!("{meta}");
            }
        }
    }

    Ok(())
}

fn parse_permissions(text: &str) -> Result<Permissions, Box<dyn std::error::Error>> {
    match serde_json::from_str(text)? {
        Value::Object(filter) => Ok(Permissions {
            role: None,
            permissions: Some(filter),
        }),
        other => Err(format!("permission filter must be a JSON object, got {other}").into()),
    }
}
