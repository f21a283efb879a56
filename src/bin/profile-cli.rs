use std::path::PathBuf;

use clap::{Parser, Subcommand};
use serde::Serialize;

use mythic_http::config::loader::default_config_path;
use mythic_http::observability::init_tracing;
use mythic_http::profile::{dispatch, C2Profile, HttpProfile};

#[derive(Parser)]
#[command(name = "profile-cli")]
#[command(about = "Negotiation CLI for the Mythic HTTP C2 profile", long_about = None)]
struct Cli {
    /// Listener config file; defaults to config.json next to the server binary.
    #[arg(short, long, env = "MYTHIC_HTTP_CONFIG")]
    config: Option<PathBuf>,

    #[arg(long, env = "DEBUG_LEVEL", default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the profile definition
    Definition,
    /// Print the build parameter schema
    Parameters,
    /// Run a profile operation (config_check, redirector_rules, opsec_check,
    /// get_ioc, sample_message, host_file)
    Run {
        operation: String,

        /// Operation message as JSON
        #[arg(short, long, default_value = "{}")]
        message: String,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_tracing(&cli.log_level);

    let config_path = match cli.config {
        Some(path) => path,
        None => default_config_path()?,
    };
    let profile = HttpProfile::new(config_path);

    match cli.command {
        Commands::Definition => print_json(&profile.definition())?,
        Commands::Parameters => print_json(&profile.parameters())?,
        Commands::Run { operation, message } => {
            let response = dispatch(&profile, &operation, &message)?;
            print_json(&response)?;
        }
    }

    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
