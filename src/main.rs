//! tup - inspect and build TUP packets from the command line.

mod commands;
mod config;

use clap::{Parser, Subcommand};
use colored::Colorize;
use config::Config;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "tup")]
#[command(about = "Inspect and build length-prefixed TUP packets")]
#[command(version)]
struct Cli {
    /// YAML config file with packet defaults
    #[arg(short, long, env = "TUP_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Decode one framed packet and print its contents
    Inspect {
        /// Packet file, or - for stdin
        input: String,

        /// Input is hex text rather than raw bytes
        #[arg(long)]
        hex: bool,

        /// Human-readable summary instead of JSON
        #[arg(short, long)]
        pretty: bool,
    },

    /// Build a packet and print it as hex
    Encode {
        /// Servant name
        #[arg(short, long)]
        servant: String,

        /// Function name
        #[arg(short, long)]
        func: String,

        /// Field layout version (2 or 3), overrides the config
        #[arg(short = 'V', long)]
        version: Option<i16>,

        /// Request id
        #[arg(short, long, default_value = "0")]
        request_id: i32,

        /// Parameter as name:type=value (types: i32, i64, bool, string, bytes)
        #[arg(short, long = "param")]
        params: Vec<String>,

        /// Write raw bytes to stdout instead of hex
        #[arg(long)]
        raw: bool,
    },

    /// Print the declared length prefix next to the actual size
    FrameLen {
        /// Packet file, or - for stdin
        input: String,

        /// Input is hex text rather than raw bytes
        #[arg(long)]
        hex: bool,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let config = match Config::load(cli.config.as_deref()) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("{}: {}", "Error".red(), e);
            std::process::exit(1);
        }
    };
    tracing::debug!(?config, "loaded configuration");

    match commands::execute(cli.command, &config) {
        Ok(output) => {
            if !output.is_empty() {
                println!("{}", output);
            }
            Ok(())
        }
        Err(e) => {
            eprintln!("{}: {}", "Error".red(), e);
            std::process::exit(1);
        }
    }
}
