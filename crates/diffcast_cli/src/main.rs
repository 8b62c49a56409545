//! Diffcast CLI
//!
//! Command-line tools for exercising and debugging diffcast publishers.
//!
//! # Commands
//!
//! - `publish` - Run a diff file through a publisher and an in-memory broker
//! - `inspect` - Summarize a diff file without publishing
//! - `decode` - Decode one payload from hex
//! - `version` - Show version information

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Diffcast command-line publisher tools.
#[derive(Parser)]
#[command(name = "diffcast")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to a JSON diff file
    #[arg(global = true, short, long)]
    path: Option<PathBuf>,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Publish a diff file through an in-memory broker
    Publish {
        /// Generate a demo workload instead of reading a file
        #[arg(long)]
        demo: bool,

        /// Number of demo transactions
        #[arg(short, long, default_value = "4")]
        diffs: usize,

        /// Demo one entity's create/update/delete lifecycle
        #[arg(short, long)]
        lifecycle: bool,

        /// Broker addresses
        #[arg(long, value_delimiter = ',', default_value = "localhost:9092")]
        servers: Vec<String>,

        /// Topic receiving node change records
        #[arg(long, default_value = "nodes")]
        node_topic: String,

        /// Topic receiving relationship change records
        #[arg(long, default_value = "relationships")]
        relationship_topic: String,

        /// Ack level (buffered, acknowledged)
        #[arg(short, long, default_value = "acknowledged")]
        ack: String,

        /// Print every stored record
        #[arg(long)]
        dump: bool,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Summarize a diff file without publishing
    Inspect {
        /// Show per-label and per-relationship-type counts
        #[arg(short, long)]
        labels: bool,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Decode one payload from hex
    Decode {
        /// Hex payload, or @file pointing at a file of hex text
        payload: String,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Commands::Publish {
            demo,
            diffs,
            lifecycle,
            servers,
            node_topic,
            relationship_topic,
            ack,
            dump,
            format,
        } => {
            let options = commands::publish::PublishOptions {
                path: cli.path,
                demo,
                diffs,
                lifecycle,
                servers,
                node_topic,
                relationship_topic,
                ack,
                dump,
                format,
            };
            commands::publish::run(options)?;
        }
        Commands::Inspect { labels, format } => {
            let path = cli.path.ok_or("Diff file required for inspect")?;
            commands::inspect::run(&path, labels, &format)?;
        }
        Commands::Decode { payload, format } => {
            commands::decode::run(&payload, &format)?;
        }
        Commands::Version => {
            println!("Diffcast CLI v{}", env!("CARGO_PKG_VERSION"));
            println!(
                "Wire protocol v{}, payload format v{}",
                diffcast_wire::PROTOCOL_VERSION,
                diffcast_wire::PAYLOAD_VERSION
            );
        }
    }

    Ok(())
}
