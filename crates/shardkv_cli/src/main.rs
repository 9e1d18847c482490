//! shardkv CLI
//!
//! Command-line tools for shardkv segment files.
//!
//! # Commands
//!
//! - `build` - Write a segment file from a JSON description of its entries
//! - `inspect` - Display the header and indexes of a segment
//! - `verify` - Verify the structure of a segment's indexes

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// shardkv segment tools.
#[derive(Parser)]
#[command(name = "shardkv")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a segment file from a JSON description of its entries
    Build {
        /// JSON file with `secondary_index_count` and `entries`
        #[arg(short, long)]
        input: PathBuf,

        /// Segment file to create
        #[arg(short, long)]
        output: PathBuf,

        /// Scratch space directory (defaults to `<output>.scratch.d`)
        #[arg(short, long)]
        scratch: Option<PathBuf>,

        /// Compaction level recorded in the header
        #[arg(short, long, default_value = "0")]
        level: u16,
    },

    /// Display the header and indexes of a segment
    Inspect {
        /// Segment file
        file: PathBuf,

        /// List every key of every index
        #[arg(short, long)]
        keys: bool,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Verify the structure of a segment's indexes
    Verify {
        /// Segment file
        file: PathBuf,
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
        Commands::Build {
            input,
            output,
            scratch,
            level,
        } => {
            commands::build::run(&input, &output, scratch, level)?;
        }
        Commands::Inspect { file, keys, format } => {
            commands::inspect::run(&file, keys, &format)?;
        }
        Commands::Verify { file } => {
            commands::verify::run(&file)?;
        }
        Commands::Version => {
            println!("shardkv CLI v{}", env!("CARGO_PKG_VERSION"));
            println!("Segment format v{}", shardkv_segment::SEGMENT_VERSION);
        }
    }

    Ok(())
}
