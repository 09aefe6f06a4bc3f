//! oprecover CLI
//!
//! Offline tools for disk stores.
//!
//! # Commands
//!
//! - `validate` - Replay every oplog and check the mutation history
//! - `export` - Replay every oplog and write recovered entries as JSON lines
//! - `dump-oplog` - Print decoded oplog records for debugging

mod commands;

use clap::{Parser, Subcommand};
use oprecover_core::RecoveryConfig;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// oprecover command-line disk store tools.
#[derive(Parser)]
#[command(name = "oprecover")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the disk store directory
    #[arg(global = true, short, long)]
    path: Option<PathBuf>,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    /// Treat a record cut short at the end of an oplog as its end
    #[arg(global = true, long)]
    tolerate_truncated_tail: bool,

    /// Skip record checksum verification
    #[arg(global = true, long)]
    skip_checksums: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay every oplog and check the mutation history
    Validate {
        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Export recovered entries as JSON lines, one batch per oplog
    Export {
        /// Output file (stdout if omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Dump decoded oplog records for debugging
    DumpOplog {
        /// Only dump this oplog id
        #[arg(short, long)]
        oplog: Option<u64>,

        /// Maximum number of records to dump
        #[arg(short, long)]
        limit: Option<usize>,

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
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let config = RecoveryConfig::new()
        .tolerate_truncated_tail(cli.tolerate_truncated_tail)
        .verify_checksums(!cli.skip_checksums);

    match cli.command {
        Commands::Validate { format } => {
            let path = cli.path.ok_or("Disk store path required for validate")?;
            commands::validate::run(&path, config, &format)?;
        }
        Commands::Export { output } => {
            let path = cli.path.ok_or("Disk store path required for export")?;
            commands::export::run(&path, config, output.as_deref())?;
        }
        Commands::DumpOplog {
            oplog,
            limit,
            format,
        } => {
            let path = cli.path.ok_or("Disk store path required for dump-oplog")?;
            commands::dump_oplog::run(&path, config, oplog, limit, &format)?;
        }
        Commands::Version => {
            println!("oprecover CLI v{}", env!("CARGO_PKG_VERSION"));
            println!("oprecover core v{}", oprecover_core::VERSION);
            println!(
                "oplog format {} (reads {} to {})",
                oprecover_codec::VersionTag::CURRENT,
                oprecover_codec::VersionTag::V1,
                oprecover_codec::VersionTag::CURRENT
            );
        }
    }

    Ok(())
}
