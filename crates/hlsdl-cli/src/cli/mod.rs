//! CLI for the hlsdl HLS downloader.

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use hlsdl_core::config;
use std::path::{Path, PathBuf};

use commands::{run_checksum, run_get, run_probe, GetArgs};

/// Top-level CLI for hlsdl.
#[derive(Debug, Parser)]
#[command(name = "hlsdl")]
#[command(about = "hlsdl: concurrent HLS stream downloader", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Download an HLS stream (master or media playlist) into a single file.
    Get {
        /// Playlist URL.
        url: String,

        /// Output file name (default: local start time, e.g. 2024-03-09_14-05-33.mp4).
        #[arg(short, long, value_name = "NAME")]
        output: Option<String>,

        /// Concurrent segment fetches (overrides config).
        #[arg(short, long, value_name = "N")]
        workers: Option<usize>,

        /// Directory for the finished file (overrides config).
        #[arg(long, value_name = "DIR")]
        output_dir: Option<PathBuf>,

        /// Root for per-download staging directories (overrides config).
        #[arg(long, value_name = "DIR")]
        staging_dir: Option<PathBuf>,
    },

    /// Resolve a playlist and list the segments that would be downloaded.
    Probe {
        /// Playlist URL.
        url: String,
    },

    /// Compute SHA-256 of a file (e.g. after download).
    Checksum {
        /// Path to the file.
        path: String,
    },
}

impl CliCommand {
    pub async fn run_from_args() -> Result<()> {
        let cli = Cli::parse();
        let cfg = config::load_or_init()?;
        tracing::debug!("loaded config: {:?}", cfg);

        match cli.command {
            CliCommand::Get {
                url,
                output,
                workers,
                output_dir,
                staging_dir,
            } => {
                let args = GetArgs {
                    url,
                    output,
                    workers,
                    output_dir,
                    staging_dir,
                };
                run_get(&cfg, args).await?
            }
            CliCommand::Probe { url } => run_probe(&cfg, &url).await?,
            CliCommand::Checksum { path } => run_checksum(Path::new(&path)).await?,
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests;
