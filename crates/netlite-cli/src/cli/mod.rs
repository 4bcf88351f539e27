//! CLI for the netlite downloader.

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use netlite_core::config;
use netlite_core::inflight::ConflictPolicy;
use std::path::PathBuf;

use commands::{run_clear_cache, run_fetch, run_get};

/// Top-level CLI for the netlite downloader.
#[derive(Debug, Parser)]
#[command(name = "netlite")]
#[command(about = "netlite: download URLs without duplicating in-flight work", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Download URLs concurrently; repeated URLs follow the conflict policy.
    Fetch {
        /// Direct HTTP/HTTPS URLs to download. Repeats are allowed.
        #[arg(required = true)]
        urls: Vec<String>,
        /// Directory to write files into (default: current directory).
        #[arg(long, value_name = "DIR")]
        out_dir: Option<PathBuf>,
        /// What a repeated URL does while the first is in flight: overlay, wait-after or cancel.
        /// Overrides the configured policy.
        #[arg(long, value_name = "POLICY")]
        policy: Option<ConflictPolicy>,
    },

    /// Print the body of a URL to stdout.
    Get {
        /// Direct HTTP/HTTPS URL.
        url: String,
    },

    /// Remove leftover temp files from the download cache folder.
    ClearCache,
}

impl CliCommand {
    pub async fn run_from_args() -> Result<()> {
        let cli = Cli::parse();
        let cfg = config::load_or_init()?;
        tracing::debug!("loaded config: {:?}", cfg);

        match cli.command {
            CliCommand::Fetch {
                urls,
                out_dir,
                policy,
            } => {
                let out_dir = match out_dir {
                    Some(dir) => dir,
                    None => std::env::current_dir()?,
                };
                run_fetch(&cfg, urls, &out_dir, policy).await?;
            }
            CliCommand::Get { url } => run_get(&cfg, url).await?,
            CliCommand::ClearCache => run_clear_cache(&cfg).await?,
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests;
