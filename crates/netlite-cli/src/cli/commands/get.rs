//! `netlite get` – print a URL's body to stdout.

use anyhow::{Context, Result};
use netlite_core::config::NetliteConfig;
use netlite_core::fetch::{FetchOptions, Fetcher};
use std::io::Write;

pub async fn run_get(cfg: &NetliteConfig, url: String) -> Result<()> {
    let fetcher = Fetcher::new(FetchOptions::from(cfg));
    let body = tokio::task::spawn_blocking(move || fetcher.get(&url))
        .await
        .context("request task panicked")??;
    let mut stdout = std::io::stdout().lock();
    stdout.write_all(&body)?;
    stdout.flush()?;
    Ok(())
}
