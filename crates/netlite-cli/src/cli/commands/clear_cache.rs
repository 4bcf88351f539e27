//! `netlite clear-cache` – empty the download cache folder.

use anyhow::Result;
use netlite_core::config::{CacheConfig, NetliteConfig};
use netlite_core::fetch::DownloadCache;

/// Clears the configured cache folder even when the cache is currently disabled.
pub async fn run_clear_cache(cfg: &NetliteConfig) -> Result<()> {
    let cache_cfg = CacheConfig {
        use_download_cache: true,
        ..cfg.cache.clone()
    };
    let Some(folder) = cache_cfg.resolve_folder()? else {
        return Ok(());
    };
    let cache = DownloadCache::new(folder)?;
    let removed = cache.clear()?;
    println!("removed {} item(s) from {}", removed, cache.folder().display());
    Ok(())
}
