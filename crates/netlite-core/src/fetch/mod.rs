//! HTTP fetcher built on libcurl.
//!
//! `get` and `download_to` are plain transfers. `download` writes a file and,
//! when the fetcher is bound to a [`Registry`], checks the url out first so
//! concurrent downloads of the same url follow the registry's conflict policy.

mod cache;
mod download;
mod error;
mod file_name;
mod ticket;
mod transfer;

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;

use crate::config::{NetliteConfig, DEFAULT_TIMEOUT_SECS};
use crate::inflight::{Interrupt, Registry};

pub use cache::{DownloadCache, CACHE_SUFFIX};
pub use error::FetchError;
pub use file_name::{file_name_for_url, sanitize_file_name, FALLBACK_FILE_NAME};

/// libcurl settings applied to every transfer.
#[derive(Debug, Clone)]
pub struct FetchOptions {
    pub connect_timeout: Duration,
    /// Abort when nothing arrives for this long. Zero disables the check.
    pub read_timeout: Duration,
    pub follow_redirects: bool,
    pub user_agent: Option<String>,
    pub accept_identity: bool,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            read_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            follow_redirects: true,
            user_agent: None,
            accept_identity: false,
        }
    }
}

impl From<&NetliteConfig> for FetchOptions {
    fn from(cfg: &NetliteConfig) -> Self {
        Self {
            connect_timeout: Duration::from_secs(cfg.connect_timeout_secs),
            read_timeout: Duration::from_secs(cfg.read_timeout_secs),
            follow_redirects: cfg.follow_redirects,
            user_agent: cfg.user_agent.clone(),
            accept_identity: cfg.accept_identity,
        }
    }
}

impl FetchOptions {
    fn apply(&self, easy: &mut curl::easy::Easy, url: &str) -> Result<(), curl::Error> {
        easy.url(url)?;
        easy.get(true)?;
        easy.follow_location(self.follow_redirects)?;
        if self.follow_redirects {
            easy.max_redirections(10)?;
        }
        easy.connect_timeout(self.connect_timeout)?;
        if !self.read_timeout.is_zero() {
            easy.low_speed_limit(1)?;
            easy.low_speed_time(self.read_timeout)?;
        }
        if let Some(agent) = &self.user_agent {
            easy.useragent(agent)?;
        }
        if self.accept_identity {
            let mut list = curl::easy::List::new();
            list.append("Accept-Encoding: identity")?;
            easy.http_headers(list)?;
        }
        Ok(())
    }
}

/// Transfer progress snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchProgress {
    pub bytes_done: u64,
    /// Content length, when the server reported one.
    pub total_bytes: Option<u64>,
}

impl FetchProgress {
    /// Fraction complete in [0.0, 1.0]; `None` while the total is unknown.
    pub fn fraction(&self) -> Option<f64> {
        match self.total_bytes {
            Some(0) => Some(1.0),
            Some(total) => Some((self.bytes_done as f64 / total as f64).min(1.0)),
            None => None,
        }
    }
}

/// Optional callbacks for a download.
#[derive(Default, Clone, Copy)]
pub struct DownloadHooks<'a> {
    /// Stops the transfer, or a wait on a duplicate, when fired.
    pub interrupt: Option<&'a Interrupt>,
    /// Called as bytes arrive.
    pub progress: Option<&'a (dyn Fn(FetchProgress) + Sync)>,
}

/// How a completed download came about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadRole {
    /// This call transferred the file and was the only one doing so.
    Performed,
    /// This call transferred the file while another download of the url was in flight.
    Overlaid,
    /// This call waited for an in-flight download of the url and shares its success.
    Adopted,
}

impl DownloadRole {
    pub fn as_str(self) -> &'static str {
        match self {
            DownloadRole::Performed => "done",
            DownloadRole::Overlaid => "done (overlay)",
            DownloadRole::Adopted => "adopted",
        }
    }
}

/// A finished download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Download {
    pub path: PathBuf,
    pub role: DownloadRole,
    /// Bytes transferred by this call; `None` when adopted.
    pub bytes: Option<u64>,
}

/// HTTP fetcher, optionally sharing a [`Registry`] with other fetchers.
#[derive(Debug, Clone, Default)]
pub struct Fetcher {
    options: FetchOptions,
    cache: Option<DownloadCache>,
    registry: Option<Arc<Registry>>,
    wait_timeout: Option<Duration>,
}

impl Fetcher {
    pub fn new(options: FetchOptions) -> Self {
        Self {
            options,
            ..Self::default()
        }
    }

    /// Build from config: options, download cache and wait timeout. The
    /// registry is passed in so several fetchers can share it.
    pub fn from_config(cfg: &NetliteConfig, registry: Arc<Registry>) -> Result<Self> {
        let mut fetcher = Self::new(FetchOptions::from(cfg))
            .with_registry(registry)
            .with_wait_timeout(cfg.wait_timeout());
        if let Some(folder) = cfg.cache.resolve_folder()? {
            fetcher = fetcher.with_cache(DownloadCache::new(folder)?);
        }
        Ok(fetcher)
    }

    pub fn with_cache(mut self, cache: DownloadCache) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn with_registry(mut self, registry: Arc<Registry>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Bound how long `download` waits on an in-flight duplicate. `None` waits indefinitely.
    pub fn with_wait_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.wait_timeout = timeout;
        self
    }

    pub fn options(&self) -> &FetchOptions {
        &self.options
    }

    pub fn cache(&self) -> Option<&DownloadCache> {
        self.cache.as_ref()
    }

    pub fn registry(&self) -> Option<&Arc<Registry>> {
        self.registry.as_ref()
    }

    /// GET `url` into memory. Not deduplicated.
    pub fn get(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let mut body = Vec::new();
        transfer::perform_get(&self.options, url, &mut body, &DownloadHooks::default())?;
        Ok(body)
    }

    /// Stream the body of `url` into `out`. Not deduplicated. Returns bytes written.
    pub fn download_to<W: Write>(&self, url: &str, out: &mut W) -> Result<u64, FetchError> {
        transfer::perform_get(&self.options, url, out, &DownloadHooks::default())
    }
}
