use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use crate::inflight::ConflictPolicy;

/// Default connect and read timeout, in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Browser-like agent sent unless the config overrides it.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/64.0.3282.186 Safari/537.36";

/// Download cache parameters (optional `[cache]` section in config.toml).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Write downloads to a temp file in the cache folder, then move them into place.
    #[serde(default)]
    pub use_download_cache: bool,
    /// Cache folder; defaults to `~/.cache/netlite/downloads` when caching is on.
    #[serde(default)]
    pub folder: Option<PathBuf>,
}

impl CacheConfig {
    /// The folder to cache downloads in, or `None` when caching is off.
    pub fn resolve_folder(&self) -> Result<Option<PathBuf>> {
        if !self.use_download_cache {
            return Ok(None);
        }
        if let Some(folder) = &self.folder {
            return Ok(Some(folder.clone()));
        }
        let xdg_dirs = xdg::BaseDirectories::with_prefix("netlite")?;
        let folder = xdg_dirs
            .create_cache_directory("downloads")
            .context("download cache enabled but no cache folder could be created")?;
        Ok(Some(folder))
    }
}

/// Global configuration loaded from `~/.config/netlite/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetliteConfig {
    /// What a duplicate download of an in-flight url does: "overlay", "wait-after" or "cancel".
    #[serde(default)]
    pub policy: ConflictPolicy,
    /// Connection timeout in seconds.
    pub connect_timeout_secs: u64,
    /// Abort a transfer that receives nothing for this many seconds.
    pub read_timeout_secs: u64,
    /// Follow HTTP redirects.
    pub follow_redirects: bool,
    /// User-Agent header; omitted when `None`.
    #[serde(default)]
    pub user_agent: Option<String>,
    /// Send `Accept-Encoding: identity` so servers report a usable Content-Length.
    #[serde(default)]
    pub accept_identity: bool,
    /// Give up waiting on a duplicate after this many seconds (None = wait indefinitely).
    #[serde(default)]
    pub wait_timeout_secs: Option<u64>,
    #[serde(default)]
    pub cache: CacheConfig,
}

impl Default for NetliteConfig {
    fn default() -> Self {
        Self {
            policy: ConflictPolicy::Overlay,
            connect_timeout_secs: DEFAULT_TIMEOUT_SECS,
            read_timeout_secs: DEFAULT_TIMEOUT_SECS,
            follow_redirects: true,
            user_agent: Some(DEFAULT_USER_AGENT.to_string()),
            accept_identity: false,
            wait_timeout_secs: None,
            cache: CacheConfig::default(),
        }
    }
}

impl NetliteConfig {
    pub fn wait_timeout(&self) -> Option<Duration> {
        self.wait_timeout_secs.map(Duration::from_secs)
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("netlite")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<NetliteConfig> {
    let path = config_path()?;
    if !path.exists() {
        let default_cfg = NetliteConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }

    let data = fs::read_to_string(&path)?;
    let cfg: NetliteConfig =
        toml::from_str(&data).with_context(|| format!("invalid config at {}", path.display()))?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_values() {
        let cfg = NetliteConfig::default();
        assert_eq!(cfg.policy, ConflictPolicy::Overlay);
        assert_eq!(cfg.connect_timeout_secs, 30);
        assert_eq!(cfg.read_timeout_secs, 30);
        assert!(cfg.follow_redirects);
        assert!(cfg.wait_timeout().is_none());
        assert!(!cfg.cache.use_download_cache);
    }

    #[test]
    fn config_toml_roundtrip() {
        let cfg = NetliteConfig::default();
        let toml = toml::to_string_pretty(&cfg).unwrap();
        let parsed: NetliteConfig = toml::from_str(&toml).unwrap();
        assert_eq!(parsed.policy, cfg.policy);
        assert_eq!(parsed.connect_timeout_secs, cfg.connect_timeout_secs);
        assert_eq!(parsed.user_agent, cfg.user_agent);
    }

    #[test]
    fn config_toml_custom_values() {
        let toml = r#"
            policy = "wait-after"
            connect_timeout_secs = 5
            read_timeout_secs = 10
            follow_redirects = false
            wait_timeout_secs = 120

            [cache]
            use_download_cache = true
            folder = "/tmp/netlite-cache"
        "#;
        let cfg: NetliteConfig = toml::from_str(toml).unwrap();
        assert_eq!(cfg.policy, ConflictPolicy::WaitAfter);
        assert_eq!(cfg.connect_timeout_secs, 5);
        assert_eq!(cfg.read_timeout_secs, 10);
        assert!(!cfg.follow_redirects);
        assert!(cfg.user_agent.is_none());
        assert_eq!(cfg.wait_timeout(), Some(Duration::from_secs(120)));
        assert_eq!(
            cfg.cache.resolve_folder().unwrap(),
            Some(PathBuf::from("/tmp/netlite-cache"))
        );
    }

    #[test]
    fn config_toml_policy_spellings() {
        for (raw, expected) in [
            ("overlay", ConflictPolicy::Overlay),
            ("wait-after", ConflictPolicy::WaitAfter),
            ("cancel", ConflictPolicy::Cancel),
        ] {
            let toml = format!(
                "policy = \"{raw}\"\nconnect_timeout_secs = 1\nread_timeout_secs = 1\nfollow_redirects = true\n"
            );
            let cfg: NetliteConfig = toml::from_str(&toml).unwrap();
            assert_eq!(cfg.policy, expected);
        }
        let bad = "policy = \"skip\"\nconnect_timeout_secs = 1\nread_timeout_secs = 1\nfollow_redirects = true\n";
        assert!(toml::from_str::<NetliteConfig>(bad).is_err());
    }

    #[test]
    fn cache_disabled_resolves_to_none() {
        let cache = CacheConfig {
            use_download_cache: false,
            folder: Some(PathBuf::from("/tmp/ignored")),
        };
        assert!(cache.resolve_folder().unwrap().is_none());
    }
}
