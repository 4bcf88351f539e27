//! `netlite fetch` – download URLs concurrently through one shared registry.

use anyhow::{Context, Result};
use netlite_core::config::NetliteConfig;
use netlite_core::fetch::{file_name_for_url, Download, DownloadHooks, FetchError, Fetcher};
use netlite_core::inflight::{ConflictPolicy, Interrupt, Registry};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub async fn run_fetch(
    cfg: &NetliteConfig,
    urls: Vec<String>,
    out_dir: &Path,
    policy: Option<ConflictPolicy>,
) -> Result<()> {
    std::fs::create_dir_all(out_dir)
        .with_context(|| format!("failed to create {}", out_dir.display()))?;

    let policy = policy.unwrap_or(cfg.policy);
    let registry = Arc::new(Registry::with_policy(policy));
    let fetcher = Arc::new(Fetcher::from_config(cfg, Arc::clone(&registry))?);
    tracing::info!(count = urls.len(), %policy, "fetching");

    let interrupt = Interrupt::new();
    let on_ctrl_c = {
        let interrupt = interrupt.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("interrupted, stopping downloads");
                interrupt.interrupt();
            }
        })
    };

    let outputs = output_paths(out_dir, &urls);
    let mut handles = Vec::with_capacity(urls.len());
    for (url, out) in urls.into_iter().zip(outputs) {
        let fetcher = Arc::clone(&fetcher);
        let interrupt = interrupt.clone();
        handles.push(tokio::task::spawn_blocking(move || {
            let hooks = DownloadHooks {
                interrupt: Some(&interrupt),
                ..DownloadHooks::default()
            };
            let result = fetcher.download(&url, &out, &hooks);
            (url, result)
        }));
    }

    let mut failed = 0usize;
    for handle in handles {
        let (url, result) = handle.await.context("download task panicked")?;
        if matches!(&result, Err(e) if !matches!(e, FetchError::Cancelled { .. })) {
            failed += 1;
        }
        println!("{}", report_line(&url, &result));
    }
    on_ctrl_c.abort();

    if failed > 0 {
        anyhow::bail!("{} download(s) failed", failed);
    }
    Ok(())
}

/// Output file for each URL. Repeats of one URL share a file so duplicates
/// can adopt each other; distinct URLs that derive the same name get `-1`,
/// `-2`, ... before the extension.
pub(crate) fn output_paths(out_dir: &Path, urls: &[String]) -> Vec<PathBuf> {
    let mut by_url: HashMap<&str, PathBuf> = HashMap::new();
    let mut taken: HashSet<String> = HashSet::new();
    urls.iter()
        .map(|url| {
            by_url
                .entry(url.as_str())
                .or_insert_with(|| {
                    let name = unique_name(&file_name_for_url(url), &taken);
                    taken.insert(name.clone());
                    out_dir.join(name)
                })
                .clone()
        })
        .collect()
}

fn unique_name(name: &str, taken: &HashSet<String>) -> String {
    if !taken.contains(name) {
        return name.to_string();
    }
    let (stem, ext) = match name.rfind('.') {
        Some(i) if i > 0 => name.split_at(i),
        _ => (name, ""),
    };
    (1..)
        .map(|n| format!("{stem}-{n}{ext}"))
        .find(|candidate| !taken.contains(candidate))
        .unwrap_or_else(|| name.to_string())
}

/// One line of output per URL: status, URL, then the file or the reason.
pub(crate) fn report_line(url: &str, result: &Result<Download, FetchError>) -> String {
    match result {
        Ok(download) => format!(
            "{:<14} {}  {}",
            download.role.as_str(),
            url,
            download.path.display()
        ),
        Err(FetchError::Cancelled { .. }) => {
            format!("{:<14} {}  (duplicate already in flight)", "cancelled", url)
        }
        Err(e) => format!("{:<14} {}  {}", "failed", url, e),
    }
}
