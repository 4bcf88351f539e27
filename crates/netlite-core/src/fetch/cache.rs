//! Download cache folder for in-progress transfers.
//!
//! With the cache enabled, a download is written to a temp file in the cache
//! folder and only moved onto the destination once complete, so a failed
//! transfer never clobbers an existing file.

use std::collections::hash_map::DefaultHasher;
use std::fs;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

use super::file_name::sanitize_file_name;
use super::FetchError;

/// Suffix of cache temp files.
pub const CACHE_SUFFIX: &str = ".tmp";

#[derive(Debug, Clone)]
pub struct DownloadCache {
    folder: PathBuf,
}

impl DownloadCache {
    /// Use `folder` as the cache, creating it if missing.
    pub fn new(folder: impl Into<PathBuf>) -> Result<Self, FetchError> {
        let folder = folder.into();
        fs::create_dir_all(&folder).map_err(|e| FetchError::io(&folder, e))?;
        Ok(Self { folder })
    }

    pub fn folder(&self) -> &Path {
        &self.folder
    }

    /// File name prefix for `url`: `<hash>_<tail>`, where tail is the last 8
    /// characters of the url (the whole url when shorter than 10). The hash
    /// only groups files per url within one build; it is not a stable key.
    pub fn cache_prefix_for(url: &str) -> String {
        let mut hasher = DefaultHasher::new();
        url.hash(&mut hasher);
        let chars: Vec<char> = url.chars().collect();
        let tail: String = if chars.len() < 10 {
            url.to_string()
        } else {
            chars[chars.len() - 8..].iter().collect()
        };
        format!("{:016x}_{}", hasher.finish(), sanitize_file_name(&tail))
    }

    /// Create a fresh temp file for `url` in the cache folder. Concurrent
    /// downloads of the same url each get their own file. The file is deleted
    /// when dropped unless it has been persisted.
    pub fn create_cache_file(&self, url: &str) -> Result<NamedTempFile, FetchError> {
        tempfile::Builder::new()
            .prefix(&format!("{}.", Self::cache_prefix_for(url)))
            .suffix(CACHE_SUFFIX)
            .tempfile_in(&self.folder)
            .map_err(|e| FetchError::io(&self.folder, e))
    }

    /// Remove everything in the cache folder, leaving the folder itself in place.
    pub fn clear(&self) -> Result<usize, FetchError> {
        let mut removed = 0;
        let entries = fs::read_dir(&self.folder).map_err(|e| FetchError::io(&self.folder, e))?;
        for entry in entries {
            let path = entry.map_err(|e| FetchError::io(&self.folder, e))?.path();
            let result = if path.is_dir() {
                fs::remove_dir_all(&path)
            } else {
                fs::remove_file(&path)
            };
            result.map_err(|e| FetchError::io(&path, e))?;
            removed += 1;
        }
        tracing::debug!(folder = %self.folder.display(), removed, "cleared download cache");
        Ok(removed)
    }
}
