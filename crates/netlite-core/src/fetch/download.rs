//! Deduplicated file download.

use std::io::{self, Seek, SeekFrom};
use std::path::Path;
use std::sync::Arc;

use tempfile::NamedTempFile;

use crate::inflight::{Decision, Emitter};

use super::ticket::Ticket;
use super::{transfer, Download, DownloadHooks, DownloadRole, FetchError, Fetcher};

/// Suffix of temp files created next to the destination when the cache is off.
const PART_SUFFIX: &str = ".part";

impl Fetcher {
    /// Download `url` to `out_file`, replacing it once the transfer completes.
    ///
    /// With a registry, a duplicate of an in-flight url is handled by the
    /// registry's policy: it races the original (`Overlaid`), waits for it and
    /// shares its result (`Adopted`), or fails with [`FetchError::Cancelled`].
    /// An adopted download reports `out_file` as its path; the caller is
    /// expected to derive `out_file` from the url so both downloads target
    /// the same file.
    pub fn download(
        &self,
        url: &str,
        out_file: &Path,
        hooks: &DownloadHooks<'_>,
    ) -> Result<Download, FetchError> {
        let Some(registry) = self.registry.as_deref() else {
            return self.perform(url, out_file, hooks, DownloadRole::Performed);
        };

        let (role, emitter) = match registry.checkout(url) {
            Decision::Cancel => {
                return Err(FetchError::Cancelled {
                    url: url.to_string(),
                })
            }
            Decision::WaitAfter(emitter) => return self.adopt(url, out_file, &emitter, hooks),
            Decision::First(emitter) => (DownloadRole::Performed, emitter),
            Decision::Overlay(emitter) => (DownloadRole::Overlaid, emitter),
        };

        let ticket = Ticket::new(registry, url, emitter);
        let download = self.perform(url, out_file, hooks, role)?;
        ticket.succeed();
        Ok(download)
    }

    fn adopt(
        &self,
        url: &str,
        out_file: &Path,
        emitter: &Arc<Emitter>,
        hooks: &DownloadHooks<'_>,
    ) -> Result<Download, FetchError> {
        tracing::debug!(url, "waiting on in-flight download");
        let waited = match self.wait_timeout {
            Some(timeout) => emitter.wait_timeout(timeout, hooks.interrupt),
            None => emitter.wait(hooks.interrupt),
        };
        let outcome = waited.map_err(|source| FetchError::Wait {
            url: url.to_string(),
            source,
        })?;
        if !outcome.is_success() {
            return Err(FetchError::SharedFailed {
                url: url.to_string(),
            });
        }
        tracing::info!(url, path = %out_file.display(), "adopted in-flight download");
        Ok(Download {
            path: out_file.to_path_buf(),
            role: DownloadRole::Adopted,
            bytes: None,
        })
    }

    fn perform(
        &self,
        url: &str,
        out_file: &Path,
        hooks: &DownloadHooks<'_>,
        role: DownloadRole,
    ) -> Result<Download, FetchError> {
        let mut temp = self.temp_file_for(url, out_file)?;
        let bytes = transfer::perform_get(&self.options, url, temp.as_file_mut(), hooks)?;
        temp.as_file()
            .sync_all()
            .map_err(|e| FetchError::io(temp.path(), e))?;
        move_into_place(temp, out_file)?;
        tracing::info!(url, path = %out_file.display(), bytes, "download complete");
        Ok(Download {
            path: out_file.to_path_buf(),
            role,
            bytes: Some(bytes),
        })
    }

    /// Fresh temp file in the cache folder, or next to `out_file` when the cache is off.
    fn temp_file_for(&self, url: &str, out_file: &Path) -> Result<NamedTempFile, FetchError> {
        if let Some(cache) = &self.cache {
            return cache.create_cache_file(url);
        }
        part_file_beside(out_file)
    }
}

/// Fresh `.{name}.XXXX.part` file in the directory of `dest`.
fn part_file_beside(dest: &Path) -> Result<NamedTempFile, FetchError> {
    let dir = match dest.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let name = dest
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    tempfile::Builder::new()
        .prefix(&format!(".{name}."))
        .suffix(PART_SUFFIX)
        .tempfile_in(dir)
        .map_err(|e| FetchError::io(dir, e))
}

/// Rename `temp` onto `dest`. Across filesystems, copy into a `.part` file
/// beside `dest` first and rename that, so `dest` is never half-written.
fn move_into_place(temp: NamedTempFile, dest: &Path) -> Result<(), FetchError> {
    let (error, mut file) = match temp.persist(dest) {
        Ok(_) => return Ok(()),
        Err(tempfile::PersistError { error, file }) => (error, file),
    };
    if error.kind() != io::ErrorKind::CrossesDevices {
        return Err(FetchError::io(dest, error));
    }
    tracing::debug!(
        from = %file.path().display(),
        to = %dest.display(),
        "rename crosses filesystems, copying"
    );
    copy_into_place(&mut file, dest)
}

fn copy_into_place(src: &mut NamedTempFile, dest: &Path) -> Result<(), FetchError> {
    let mut sibling = part_file_beside(dest)?;
    src.as_file_mut()
        .seek(SeekFrom::Start(0))
        .map_err(|e| FetchError::io(src.path(), e))?;
    io::copy(src.as_file_mut(), sibling.as_file_mut())
        .map_err(|e| FetchError::io(sibling.path(), e))?;
    sibling
        .as_file()
        .sync_all()
        .map_err(|e| FetchError::io(sibling.path(), e))?;
    sibling
        .persist(dest)
        .map_err(|e| FetchError::io(dest, e.error))?;
    Ok(())
}
