//! Fetch error type.

use std::path::PathBuf;

use crate::inflight::WaitError;

/// Error returned by [`Fetcher`](super::Fetcher) operations.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// Another download of the url is in flight and the policy rejects duplicates.
    #[error("duplicate of an in-flight download cancelled: {url}")]
    Cancelled { url: String },
    /// This call waited on an in-flight download of the url and that download failed.
    #[error("in-flight download of {url} failed")]
    SharedFailed { url: String },
    /// Waiting on the in-flight download stopped early.
    #[error("waiting for {url}: {source}")]
    Wait {
        url: String,
        #[source]
        source: WaitError,
    },
    /// The transfer was stopped through an interrupt.
    #[error("download of {url} interrupted")]
    Interrupted { url: String },
    /// Response status other than 200.
    #[error("GET {url} returned HTTP {status}")]
    Http { url: String, status: u32 },
    /// Writing the response body to its destination failed.
    #[error("writing response body: {0}")]
    Write(#[source] std::io::Error),
    #[error("curl: {0}")]
    Curl(#[from] curl::Error),
    #[error("{}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl FetchError {
    pub(super) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        FetchError::Io {
            path: path.into(),
            source,
        }
    }

    /// True when the error came from the duplicate-handling policy rather than the transfer.
    pub fn is_duplicate(&self) -> bool {
        matches!(
            self,
            FetchError::Cancelled { .. } | FetchError::SharedFailed { .. }
        )
    }
}
