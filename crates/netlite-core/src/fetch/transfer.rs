//! Single GET transfer over a libcurl easy handle.

use std::io::Write;

use super::{DownloadHooks, FetchError, FetchOptions, FetchProgress};

/// GETs `url` and streams the body into `sink`. Returns the number of body bytes written.
///
/// Any status other than 200 is an error; whatever body arrived with it has
/// already been written to `sink`, so callers writing to a temp file must
/// discard it.
pub(super) fn perform_get(
    options: &FetchOptions,
    url: &str,
    sink: &mut dyn Write,
    hooks: &DownloadHooks<'_>,
) -> Result<u64, FetchError> {
    let mut easy = curl::easy::Easy::new();
    options.apply(&mut easy, url)?;
    let watch_progress = hooks.progress.is_some() || hooks.interrupt.is_some();
    if watch_progress {
        easy.progress(true)?;
    }

    let mut written: u64 = 0;
    let mut write_error: Option<std::io::Error> = None;
    let performed = {
        let mut transfer = easy.transfer();
        transfer.write_function(|data| match sink.write_all(data) {
            Ok(()) => {
                written += data.len() as u64;
                Ok(data.len())
            }
            Err(e) => {
                write_error = Some(e);
                Ok(0) // abort transfer
            }
        })?;
        if watch_progress {
            transfer.progress_function(|dltotal, dlnow, _, _| {
                if hooks.interrupt.is_some_and(|i| i.is_interrupted()) {
                    return false;
                }
                if let Some(report) = hooks.progress {
                    report(FetchProgress {
                        bytes_done: dlnow as u64,
                        total_bytes: (dltotal > 0.0).then_some(dltotal as u64),
                    });
                }
                true
            })?;
        }
        transfer.perform()
    };

    if let Err(e) = performed {
        if let Some(source) = write_error {
            return Err(FetchError::Write(source));
        }
        if e.is_aborted_by_callback() {
            return Err(FetchError::Interrupted {
                url: url.to_string(),
            });
        }
        return Err(FetchError::Curl(e));
    }
    sink.flush().map_err(FetchError::Write)?;

    let status = easy.response_code()?;
    if status != 200 {
        return Err(FetchError::Http {
            url: url.to_string(),
            status,
        });
    }
    if let Some(report) = hooks.progress {
        report(FetchProgress {
            bytes_done: written,
            total_bytes: Some(written),
        });
    }
    Ok(written)
}
