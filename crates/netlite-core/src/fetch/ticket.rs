//! RAII guard that reports a checked-out url back to the registry.

use std::sync::Arc;

use crate::inflight::{Emitter, Outcome, Registry};

/// Clears `url` from the registry when dropped: with success if
/// [`succeed`](Ticket::succeed) was called, otherwise as a break. Covers early
/// returns and panics in the transfer path.
///
/// Only the entry for `emitter` is cleared. If that entry is already gone and
/// the url has been checked out again, the newer entry is left alone.
pub(super) struct Ticket<'a> {
    registry: &'a Registry,
    url: &'a str,
    emitter: Arc<Emitter>,
    succeeded: bool,
}

impl<'a> Ticket<'a> {
    pub(super) fn new(registry: &'a Registry, url: &'a str, emitter: Arc<Emitter>) -> Self {
        Self {
            registry,
            url,
            emitter,
            succeeded: false,
        }
    }

    pub(super) fn succeed(mut self) {
        self.succeeded = true;
    }
}

impl Drop for Ticket<'_> {
    fn drop(&mut self) {
        let outcome = if self.succeeded {
            Outcome::Succeeded
        } else {
            Outcome::Failed
        };
        if !self.registry.clear_owned(self.url, &self.emitter, outcome) {
            tracing::debug!(url = self.url, ?outcome, "entry already cleared");
        }
    }
}
