//! External cancellation for waiters and transfers.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::Notify;

use super::emitter::Emitter;

/// Shared interrupt flag. Clones share state; firing one interrupts every
/// wait and transfer that was handed any clone.
#[derive(Debug, Clone, Default)]
pub struct Interrupt {
    inner: Arc<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    fired: AtomicBool,
    watched: Mutex<Vec<Arc<Emitter>>>,
    notify: Notify,
}

impl Interrupt {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fire the interrupt. Blocked waiters return [`WaitError::Interrupted`](super::WaitError).
    pub fn interrupt(&self) {
        self.inner.fired.store(true, Ordering::SeqCst);
        let watched = self.lock_watched().clone();
        for emitter in watched {
            emitter.wake();
        }
        self.inner.notify.notify_waiters();
    }

    pub fn is_interrupted(&self) -> bool {
        self.inner.fired.load(Ordering::SeqCst)
    }

    /// Track `emitter` until the returned guard drops.
    pub(super) fn watch(&self, emitter: &Arc<Emitter>) -> WatchGuard<'_> {
        self.lock_watched().push(Arc::clone(emitter));
        WatchGuard {
            interrupt: self,
            emitter: Arc::clone(emitter),
        }
    }

    /// Resolves once the interrupt has fired.
    pub(crate) async fn interrupted(&self) {
        loop {
            let notified = self.inner.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.is_interrupted() {
                return;
            }
            notified.await;
        }
    }

    fn lock_watched(&self) -> MutexGuard<'_, Vec<Arc<Emitter>>> {
        self.inner
            .watched
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

/// Removes one watch registration when dropped.
pub(super) struct WatchGuard<'a> {
    interrupt: &'a Interrupt,
    emitter: Arc<Emitter>,
}

impl Drop for WatchGuard<'_> {
    fn drop(&mut self) {
        let mut watched = self.interrupt.lock_watched();
        if let Some(pos) = watched.iter().position(|e| Arc::ptr_eq(e, &self.emitter)) {
            watched.swap_remove(pos);
        }
    }
}
