//! Per-url completion handle shared between the task doing the work and any
//! duplicates waiting on it.

use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use tokio::sync::Notify;

use super::interrupt::Interrupt;

/// Completion outcome of an in-flight task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Outcome {
    #[default]
    Pending,
    Succeeded,
    Failed,
}

impl Outcome {
    pub fn is_success(self) -> bool {
        self == Outcome::Succeeded
    }

    pub fn is_terminal(self) -> bool {
        self != Outcome::Pending
    }
}

/// Why a wait on an [`Emitter`] returned without an outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum WaitError {
    #[error("wait interrupted before the in-flight task finished")]
    Interrupted,
    #[error("timed out after {0:?} waiting for the in-flight task")]
    TimedOut(Duration),
}

#[derive(Debug, Default)]
struct State {
    outcome: Outcome,
    signalled: bool,
}

/// Synchronization handle for one in-flight url.
///
/// Threads block on a condition variable owned by the emitter, async tasks on
/// a [`Notify`]; neither touches the registry lock, so a blocked duplicate
/// never stalls checkouts for other urls.
#[derive(Debug)]
pub struct Emitter {
    url: String,
    state: Mutex<State>,
    cond: Condvar,
    notify: Notify,
}

impl Emitter {
    pub(crate) fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            state: Mutex::new(State::default()),
            cond: Condvar::new(),
            notify: Notify::new(),
        }
    }

    /// The dedup key this emitter was registered under.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Current outcome. Only meaningful once the emitter has been signalled.
    pub fn outcome(&self) -> Outcome {
        self.lock_state().outcome
    }

    /// True once [`signal`](Self::signal) has run.
    pub fn is_signalled(&self) -> bool {
        self.lock_state().signalled
    }

    /// Record the terminal outcome. Returns false if one was already recorded;
    /// the first outcome sticks.
    pub(crate) fn finish(&self, outcome: Outcome) -> bool {
        let mut state = self.lock_state();
        if state.outcome.is_terminal() || !outcome.is_terminal() {
            return false;
        }
        state.outcome = outcome;
        true
    }

    /// Wake every thread and task waiting on this emitter. Harmless to repeat.
    pub fn signal(&self) {
        {
            let mut state = self.lock_state();
            state.signalled = true;
            self.cond.notify_all();
        }
        self.notify.notify_waiters();
    }

    /// Block until signalled, returning the recorded outcome.
    ///
    /// With an `interrupt`, fails with [`WaitError::Interrupted`] as soon as
    /// it fires. Without one the wait is unbounded.
    pub fn wait(self: &Arc<Self>, interrupt: Option<&Interrupt>) -> Result<Outcome, WaitError> {
        self.wait_until(interrupt, None)
    }

    /// Like [`wait`](Self::wait) but gives up after `timeout`.
    pub fn wait_timeout(
        self: &Arc<Self>,
        timeout: Duration,
        interrupt: Option<&Interrupt>,
    ) -> Result<Outcome, WaitError> {
        self.wait_until(interrupt, Some((Instant::now() + timeout, timeout)))
    }

    fn wait_until(
        self: &Arc<Self>,
        interrupt: Option<&Interrupt>,
        deadline: Option<(Instant, Duration)>,
    ) -> Result<Outcome, WaitError> {
        // Registered before the flag is read so `Interrupt::interrupt` can reach us.
        let _watch = interrupt.map(|i| i.watch(self));
        let mut state = self.lock_state();
        loop {
            if state.signalled {
                return Ok(state.outcome);
            }
            if interrupt.is_some_and(Interrupt::is_interrupted) {
                return Err(WaitError::Interrupted);
            }
            state = match deadline {
                None => self
                    .cond
                    .wait(state)
                    .unwrap_or_else(PoisonError::into_inner),
                Some((at, timeout)) => {
                    let now = Instant::now();
                    if now >= at {
                        return Err(WaitError::TimedOut(timeout));
                    }
                    self.cond
                        .wait_timeout(state, at - now)
                        .map(|(guard, _)| guard)
                        .unwrap_or_else(|e| e.into_inner().0)
                }
            };
        }
    }

    /// Async counterpart of [`wait`](Self::wait). Dropping the future is also
    /// a valid way to stop waiting.
    pub async fn wait_async(&self, interrupt: Option<&Interrupt>) -> Result<Outcome, WaitError> {
        let interrupted = async {
            match interrupt {
                Some(i) => i.interrupted().await,
                None => std::future::pending::<()>().await,
            }
        };
        tokio::select! {
            biased;
            outcome = self.signalled() => Ok(outcome),
            () = interrupted => Err(WaitError::Interrupted),
        }
    }

    async fn signalled(&self) -> Outcome {
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            {
                let state = self.lock_state();
                if state.signalled {
                    return state.outcome;
                }
            }
            notified.await;
        }
    }

    /// Nudge blocked threads so they re-check their interrupt.
    pub(super) fn wake(&self) {
        let _state = self.lock_state();
        self.cond.notify_all();
    }

    fn lock_state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
