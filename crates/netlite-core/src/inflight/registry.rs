//! Registry of in-flight urls and the conflict policy applied to duplicates.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::decision::Decision;
use super::emitter::{Emitter, Outcome};
use super::policy::ConflictPolicy;

#[derive(Debug, Default)]
struct Inner {
    tasks: HashMap<String, Arc<Emitter>>,
    policy: ConflictPolicy,
}

/// In-memory registry of in-flight tasks keyed by url.
///
/// One mutex guards both the map and the policy. It is only held for map
/// lookups, inserts, removals and the policy read; waiting happens on the
/// emitters, outside this lock.
#[derive(Debug, Default)]
pub struct Registry {
    inner: Mutex<Inner>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_policy(policy: ConflictPolicy) -> Self {
        let registry = Self::default();
        registry.set_policy(policy);
        registry
    }

    /// Register intent to work on `url` and learn how to proceed.
    pub fn checkout(&self, url: &str) -> Decision {
        let mut inner = self.lock();
        let decision = match inner.tasks.get(url) {
            Some(existing) => match inner.policy {
                ConflictPolicy::Overlay => Decision::Overlay(Arc::clone(existing)),
                ConflictPolicy::WaitAfter => Decision::WaitAfter(Arc::clone(existing)),
                ConflictPolicy::Cancel => Decision::Cancel,
            },
            None => {
                let emitter = Arc::new(Emitter::new(url));
                inner.tasks.insert(url.to_string(), Arc::clone(&emitter));
                Decision::First(emitter)
            }
        };
        drop(inner);
        tracing::debug!(url, decision = decision.label(), "checkout");
        decision
    }

    /// Mark `url` as finished successfully and release its waiters.
    /// Returns false (and does nothing) if `url` is not in flight.
    pub fn clear_success(&self, url: &str) -> bool {
        self.clear(url, Outcome::Succeeded)
    }

    /// Mark `url` as failed and release its waiters.
    /// Returns false (and does nothing) if `url` is not in flight.
    pub fn clear_break(&self, url: &str) -> bool {
        self.clear(url, Outcome::Failed)
    }

    /// Like `clear_success`/`clear_break`, but only removes the entry if it is
    /// still `emitter`. A url checked out again after `emitter` was cleared
    /// keeps its newer entry.
    pub(crate) fn clear_owned(&self, url: &str, emitter: &Arc<Emitter>, outcome: Outcome) -> bool {
        self.clear_if(url, outcome, |current| Arc::ptr_eq(current, emitter))
    }

    fn clear(&self, url: &str, outcome: Outcome) -> bool {
        self.clear_if(url, outcome, |_| true)
    }

    fn clear_if(
        &self,
        url: &str,
        outcome: Outcome,
        owns: impl FnOnce(&Arc<Emitter>) -> bool,
    ) -> bool {
        let emitter = {
            let mut inner = self.lock();
            if !inner.tasks.get(url).is_some_and(owns) {
                return false;
            }
            let Some(emitter) = inner.tasks.remove(url) else {
                return false;
            };
            emitter.finish(outcome);
            emitter
        };
        // Waiters are released whatever the policy is now; they chose to wait
        // under the policy in force at their checkout.
        emitter.signal();
        tracing::debug!(url, ?outcome, "cleared in-flight task");
        true
    }

    pub fn policy(&self) -> ConflictPolicy {
        self.lock().policy
    }

    /// Change the policy for future checkouts. Entries already in flight are untouched.
    pub fn set_policy(&self, policy: ConflictPolicy) {
        self.lock().policy = policy;
    }

    /// Set the policy from its numeric code; unknown codes select `Cancel`.
    pub fn set_policy_code(&self, code: i32) {
        self.set_policy(ConflictPolicy::from_code(code));
    }

    /// The emitter currently registered for `url`, if any.
    pub fn in_flight(&self, url: &str) -> Option<Arc<Emitter>> {
        self.lock().tasks.get(url).cloned()
    }

    pub fn contains(&self, url: &str) -> bool {
        self.lock().tasks.contains_key(url)
    }

    pub fn len(&self) -> usize {
        self.lock().tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().tasks.is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
