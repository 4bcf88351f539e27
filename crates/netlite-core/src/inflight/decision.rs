//! Result of a checkout.

use std::sync::Arc;

use super::emitter::Emitter;

/// How the caller of [`Registry::checkout`](super::Registry::checkout) must proceed.
///
/// `First` and `Overlay` callers do the work and must report back with
/// `clear_success` or `clear_break`. `WaitAfter` callers do no work; they wait
/// on the emitter and adopt its outcome. `Cancel` callers do nothing.
#[derive(Debug, Clone)]
#[must_use]
pub enum Decision {
    First(Arc<Emitter>),
    Overlay(Arc<Emitter>),
    WaitAfter(Arc<Emitter>),
    Cancel,
}

impl Decision {
    pub fn emitter(&self) -> Option<&Arc<Emitter>> {
        match self {
            Decision::First(e) | Decision::Overlay(e) | Decision::WaitAfter(e) => Some(e),
            Decision::Cancel => None,
        }
    }

    /// True for decisions whose caller performs the I/O and must clear the url afterwards.
    pub fn must_report(&self) -> bool {
        matches!(self, Decision::First(_) | Decision::Overlay(_))
    }

    pub fn is_first(&self) -> bool {
        matches!(self, Decision::First(_))
    }

    /// Short label for logs.
    pub fn label(&self) -> &'static str {
        match self {
            Decision::First(_) => "first",
            Decision::Overlay(_) => "overlay",
            Decision::WaitAfter(_) => "wait-after",
            Decision::Cancel => "cancel",
        }
    }
}
