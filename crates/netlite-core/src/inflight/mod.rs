//! In-flight task coordination.
//!
//! A [`Registry`] tracks which urls currently have a task working on them.
//! Callers `checkout` a url before doing any I/O and get back a [`Decision`]:
//! - `First`: nobody else is on it; do the work, then `clear_success` or
//!   `clear_break`.
//! - `Overlay`: someone is, but the policy lets you race them; do the work
//!   and clear the same way. Only the first clear for the url counts.
//! - `WaitAfter`: block on the returned [`Emitter`] and adopt its outcome.
//! - `Cancel`: give up.
//!
//! The registry never performs I/O and keeps nothing across restarts.

mod decision;
mod emitter;
mod interrupt;
mod policy;
mod registry;

pub use decision::Decision;
pub use emitter::{Emitter, Outcome, WaitError};
pub use interrupt::Interrupt;
pub use policy::ConflictPolicy;
pub use registry::Registry;

#[cfg(test)]
mod tests;
