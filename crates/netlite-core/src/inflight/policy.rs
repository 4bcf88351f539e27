//! Conflict policy applied to duplicate checkouts.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// What a duplicate `checkout` gets while the original task is still running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConflictPolicy {
    /// Run the duplicate anyway, racing the original. Nothing is cancelled.
    #[default]
    Overlay,
    /// Block the duplicate until the original finishes, then share its outcome.
    WaitAfter,
    /// Reject the duplicate.
    Cancel,
}

impl ConflictPolicy {
    /// Numeric code: 0 overlay, 1 wait-after, 2 cancel.
    pub fn code(self) -> i32 {
        match self {
            ConflictPolicy::Overlay => 0,
            ConflictPolicy::WaitAfter => 1,
            ConflictPolicy::Cancel => 2,
        }
    }

    /// Map a numeric code back to a policy. Unknown codes fall back to `Cancel`.
    pub fn from_code(code: i32) -> Self {
        match code {
            0 => ConflictPolicy::Overlay,
            1 => ConflictPolicy::WaitAfter,
            _ => ConflictPolicy::Cancel,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ConflictPolicy::Overlay => "overlay",
            ConflictPolicy::WaitAfter => "wait-after",
            ConflictPolicy::Cancel => "cancel",
        }
    }
}

impl fmt::Display for ConflictPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConflictPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "overlay" | "default" => Ok(ConflictPolicy::Overlay),
            "wait-after" | "wait" => Ok(ConflictPolicy::WaitAfter),
            "cancel" => Ok(ConflictPolicy::Cancel),
            other => Err(format!(
                "unknown conflict policy '{other}' (expected overlay, wait-after or cancel)"
            )),
        }
    }
}
