// src/readiness/state.rs

use std::fmt;

use serde::Serialize;

/// Answer to "may this task run now?".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DependencyState {
    /// The target could not be inspected (store unavailable or query failed).
    Unresolved,
    /// Nothing left to do: no document matches the selector.
    Passed,
    /// Work remains and every prerequisite completed cleanly.
    Ready,
    /// Work remains but a prerequisite is missing, failed, or unreadable.
    Blocked,
}

impl fmt::Display for DependencyState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DependencyState::Unresolved => "unresolved",
            DependencyState::Passed => "passed",
            DependencyState::Ready => "ready",
            DependencyState::Blocked => "blocked",
        };
        f.write_str(s)
    }
}
