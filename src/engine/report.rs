// src/engine/report.rs

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

use crate::engine::core::TaskPhase;
use crate::readiness::DependencyState;
use crate::types::Identifier;

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunOutcome {
    /// Every task ran (or had nothing to do) without errors.
    Succeeded,
    /// Every task reached a final state but some of them failed.
    CompletedWithErrors,
    /// Some tasks never became runnable before the run gave up waiting.
    CompletedButBlocked,
    /// The run was cancelled before it finished.
    Canceled,
}

impl fmt::Display for RunOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RunOutcome::Succeeded => "succeeded",
            RunOutcome::CompletedWithErrors => "completed with errors",
            RunOutcome::CompletedButBlocked => "completed but blocked",
            RunOutcome::Canceled => "canceled",
        };
        f.write_str(s)
    }
}

/// Summary of one run.
///
/// `failed` and `blocked` are always populated independently of `outcome`,
/// so a blocked run still lists the failures that blocked it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunReport {
    pub outcome: RunOutcome,
    /// Child tasks whose operation ran cleanly.
    pub succeeded: Vec<Identifier>,
    /// Tasks that had nothing left to do when evaluated.
    pub passed: Vec<Identifier>,
    /// Tasks (children or generators) that finished with errors.
    pub failed: BTreeMap<Identifier, Vec<String>>,
    /// Tasks still waiting when the run stopped, with the last readiness
    /// observed for them (if any).
    pub blocked: BTreeMap<Identifier, Option<DependencyState>>,
    pub generators: BTreeMap<Identifier, TaskPhase>,
    pub rounds: u32,
}

impl RunReport {
    pub fn is_success(&self) -> bool {
        self.outcome == RunOutcome::Succeeded
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "run {} after {} rounds: {} succeeded, {} passed, {} failed, {} blocked",
            self.outcome,
            self.rounds,
            self.succeeded.len(),
            self.passed.len(),
            self.failed.len(),
            self.blocked.len()
        )?;
        for (id, errors) in &self.failed {
            writeln!(f, "  failed {id}: {}", errors.join("; "))?;
        }
        for (id, state) in &self.blocked {
            match state {
                Some(state) => writeln!(f, "  waiting {id} ({state})")?,
                None => writeln!(f, "  waiting {id} (never evaluated)")?,
            }
        }
        Ok(())
    }
}
