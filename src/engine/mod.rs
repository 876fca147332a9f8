// src/engine/mod.rs

//! Orchestration engine for migradag.
//!
//! This module ties together:
//! - the run-scoped [`Environment`] (stores, dependency graph, operations),
//! - the [`OperationRegistry`] of named migration operations,
//! - the run driver that gates generators and child tasks on their
//!   readiness and records completions.
//!
//! The pure run state machine lives in [`core`]; the async/IO shell is
//! implemented in [`runtime`].

use std::time::Duration;

use crate::types::ValidationPolicy;

/// Knobs for one run.
#[derive(Debug, Clone, Copy)]
pub struct RuntimeOptions {
    /// Child tasks evaluated and applied concurrently.
    pub workers: usize,
    /// Sleep between rounds that made no progress.
    pub poll_interval: Duration,
    /// Consecutive idle rounds tolerated before the run gives up waiting.
    pub max_idle_rounds: u32,
    pub validation: ValidationPolicy,
}

impl Default for RuntimeOptions {
    fn default() -> Self {
        Self {
            workers: 4,
            poll_interval: Duration::from_millis(250),
            max_idle_rounds: 20,
            validation: ValidationPolicy::Require,
        }
    }
}

pub mod core;
pub mod environment;
pub mod registry;
pub mod report;
pub mod runtime;

pub use self::core::{CoreRun, TaskPhase};
pub use environment::Environment;
pub use registry::OperationRegistry;
pub use report::{RunOutcome, RunReport};
pub use runtime::Runtime;
