// src/exec/operation.rs

//! Pluggable migration logic.
//!
//! The runtime never knows what a migration does to a document. It looks up
//! the task's operation by name in the [`OperationRegistry`] and calls
//! [`MigrationOperation::apply`] once the task's readiness oracle says
//! `Ready`.
//!
//! Operations must be idempotent: a task can be applied again after a crash
//! between the write and its completion record.
//!
//! [`OperationRegistry`]: crate::engine::OperationRegistry

use crate::context::RunContext;
use crate::engine::Environment;
use crate::generator::MigrationTask;
use crate::store::BoxFuture;

pub trait MigrationOperation: Send + Sync {
    /// Apply the migration to the single document named by `task`.
    ///
    /// Long-running implementations should pass their store calls through
    /// `ctx.guard` so cancellation reaches them.
    fn apply<'a>(
        &'a self,
        env: &'a Environment,
        ctx: &'a RunContext,
        task: &'a MigrationTask,
    ) -> BoxFuture<'a, anyhow::Result<()>>;
}
