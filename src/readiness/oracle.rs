// src/readiness/oracle.rs

//! Per-task readiness evaluation against persisted state.
//!
//! An oracle is bound at construction to the task's selector, its target
//! namespace and the identifiers it depends on. Each call to
//! [`ReadinessOracle::state`] re-reads the store; nothing is cached.

use tracing::{debug, warn};

use crate::context::RunContext;
use crate::document::Selector;
use crate::engine::Environment;
use crate::errors::{MigradagError, Result, StoreError};
use crate::readiness::DependencyState;
use crate::types::{Identifier, Namespace};

#[derive(Debug, Clone, PartialEq)]
pub struct ReadinessOracle {
    selector: Selector,
    namespace: Namespace,
    edges: Vec<Identifier>,
}

impl ReadinessOracle {
    pub fn new<I, S>(selector: Selector, namespace: Namespace, edges: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<Identifier>,
    {
        let mut edges: Vec<Identifier> = edges.into_iter().map(Into::into).collect();
        edges.sort();
        edges.dedup();
        Self {
            selector,
            namespace,
            edges,
        }
    }

    pub fn selector(&self) -> &Selector {
        &self.selector
    }

    pub fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    pub fn edges(&self) -> &[Identifier] {
        &self.edges
    }

    /// Evaluate readiness.
    ///
    /// Store failures never surface as errors: an unreadable target gives
    /// `Unresolved`, unreadable prerequisites give `Blocked`. The only error
    /// is [`MigradagError::Canceled`].
    pub async fn state(&self, env: &Environment, ctx: &RunContext) -> Result<DependencyState> {
        let remaining = match ctx.guard(env.reader().count(&self.namespace, &self.selector)).await {
            Ok(n) => n,
            Err(StoreError::Canceled) => return Err(MigradagError::Canceled),
            Err(err) => {
                warn!(ns = %self.namespace, error = %err, "could not count target documents");
                return Ok(DependencyState::Unresolved);
            }
        };

        if remaining == 0 {
            return Ok(DependencyState::Passed);
        }

        if self.edges.is_empty() {
            return Ok(DependencyState::Ready);
        }

        let metadata_ns = env.metadata_ns();
        let mut cursor = match ctx
            .guard(env.completions().find_records(metadata_ns, &self.edges))
            .await
        {
            Ok(cursor) => cursor,
            Err(StoreError::Canceled) => return Err(MigradagError::Canceled),
            Err(err) => {
                warn!(ns = %metadata_ns, error = %err, "could not query completion records");
                return Ok(DependencyState::Blocked);
            }
        };

        let mut satisfied = 0usize;
        loop {
            match ctx.guard(cursor.next()).await {
                Ok(Some(record)) => {
                    if !record.satisfied() {
                        debug!(
                            dependency = %record.id,
                            completed = record.completed,
                            has_errors = record.has_errors,
                            "prerequisite not satisfied"
                        );
                        return Ok(DependencyState::Blocked);
                    }
                    satisfied += 1;
                }
                Ok(None) => break,
                Err(StoreError::Canceled) => return Err(MigradagError::Canceled),
                Err(err) => {
                    warn!(ns = %metadata_ns, error = %err, "completion record cursor failed");
                    return Ok(DependencyState::Blocked);
                }
            }
        }

        if satisfied < self.edges.len() {
            debug!(satisfied, required = self.edges.len(), "prerequisites still missing");
            return Ok(DependencyState::Blocked);
        }

        Ok(DependencyState::Ready)
    }
}
