// src/generator/mod.rs

//! Fan-out of one migration into per-document tasks.
//!
//! A [`Generator`] scans its target namespace for documents matching its
//! selector and buffers one [`MigrationTask`] per document. Each child
//! inherits the generator's selector, namespace and prerequisites through its
//! readiness oracle. After the scan the child ids are registered as a group
//! under the generator id, in one call.
//!
//! [`Generator::jobs`] hands the buffer out exactly once.

pub mod task;

use std::sync::{Mutex, MutexGuard};

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::context::RunContext;
use crate::document::{DocValue, Selector};
use crate::engine::Environment;
use crate::errors::{Catcher, Result};
use crate::readiness::ReadinessOracle;
use crate::types::{Identifier, Namespace};

pub use task::{MigrationTask, child_id};

/// Definition of one migration.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratorOptions {
    pub id: Identifier,
    pub namespace: Namespace,
    pub selector: Selector,
    /// Name of the registered operation applied to each document.
    pub operation: String,
    pub update: Option<DocValue>,
    /// Upper bound on children per run; `None` (or zero) means unbounded.
    pub limit: Option<usize>,
    pub depends_on: Vec<Identifier>,
}

#[derive(Debug, Default)]
struct GeneratorState {
    buffered: Vec<MigrationTask>,
    errors: Catcher,
    completed: bool,
}

#[derive(Debug)]
pub struct Generator {
    options: GeneratorOptions,
    oracle: ReadinessOracle,
    state: Mutex<GeneratorState>,
}

impl Generator {
    pub fn new(mut options: GeneratorOptions) -> Self {
        options.limit = options.limit.filter(|n| *n > 0);
        let oracle = ReadinessOracle::new(
            options.selector.clone(),
            options.namespace.clone(),
            options.depends_on.iter().cloned(),
        );
        Self {
            options,
            oracle,
            state: Mutex::new(GeneratorState::default()),
        }
    }

    pub fn id(&self) -> &str {
        &self.options.id
    }

    pub fn options(&self) -> &GeneratorOptions {
        &self.options
    }

    pub fn depends_on(&self) -> &[Identifier] {
        &self.options.depends_on
    }

    /// Readiness of the generator itself, over its own selector and
    /// prerequisites.
    pub fn oracle(&self) -> &ReadinessOracle {
        &self.oracle
    }

    fn lock(&self) -> MutexGuard<'_, GeneratorState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Scan the target and buffer one child task per matching document.
    ///
    /// Returns how many children this call produced. On failure the error is
    /// recorded on the generator and also returned; children produced before
    /// the failure stay buffered and are registered as the group.
    pub async fn run(&self, env: &Environment, ctx: &RunContext) -> Result<usize> {
        let mut tasks = Vec::new();
        let result = self.generate(env, ctx, &mut tasks).await;

        let ids: Vec<Identifier> = tasks.iter().map(|t| t.id.clone()).collect();
        env.graph().add_group(self.id(), ids);

        let produced = tasks.len();
        let mut state = self.lock();
        state.buffered.extend(tasks);
        state.completed = true;

        match result {
            Ok(()) => {
                debug!(generator = %self.id(), produced, "generation finished");
                Ok(produced)
            }
            Err(err) => {
                warn!(generator = %self.id(), produced, error = %err, "generation stopped early");
                state.errors.add(&err);
                Err(err)
            }
        }
    }

    async fn generate(
        &self,
        env: &Environment,
        ctx: &RunContext,
        tasks: &mut Vec<MigrationTask>,
    ) -> Result<()> {
        let opts = &self.options;
        let mut cursor = ctx
            .guard(env.reader().find_ids(&opts.namespace, &opts.selector, opts.limit))
            .await?;

        while let Some(document_id) = ctx.guard(cursor.next()).await? {
            if opts.limit.is_some_and(|limit| tasks.len() >= limit) {
                break;
            }

            let id = child_id(&opts.id, &document_id, tasks.len());
            tasks.push(MigrationTask {
                id,
                migration: opts.id.clone(),
                namespace: opts.namespace.clone(),
                document_id,
                operation: opts.operation.clone(),
                update: opts.update.clone(),
                oracle: self.oracle.clone(),
            });
        }

        Ok(())
    }

    /// Hand out every buffered child, then forget them.
    ///
    /// The returned channel is already closed; a second call without another
    /// `run` in between yields nothing.
    pub fn jobs(&self) -> mpsc::UnboundedReceiver<MigrationTask> {
        let drained = std::mem::take(&mut self.lock().buffered);
        info!(generator = %self.id(), tasks = drained.len(), "releasing generated migration tasks");

        let (tx, rx) = mpsc::unbounded_channel();
        for task in drained {
            // `rx` is alive, so the send cannot fail.
            let _ = tx.send(task);
        }
        rx
    }

    pub fn errors(&self) -> Vec<String> {
        self.lock().errors.errors().to_vec()
    }

    pub fn has_errors(&self) -> bool {
        self.lock().errors.has_errors()
    }

    /// True once `run` has returned at least once.
    pub fn is_completed(&self) -> bool {
        self.lock().completed
    }
}
