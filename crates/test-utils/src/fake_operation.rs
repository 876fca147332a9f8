use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use migradag::context::RunContext;
use migradag::document::DocValue;
use migradag::engine::Environment;
use migradag::exec::MigrationOperation;
use migradag::generator::MigrationTask;
use migradag::store::{BoxFuture, InMemoryStore};

/// A fake migration operation that:
/// - records the id of every task it is applied to
/// - marks the task's document with `marker = true` in the in-memory store,
///   so a selector like `{ marker = { "$exists" = false } }` stops matching
/// - optionally fails for chosen documents, or waits before doing anything
#[derive(Clone)]
pub struct RecordingOperation {
    store: InMemoryStore,
    executed: Arc<Mutex<Vec<String>>>,
    marker: String,
    fail_documents: HashSet<String>,
    delay: Option<Duration>,
}

impl RecordingOperation {
    pub fn new(store: &InMemoryStore, executed: Arc<Mutex<Vec<String>>>) -> Self {
        Self {
            store: store.clone(),
            executed,
            marker: "migrated".to_string(),
            fail_documents: HashSet::new(),
            delay: None,
        }
    }

    pub fn with_marker(mut self, field: &str) -> Self {
        self.marker = field.to_string();
        self
    }

    /// Fail (without marking) when applied to the document with this id.
    pub fn failing_on(mut self, document_id: &str) -> Self {
        self.fail_documents.insert(document_id.to_string());
        self
    }

    /// Wait this long before applying; returns an error if the run is
    /// cancelled meanwhile.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

impl MigrationOperation for RecordingOperation {
    fn apply<'a>(
        &'a self,
        _env: &'a Environment,
        ctx: &'a RunContext,
        task: &'a MigrationTask,
    ) -> BoxFuture<'a, anyhow::Result<()>> {
        Box::pin(async move {
            if let Some(delay) = self.delay {
                if !ctx.pause(delay).await {
                    anyhow::bail!("canceled while applying {}", task.id);
                }
            }

            self.executed.lock().unwrap().push(task.id.clone());

            if self.fail_documents.contains(&task.document_id.to_string()) {
                anyhow::bail!("refusing to migrate document {}", task.document_id);
            }

            self.store.set_field(
                &task.namespace,
                &task.document_id,
                &self.marker,
                DocValue::Bool(true),
            );
            Ok(())
        })
    }
}
