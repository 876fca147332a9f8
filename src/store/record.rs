// src/store/record.rs

//! Completion records and the write that produces them.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::context::RunContext;
use crate::document::{DocValue, Document, document};
use crate::errors::StoreResult;
use crate::store::CompletionStore;
use crate::types::{Identifier, Namespace};

/// Persisted marker that a task finished.
///
/// Stored under `_id = id`; `migration` names the generator (or plan entry)
/// the task belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionRecord {
    #[serde(rename = "_id")]
    pub id: Identifier,
    #[serde(rename = "migration")]
    pub group_id: Identifier,
    pub has_errors: bool,
    pub completed: bool,
}

impl CompletionRecord {
    /// Record for a task that has run to the end.
    pub fn finished(id: impl Into<Identifier>, group_id: impl Into<Identifier>, has_errors: bool) -> Self {
        Self {
            id: id.into(),
            group_id: group_id.into(),
            has_errors,
            completed: true,
        }
    }

    /// A prerequisite only counts once it completed cleanly.
    pub fn satisfied(&self) -> bool {
        self.completed && !self.has_errors
    }

    pub fn to_document(&self) -> Document {
        document([
            ("_id", DocValue::from(self.id.as_str())),
            ("migration", DocValue::from(self.group_id.as_str())),
            ("has_errors", DocValue::from(self.has_errors)),
            ("completed", DocValue::from(self.completed)),
        ])
    }
}

/// Upsert the completion record for a finished task.
pub async fn finish_migration(
    store: &dyn CompletionStore,
    ctx: &RunContext,
    metadata_ns: &Namespace,
    id: &str,
    group_id: &str,
    has_errors: bool,
) -> StoreResult<()> {
    let record = CompletionRecord::finished(id, group_id, has_errors);
    ctx.guard(store.upsert_record(metadata_ns, record)).await?;
    debug!(task = %id, migration = %group_id, has_errors, ns = %metadata_ns, "completion recorded");
    Ok(())
}
