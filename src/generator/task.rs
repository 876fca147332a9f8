// src/generator/task.rs

use crate::document::DocValue;
use crate::readiness::ReadinessOracle;
use crate::types::{Identifier, Namespace};

/// One child task: apply `operation` to the document `document_id`.
#[derive(Debug, Clone, PartialEq)]
pub struct MigrationTask {
    /// `<generator>.<document id>.<ordinal>`
    pub id: Identifier,
    /// The generator that produced this task.
    pub migration: Identifier,
    pub namespace: Namespace,
    pub document_id: DocValue,
    pub operation: String,
    /// Optional payload for the operation, e.g. an update document.
    pub update: Option<DocValue>,
    pub oracle: ReadinessOracle,
}

impl MigrationTask {
    pub fn depends_on(&self) -> &[Identifier] {
        self.oracle.edges()
    }
}

/// Child id for the `ordinal`-th document of a generator run.
pub fn child_id(generator: &str, document_id: &DocValue, ordinal: usize) -> Identifier {
    format!("{generator}.{document_id}.{ordinal}")
}
