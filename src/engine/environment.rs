// src/engine/environment.rs

//! Run-scoped collaborators.
//!
//! Everything a generator, oracle or operation needs from the outside world
//! is reached through an [`Environment`] value handed down explicitly. There
//! is no process-wide registry; two runs in one process do not share state
//! unless they share an `Environment`.

use std::fmt;
use std::sync::Arc;

use crate::dag::DependencyGraph;
use crate::engine::OperationRegistry;
use crate::store::{CompletionStore, InMemoryStore, SelectorReader};
use crate::types::Namespace;

#[derive(Clone)]
pub struct Environment {
    reader: Arc<dyn SelectorReader>,
    completions: Arc<dyn CompletionStore>,
    graph: Arc<DependencyGraph>,
    registry: Arc<OperationRegistry>,
    metadata_ns: Namespace,
}

impl Environment {
    pub fn new(reader: Arc<dyn SelectorReader>, completions: Arc<dyn CompletionStore>) -> Self {
        Self {
            reader,
            completions,
            graph: Arc::new(DependencyGraph::new()),
            registry: Arc::new(OperationRegistry::new()),
            metadata_ns: Namespace::default_metadata(),
        }
    }

    /// Environment backed by one in-memory store for both capabilities.
    pub fn in_memory(store: &InMemoryStore) -> Self {
        let store = Arc::new(store.clone());
        Self::new(store.clone(), store)
    }

    pub fn with_registry(mut self, registry: OperationRegistry) -> Self {
        self.registry = Arc::new(registry);
        self
    }

    pub fn with_metadata_ns(mut self, ns: Namespace) -> Self {
        self.metadata_ns = ns;
        self
    }

    pub fn reader(&self) -> &dyn SelectorReader {
        self.reader.as_ref()
    }

    pub fn completions(&self) -> &dyn CompletionStore {
        self.completions.as_ref()
    }

    pub fn graph(&self) -> &DependencyGraph {
        &self.graph
    }

    pub fn registry(&self) -> &OperationRegistry {
        &self.registry
    }

    pub fn metadata_ns(&self) -> &Namespace {
        &self.metadata_ns
    }
}

impl fmt::Debug for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Environment")
            .field("metadata_ns", &self.metadata_ns)
            .field("operations", &self.registry.names())
            .finish_non_exhaustive()
    }
}
