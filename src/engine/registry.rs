// src/engine/registry.rs

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::debug;

use crate::errors::RegistryError;
use crate::exec::MigrationOperation;

/// Named migration operations available to a run.
///
/// Built up front, then frozen inside an [`Environment`](crate::engine::Environment).
#[derive(Default)]
pub struct OperationRegistry {
    operations: BTreeMap<String, Arc<dyn MigrationOperation>>,
}

impl OperationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `op` under `name`. A name can only be taken once.
    pub fn register(
        &mut self,
        name: impl Into<String>,
        op: impl MigrationOperation + 'static,
    ) -> Result<(), RegistryError> {
        self.register_arc(name, Arc::new(op))
    }

    pub fn register_arc(
        &mut self,
        name: impl Into<String>,
        op: Arc<dyn MigrationOperation>,
    ) -> Result<(), RegistryError> {
        let name = name.into();
        if self.operations.contains_key(&name) {
            return Err(RegistryError::Duplicate(name));
        }
        debug!(operation = %name, "registered migration operation");
        self.operations.insert(name, op);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Result<Arc<dyn MigrationOperation>, RegistryError> {
        self.operations
            .get(name)
            .cloned()
            .ok_or_else(|| RegistryError::NotFound(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.operations.contains_key(name)
    }

    pub fn names(&self) -> Vec<String> {
        self.operations.keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::RunContext;
    use crate::engine::Environment;
    use crate::generator::MigrationTask;
    use crate::store::BoxFuture;

    struct Noop;

    impl MigrationOperation for Noop {
        fn apply<'a>(
            &'a self,
            _env: &'a Environment,
            _ctx: &'a RunContext,
            _task: &'a MigrationTask,
        ) -> BoxFuture<'a, anyhow::Result<()>> {
            Box::pin(async { Ok(()) })
        }
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let mut registry = OperationRegistry::new();
        registry.register("noop", Noop).unwrap();
        assert_eq!(
            registry.register("noop", Noop),
            Err(RegistryError::Duplicate("noop".into()))
        );
        assert_eq!(registry.names(), vec!["noop"]);
    }

    #[test]
    fn missing_names_are_reported() {
        let registry = OperationRegistry::new();
        assert!(!registry.contains("ghost"));
        assert!(matches!(
            registry.get("ghost"),
            Err(RegistryError::NotFound(name)) if name == "ghost"
        ));
    }
}
