#![allow(dead_code)]

use std::collections::BTreeMap;

use migradag::config::{ConfigSection, MigrationConfig, PlanFile, RawPlanFile};
use migradag::document::{DocValue, Selector, document};
use migradag::generator::GeneratorOptions;
use migradag::types::{Namespace, ValidationPolicy};

/// Builder for `PlanFile` to simplify test setup.
pub struct PlanFileBuilder {
    plan: RawPlanFile,
}

impl PlanFileBuilder {
    pub fn new() -> Self {
        Self {
            plan: RawPlanFile {
                config: ConfigSection::default(),
                migration: BTreeMap::new(),
            },
        }
    }

    pub fn with_migration(mut self, id: &str, migration: MigrationConfig) -> Self {
        self.plan.migration.insert(id.to_string(), migration);
        self
    }

    pub fn workers(mut self, workers: usize) -> Self {
        self.plan.config.workers = workers;
        self
    }

    pub fn validation(mut self, policy: ValidationPolicy) -> Self {
        self.plan.config.validation = policy;
        self
    }

    pub fn raw(self) -> RawPlanFile {
        self.plan
    }

    pub fn build(self) -> PlanFile {
        PlanFile::try_from(self.plan).expect("Failed to build valid plan from builder")
    }
}

impl Default for PlanFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for `MigrationConfig`.
pub struct MigrationConfigBuilder {
    migration: MigrationConfig,
}

impl MigrationConfigBuilder {
    pub fn new(store: &str, collection: &str, operation: &str) -> Self {
        Self {
            migration: MigrationConfig {
                store: store.to_string(),
                collection: collection.to_string(),
                operation: operation.to_string(),
                query: Selector::all(),
                update: None,
                limit: None,
                after: vec![],
            },
        }
    }

    pub fn after(mut self, dep: &str) -> Self {
        self.migration.after.push(dep.to_string());
        self
    }

    pub fn query(mut self, selector: Selector) -> Self {
        self.migration.query = selector;
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.migration.limit = Some(limit);
        self
    }

    pub fn update(mut self, update: DocValue) -> Self {
        self.migration.update = Some(update);
        self
    }

    pub fn build(self) -> MigrationConfig {
        self.migration
    }
}

/// Builder for `GeneratorOptions`, defaulting to "every document without a
/// `migrated` field" and the `record` operation.
pub struct GeneratorOptionsBuilder {
    options: GeneratorOptions,
}

impl GeneratorOptionsBuilder {
    pub fn new(id: &str, ns: &Namespace) -> Self {
        Self {
            options: GeneratorOptions {
                id: id.to_string(),
                namespace: ns.clone(),
                selector: unmigrated("migrated"),
                operation: "record".to_string(),
                update: None,
                limit: None,
                depends_on: vec![],
            },
        }
    }

    pub fn after(mut self, dep: &str) -> Self {
        self.options.depends_on.push(dep.to_string());
        self
    }

    pub fn selector(mut self, selector: Selector) -> Self {
        self.options.selector = selector;
        self
    }

    pub fn operation(mut self, operation: &str) -> Self {
        self.options.operation = operation.to_string();
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.options.limit = Some(limit);
        self
    }

    pub fn build(self) -> GeneratorOptions {
        self.options
    }
}

/// Selector for documents that do not carry `marker` yet.
pub fn unmigrated(marker: &str) -> Selector {
    Selector::all().with(marker, document([("$exists", false)]))
}
