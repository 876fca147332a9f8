// src/config/model.rs

use std::collections::BTreeMap;
use std::time::Duration;

use serde::Deserialize;

use crate::document::{DocValue, Selector};
use crate::engine::RuntimeOptions;
use crate::generator::GeneratorOptions;
use crate::types::{DEFAULT_METADATA_COLLECTION, DEFAULT_METADATA_STORE, Namespace, ValidationPolicy};

/// Migration plan as read from a TOML file, before validation.
///
/// ```toml
/// [config]
/// workers = 4
/// validation = "require"
///
/// [migration.rename-time]
/// store = "mci"
/// collection = "events"
/// operation = "rename-field"
/// query = { time = { "$exists" = true } }
/// update = { "$rename" = { time = "timeSince" } }
/// after = ["backfill"]
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct RawPlanFile {
    #[serde(default)]
    pub config: ConfigSection,

    /// Keys are migration ids; they double as generator ids.
    #[serde(default)]
    pub migration: BTreeMap<String, MigrationConfig>,
}

/// A validated migration plan.
#[derive(Debug, Clone)]
pub struct PlanFile {
    pub config: ConfigSection,
    pub migration: BTreeMap<String, MigrationConfig>,
}

impl PlanFile {
    pub(crate) fn new_unchecked(
        config: ConfigSection,
        migration: BTreeMap<String, MigrationConfig>,
    ) -> Self {
        Self { config, migration }
    }

    /// One generator definition per `[migration.<id>]` section.
    pub fn generators(&self) -> Vec<GeneratorOptions> {
        self.migration
            .iter()
            .map(|(id, m)| m.to_generator_options(id))
            .collect()
    }

    pub fn metadata_namespace(&self) -> Namespace {
        self.config.metadata_namespace()
    }

    pub fn runtime_options(&self) -> RuntimeOptions {
        RuntimeOptions::from(&self.config)
    }
}

/// `[config]` section.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ConfigSection {
    #[serde(default = "default_metadata_store")]
    pub metadata_store: String,

    #[serde(default = "default_metadata_collection")]
    pub metadata_collection: String,

    #[serde(default = "default_workers")]
    pub workers: usize,

    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    #[serde(default = "default_max_idle_rounds")]
    pub max_idle_rounds: u32,

    /// `"require"` (default) or `"warn"`.
    #[serde(default)]
    pub validation: ValidationPolicy,
}

fn default_metadata_store() -> String {
    DEFAULT_METADATA_STORE.to_string()
}

fn default_metadata_collection() -> String {
    DEFAULT_METADATA_COLLECTION.to_string()
}

fn default_workers() -> usize {
    4
}

fn default_poll_interval_ms() -> u64 {
    250
}

fn default_max_idle_rounds() -> u32 {
    20
}

impl Default for ConfigSection {
    fn default() -> Self {
        Self {
            metadata_store: default_metadata_store(),
            metadata_collection: default_metadata_collection(),
            workers: default_workers(),
            poll_interval_ms: default_poll_interval_ms(),
            max_idle_rounds: default_max_idle_rounds(),
            validation: ValidationPolicy::default(),
        }
    }
}

impl ConfigSection {
    pub fn metadata_namespace(&self) -> Namespace {
        Namespace::new(&self.metadata_store, &self.metadata_collection)
    }
}

impl From<&ConfigSection> for RuntimeOptions {
    fn from(cfg: &ConfigSection) -> Self {
        RuntimeOptions {
            workers: cfg.workers,
            poll_interval: Duration::from_millis(cfg.poll_interval_ms),
            max_idle_rounds: cfg.max_idle_rounds,
            validation: cfg.validation,
        }
    }
}

/// `[migration.<id>]` section.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MigrationConfig {
    pub store: String,
    pub collection: String,

    /// Registered operation applied to each matching document.
    pub operation: String,

    /// Documents still needing this migration. Empty matches everything.
    #[serde(default)]
    pub query: Selector,

    /// Payload handed to the operation with every task.
    #[serde(default)]
    pub update: Option<DocValue>,

    /// Cap on tasks generated per run; absent or 0 means no cap.
    #[serde(default)]
    pub limit: Option<usize>,

    /// Migrations that must fully complete first.
    #[serde(default)]
    pub after: Vec<String>,
}

impl MigrationConfig {
    pub fn namespace(&self) -> Namespace {
        Namespace::new(&self.store, &self.collection)
    }

    pub fn to_generator_options(&self, id: &str) -> GeneratorOptions {
        GeneratorOptions {
            id: id.to_string(),
            namespace: self.namespace(),
            selector: self.query.clone(),
            operation: self.operation.clone(),
            update: self.update.clone(),
            limit: self.limit,
            depends_on: self.after.clone(),
        }
    }
}
