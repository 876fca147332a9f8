// src/types.rs

//! Small shared types used across the crate.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Opaque name of a task or generator, unique within one run.
pub type Identifier = String;

/// Store and collection pair naming where documents live.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Namespace {
    pub store: String,
    pub collection: String,
}

impl Namespace {
    pub fn new(store: impl Into<String>, collection: impl Into<String>) -> Self {
        Self {
            store: store.into(),
            collection: collection.into(),
        }
    }

    /// Where completion records are kept unless configured otherwise.
    pub fn default_metadata() -> Self {
        Self::new(DEFAULT_METADATA_STORE, DEFAULT_METADATA_COLLECTION)
    }

    pub fn is_valid(&self) -> bool {
        !self.store.trim().is_empty() && !self.collection.trim().is_empty()
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.store, self.collection)
    }
}

pub const DEFAULT_METADATA_STORE: &str = "anser";
pub const DEFAULT_METADATA_COLLECTION: &str = "migrations.metadata";

/// What a run does when the dependency graph fails validation.
///
/// - `Require`: refuse to start (default).
/// - `Warn`: log every problem and keep going; tasks caught in a cycle or
///   waiting on an undefined migration simply stay blocked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ValidationPolicy {
    #[default]
    Require,
    Warn,
}

impl FromStr for ValidationPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "require" => Ok(ValidationPolicy::Require),
            "warn" => Ok(ValidationPolicy::Warn),
            other => Err(format!(
                "invalid validation policy: {other} (expected \"require\" or \"warn\")"
            )),
        }
    }
}
