// src/config/loader.rs

use std::fs;
use std::path::{Path, PathBuf};

use crate::config::model::{PlanFile, RawPlanFile};
use crate::errors::Result;

/// Load a plan file and return the raw, unvalidated `RawPlanFile`.
///
/// Use [`load_and_validate`] for the semantic checks.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawPlanFile> {
    let contents = fs::read_to_string(path.as_ref())?;
    load_from_str(&contents)
}

pub fn load_from_str(contents: &str) -> Result<RawPlanFile> {
    let plan: RawPlanFile = toml::from_str(contents)?;
    Ok(plan)
}

/// Load a plan file and validate it.
///
/// Checks, in order:
/// - at least one migration,
/// - `[config]` sanity (workers, idle rounds, metadata namespace),
/// - each migration's namespace and operation,
/// - unknown or self `after` references and cycles (downgraded to warnings
///   under `validation = "warn"`).
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<PlanFile> {
    let raw = load_from_path(&path)?;
    PlanFile::try_from(raw)
}

/// `Migradag.toml` in the current working directory.
pub fn default_config_path() -> PathBuf {
    PathBuf::from("Migradag.toml")
}
