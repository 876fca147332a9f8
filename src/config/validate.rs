// src/config/validate.rs

use tracing::warn;

use crate::config::model::{PlanFile, RawPlanFile};
use crate::dag::DependencyGraph;
use crate::errors::{GraphProblem, MigradagError, Result};
use crate::types::ValidationPolicy;

impl TryFrom<RawPlanFile> for PlanFile {
    type Error = MigradagError;

    fn try_from(raw: RawPlanFile) -> std::result::Result<Self, Self::Error> {
        validate_raw_plan(&raw)?;
        Ok(PlanFile::new_unchecked(raw.config, raw.migration))
    }
}

fn validate_raw_plan(cfg: &RawPlanFile) -> Result<()> {
    ensure_has_migrations(cfg)?;
    validate_global_config(cfg)?;
    validate_migrations(cfg)?;

    match cfg.config.validation {
        ValidationPolicy::Require => {
            validate_dependencies(cfg)?;
            validate_dag(cfg)?;
        }
        ValidationPolicy::Warn => {
            if let Err(err) = validate_dependencies(cfg).and_then(|()| validate_dag(cfg)) {
                warn!(error = %err, "migration plan has dependency problems; continuing");
            }
        }
    }
    Ok(())
}

fn ensure_has_migrations(cfg: &RawPlanFile) -> Result<()> {
    if cfg.migration.is_empty() {
        return Err(MigradagError::ConfigError(
            "plan must contain at least one [migration.<id>] section".to_string(),
        ));
    }
    Ok(())
}

fn validate_global_config(cfg: &RawPlanFile) -> Result<()> {
    if cfg.config.workers == 0 {
        return Err(MigradagError::ConfigError(
            "[config].workers must be >= 1 (got 0)".to_string(),
        ));
    }
    if cfg.config.max_idle_rounds == 0 {
        return Err(MigradagError::ConfigError(
            "[config].max_idle_rounds must be >= 1 (got 0)".to_string(),
        ));
    }
    if !cfg.config.metadata_namespace().is_valid() {
        return Err(MigradagError::ConfigError(
            "[config].metadata_store and metadata_collection must not be empty".to_string(),
        ));
    }
    Ok(())
}

fn validate_migrations(cfg: &RawPlanFile) -> Result<()> {
    for (id, migration) in cfg.migration.iter() {
        if id.contains('.') {
            return Err(MigradagError::ConfigError(format!(
                "migration id '{id}' must not contain '.'"
            )));
        }
        if !migration.namespace().is_valid() {
            return Err(MigradagError::ConfigError(format!(
                "migration '{id}' needs a non-empty store and collection"
            )));
        }
        if migration.operation.trim().is_empty() {
            return Err(MigradagError::ConfigError(format!(
                "migration '{id}' needs an operation"
            )));
        }
    }
    Ok(())
}

fn validate_dependencies(cfg: &RawPlanFile) -> Result<()> {
    for (id, migration) in cfg.migration.iter() {
        for dep in migration.after.iter() {
            if !cfg.migration.contains_key(dep) {
                return Err(MigradagError::ConfigError(format!(
                    "migration '{id}' has unknown dependency '{dep}' in `after`"
                )));
            }
            if dep == id {
                return Err(MigradagError::ConfigError(format!(
                    "migration '{id}' cannot depend on itself in `after`"
                )));
            }
        }
    }
    Ok(())
}

fn validate_dag(cfg: &RawPlanFile) -> Result<()> {
    let graph = DependencyGraph::new();
    for (id, migration) in cfg.migration.iter() {
        graph.add_node(id);
        graph.add(id, migration.after.iter().cloned());
    }

    let Err(err) = graph.validate() else {
        return Ok(());
    };

    let cycles: Vec<String> = err
        .problems
        .iter()
        .filter(|p| matches!(p, GraphProblem::Cycle(_)))
        .map(ToString::to_string)
        .collect();
    if cycles.is_empty() {
        Err(err.into())
    } else {
        Err(MigradagError::DagCycle(cycles.join("; ")))
    }
}
