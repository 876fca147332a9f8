// src/errors.rs

//! Crate-wide error types, aliases and helpers.

use std::fmt;

use thiserror::Error;

use crate::types::Identifier;

#[derive(Error, Debug)]
pub enum MigradagError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Cycle detected in migration plan: {0}")]
    DagCycle(String),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("JSON encoding error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    InvalidGraph(#[from] GraphValidationError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error("operation canceled")]
    Canceled,

    #[error("{}", .0.join("; "))]
    Aggregate(Vec<String>),
}

impl MigradagError {
    /// True when the error means "the run was asked to stop", as opposed to
    /// something having gone wrong.
    pub fn is_canceled(&self) -> bool {
        matches!(
            self,
            MigradagError::Canceled | MigradagError::Store(StoreError::Canceled)
        )
    }
}

/// Failures reported by the store capability traits.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("store unreachable: {0}")]
    Unreachable(String),

    #[error("query failed: {0}")]
    Query(String),

    #[error("cursor failed: {0}")]
    Cursor(String),

    #[error("write failed: {0}")]
    Write(String),

    #[error("store call canceled")]
    Canceled,

    #[error("store call exceeded the run deadline")]
    DeadlineExceeded,
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Errors from the operation registry.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("operation '{0}' is already registered")]
    Duplicate(String),

    #[error("no operation registered under '{0}'")]
    NotFound(String),
}

/// One structural defect found by `DependencyGraph::validate`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GraphProblem {
    MissingDependency(Identifier),
    Cycle(Vec<Identifier>),
}

impl fmt::Display for GraphProblem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GraphProblem::MissingDependency(id) => {
                write!(f, "dependency {id} is not defined")
            }
            GraphProblem::Cycle(nodes) => {
                write!(f, "cycle detected between nodes: [{}]", nodes.join(", "))
            }
        }
    }
}

/// Every problem found in one validation pass.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid dependency graph: {}", render_problems(.problems))]
pub struct GraphValidationError {
    pub problems: Vec<GraphProblem>,
}

impl GraphValidationError {
    pub fn missing(&self) -> impl Iterator<Item = &Identifier> {
        self.problems.iter().filter_map(|p| match p {
            GraphProblem::MissingDependency(id) => Some(id),
            GraphProblem::Cycle(_) => None,
        })
    }

    pub fn cycles(&self) -> impl Iterator<Item = &[Identifier]> {
        self.problems.iter().filter_map(|p| match p {
            GraphProblem::Cycle(nodes) => Some(nodes.as_slice()),
            GraphProblem::MissingDependency(_) => None,
        })
    }
}

fn render_problems(problems: &[GraphProblem]) -> String {
    let rendered: Vec<String> = problems.iter().map(ToString::to_string).collect();
    rendered.join("; ")
}

/// Accumulates errors for one task instead of stopping at the first.
#[derive(Debug, Clone, Default)]
pub struct Catcher {
    errors: Vec<String>,
}

impl Catcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, err: impl fmt::Display) {
        self.errors.push(err.to_string());
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    pub fn resolve(&self) -> Result<()> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(MigradagError::Aggregate(self.errors.clone()))
        }
    }
}

pub type Result<T> = std::result::Result<T, MigradagError>;
