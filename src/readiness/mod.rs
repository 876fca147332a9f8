// src/readiness/mod.rs

//! Task readiness.
//!
//! - [`state`] defines the four readiness answers.
//! - [`oracle`] computes them from the store.

pub mod oracle;
pub mod state;

pub use oracle::ReadinessOracle;
pub use state::DependencyState;
