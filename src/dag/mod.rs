// src/dag/mod.rs

//! Dependency bookkeeping.
//!
//! - [`graph`] holds the concurrent dependency network and group registry,
//!   along with structural validation (undefined dependencies, cycles).

pub mod graph;

pub use graph::DependencyGraph;
