// src/exec/mod.rs

//! Execution seam between the runtime and concrete migration logic.
//!
//! - [`operation`] defines the `MigrationOperation` trait that the runtime
//!   calls for every ready task. Production code registers real
//!   implementations; tests register recording or failing fakes.

pub mod operation;

pub use operation::MigrationOperation;
