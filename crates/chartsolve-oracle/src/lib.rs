//! Subprocess validator oracle for chartsolve.
//!
//! Renders a parameter set into a validator command line, runs it under a
//! wall-clock bound and turns the outcome into a classified
//! [`ValidationResult`](chartsolve_core::ValidationResult).

pub mod command;
pub mod runner;

pub use command::{CommandError, ValidatorCommand, ValidatorSettings};
pub use runner::ValidatorOracle;
