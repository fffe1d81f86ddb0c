//! Firmware build execution.
//!
//! This module runs resolved [`BuildJob`](crate::core::BuildJob)s through a
//! [`Toolchain`] and places the resulting binaries into the output directory.

pub mod errors;
pub mod executor;
pub mod output;
pub mod toolchain;

pub use errors::BuildError;
pub use executor::{BuildExecutor, BuildReport, BuiltArtifact, JobOutcome};
pub use output::OutputSpec;
pub use toolchain::{CommandSpec, Toolchain, WestToolchain};
