//! Keyforge - build-matrix and emulation-test orchestrator for keyboard firmware
//!
//! This crate provides the core library functionality for Keyforge,
//! including combo limit derivation, matrix resolution, build execution,
//! and snapshot-based emulation testing.

pub mod builder;
pub mod core;
pub mod ops;
pub mod util;

/// Test utilities and fakes for Keyforge unit tests.
///
/// This module is only available when compiling with `--cfg test`. It
/// provides a scriptable toolchain and fixture project builders.
#[cfg(test)]
pub mod test_support;

pub use core::{
    catalog::Catalog, job::BuildJob, limits::ResourceLimits, matrix::MatrixDocument,
    variant::{ArtifactName, Variant},
};

pub use util::context::GlobalContext;
