//! Core data types for Keyforge.
//!
//! This module contains the fundamental types: variants, artifact names,
//! build jobs, the resource limit pair, the declarative matrix document,
//! and the catalog of known boards and shields.

pub mod catalog;
pub mod errors;
pub mod job;
pub mod limits;
pub mod matrix;
pub mod variant;

pub use catalog::Catalog;
pub use errors::ConfigError;
pub use job::BuildJob;
pub use limits::ResourceLimits;
pub use matrix::{MatrixDocument, MatrixEntry};
pub use variant::{ArtifactName, Variant};
