//! High-level operations.
//!
//! This module contains the implementation of Keyforge commands.

pub mod derive_limits;
pub mod harness;
pub mod keyforge_build;
pub mod report;
pub mod resolve;

pub use derive_limits::{derive_and_write, derive_limits, write_limits_fragment};
pub use harness::{run_tests, TestOptions, TestReport};
pub use keyforge_build::{build, plan, BuildOptions, BuildPlan};
pub use report::OutputFormat;
pub use resolve::{classify_entry, resolve_jobs, EntryDisposition, ResolveOptions};
