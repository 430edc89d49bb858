//! Seed-region regressor extraction and first-level result aggregation for
//! CIFTI fMRI data.
//!
//! A [`SeedContext`] is built once per run from a [`SeedConfig`]. It drives
//! Connectome Workbench through a [`WorkbenchRunner`] to parcellate the input
//! time series, writes the seed regressor, and appends parcellated
//! z-statistics to a shared, subject/session-keyed CSV table.

pub mod aggregate;
pub mod cifti;
pub mod context;
pub mod error;
pub mod mmap_utils;
pub mod naming;
pub mod regressor;
pub mod types;
pub mod workbench;

pub use context::SeedContext;
pub use error::{Result, SeedError};
pub use types::*;
pub use workbench::WorkbenchRunner;
