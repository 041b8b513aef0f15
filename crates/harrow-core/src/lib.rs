//! # harrow-core
//!
//! Core abstractions for the harrow batch storage-access layer.
//!
//! This crate provides the foundational types used across all harrow
//! components:
//!
//! - **Namespace Provider**: the abstract distributed-filesystem contract
//!   plus an in-memory implementation for tests
//! - **Path Layout**: canonical journal and staging paths
//! - **Profiles**: per-data-source configuration values
//! - **Counters**: explicit operation accumulators threaded through commits
//! - **Error Types**: shared error definitions and result alias
//!
//! ## Crate Boundary
//!
//! `harrow-core` is the only crate allowed to define shared primitives.
//! The storage-access layer proper lives in `harrow-source` and consumes
//! everything here through explicit values, never globals.

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]
#![warn(clippy::pedantic)]

pub mod counter;
pub mod error;
pub mod namespace;
pub mod observability;
pub mod paths;
pub mod profile;

pub use counter::Counter;
pub use error::{Error, Result};
pub use namespace::{
    list_files_recursive, BlockHint, MemoryNamespace, Namespace, ResourceStatus,
};
pub use observability::{init_logging, LogFormat};
pub use paths::SystemPaths;
pub use profile::{DataSourceProfile, FragmentSizeCompat};

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::counter::Counter;
    pub use crate::error::{Error, Result};
    pub use crate::namespace::{BlockHint, MemoryNamespace, Namespace, ResourceStatus};
    pub use crate::paths::SystemPaths;
    pub use crate::profile::{DataSourceProfile, FragmentSizeCompat};
}
