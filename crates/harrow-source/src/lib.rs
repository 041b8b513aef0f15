//! # harrow-source
//!
//! The harrow storage-access layer: maps pattern-addressed logical resources
//! onto files in a distributed namespace, computes locality-aware work
//! partitions over them, and coordinates multi-writer output commits with
//! crash-recoverable transactional semantics.
//!
//! ## Components
//!
//! - **Block/Fragment planning**: [`block::BlockMap`] normalizes replica
//!   hints; [`fragment::FragmentPlanner`] turns them into contiguous work
//!   fragments with locality hints
//! - **Pattern resolution**: [`pattern::ResourcePattern`] + [`pattern::search`]
//!   resolve segmented patterns (literal, `*`, `{a|b}`, `**`) into entries
//! - **Output commit**: [`mover::BulkMover`] relocates staged trees;
//!   [`transaction::OutputCoordinator`] drives the attempt/transaction
//!   lifecycle; [`journal::TransactionJournal`] makes it crash-recoverable
//!
//! ## Recovery Model
//!
//! ```text
//! begin marker only          -> abort: discard staging, drop marker
//! begin + commit marker      -> apply: re-run commit + cleanup, drop markers
//! no begin marker            -> nothing to recover
//! ```
//!
//! All I/O flows through the [`harrow_core::Namespace`] provider; this crate
//! owns no background scheduler and no network transport.

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]
#![warn(clippy::pedantic)]

pub mod block;
pub mod format;
pub mod fragment;
pub mod journal;
pub mod mover;
pub mod pattern;
pub mod transaction;

pub use block::{Block, BlockMap};
pub use format::{FormatRegistry, RecordFormat};
pub use fragment::{Fragment, FragmentPlanner};
pub use journal::{TransactionInfo, TransactionJournal};
pub use mover::{BulkMover, MoveMode};
pub use pattern::{only_minimal_covered, search, ResourcePattern, Segment};
pub use transaction::{
    DataSourceRepository, OutputAttemptContext, OutputCoordinator, OutputDataSource,
    OutputTransactionContext,
};

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::block::BlockMap;
    pub use crate::fragment::{Fragment, FragmentPlanner};
    pub use crate::journal::TransactionJournal;
    pub use crate::mover::{BulkMover, MoveMode};
    pub use crate::pattern::{search, ResourcePattern};
    pub use crate::transaction::{
        DataSourceRepository, OutputAttemptContext, OutputCoordinator, OutputDataSource,
        OutputTransactionContext,
    };
}
