//! Transactional output lifecycle.
//!
//! Output for one `(transaction, data source)` pair moves through a fixed
//! state machine:
//!
//! ```text
//! NEW -> TRANSACTION_SETUP
//!     -> { ATTEMPT_SETUP -> write -> ATTEMPT_COMMIT -> ATTEMPT_CLEANUP }*
//!     -> TRANSACTION_COMMIT -> TRANSACTION_CLEANUP
//! ```
//!
//! Attempts write into isolated staging directories and are promoted by
//! moving files, never by writing in place; a crashed attempt leaves nothing
//! visible. The attempt loop repeats freely for retries because commit and
//! cleanup are both idempotent under re-entry.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;

use harrow_core::counter::Counter;
use harrow_core::error::Result;
use harrow_core::namespace::Namespace;
use harrow_core::paths::{self, SystemPaths};
use harrow_core::profile::DataSourceProfile;

use crate::mover::{BulkMover, MoveMode};

/// Identity of one task attempt's output.
#[derive(Debug, Clone)]
pub struct OutputAttemptContext {
    /// Transaction (execution) the attempt belongs to.
    pub transaction_id: String,
    /// Unique attempt id, stable across this attempt's setup and cleanup.
    pub attempt_id: String,
    /// Output id of the data source being written.
    pub output_id: String,
    /// Accumulator for operations performed on behalf of this attempt.
    pub counter: Counter,
}

/// Identity of one logical transaction on one data source.
#[derive(Debug, Clone)]
pub struct OutputTransactionContext {
    /// Transaction (execution) id.
    pub transaction_id: String,
    /// Output id of the data source.
    pub output_id: String,
    /// Accumulator for operations performed on behalf of this transaction.
    pub counter: Counter,
}

impl OutputTransactionContext {
    /// Creates a context for `transaction_id` on the output named `output_id`.
    #[must_use]
    pub fn new(transaction_id: impl Into<String>, output_id: impl Into<String>) -> Self {
        Self {
            transaction_id: transaction_id.into(),
            output_id: output_id.into(),
            counter: Counter::new(),
        }
    }
}

impl OutputAttemptContext {
    /// Creates a context for one attempt of `transaction_id` on `output_id`.
    #[must_use]
    pub fn new(
        transaction_id: impl Into<String>,
        attempt_id: impl Into<String>,
        output_id: impl Into<String>,
    ) -> Self {
        Self {
            transaction_id: transaction_id.into(),
            attempt_id: attempt_id.into(),
            output_id: output_id.into(),
            counter: Counter::new(),
        }
    }
}

/// The attempt/transaction lifecycle one data source exposes.
///
/// The journal drives roll-forward and rollback through this trait without
/// knowing how a data source stages its output.
#[async_trait]
pub trait OutputDataSource: Send + Sync {
    /// Name of this data source within the repository.
    fn id(&self) -> &str;

    /// Prepares the transaction's staging area.
    async fn setup_transaction(&self, ctx: &OutputTransactionContext) -> Result<()>;

    /// Promotes staged transaction output into the final location.
    async fn commit_transaction(&self, ctx: &OutputTransactionContext) -> Result<()>;

    /// Removes the transaction's temporary area. Tolerates absence.
    async fn cleanup_transaction(&self, ctx: &OutputTransactionContext) -> Result<()>;

    /// Creates the attempt's staging directory.
    async fn setup_attempt(&self, ctx: &OutputAttemptContext) -> Result<()>;

    /// Promotes the attempt's output into the transaction staging area.
    async fn commit_attempt(&self, ctx: &OutputAttemptContext) -> Result<()>;

    /// Deletes the attempt directory regardless of commit outcome.
    async fn cleanup_attempt(&self, ctx: &OutputAttemptContext) -> Result<()>;
}

/// An explicit, enumerable set of named data sources.
///
/// Constructed by the embedder and passed by value into the journal; there
/// is no ambient registry. Iteration order is the source id order, so
/// roll-forward visits data sources deterministically.
#[derive(Clone, Default)]
pub struct DataSourceRepository {
    sources: BTreeMap<String, Arc<dyn OutputDataSource>>,
}

impl DataSourceRepository {
    /// Creates an empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a data source, replacing any previous one with the same id.
    pub fn register(&mut self, source: Arc<dyn OutputDataSource>) {
        self.sources.insert(source.id().to_string(), source);
    }

    /// Looks up a data source by id.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&Arc<dyn OutputDataSource>> {
        self.sources.get(id)
    }

    /// Iterates data sources in id order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn OutputDataSource>> {
        self.sources.values()
    }

    /// Number of registered data sources.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sources.len()
    }

    /// Whether the repository is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

impl std::fmt::Debug for DataSourceRepository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataSourceRepository")
            .field("sources", &self.sources.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Drives the output lifecycle for one data source profile.
///
/// Writers put files under the directory returned by
/// [`OutputCoordinator::attempt_output_dir`]; everything else is moves and
/// deletes orchestrated here.
#[derive(Clone)]
pub struct OutputCoordinator {
    profile: DataSourceProfile,
    ns: Arc<dyn Namespace>,
    local: Option<Arc<dyn Namespace>>,
}

impl OutputCoordinator {
    /// Creates a coordinator over the given namespace.
    #[must_use]
    pub fn new(profile: DataSourceProfile, ns: Arc<dyn Namespace>) -> Self {
        Self {
            profile,
            ns,
            local: None,
        }
    }

    /// Attaches the local scratch namespace used for non-streaming attempts.
    #[must_use]
    pub fn with_local(mut self, local: Arc<dyn Namespace>) -> Self {
        self.local = Some(local);
        self
    }

    /// The profile this coordinator serves.
    #[must_use]
    pub fn profile(&self) -> &DataSourceProfile {
        &self.profile
    }

    fn staging_dir(&self, transaction_id: &str, output_id: &str) -> String {
        SystemPaths::staging_dir(&self.profile.temp_root, transaction_id, output_id)
    }

    fn temp_dir(&self, transaction_id: &str, output_id: &str) -> String {
        SystemPaths::transaction_temp_dir(&self.profile.temp_root, transaction_id, output_id)
    }

    /// Whether attempts buffer to the local scratch namespace first.
    fn attempt_is_local(&self) -> bool {
        !self.profile.streaming && self.local.is_some() && self.profile.local_scratch.is_some()
    }

    /// Returns the namespace and directory an attempt writes into.
    #[must_use]
    pub fn attempt_output_dir(&self, ctx: &OutputAttemptContext) -> (Arc<dyn Namespace>, String) {
        if self.attempt_is_local() {
            let scratch = self
                .profile
                .local_scratch
                .as_deref()
                .unwrap_or_default();
            let local = self
                .local
                .clone()
                .unwrap_or_else(|| Arc::clone(&self.ns));
            let dir = paths::join(
                scratch,
                &SystemPaths::attempt_dir(
                    "",
                    &ctx.transaction_id,
                    &ctx.output_id,
                    &ctx.attempt_id,
                ),
            );
            (local, dir)
        } else {
            let dir = SystemPaths::attempt_dir(
                &self.profile.temp_root,
                &ctx.transaction_id,
                &ctx.output_id,
                &ctx.attempt_id,
            );
            (Arc::clone(&self.ns), dir)
        }
    }

    /// The directory committed attempt output lands in: the transaction
    /// staging area, or the final root when staging is disabled.
    fn attempt_commit_target(&self, transaction_id: &str, output_id: &str) -> String {
        if self.profile.staging {
            self.staging_dir(transaction_id, output_id)
        } else {
            self.profile.root_path.clone()
        }
    }
}

#[async_trait]
impl OutputDataSource for OutputCoordinator {
    fn id(&self) -> &str {
        &self.profile.id
    }

    async fn setup_transaction(&self, ctx: &OutputTransactionContext) -> Result<()> {
        if self.profile.staging {
            let staging = self.staging_dir(&ctx.transaction_id, &ctx.output_id);
            tracing::debug!(
                source = %self.profile.id,
                transaction = %ctx.transaction_id,
                staging = %staging,
                "setting up transaction"
            );
            self.ns.mkdirs(&staging).await?;
        }
        Ok(())
    }

    async fn commit_transaction(&self, ctx: &OutputTransactionContext) -> Result<()> {
        if !self.profile.staging {
            return Ok(());
        }
        let staging = self.staging_dir(&ctx.transaction_id, &ctx.output_id);
        tracing::info!(
            source = %self.profile.id,
            transaction = %ctx.transaction_id,
            threads = self.profile.rollforward_threads,
            "committing transaction output"
        );
        BulkMover::new(self.profile.rollforward_threads)
            .move_all(
                &self.ns,
                &staging,
                &self.ns,
                &self.profile.root_path,
                MoveMode::Rename,
                &ctx.counter,
            )
            .await?;
        Ok(())
    }

    async fn cleanup_transaction(&self, ctx: &OutputTransactionContext) -> Result<()> {
        let temp = self.temp_dir(&ctx.transaction_id, &ctx.output_id);
        self.ns.delete(&temp, true).await?;
        if self.attempt_is_local() {
            if let (Some(local), Some(scratch)) = (&self.local, &self.profile.local_scratch) {
                let local_temp = paths::join(
                    scratch,
                    &SystemPaths::transaction_temp_dir("", &ctx.transaction_id, &ctx.output_id),
                );
                local.delete(&local_temp, true).await?;
            }
        }
        tracing::debug!(
            source = %self.profile.id,
            transaction = %ctx.transaction_id,
            "transaction temporary area removed"
        );
        Ok(())
    }

    async fn setup_attempt(&self, ctx: &OutputAttemptContext) -> Result<()> {
        let (ns, dir) = self.attempt_output_dir(ctx);
        tracing::debug!(
            source = %self.profile.id,
            attempt = %ctx.attempt_id,
            dir = %dir,
            local = self.attempt_is_local(),
            "setting up attempt"
        );
        ns.mkdirs(&dir).await
    }

    async fn commit_attempt(&self, ctx: &OutputAttemptContext) -> Result<()> {
        let (attempt_ns, attempt_dir) = self.attempt_output_dir(ctx);
        let target = self.attempt_commit_target(&ctx.transaction_id, &ctx.output_id);
        let mode = if self.attempt_is_local() {
            MoveMode::CopyFromLocal
        } else {
            MoveMode::Rename
        };
        BulkMover::new(1)
            .move_all(&attempt_ns, &attempt_dir, &self.ns, &target, mode, &ctx.counter)
            .await?;
        Ok(())
    }

    async fn cleanup_attempt(&self, ctx: &OutputAttemptContext) -> Result<()> {
        let (ns, dir) = self.attempt_output_dir(ctx);
        ns.delete(&dir, true).await?;
        Ok(())
    }
}
