//! Durable transaction journal.
//!
//! For every execution the journal keeps a begin marker
//! (`{system_dir}/transactions/tx-{id}`) and, once global commit is reached,
//! a commit marker (`commit-{id}`). Commit-marker presence is the sole
//! on-disk signal distinguishing "committed, needs roll-forward" from
//! "never committed, needs rollback" — which is why [`TransactionJournal::apply`]
//! deletes the commit marker before the begin marker, and
//! [`TransactionJournal::abort`] deletes it first thing.
//!
//! Marker bodies are JSON and carry a timestamp plus free-text comment
//! lines. A marker whose body cannot be parsed is still a valid journal
//! entry: its comment is replaced with a diagnostic, never an error, so one
//! corrupt file cannot hide the rest of the journal.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use harrow_core::error::{Error, Result};
use harrow_core::namespace::Namespace;
use harrow_core::paths::{self, SystemPaths};

use crate::transaction::{DataSourceRepository, OutputTransactionContext};

/// One journal entry, derived from the markers on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionInfo {
    /// Execution the transaction belongs to.
    pub execution_id: String,
    /// When the transaction began.
    pub timestamp: DateTime<Utc>,
    /// Whether global commit was reached.
    pub committed: bool,
    /// Free-text comment lines from the begin marker.
    pub comment: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct MarkerBody {
    timestamp: DateTime<Utc>,
    comment: Vec<String>,
}

/// Durable begin/commit marker bookkeeping with roll-forward and rollback.
#[derive(Clone)]
pub struct TransactionJournal {
    ns: Arc<dyn Namespace>,
    paths: SystemPaths,
    repository: DataSourceRepository,
}

impl TransactionJournal {
    /// Creates a journal over the given namespace and data-source repository.
    #[must_use]
    pub fn new(ns: Arc<dyn Namespace>, paths: SystemPaths, repository: DataSourceRepository) -> Self {
        Self {
            ns,
            paths,
            repository,
        }
    }

    fn validate_id(execution_id: &str) -> Result<()> {
        if execution_id.trim().is_empty() {
            return Err(Error::InvalidInput("execution id must not be blank".into()));
        }
        Ok(())
    }

    /// Writes the begin marker for an execution.
    ///
    /// # Errors
    ///
    /// Fails fast on a blank id; otherwise propagates namespace faults.
    pub async fn begin(&self, execution_id: &str, comment: &[String]) -> Result<()> {
        Self::validate_id(execution_id)?;
        let body = MarkerBody {
            timestamp: Utc::now(),
            comment: comment.to_vec(),
        };
        let data = serde_json::to_vec(&body).map_err(|e| Error::Serialization {
            message: format!("failed to encode begin marker: {e}"),
        })?;
        self.ns
            .write(&self.paths.begin_marker(execution_id), Bytes::from(data))
            .await?;
        tracing::info!(execution_id, "transaction begun");
        Ok(())
    }

    /// Writes the commit marker, recording that global commit was reached.
    ///
    /// # Errors
    ///
    /// Fails fast on a blank id; otherwise propagates namespace faults.
    pub async fn set_committed(&self, execution_id: &str) -> Result<()> {
        Self::validate_id(execution_id)?;
        let body = MarkerBody {
            timestamp: Utc::now(),
            comment: Vec::new(),
        };
        let data = serde_json::to_vec(&body).map_err(|e| Error::Serialization {
            message: format!("failed to encode commit marker: {e}"),
        })?;
        self.ns
            .write(&self.paths.commit_marker(execution_id), Bytes::from(data))
            .await?;
        tracing::info!(execution_id, "transaction committed");
        Ok(())
    }

    /// Lists all journal entries, oldest first.
    ///
    /// # Errors
    ///
    /// Propagates namespace faults. Unreadable marker bodies do not fail the
    /// listing.
    pub async fn list(&self) -> Result<Vec<TransactionInfo>> {
        let mut infos = Vec::new();
        for entry in self.ns.list_dir(&self.paths.transactions_dir()).await? {
            let name = paths::file_name(&entry.path);
            if let Some(execution_id) = SystemPaths::execution_id_of(name) {
                infos.push(self.build_info(execution_id, &entry.modified_at).await?);
            }
        }
        infos.sort_by(|a, b| {
            a.timestamp
                .cmp(&b.timestamp)
                .then_with(|| a.execution_id.cmp(&b.execution_id))
        });
        Ok(infos)
    }

    /// Returns the journal entry for one execution, or `None`.
    ///
    /// # Errors
    ///
    /// Fails fast on a blank id; otherwise propagates namespace faults.
    pub async fn get(&self, execution_id: &str) -> Result<Option<TransactionInfo>> {
        Self::validate_id(execution_id)?;
        let marker = self.paths.begin_marker(execution_id);
        match self.ns.status(&marker).await? {
            Some(status) => Ok(Some(
                self.build_info(execution_id, &status.modified_at).await?,
            )),
            None => Ok(None),
        }
    }

    async fn build_info(
        &self,
        execution_id: &str,
        fallback_timestamp: &DateTime<Utc>,
    ) -> Result<TransactionInfo> {
        let begin = self.paths.begin_marker(execution_id);
        let committed = self
            .ns
            .status(&self.paths.commit_marker(execution_id))
            .await?
            .is_some();
        let (timestamp, comment) = match self.ns.read(&begin).await {
            Ok(data) => match serde_json::from_slice::<MarkerBody>(&data) {
                Ok(body) => (body.timestamp, body.comment),
                Err(e) => (
                    *fallback_timestamp,
                    vec![format!("(unreadable marker body: {e})")],
                ),
            },
            Err(e) => (
                *fallback_timestamp,
                vec![format!("(failed to read marker: {e})")],
            ),
        };
        Ok(TransactionInfo {
            execution_id: execution_id.to_string(),
            timestamp,
            committed,
            comment,
        })
    }

    /// Rolls the transaction forward: commit and clean up every data source,
    /// then clear both markers.
    ///
    /// Returns `false` without touching anything if the begin marker is
    /// absent.
    ///
    /// # Errors
    ///
    /// The first data-source failure stops the roll-forward and propagates
    /// with both markers left in place, so the transaction can be retried or
    /// explicitly aborted later.
    pub async fn apply(&self, execution_id: &str) -> Result<bool> {
        Self::validate_id(execution_id)?;
        let begin = self.paths.begin_marker(execution_id);
        if self.ns.status(&begin).await?.is_none() {
            return Ok(false);
        }
        tracing::info!(
            execution_id,
            sources = self.repository.len(),
            "rolling transaction forward"
        );
        for source in self.repository.iter() {
            let ctx = OutputTransactionContext::new(execution_id, source.id());
            source.commit_transaction(&ctx).await?;
            source.cleanup_transaction(&ctx).await?;
        }
        // Commit marker first: if we crash between the two deletes the
        // transaction still reads as committed and apply can re-run.
        self.ns
            .delete(&self.paths.commit_marker(execution_id), false)
            .await?;
        self.ns.delete(&begin, false).await?;
        tracing::info!(execution_id, "transaction applied");
        Ok(true)
    }

    /// Rolls the transaction back: discard staged output for every data
    /// source, then clear the begin marker.
    ///
    /// Returns `false` without touching anything if the begin marker is
    /// absent.
    ///
    /// # Errors
    ///
    /// Per-source cleanup failures are collected; every source is attempted
    /// before the error is raised, with the first failure preserved as the
    /// error's cause, and the begin marker survives so the abort can be
    /// retried.
    pub async fn abort(&self, execution_id: &str) -> Result<bool> {
        Self::validate_id(execution_id)?;
        let begin = self.paths.begin_marker(execution_id);
        if self.ns.status(&begin).await?.is_none() {
            return Ok(false);
        }
        // The commit marker goes first so a crash mid-abort can never be
        // mistaken for a committed transaction.
        self.ns
            .delete(&self.paths.commit_marker(execution_id), false)
            .await?;
        tracing::info!(
            execution_id,
            sources = self.repository.len(),
            "rolling transaction back"
        );
        let mut failures: Vec<String> = Vec::new();
        let mut cause: Option<Error> = None;
        for source in self.repository.iter() {
            let ctx = OutputTransactionContext::new(execution_id, source.id());
            if let Err(e) = source.cleanup_transaction(&ctx).await {
                tracing::error!(execution_id, source = source.id(), error = %e, "cleanup failed");
                failures.push(format!("{}: {e}", source.id()));
                cause.get_or_insert(e);
            }
        }
        if let Some(cause) = cause {
            return Err(Error::storage_with_source(
                format!(
                    "abort of {execution_id} left {} data source(s) uncleaned: {}",
                    failures.len(),
                    failures.join("; ")
                ),
                cause,
            ));
        }
        self.ns.delete(&begin, false).await?;
        tracing::info!(execution_id, "transaction aborted");
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use harrow_core::namespace::MemoryNamespace;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::transaction::{OutputAttemptContext, OutputDataSource};

    #[derive(Default)]
    struct RecordingSource {
        name: String,
        commits: AtomicUsize,
        cleanups: AtomicUsize,
        fail_commit: bool,
        fail_cleanup: bool,
    }

    impl RecordingSource {
        fn named(name: &str) -> Self {
            Self {
                name: name.to_string(),
                ..Self::default()
            }
        }
    }

    #[async_trait]
    impl OutputDataSource for RecordingSource {
        fn id(&self) -> &str {
            &self.name
        }

        async fn setup_transaction(&self, _: &OutputTransactionContext) -> Result<()> {
            Ok(())
        }

        async fn commit_transaction(&self, _: &OutputTransactionContext) -> Result<()> {
            if self.fail_commit {
                return Err(Error::storage("commit refused"));
            }
            self.commits.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn cleanup_transaction(&self, _: &OutputTransactionContext) -> Result<()> {
            if self.fail_cleanup {
                return Err(Error::storage("cleanup refused"));
            }
            self.cleanups.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn setup_attempt(&self, _: &OutputAttemptContext) -> Result<()> {
            Ok(())
        }

        async fn commit_attempt(&self, _: &OutputAttemptContext) -> Result<()> {
            Ok(())
        }

        async fn cleanup_attempt(&self, _: &OutputAttemptContext) -> Result<()> {
            Ok(())
        }
    }

    fn journal_with(sources: Vec<Arc<RecordingSource>>) -> (TransactionJournal, MemoryNamespace) {
        let ns = MemoryNamespace::new();
        let mut repository = DataSourceRepository::new();
        for source in sources {
            repository.register(source);
        }
        let journal = TransactionJournal::new(
            Arc::new(ns.clone()),
            SystemPaths::default(),
            repository,
        );
        (journal, ns)
    }

    #[tokio::test]
    async fn apply_commits_cleans_and_clears_markers() {
        let source = Arc::new(RecordingSource::named("ds"));
        let (journal, ns) = journal_with(vec![Arc::clone(&source)]);

        journal.begin("ex1", &["batch run".into()]).await.unwrap();
        journal.set_committed("ex1").await.unwrap();

        assert!(journal.apply("ex1").await.expect("apply"));
        assert_eq!(source.commits.load(Ordering::SeqCst), 1);
        assert_eq!(source.cleanups.load(Ordering::SeqCst), 1);
        assert!(ns.status("_directio/transactions/tx-ex1").await.unwrap().is_none());
        assert!(ns
            .status("_directio/transactions/commit-ex1")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn abort_cleans_without_committing() {
        let source = Arc::new(RecordingSource::named("ds"));
        let (journal, ns) = journal_with(vec![Arc::clone(&source)]);

        journal.begin("ex1", &[]).await.unwrap();
        assert!(journal.abort("ex1").await.expect("abort"));
        assert_eq!(source.commits.load(Ordering::SeqCst), 0);
        assert_eq!(source.cleanups.load(Ordering::SeqCst), 1);
        assert!(ns.status("_directio/transactions/tx-ex1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn apply_and_abort_without_begin_marker_return_false() {
        let source = Arc::new(RecordingSource::named("ds"));
        let (journal, _ns) = journal_with(vec![Arc::clone(&source)]);

        assert!(!journal.apply("ghost").await.expect("apply"));
        assert!(!journal.abort("ghost").await.expect("abort"));
        assert_eq!(source.commits.load(Ordering::SeqCst), 0);
        assert_eq!(source.cleanups.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn failed_commit_keeps_markers_for_retry() {
        let good = Arc::new(RecordingSource::named("a-good"));
        let bad = Arc::new(RecordingSource {
            fail_commit: true,
            ..RecordingSource::named("b-bad")
        });
        let (journal, ns) = journal_with(vec![Arc::clone(&good), Arc::clone(&bad)]);

        journal.begin("ex1", &[]).await.unwrap();
        journal.set_committed("ex1").await.unwrap();

        assert!(journal.apply("ex1").await.is_err());
        // Markers survive so the transaction stays visible and retryable.
        assert!(ns.status("_directio/transactions/tx-ex1").await.unwrap().is_some());
        assert!(ns
            .status("_directio/transactions/commit-ex1")
            .await
            .unwrap()
            .is_some());

        // The failing source recovers; retry completes and clears markers.
        let retry_good = Arc::new(RecordingSource::named("b-bad"));
        let mut repository = DataSourceRepository::new();
        repository.register(Arc::clone(&good) as Arc<dyn OutputDataSource>);
        repository.register(retry_good);
        let journal = TransactionJournal::new(
            Arc::new(ns.clone()),
            SystemPaths::default(),
            repository,
        );
        assert!(journal.apply("ex1").await.expect("retry"));
        assert!(ns.status("_directio/transactions/tx-ex1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn failed_cleanup_during_abort_keeps_begin_marker() {
        let good = Arc::new(RecordingSource::named("a-good"));
        let bad = Arc::new(RecordingSource {
            fail_cleanup: true,
            ..RecordingSource::named("b-bad")
        });
        let (journal, ns) = journal_with(vec![Arc::clone(&good), Arc::clone(&bad)]);

        journal.begin("ex1", &[]).await.unwrap();
        journal.set_committed("ex1").await.unwrap();

        let err = journal.abort("ex1").await.expect_err("abort must fail");
        // The aggregated error carries the first cleanup failure as its cause.
        assert!(std::error::Error::source(&err).is_some());
        // Every source was attempted despite the failure.
        assert_eq!(good.cleanups.load(Ordering::SeqCst), 1);
        // Begin marker survives; commit marker is already gone.
        assert!(ns.status("_directio/transactions/tx-ex1").await.unwrap().is_some());
        assert!(ns
            .status("_directio/transactions/commit-ex1")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn list_sorts_by_timestamp_and_reports_commit_state() {
        let (journal, _ns) = journal_with(vec![]);

        journal.begin("older", &["first".into()]).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        journal.begin("newer", &["second".into()]).await.unwrap();
        journal.set_committed("newer").await.unwrap();

        let infos = journal.list().await.expect("list");
        assert_eq!(infos.len(), 2);
        assert_eq!(infos[0].execution_id, "older");
        assert!(!infos[0].committed);
        assert_eq!(infos[1].execution_id, "newer");
        assert!(infos[1].committed);
        assert_eq!(infos[1].comment, ["second"]);
    }

    #[tokio::test]
    async fn corrupt_marker_body_is_diagnostic_not_fatal() {
        let (journal, ns) = journal_with(vec![]);
        ns.write(
            "_directio/transactions/tx-broken",
            Bytes::from_static(b"not json"),
        )
        .await
        .unwrap();

        let infos = journal.list().await.expect("list");
        assert_eq!(infos.len(), 1);
        assert_eq!(infos[0].execution_id, "broken");
        assert!(infos[0].comment[0].contains("unreadable marker body"));

        let info = journal.get("broken").await.expect("get").expect("found");
        assert!(!info.committed);
    }

    #[tokio::test]
    async fn get_missing_is_none_and_blank_id_is_rejected() {
        let (journal, _ns) = journal_with(vec![]);
        assert!(journal.get("absent").await.expect("get").is_none());
        assert!(journal.get(" ").await.is_err());
        assert!(journal.begin("", &[]).await.is_err());
    }
}
