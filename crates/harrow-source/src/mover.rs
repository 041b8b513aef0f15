//! Bulk relocation of directory trees.
//!
//! [`BulkMover`] moves every file under one directory into another location,
//! serially or with bounded parallelism. A missing source is a successful
//! no-op, so a retried move converges instead of failing: files already
//! relocated by an earlier attempt are simply no longer there to move.
//!
//! The parallel path runs two fully separated phases: prepare (delete stale
//! targets, create missing parent directories) and execute (relocate). The
//! barrier between them means no relocation ever races a directory creation
//! or a stale-target delete.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use futures::stream::{self, TryStreamExt};

use harrow_core::counter::Counter;
use harrow_core::error::{Error, Result};
use harrow_core::namespace::{list_files_recursive, Namespace};
use harrow_core::paths;

/// Minimum file count before a parallel move pays for its worker pool.
const MIN_PARALLEL_FILES: usize = 3;

/// How individual files are relocated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveMode {
    /// Atomic rename within one namespace. Source and destination must be
    /// the same namespace.
    Rename,
    /// Copy out of a local scratch namespace, then delete the source.
    CopyFromLocal,
}

/// Relocates a directory tree's files into another location.
#[derive(Debug, Clone, Copy)]
pub struct BulkMover {
    parallelism: usize,
}

impl BulkMover {
    /// Creates a mover that uses up to `parallelism` concurrent workers.
    #[must_use]
    pub fn new(parallelism: usize) -> Self {
        Self {
            parallelism: parallelism.max(1),
        }
    }

    /// Moves every file under `from` to the corresponding path under `to`.
    ///
    /// Returns the number of files relocated, which is also added to
    /// `counter`. A missing `from` returns zero operations. The first
    /// failure in a parallel phase cancels the phase's remaining work and
    /// propagates.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidInput` if `from` exists but is not a
    /// directory, [`Error::MoveFailed`] when a rename is rejected, or the
    /// underlying namespace fault.
    pub async fn move_all(
        &self,
        src: &Arc<dyn Namespace>,
        from: &str,
        dst: &Arc<dyn Namespace>,
        to: &str,
        mode: MoveMode,
        counter: &Counter,
    ) -> Result<u64> {
        let Some(from_status) = src.status(from).await? else {
            tracing::debug!(from, to, "move source absent, nothing to do");
            return Ok(0);
        };
        if !from_status.is_dir {
            return Err(Error::InvalidInput(format!(
                "move source is not a directory: {from}"
            )));
        }

        let files = list_files_recursive(src.as_ref(), from).await?;
        let moves: Vec<(String, String)> = files
            .into_iter()
            .filter_map(|file| {
                paths::relative_to(from, &file.path)
                    .map(|rel| (file.path.clone(), paths::join(to, rel)))
            })
            .collect();

        tracing::info!(
            from,
            to,
            files = moves.len(),
            parallelism = self.parallelism,
            "starting bulk move"
        );

        let moved = if self.parallelism > 1 && moves.len() >= MIN_PARALLEL_FILES {
            self.move_parallel(src, dst, &moves, mode, counter).await?
        } else {
            Self::move_serial(src, dst, &moves, mode, counter).await?
        };

        tracing::info!(from, to, moved, "bulk move complete");
        Ok(moved)
    }

    async fn move_parallel(
        &self,
        src: &Arc<dyn Namespace>,
        dst: &Arc<dyn Namespace>,
        moves: &[(String, String)],
        mode: MoveMode,
        counter: &Counter,
    ) -> Result<u64> {
        let workers = self.parallelism.min(moves.len());
        let missing_parents: Mutex<HashSet<String>> = Mutex::new(HashSet::new());

        // Phase 1: delete stale targets and collect parents needing creation.
        stream::iter(moves.iter().map(Ok::<_, Error>))
            .try_for_each_concurrent(workers, |(_, target)| {
                let missing_parents = &missing_parents;
                async move {
                    if dst.status(target).await?.is_some() {
                        dst.delete(target, true).await?;
                    } else if let Some(parent) = paths::parent(target) {
                        missing_parents
                            .lock()
                            .map_err(|_| Error::internal("lock poisoned"))?
                            .insert(parent.to_string());
                    }
                    Ok(())
                }
            })
            .await?;

        let parents: Vec<String> = missing_parents
            .lock()
            .map_err(|_| Error::internal("lock poisoned"))?
            .iter()
            .cloned()
            .collect();
        stream::iter(parents.iter().map(Ok::<_, Error>))
            .try_for_each_concurrent(workers, |parent| async move {
                dst.mkdirs(parent).await
            })
            .await?;

        // Phase 2: every directory is in place, relocate.
        stream::iter(moves.iter().map(Ok::<_, Error>))
            .try_for_each_concurrent(workers, |(source, target)| async move {
                relocate(src, dst, source, target, mode).await?;
                counter.add(1);
                Ok(())
            })
            .await?;

        Ok(moves.len() as u64)
    }

    async fn move_serial(
        src: &Arc<dyn Namespace>,
        dst: &Arc<dyn Namespace>,
        moves: &[(String, String)],
        mode: MoveMode,
        counter: &Counter,
    ) -> Result<u64> {
        let mut created: HashSet<String> = HashSet::new();
        for (source, target) in moves {
            if dst.status(target).await?.is_some() {
                dst.delete(target, true).await?;
            } else if let Some(parent) = paths::parent(target) {
                if created.insert(parent.to_string()) {
                    dst.mkdirs(parent).await?;
                }
            }
            relocate(src, dst, source, target, mode).await?;
            counter.add(1);
        }
        Ok(moves.len() as u64)
    }
}

async fn relocate(
    src: &Arc<dyn Namespace>,
    dst: &Arc<dyn Namespace>,
    source: &str,
    target: &str,
    mode: MoveMode,
) -> Result<()> {
    tracing::debug!(source, target, ?mode, "relocating file");
    match mode {
        MoveMode::Rename => src.rename(source, target).await,
        MoveMode::CopyFromLocal => {
            let data = src.read(source).await?;
            dst.write(target, data).await?;
            src.delete(source, false).await?;
            Ok(())
        }
    }
}
