//! Namespace provider abstraction.
//!
//! This module defines the contract harrow expects from the distributed
//! filesystem it runs against: status/list/mkdirs/delete/rename, whole-file
//! read/write for small system files, and replica-location hints for input
//! planning. The contract assumes an already-connected client; harrow adds no
//! transport of its own.
//!
//! Paths are `/`-separated relative strings. "Not found" is a normal result
//! (`Option`, or `false` from [`Namespace::delete`]), never an error —
//! idempotent retry depends on that.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, RwLock};

use crate::error::{Error, Result};
use crate::paths;

/// A namespace status snapshot for one entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceStatus {
    /// Full path of the entry.
    pub path: String,
    /// Whether the entry is a directory.
    pub is_dir: bool,
    /// Size in bytes; zero for directories.
    pub size: u64,
    /// Last modification time.
    pub modified_at: DateTime<Utc>,
}

/// A replica-location hint for one byte sub-range of a file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockHint {
    /// Offset of the range within the file.
    pub offset: u64,
    /// Length of the range.
    pub length: u64,
    /// Hosts known to hold a replica of the range.
    pub hosts: Vec<String>,
}

/// The namespace provider contract.
///
/// Implementations must make `rename` atomic within the namespace and
/// `delete`/`mkdirs` idempotent; harrow's transactional guarantees are built
/// on exactly those properties.
#[async_trait]
pub trait Namespace: Send + Sync {
    /// Returns the status of an entry, or `None` if it does not exist.
    async fn status(&self, path: &str) -> Result<Option<ResourceStatus>>;

    /// Lists the direct children of a directory.
    ///
    /// Returns an empty list for a missing path or a non-directory.
    async fn list_dir(&self, path: &str) -> Result<Vec<ResourceStatus>>;

    /// Creates a directory and any missing ancestors. Idempotent.
    async fn mkdirs(&self, path: &str) -> Result<()>;

    /// Deletes an entry, returning `false` if it was already absent.
    ///
    /// Deleting a non-empty directory requires `recursive`.
    async fn delete(&self, path: &str, recursive: bool) -> Result<bool>;

    /// Atomically renames an entry. Fails with [`Error::MoveFailed`] if the
    /// source is missing or the target already exists.
    async fn rename(&self, from: &str, to: &str) -> Result<()>;

    /// Reads the entire content of a file.
    async fn read(&self, path: &str) -> Result<Bytes>;

    /// Writes a file, replacing any previous content and creating missing
    /// parent directories.
    async fn write(&self, path: &str, data: Bytes) -> Result<()>;

    /// Returns the replica-location hints for a file, possibly empty.
    async fn block_hints(&self, path: &str) -> Result<Vec<BlockHint>>;
}

/// In-memory namespace for testing.
///
/// Thread-safe via `RwLock`; not suitable for production. Keeps explicit
/// directory entries so that empty directories, recursive deletes, and
/// subtree renames behave like a real filesystem. Block hints are attached
/// per file through [`MemoryNamespace::set_block_hints`].
#[derive(Debug, Default, Clone)]
pub struct MemoryNamespace {
    inner: Arc<RwLock<MemoryInner>>,
}

#[derive(Debug, Default)]
struct MemoryInner {
    files: BTreeMap<String, StoredFile>,
    dirs: BTreeSet<String>,
}

#[derive(Debug, Clone)]
struct StoredFile {
    data: Bytes,
    modified_at: DateTime<Utc>,
    hints: Vec<BlockHint>,
}

impl MemoryNamespace {
    /// Creates a new empty namespace.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Attaches replica-location hints to an existing file.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidInput` if the file does not exist.
    pub fn set_block_hints(&self, path: &str, hints: Vec<BlockHint>) -> Result<()> {
        let mut inner = self.write_lock()?;
        match inner.files.get_mut(path) {
            Some(file) => {
                file.hints = hints;
                Ok(())
            }
            None => Err(Error::InvalidInput(format!("no such file: {path}"))),
        }
    }

    fn read_lock(&self) -> Result<std::sync::RwLockReadGuard<'_, MemoryInner>> {
        self.inner.read().map_err(|_| Error::internal("lock poisoned"))
    }

    fn write_lock(&self) -> Result<std::sync::RwLockWriteGuard<'_, MemoryInner>> {
        self.inner
            .write()
            .map_err(|_| Error::internal("lock poisoned"))
    }
}

impl MemoryInner {
    fn add_ancestors(&mut self, path: &str) {
        let mut current = paths::parent(path);
        while let Some(dir) = current {
            self.dirs.insert(dir.to_string());
            current = paths::parent(dir);
        }
    }

    fn has_children(&self, dir: &str) -> bool {
        let files = self
            .files
            .keys()
            .any(|p| paths::is_strict_ancestor(dir, p));
        files || self.dirs.iter().any(|p| paths::is_strict_ancestor(dir, p))
    }

    fn dir_status(path: &str) -> ResourceStatus {
        ResourceStatus {
            path: path.to_string(),
            is_dir: true,
            size: 0,
            modified_at: Utc::now(),
        }
    }
}

#[async_trait]
impl Namespace for MemoryNamespace {
    async fn status(&self, path: &str) -> Result<Option<ResourceStatus>> {
        let inner = self.read_lock()?;
        if let Some(file) = inner.files.get(path) {
            return Ok(Some(ResourceStatus {
                path: path.to_string(),
                is_dir: false,
                size: file.data.len() as u64,
                modified_at: file.modified_at,
            }));
        }
        if inner.dirs.contains(path) {
            return Ok(Some(MemoryInner::dir_status(path)));
        }
        Ok(None)
    }

    async fn list_dir(&self, path: &str) -> Result<Vec<ResourceStatus>> {
        let inner = self.read_lock()?;
        if !inner.dirs.contains(path) {
            return Ok(Vec::new());
        }
        let mut children: Vec<ResourceStatus> = Vec::new();
        for (file_path, file) in &inner.files {
            if paths::parent(file_path) == Some(path) {
                children.push(ResourceStatus {
                    path: file_path.clone(),
                    is_dir: false,
                    size: file.data.len() as u64,
                    modified_at: file.modified_at,
                });
            }
        }
        for dir in &inner.dirs {
            if paths::parent(dir) == Some(path) {
                children.push(MemoryInner::dir_status(dir));
            }
        }
        children.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(children)
    }

    async fn mkdirs(&self, path: &str) -> Result<()> {
        let mut inner = self.write_lock()?;
        if inner.files.contains_key(path) {
            return Err(Error::storage(format!(
                "cannot create directory over file: {path}"
            )));
        }
        inner.dirs.insert(path.to_string());
        inner.add_ancestors(path);
        Ok(())
    }

    async fn delete(&self, path: &str, recursive: bool) -> Result<bool> {
        let mut inner = self.write_lock()?;
        if inner.files.remove(path).is_some() {
            return Ok(true);
        }
        if !inner.dirs.contains(path) {
            return Ok(false);
        }
        if inner.has_children(path) && !recursive {
            return Err(Error::storage(format!(
                "directory not empty: {path} (recursive delete required)"
            )));
        }
        inner.dirs.remove(path);
        inner
            .dirs
            .retain(|d| !paths::is_strict_ancestor(path, d));
        inner
            .files
            .retain(|f, _| !paths::is_strict_ancestor(path, f));
        Ok(true)
    }

    async fn rename(&self, from: &str, to: &str) -> Result<()> {
        let mut inner = self.write_lock()?;
        let target_exists = inner.files.contains_key(to) || inner.dirs.contains(to);
        if target_exists {
            return Err(Error::MoveFailed {
                from: from.to_string(),
                to: to.to_string(),
            });
        }
        if let Some(file) = inner.files.remove(from) {
            inner.add_ancestors(to);
            inner.files.insert(to.to_string(), file);
            return Ok(());
        }
        if inner.dirs.contains(from) {
            inner.dirs.remove(from);
            inner.dirs.insert(to.to_string());
            inner.add_ancestors(to);
            let moved_dirs: Vec<String> = inner
                .dirs
                .iter()
                .filter(|d| paths::is_strict_ancestor(from, d))
                .cloned()
                .collect();
            for dir in moved_dirs {
                let suffix = paths::relative_to(from, &dir)
                    .ok_or_else(|| Error::internal("subtree rename lost a directory"))?
                    .to_string();
                inner.dirs.remove(&dir);
                inner.dirs.insert(paths::join(to, &suffix));
            }
            let moved_files: Vec<String> = inner
                .files
                .keys()
                .filter(|f| paths::is_strict_ancestor(from, f))
                .cloned()
                .collect();
            for file_path in moved_files {
                let suffix = paths::relative_to(from, &file_path)
                    .ok_or_else(|| Error::internal("subtree rename lost a file"))?
                    .to_string();
                if let Some(file) = inner.files.remove(&file_path) {
                    inner.files.insert(paths::join(to, &suffix), file);
                }
            }
            return Ok(());
        }
        Err(Error::MoveFailed {
            from: from.to_string(),
            to: to.to_string(),
        })
    }

    async fn read(&self, path: &str) -> Result<Bytes> {
        let inner = self.read_lock()?;
        inner
            .files
            .get(path)
            .map(|f| f.data.clone())
            .ok_or_else(|| Error::storage(format!("no such file: {path}")))
    }

    async fn write(&self, path: &str, data: Bytes) -> Result<()> {
        let mut inner = self.write_lock()?;
        if inner.dirs.contains(path) {
            return Err(Error::storage(format!(
                "cannot write file over directory: {path}"
            )));
        }
        inner.add_ancestors(path);
        inner.files.insert(
            path.to_string(),
            StoredFile {
                data,
                modified_at: Utc::now(),
                hints: Vec::new(),
            },
        );
        Ok(())
    }

    async fn block_hints(&self, path: &str) -> Result<Vec<BlockHint>> {
        let inner = self.read_lock()?;
        Ok(inner
            .files
            .get(path)
            .map(|f| f.hints.clone())
            .unwrap_or_default())
    }
}

/// Collects every file (not directory) under `root`, recursively.
///
/// Returns an empty list if `root` is missing. A file `root` is returned as
/// the single result. The output is sorted by path.
pub async fn list_files_recursive(
    ns: &dyn Namespace,
    root: &str,
) -> Result<Vec<ResourceStatus>> {
    let Some(root_status) = ns.status(root).await? else {
        return Ok(Vec::new());
    };
    if !root_status.is_dir {
        return Ok(vec![root_status]);
    }
    let mut files = Vec::new();
    let mut queue = vec![root_status.path];
    while let Some(dir) = queue.pop() {
        for child in ns.list_dir(&dir).await? {
            if child.is_dir {
                queue.push(child.path);
            } else {
                files.push(child);
            }
        }
    }
    files.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn write_creates_ancestors() {
        let ns = MemoryNamespace::new();
        ns.write("a/b/c.bin", Bytes::from_static(b"x"))
            .await
            .expect("write");

        let status = ns.status("a/b").await.expect("status").expect("exists");
        assert!(status.is_dir);
        let children = ns.list_dir("a/b").await.expect("list");
        assert_eq!(children.len(), 1);
        assert_eq!(children[0].path, "a/b/c.bin");
        assert!(!children[0].is_dir);
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let ns = MemoryNamespace::new();
        ns.write("a/f", Bytes::from_static(b"x")).await.unwrap();

        assert!(ns.delete("a/f", false).await.expect("first delete"));
        assert!(!ns.delete("a/f", false).await.expect("second delete"));
        assert!(!ns.delete("missing", true).await.expect("absent"));
    }

    #[tokio::test]
    async fn recursive_delete_required_for_non_empty_dir() {
        let ns = MemoryNamespace::new();
        ns.write("d/f", Bytes::from_static(b"x")).await.unwrap();

        assert!(ns.delete("d", false).await.is_err());
        assert!(ns.delete("d", true).await.expect("recursive"));
        assert!(ns.status("d/f").await.expect("status").is_none());
    }

    #[tokio::test]
    async fn rename_moves_subtrees_and_rejects_existing_target() {
        let ns = MemoryNamespace::new();
        ns.write("src/x/f1", Bytes::from_static(b"1")).await.unwrap();
        ns.write("src/f2", Bytes::from_static(b"2")).await.unwrap();

        ns.rename("src", "dst").await.expect("rename");
        assert_eq!(ns.read("dst/x/f1").await.expect("read"), Bytes::from_static(b"1"));
        assert!(ns.status("src").await.expect("status").is_none());

        ns.write("other", Bytes::from_static(b"3")).await.unwrap();
        let err = ns.rename("other", "dst/f2").await;
        assert!(matches!(err, Err(Error::MoveFailed { .. })));
    }

    #[tokio::test]
    async fn rename_missing_source_fails() {
        let ns = MemoryNamespace::new();
        assert!(matches!(
            ns.rename("nope", "dst").await,
            Err(Error::MoveFailed { .. })
        ));
    }

    #[tokio::test]
    async fn list_files_recursive_walks_everything() {
        let ns = MemoryNamespace::new();
        ns.write("r/a/f1", Bytes::from_static(b"1")).await.unwrap();
        ns.write("r/a/b/f2", Bytes::from_static(b"2")).await.unwrap();
        ns.write("r/f3", Bytes::from_static(b"3")).await.unwrap();
        ns.mkdirs("r/empty").await.unwrap();

        let files = list_files_recursive(&ns, "r").await.expect("walk");
        let names: Vec<&str> = files.iter().map(|f| f.path.as_str()).collect();
        assert_eq!(names, ["r/a/b/f2", "r/a/f1", "r/f3"]);

        assert!(list_files_recursive(&ns, "absent")
            .await
            .expect("missing root")
            .is_empty());
    }

    #[tokio::test]
    async fn block_hints_roundtrip() {
        let ns = MemoryNamespace::new();
        ns.write("f", Bytes::from_static(b"0123456789")).await.unwrap();
        ns.set_block_hints(
            "f",
            vec![BlockHint {
                offset: 0,
                length: 10,
                hosts: vec!["h1".into()],
            }],
        )
        .expect("set hints");

        let hints = ns.block_hints("f").await.expect("hints");
        assert_eq!(hints.len(), 1);
        assert_eq!(hints[0].hosts, ["h1"]);
        assert!(ns.block_hints("absent").await.expect("absent").is_empty());
    }
}
