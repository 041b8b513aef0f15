//! Canonical namespace paths for harrow.
//!
//! This module is the single source of truth for the journal and staging
//! layout. All writers construct paths through [`SystemPaths`]; no hardcoded
//! path strings should exist outside this module.
//!
//! # Path Layout
//!
//! ```text
//! {system_dir}/transactions/
//! ├── tx-{execution_id}        # begin marker
//! └── commit-{execution_id}    # commit marker
//!
//! {temp_root}/{execution_id}-{output_id}/
//! ├── staging/...              # transaction staging area
//! └── attempts/{attempt_id}/...# per-attempt staging area
//! ```
//!
//! Paths are plain `/`-separated strings with no trailing slash, matching the
//! namespace provider's key space. The free functions below are the shared
//! helpers for manipulating them.

/// Default system directory when none is configured.
pub const DEFAULT_SYSTEM_DIR: &str = "_directio";

/// Prefix of begin markers inside the transactions directory.
pub const BEGIN_MARKER_PREFIX: &str = "tx-";

/// Prefix of commit markers inside the transactions directory.
pub const COMMIT_MARKER_PREFIX: &str = "commit-";

/// Joins two path components, tolerating an empty base or child.
#[must_use]
pub fn join(base: &str, child: &str) -> String {
    let base = base.trim_end_matches('/');
    let child = child.trim_start_matches('/');
    if base.is_empty() {
        child.to_string()
    } else if child.is_empty() {
        base.to_string()
    } else {
        format!("{base}/{child}")
    }
}

/// Returns the parent of a path, or `None` for a root-level path.
#[must_use]
pub fn parent(path: &str) -> Option<&str> {
    path.trim_end_matches('/').rsplit_once('/').map(|(p, _)| p)
}

/// Returns the final component of a path.
#[must_use]
pub fn file_name(path: &str) -> &str {
    path.trim_end_matches('/')
        .rsplit_once('/')
        .map_or(path, |(_, name)| name)
}

/// Returns `child` relative to `base`, or `None` if `child` is not under it.
///
/// `relative_to("a/b", "a/b/c/d")` is `Some("c/d")`; a path is not relative
/// to itself.
#[must_use]
pub fn relative_to<'a>(base: &str, child: &'a str) -> Option<&'a str> {
    let base = base.trim_end_matches('/');
    let rest = child.strip_prefix(base)?;
    rest.strip_prefix('/').filter(|r| !r.is_empty())
}

/// Returns true when `ancestor` strictly contains `path` (never for equal paths).
#[must_use]
pub fn is_strict_ancestor(ancestor: &str, path: &str) -> bool {
    relative_to(ancestor, path).is_some()
}

/// Canonical path generator for the transaction journal and staging areas.
///
/// One value per configured deployment; data sources and the journal share it
/// so that markers and temporary areas always agree on layout.
#[derive(Debug, Clone)]
pub struct SystemPaths {
    system_dir: String,
}

impl SystemPaths {
    /// Creates a path generator rooted at `system_dir`.
    #[must_use]
    pub fn new(system_dir: impl Into<String>) -> Self {
        Self {
            system_dir: system_dir.into(),
        }
    }

    /// Returns the directory holding all transaction markers.
    #[must_use]
    pub fn transactions_dir(&self) -> String {
        join(&self.system_dir, "transactions")
    }

    /// Returns the begin-marker path for an execution.
    #[must_use]
    pub fn begin_marker(&self, execution_id: &str) -> String {
        join(
            &self.transactions_dir(),
            &format!("{BEGIN_MARKER_PREFIX}{execution_id}"),
        )
    }

    /// Returns the commit-marker path for an execution.
    #[must_use]
    pub fn commit_marker(&self, execution_id: &str) -> String {
        join(
            &self.transactions_dir(),
            &format!("{COMMIT_MARKER_PREFIX}{execution_id}"),
        )
    }

    /// Extracts the execution id from a begin-marker file name, if it is one.
    #[must_use]
    pub fn execution_id_of(marker_name: &str) -> Option<&str> {
        marker_name.strip_prefix(BEGIN_MARKER_PREFIX)
    }

    /// Returns the per-transaction temporary area for one output.
    #[must_use]
    pub fn transaction_temp_dir(temp_root: &str, execution_id: &str, output_id: &str) -> String {
        join(temp_root, &format!("{execution_id}-{output_id}"))
    }

    /// Returns the transaction staging root inside the temporary area.
    #[must_use]
    pub fn staging_dir(temp_root: &str, execution_id: &str, output_id: &str) -> String {
        join(
            &Self::transaction_temp_dir(temp_root, execution_id, output_id),
            "staging",
        )
    }

    /// Returns the staging directory for one attempt.
    #[must_use]
    pub fn attempt_dir(
        temp_root: &str,
        execution_id: &str,
        output_id: &str,
        attempt_id: &str,
    ) -> String {
        join(
            &join(
                &Self::transaction_temp_dir(temp_root, execution_id, output_id),
                "attempts",
            ),
            attempt_id,
        )
    }
}

impl Default for SystemPaths {
    fn default() -> Self {
        Self::new(DEFAULT_SYSTEM_DIR)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_handles_edges() {
        assert_eq!(join("a", "b"), "a/b");
        assert_eq!(join("a/", "/b"), "a/b");
        assert_eq!(join("", "b"), "b");
        assert_eq!(join("a", ""), "a");
    }

    #[test]
    fn relative_to_requires_strict_containment() {
        assert_eq!(relative_to("a/b", "a/b/c/d"), Some("c/d"));
        assert_eq!(relative_to("a/b", "a/b"), None);
        assert_eq!(relative_to("a/b", "a/bc"), None);
        assert_eq!(relative_to("a/b", "x/y"), None);
    }

    #[test]
    fn parent_and_file_name() {
        assert_eq!(parent("a/b/c"), Some("a/b"));
        assert_eq!(parent("a"), None);
        assert_eq!(file_name("a/b/c"), "c");
        assert_eq!(file_name("c"), "c");
    }

    #[test]
    fn marker_paths_follow_layout() {
        let paths = SystemPaths::default();
        assert_eq!(paths.begin_marker("ex1"), "_directio/transactions/tx-ex1");
        assert_eq!(
            paths.commit_marker("ex1"),
            "_directio/transactions/commit-ex1"
        );
        assert_eq!(SystemPaths::execution_id_of("tx-ex1"), Some("ex1"));
        assert_eq!(SystemPaths::execution_id_of("commit-ex1"), None);
    }

    #[test]
    fn staging_layout() {
        assert_eq!(
            SystemPaths::staging_dir("tmp", "ex1", "out"),
            "tmp/ex1-out/staging"
        );
        assert_eq!(
            SystemPaths::attempt_dir("tmp", "ex1", "out", "a-0"),
            "tmp/ex1-out/attempts/a-0"
        );
    }
}
