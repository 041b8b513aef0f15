//! Data-source profiles.
//!
//! A [`DataSourceProfile`] carries everything one data source needs to plan
//! input fragments and stage output: its mount point in the namespace, its
//! temporary area, and the fragmentation and roll-forward tuning knobs.
//! Profiles are plain values; loading them from configuration files is the
//! caller's concern.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// How a format's own minimum fragment size is reconciled with the
/// configured minimum.
///
/// `Max` takes the larger of the two, so a format can never be asked to
/// split below what it supports. `LegacyMin` preserves the historical
/// behavior of taking the smaller value and exists only for deployments
/// that depended on it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FragmentSizeCompat {
    /// Take the larger of format minimum and configured minimum (default).
    #[default]
    Max,
    /// Take the smaller of the two. Legacy mode.
    LegacyMin,
}

impl FragmentSizeCompat {
    /// Reconciles a format-declared minimum with the configured minimum.
    #[must_use]
    pub fn reconcile(self, configured: i64, format_min: i64) -> i64 {
        match self {
            Self::Max => configured.max(format_min),
            Self::LegacyMin => configured.min(format_min),
        }
    }
}

/// Configuration for one data source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataSourceProfile {
    /// Unique name of this data source within the repository.
    pub id: String,
    /// Namespace path the data source is mounted on.
    pub root_path: String,
    /// Namespace path of the per-transaction temporary area.
    pub temp_root: String,
    /// Whether output goes through a transaction staging area before the
    /// final root. Disabling trades crash atomicity for one less move.
    pub staging: bool,
    /// Whether writers stream directly into the namespace. When disabled and
    /// a local scratch directory is configured, attempts buffer to local
    /// disk first.
    pub streaming: bool,
    /// Local scratch directory for non-streaming attempts.
    pub local_scratch: Option<String>,
    /// Minimum fragment size in bytes; negative disables fragmentation.
    pub min_fragment_size: i64,
    /// Preferred fragment size in bytes.
    pub preferred_fragment_size: i64,
    /// Whether spans may be split below block boundaries.
    pub split_blocks: bool,
    /// Whether adjacent blocks with identical replica sets are merged.
    pub combine_blocks: bool,
    /// Worker count for the transaction-commit move.
    pub rollforward_threads: usize,
    /// Reconciliation mode for format-declared minimum fragment sizes.
    #[serde(default)]
    pub size_compat: FragmentSizeCompat,
}

impl DataSourceProfile {
    /// Creates a profile with default tuning for the given mount.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidInput` if `id` or `root_path` is blank.
    pub fn new(
        id: impl Into<String>,
        root_path: impl Into<String>,
        temp_root: impl Into<String>,
    ) -> Result<Self> {
        let profile = Self {
            id: id.into(),
            root_path: root_path.into(),
            temp_root: temp_root.into(),
            staging: true,
            streaming: true,
            local_scratch: None,
            min_fragment_size: -1,
            preferred_fragment_size: -1,
            split_blocks: true,
            combine_blocks: true,
            rollforward_threads: 1,
            size_compat: FragmentSizeCompat::default(),
        };
        profile.validate()?;
        Ok(profile)
    }

    /// Validates required fields. Called at construction; callers building
    /// profiles by hand should call it before use.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidInput` on blank `id` or `root_path`.
    pub fn validate(&self) -> Result<()> {
        if self.id.trim().is_empty() {
            return Err(Error::InvalidInput(
                "data source id must not be blank".into(),
            ));
        }
        if self.root_path.trim().is_empty() {
            return Err(Error::InvalidInput(format!(
                "data source {} has a blank root path",
                self.id
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_fields_are_rejected() {
        assert!(DataSourceProfile::new("", "root", "tmp").is_err());
        assert!(DataSourceProfile::new("ds", " ", "tmp").is_err());
        assert!(DataSourceProfile::new("ds", "root", "tmp").is_ok());
    }

    #[test]
    fn size_compat_reconciliation() {
        assert_eq!(FragmentSizeCompat::Max.reconcile(100, 256), 256);
        assert_eq!(FragmentSizeCompat::Max.reconcile(512, 256), 512);
        assert_eq!(FragmentSizeCompat::LegacyMin.reconcile(512, 256), 256);
    }
}
