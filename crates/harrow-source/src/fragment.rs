//! Fragment planning over block maps.
//!
//! A [`FragmentPlanner`] turns one file's block map into the list of
//! contiguous work fragments handed to the execution engine. Fragments
//! always partition `[0, file_size)` exactly; locality hints ride along but
//! never affect the partitioning itself.

use harrow_core::namespace::BlockHint;
use harrow_core::profile::{DataSourceProfile, FragmentSizeCompat};

use crate::block::BlockMap;

/// A contiguous byte range of one file, one unit of parallel input work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fragment {
    /// Path of the file the fragment belongs to.
    pub path: String,
    /// Start offset within the file.
    pub offset: u64,
    /// Length in bytes.
    pub size: u64,
    /// Hosts worth scheduling this fragment on, best first. May be empty.
    pub hosts: Vec<String>,
}

/// Partitioning policy for one data source.
#[derive(Debug, Clone)]
pub struct FragmentPlanner {
    min_size: i64,
    pref_size: i64,
    combine_blocks: bool,
    split_blocks: bool,
    size_compat: FragmentSizeCompat,
}

impl FragmentPlanner {
    /// Creates a planner.
    ///
    /// A negative `min_size` disables fragmentation entirely. `min_size` is
    /// clamped to `i64::MAX / 8` so later span arithmetic cannot overflow,
    /// and `pref_size` is raised to at least `min_size`.
    #[must_use]
    pub fn new(min_size: i64, pref_size: i64, combine_blocks: bool, split_blocks: bool) -> Self {
        let min_size = min_size.min(i64::MAX / 8);
        Self {
            min_size,
            pref_size: pref_size.max(min_size),
            combine_blocks,
            split_blocks,
            size_compat: FragmentSizeCompat::default(),
        }
    }

    /// Creates a planner from a data-source profile.
    #[must_use]
    pub fn from_profile(profile: &DataSourceProfile) -> Self {
        let mut planner = Self::new(
            profile.min_fragment_size,
            profile.preferred_fragment_size,
            profile.combine_blocks,
            profile.split_blocks,
        );
        planner.size_compat = profile.size_compat;
        planner
    }

    /// Reconciles a format-declared minimum fragment size with this
    /// planner's configured minimum.
    #[must_use]
    pub fn effective_min_size(&self, format_min: i64) -> i64 {
        self.size_compat.reconcile(self.min_size, format_min)
    }

    /// Returns a planner whose minimum honors a format-declared minimum,
    /// reconciled per the configured compatibility mode.
    #[must_use]
    pub fn for_format(&self, format_min: i64) -> Self {
        let mut planner = self.clone();
        planner.min_size = self.effective_min_size(format_min).min(i64::MAX / 8);
        planner.pref_size = planner.pref_size.max(planner.min_size);
        planner
    }

    /// Whether fragmentation is enabled at all.
    #[must_use]
    pub fn fragmentation_enabled(&self) -> bool {
        self.min_size >= 0
    }

    /// Computes the fragments for one file.
    ///
    /// The result is sorted, contiguous, non-overlapping, and its union is
    /// exactly `[0, file_size)`.
    #[must_use]
    pub fn compute_fragments(
        &self,
        path: &str,
        file_size: u64,
        hints: &[BlockHint],
    ) -> Vec<Fragment> {
        let map = BlockMap::create(path, file_size, hints, self.combine_blocks);

        #[allow(clippy::cast_sign_loss)]
        let min_size = self.min_size.max(0) as u64;
        if !self.fragmentation_enabled() || file_size / 2 < min_size {
            return vec![Fragment {
                path: path.to_string(),
                offset: 0,
                size: file_size,
                hosts: map.fragment_hosts(0, file_size),
            }];
        }

        let mut fragments = Vec::new();
        for (start, end) in self.spans(&map, file_size, min_size) {
            self.emit(&map, path, start, end, &mut fragments);
        }
        fragments
    }

    /// Greedy span scan: each span reaches at least `min_size`, except that a
    /// tail shorter than `min_size` is folded into the preceding span, so the
    /// final span always ends at the end of the file.
    fn spans(&self, map: &BlockMap, file_size: u64, min_size: u64) -> Vec<(u64, u64)> {
        let mut spans = Vec::new();
        let mut span_start = 0u64;
        for block in map.blocks() {
            let span_end = block.end;
            if span_end - span_start < min_size {
                continue;
            }
            if file_size - span_end < min_size {
                break;
            }
            spans.push((span_start, span_end));
            span_start = span_end;
        }
        if span_start < file_size || spans.is_empty() {
            spans.push((span_start, file_size));
        }
        spans
    }

    fn emit(&self, map: &BlockMap, path: &str, start: u64, end: u64, out: &mut Vec<Fragment>) {
        let span_size = end - start;
        if !self.split_blocks || span_size == 0 {
            out.push(Fragment {
                path: path.to_string(),
                offset: start,
                size: span_size,
                hosts: map.fragment_hosts(start, end),
            });
            return;
        }
        #[allow(clippy::cast_sign_loss)]
        let pref = self.pref_size.max(1) as u64;
        let count = (span_size / pref).max(1);
        let piece = span_size.div_ceil(count);
        let mut offset = start;
        while offset < end {
            let size = piece.min(end - offset);
            out.push(Fragment {
                path: path.to_string(),
                offset,
                size,
                hosts: map.fragment_hosts(offset, offset + size),
            });
            offset += size;
        }
    }
}
