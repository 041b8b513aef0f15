//! Block-locality analysis for one file.
//!
//! A [`BlockMap`] normalizes the raw replica-location hints reported by the
//! namespace into a gapless, sorted block sequence covering exactly
//! `[0, file_size)`, and answers locality queries for byte ranges. Maps are
//! built per planning call and discarded; nothing here is persisted.

use harrow_core::namespace::BlockHint;

/// A range of bytes shorter than this share of a query is never worth
/// scheduling locally.
const MIN_LOCALITY: f64 = 0.125;

/// Hosts holding less than this share of the best host's overlap are pruned
/// from the locality answer.
const PRUNE_REL_LOCALITY: f64 = 0.75;

/// A contiguous byte range of a file with its known replica-holding hosts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    /// Inclusive start offset.
    pub start: u64,
    /// Exclusive end offset; always greater than `start`.
    pub end: u64,
    /// Hosts holding a replica, sorted and deduplicated. Empty for padding
    /// ranges with no known owner.
    pub hosts: Vec<String>,
}

impl Block {
    fn new(start: u64, end: u64, mut hosts: Vec<String>) -> Self {
        debug_assert!(end > start, "zero-length block");
        hosts.sort();
        hosts.dedup();
        Self { start, end, hosts }
    }

    /// Length of the intersection of this block with `[start, end)`.
    fn overlap(&self, start: u64, end: u64) -> u64 {
        let lo = self.start.max(start);
        let hi = self.end.min(end);
        hi.saturating_sub(lo)
    }
}

/// Normalized block sequence for one file.
///
/// Invariants after [`BlockMap::create`]: blocks are sorted by start,
/// contiguous, non-overlapping, and cover exactly `[0, file_size)`. With
/// `combine` enabled no two adjacent blocks have equal host sets.
#[derive(Debug, Clone)]
pub struct BlockMap {
    path: String,
    file_size: u64,
    blocks: Vec<Block>,
}

impl BlockMap {
    /// Builds a block map from raw replica-location hints.
    ///
    /// Hints may overlap, leave gaps, or run past the end of the file; the
    /// result is clipped and padded into a gapless cover. Where two hints
    /// claim the same start the one naming more hosts wins the range.
    #[must_use]
    pub fn create(path: &str, file_size: u64, hints: &[BlockHint], combine: bool) -> Self {
        let mut sorted: Vec<&BlockHint> = hints.iter().collect();
        sorted.sort_by(|a, b| {
            a.offset
                .cmp(&b.offset)
                .then_with(|| b.hosts.len().cmp(&a.hosts.len()))
        });

        let mut blocks: Vec<Block> = Vec::with_capacity(sorted.len());
        let mut last_offset = 0u64;
        for hint in sorted {
            if hint.offset >= file_size {
                continue;
            }
            let start = hint.offset.max(last_offset);
            if start > last_offset {
                // Gap with no reported owner.
                blocks.push(Block::new(last_offset, start, Vec::new()));
            }
            let end = hint.offset.saturating_add(hint.length).min(file_size);
            if end <= start {
                continue;
            }
            blocks.push(Block::new(start, end, hint.hosts.clone()));
            last_offset = end;
        }
        if file_size > 0 && (last_offset < file_size || blocks.is_empty()) {
            blocks.push(Block::new(last_offset, file_size, Vec::new()));
        }

        if combine {
            blocks = Self::combine_equal_neighbors(blocks);
        }

        Self {
            path: path.to_string(),
            file_size,
            blocks,
        }
    }

    fn combine_equal_neighbors(blocks: Vec<Block>) -> Vec<Block> {
        let mut merged: Vec<Block> = Vec::with_capacity(blocks.len());
        for block in blocks {
            match merged.last_mut() {
                Some(last) if last.hosts == block.hosts => {
                    last.end = block.end;
                }
                _ => merged.push(block),
            }
        }
        merged
    }

    /// The file this map describes.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Total file size covered by the map.
    #[must_use]
    pub fn file_size(&self) -> u64 {
        self.file_size
    }

    /// The normalized block sequence.
    #[must_use]
    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    /// Returns the hosts worth scheduling `[start, end)` on, best first.
    ///
    /// A host qualifies when it holds at least `MIN_LOCALITY` of the range
    /// and at least `PRUNE_REL_LOCALITY` of what the best host holds. Ties
    /// keep their first-seen order.
    #[must_use]
    pub fn fragment_hosts(&self, start: u64, end: u64) -> Vec<String> {
        if start >= end {
            return Vec::new();
        }
        let mut totals: Vec<(String, u64)> = Vec::new();
        for block in &self.blocks {
            let overlap = block.overlap(start, end);
            if overlap == 0 {
                continue;
            }
            for host in &block.hosts {
                match totals.iter_mut().find(|(h, _)| h == host) {
                    Some((_, total)) => *total += overlap,
                    None => totals.push((host.clone(), overlap)),
                }
            }
        }
        let Some(max) = totals.iter().map(|(_, total)| *total).max() else {
            return Vec::new();
        };
        #[allow(clippy::cast_precision_loss)]
        if (max as f64) < MIN_LOCALITY * ((end - start) as f64) {
            return Vec::new();
        }
        #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let threshold = (max as f64 * PRUNE_REL_LOCALITY).floor() as u64;
        totals.retain(|(_, total)| *total >= threshold);
        totals.sort_by(|a, b| b.1.cmp(&a.1));
        totals.into_iter().map(|(host, _)| host).collect()
    }
}

#[cfg(test)]
pub(crate) fn assert_gapless_cover(blocks: &[Block], file_size: u64) {
    if file_size == 0 {
        assert!(blocks.is_empty());
        return;
    }
    assert_eq!(blocks[0].start, 0);
    assert_eq!(blocks.last().unwrap().end, file_size);
    for pair in blocks.windows(2) {
        assert_eq!(pair[0].end, pair[1].start, "gap or overlap between blocks");
    }
    for block in blocks {
        assert!(block.end > block.start);
    }
}
