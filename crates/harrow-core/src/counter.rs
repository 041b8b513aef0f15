//! Operation counters threaded through output commits.
//!
//! A [`Counter`] is an explicit accumulator handle: the caller constructs it,
//! passes clones into the operations it wants measured, and reads the total
//! afterwards. Operations increment it only at defined points (one tick per
//! file relocated, per marker written), never speculatively.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// A shareable, monotonically increasing operation counter.
///
/// Cloning is cheap and all clones observe the same total, which lets the
/// parallel phases of a bulk move report into one handle.
#[derive(Debug, Clone, Default)]
pub struct Counter {
    value: Arc<AtomicU64>,
}

impl Counter {
    /// Creates a counter starting at zero.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `n` to the counter.
    pub fn add(&self, n: u64) {
        self.value.fetch_add(n, Ordering::Relaxed);
    }

    /// Returns the current total.
    #[must_use]
    pub fn get(&self) -> u64 {
        self.value.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_one_total() {
        let counter = Counter::new();
        let other = counter.clone();
        counter.add(2);
        other.add(3);
        assert_eq!(counter.get(), 5);
        assert_eq!(other.get(), 5);
    }
}
