//! Position index over recently seen n-grams.
//!
//! Maps an n-gram to the ordered list of context positions where it has
//! occurred. One cache is owned per proposer instance; the proposer wraps it
//! in a `Mutex` because proposals for different requests may run
//! concurrently. Positions are only ever appended, so an n-gram's earlier
//! positions never change and repeated proposals on a fixed context are
//! deterministic.

use std::collections::HashMap;

/// On eviction, surviving position lists keep only this many most recent
/// entries.
const TRIMMED_POSITIONS: usize = 10;

/// Position-indexed store of recently seen n-grams.
#[derive(Debug)]
pub struct NgramCache {
    entries: HashMap<Vec<u32>, Vec<usize>>,
    capacity: usize,
}

impl NgramCache {
    /// Create a cache that holds up to `capacity` distinct n-grams before
    /// eviction kicks in.
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: HashMap::new(),
            capacity,
        }
    }

    /// Record an occurrence of `ngram` starting at `position`.
    ///
    /// Re-adding the position already at the tail of the list is a no-op,
    /// so proposing repeatedly on an unchanged context does not grow the
    /// cache.
    pub fn add(&mut self, ngram: &[u32], position: usize) {
        if let Some(positions) = self.entries.get_mut(ngram) {
            if positions.last() != Some(&position) {
                positions.push(position);
            }
            return;
        }
        self.entries.insert(ngram.to_vec(), vec![position]);
        if self.entries.len() > self.capacity {
            self.evict();
        }
    }

    /// Positions where `ngram` has been seen, oldest first.
    pub fn lookup(&self, ngram: &[u32]) -> Option<&[usize]> {
        self.entries.get(ngram).map(|v| v.as_slice())
    }

    /// Number of distinct n-grams currently stored.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop all entries.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Shrink the cache once it exceeds capacity. Singly-seen n-grams go
    /// first; the survivors keep only their most recent positions.
    fn evict(&mut self) {
        self.entries.retain(|_, positions| positions.len() > 1);
        for positions in self.entries.values_mut() {
            if positions.len() > TRIMMED_POSITIONS {
                let cut = positions.len() - TRIMMED_POSITIONS;
                positions.drain(..cut);
            }
        }
    }
}
