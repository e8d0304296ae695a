//! Weighted n-gram proposer.
//!
//! Wraps the exact proposer and additionally keeps per-n-gram occurrence
//! statistics (count and last seen position). The base matching algorithm
//! does not consume the statistics; callers read them back via
//! [`stats_for`] to bias scheduling or tune speculation depth.
//!
//! [`stats_for`]: WeightedNgramProposer::stats_for

use std::collections::HashMap;
use std::sync::Mutex;

use crate::config::NgramConfig;
use crate::types::SpecDecodeError;

use super::{DraftProposer, NgramProposalResult, NgramProposer};

/// Occurrence statistics for one n-gram.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NgramStats {
    pub count: u64,
    pub last_position: usize,
}

/// Exact proposer with occurrence bookkeeping.
#[derive(Debug)]
pub struct WeightedNgramProposer {
    inner: NgramProposer,
    stats: Mutex<HashMap<Vec<u32>, NgramStats>>,
}

impl WeightedNgramProposer {
    pub fn new(config: NgramConfig) -> Result<Self, SpecDecodeError> {
        Ok(Self {
            inner: NgramProposer::new(config)?,
            stats: Mutex::new(HashMap::new()),
        })
    }

    /// Record an occurrence of `ngram` at `position`.
    pub fn update_stats(&self, ngram: &[u32], position: usize) {
        if let Ok(mut stats) = self.stats.lock() {
            stats
                .entry(ngram.to_vec())
                .and_modify(|s| {
                    s.count += 1;
                    s.last_position = position;
                })
                .or_insert(NgramStats {
                    count: 1,
                    last_position: position,
                });
        }
    }

    /// Statistics recorded for `ngram`, if any.
    pub fn stats_for(&self, ngram: &[u32]) -> Option<NgramStats> {
        match self.stats.lock() {
            Ok(stats) => stats.get(ngram).copied(),
            Err(_) => None,
        }
    }
}

impl DraftProposer for WeightedNgramProposer {
    fn propose(&self, token_ids: &[u32], excluded_tokens: Option<&[u32]>)
        -> NgramProposalResult {
        let result = self.inner.propose_exact(token_ids, excluded_tokens);
        if let Some(m) = &result.match_info {
            // Match positions are relative to the horizon window the exact
            // proposer scanned; stats are keyed by absolute position.
            let horizon = self.inner.config().max_model_len;
            let base = token_ids.len() - token_ids.len().min(horizon);
            let position = base + m.position;
            self.update_stats(&token_ids[position..position + m.length], position);
        }
        result
    }

    fn name(&self) -> &str {
        "weighted_ngram"
    }
}
