//! Exact n-gram draft proposer.
//!
//! For each n from `max_n` down to `min_n`, takes the n-gram ending at the
//! penultimate position of the context as the search pattern, scans the
//! preceding context backward for its most recent earlier occurrence, and
//! reads the tokens that followed that occurrence as the draft. Among all
//! tried n, the match with the most following tokens wins; ties keep the
//! larger n, which was tried first.
//!
//! A pure CPU operation requiring no model weights and no VRAM.

use std::sync::Mutex;

use crate::cache::NgramCache;
use crate::config::NgramConfig;
use crate::types::SpecDecodeError;

use super::scan::ScanBackend;
use super::{collect_following, recency_score, DraftProposer, NgramMatch, NgramProposalResult};

/// Exact-match n-gram proposer.
#[derive(Debug)]
pub struct NgramProposer {
    config: NgramConfig,
    cache: Mutex<NgramCache>,
    scan: ScanBackend,
}

impl NgramProposer {
    /// Create a proposer, validating the configuration up front.
    pub fn new(config: NgramConfig) -> Result<Self, SpecDecodeError> {
        config.validate()?;
        let cache = NgramCache::new(config.max_num_seqs * config.max_n);
        Ok(Self {
            config,
            cache: Mutex::new(cache),
            scan: ScanBackend::select(),
        })
    }

    /// Create a proposer with default configuration.
    pub fn with_defaults() -> Self {
        match Self::new(NgramConfig::default()) {
            Ok(proposer) => proposer,
            // Default config is statically valid.
            Err(_) => unreachable!("default NgramConfig must validate"),
        }
    }

    pub fn config(&self) -> &NgramConfig {
        &self.config
    }

    /// Number of distinct n-grams currently cached.
    pub fn cache_len(&self) -> usize {
        match self.cache.lock() {
            Ok(cache) => cache.len(),
            Err(_) => 0,
        }
    }

    /// Core matching loop shared with the variants that wrap this proposer.
    pub(crate) fn propose_exact(
        &self,
        token_ids: &[u32],
        excluded_tokens: Option<&[u32]>,
    ) -> NgramProposalResult {
        // Contexts beyond the model horizon scan only their most recent
        // max_model_len tokens; match positions are relative to that window.
        let token_ids = if token_ids.len() > self.config.max_model_len {
            &token_ids[token_ids.len() - self.config.max_model_len..]
        } else {
            token_ids
        };
        let total = token_ids.len();
        let k = self.config.num_speculative_tokens;
        if total < self.config.min_n {
            return NgramProposalResult::empty();
        }

        let mut best: Option<NgramMatch> = None;

        for n in (self.config.min_n..=self.config.max_n).rev() {
            // Pattern is the n-gram ending at the penultimate position; the
            // final token is what the draft must continue past.
            if total < n + 1 {
                continue;
            }
            let pattern_start = total - 1 - n;
            let pattern = &token_ids[pattern_start..total - 1];

            if let Ok(mut cache) = self.cache.lock() {
                cache.add(pattern, pattern_start);
            }

            // A candidate occurrence must start strictly before the pattern
            // itself, so it is fully contained in token_ids[..total - 2].
            if total < n + 2 {
                continue;
            }
            let Some(position) = self.scan.find_last(&token_ids[..total - 2], pattern) else {
                continue;
            };

            let following = collect_following(token_ids, position + n, k, excluded_tokens);
            if following.is_empty() {
                continue;
            }

            let replace = match &best {
                Some(current) => following.len() > current.following_tokens.len(),
                None => true,
            };
            if replace {
                best = Some(NgramMatch {
                    position,
                    length: n,
                    following_tokens: following,
                    score: recency_score(position, total),
                });
            }
        }

        match best {
            Some(m) => {
                let confidence = m.score * m.following_tokens.len() as f32 / k as f32;
                NgramProposalResult {
                    draft_tokens: m.following_tokens.clone(),
                    match_info: Some(m),
                    confidence,
                }
            }
            None => NgramProposalResult::empty(),
        }
    }
}

impl DraftProposer for NgramProposer {
    fn propose(&self, token_ids: &[u32], excluded_tokens: Option<&[u32]>)
        -> NgramProposalResult {
        self.propose_exact(token_ids, excluded_tokens)
    }

    fn name(&self) -> &str {
        "ngram"
    }
}
