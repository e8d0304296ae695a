//! Batched draft metadata.
//!
//! One `SpecDecodeMetadata` is built per scheduling step from the per-request
//! proposer outputs, handed to the model-execution layer to gather logits,
//! consumed once by the verifier, and then discarded.
//!
//! ## Logits layout
//!
//! The target model produces one logits row per sampled position. Request
//! `i` owns the contiguous row range
//! `[cu_num_sampled_tokens[i-1], cu_num_sampled_tokens[i])`: one row per
//! draft token for verification, then one bonus row used to sample a fresh
//! token after the last accepted draft. The bonus row guarantees forward
//! progress even when every draft is rejected.

use std::ops::Range;
use std::time::{Duration, Instant};

/// Flattened per-step draft batch with derived index tables.
#[derive(Debug, Clone)]
pub struct SpecDecodeMetadata {
    /// All requests' draft tokens, concatenated.
    pub draft_token_ids: Vec<u32>,
    /// Per-request draft counts; `num_draft_tokens.len()` is the batch size.
    pub num_draft_tokens: Vec<usize>,
    /// Largest per-request draft count in the batch.
    pub max_spec_len: usize,
    /// Prefix sums of `num_draft_tokens`.
    pub cu_num_draft_tokens: Vec<usize>,
    /// `cu_num_draft_tokens[i] + (i + 1)`: prefix sums including one bonus
    /// slot per request.
    pub cu_num_sampled_tokens: Vec<usize>,
    /// Logits row for each draft token, in flattened draft order.
    pub target_logits_indices: Vec<usize>,
    /// Logits row for each request's bonus token.
    pub bonus_logits_indices: Vec<usize>,
    /// Every logits row the target model must produce this step
    /// (draft rows plus bonus rows, `draft_token_ids.len() + batch` total).
    pub logits_indices: Vec<usize>,
    /// Per-draft-token acceptance, written back by the verifier.
    pub accepted_mask: Vec<bool>,
    /// Total accepted tokens, written back by the verifier.
    pub acceptance_count: usize,
    pub verification_start_time: Option<Instant>,
    pub verification_end_time: Option<Instant>,
}

impl SpecDecodeMetadata {
    /// Build metadata from per-request draft token lists.
    pub fn from_proposals(proposals: &[Vec<u32>]) -> Self {
        let num_draft_tokens: Vec<usize> = proposals.iter().map(Vec::len).collect();
        let draft_token_ids: Vec<u32> = proposals.iter().flatten().copied().collect();
        let mut metadata = Self {
            draft_token_ids,
            num_draft_tokens,
            max_spec_len: 0,
            cu_num_draft_tokens: Vec::new(),
            cu_num_sampled_tokens: Vec::new(),
            target_logits_indices: Vec::new(),
            bonus_logits_indices: Vec::new(),
            logits_indices: Vec::new(),
            accepted_mask: Vec::new(),
            acceptance_count: 0,
            verification_start_time: None,
            verification_end_time: None,
        };
        metadata.rebuild_indices();
        metadata
    }

    /// Placeholder metadata for warmup and benchmarking: every draft token
    /// id is zero but the index tables are fully realistic.
    pub fn make_dummy(num_draft_tokens: &[usize]) -> Self {
        let proposals: Vec<Vec<u32>> = num_draft_tokens.iter().map(|&n| vec![0; n]).collect();
        Self::from_proposals(&proposals)
    }

    /// Recompute every derived array from `num_draft_tokens` so they can
    /// never be stale.
    pub fn rebuild_indices(&mut self) {
        let batch = self.num_draft_tokens.len();
        self.max_spec_len = self.num_draft_tokens.iter().copied().max().unwrap_or(0);

        self.cu_num_draft_tokens = Vec::with_capacity(batch);
        self.cu_num_sampled_tokens = Vec::with_capacity(batch);
        let mut cu_drafts = 0usize;
        for (i, &n) in self.num_draft_tokens.iter().enumerate() {
            cu_drafts += n;
            self.cu_num_draft_tokens.push(cu_drafts);
            self.cu_num_sampled_tokens.push(cu_drafts + i + 1);
        }

        let total_drafts = cu_drafts;
        self.target_logits_indices = Vec::with_capacity(total_drafts);
        self.bonus_logits_indices = Vec::with_capacity(batch);
        self.logits_indices = Vec::with_capacity(total_drafts + batch);
        let mut row = 0usize;
        for &n in &self.num_draft_tokens {
            for _ in 0..n {
                self.target_logits_indices.push(row);
                self.logits_indices.push(row);
                row += 1;
            }
            // The bonus row sits right after the request's draft rows.
            self.bonus_logits_indices.push(row);
            self.logits_indices.push(row);
            row += 1;
        }

        debug_assert_eq!(self.target_logits_indices.len(), self.draft_token_ids.len());
        debug_assert_eq!(
            self.logits_indices.len(),
            self.draft_token_ids.len() + batch
        );
    }

    /// Number of requests in the batch.
    pub fn num_requests(&self) -> usize {
        self.num_draft_tokens.len()
    }

    /// Total draft tokens across the batch.
    pub fn total_draft_tokens(&self) -> usize {
        self.draft_token_ids.len()
    }

    /// Range of flattened draft indices owned by request `i`.
    pub fn request_window(&self, i: usize) -> Range<usize> {
        let start = if i == 0 {
            0
        } else {
            self.cu_num_draft_tokens[i - 1]
        };
        start..self.cu_num_draft_tokens[i]
    }

    /// Write the verifier's outcome back onto the batch.
    pub fn record_acceptance(
        &mut self,
        accepted_mask: Vec<bool>,
        acceptance_count: usize,
        started: Instant,
        finished: Instant,
    ) {
        self.accepted_mask = accepted_mask;
        self.acceptance_count = acceptance_count;
        self.verification_start_time = Some(started);
        self.verification_end_time = Some(finished);
    }

    /// Wall-clock time verification took, once recorded.
    pub fn verification_latency(&self) -> Option<Duration> {
        match (self.verification_start_time, self.verification_end_time) {
            (Some(start), Some(end)) => Some(end.duration_since(start)),
            _ => None,
        }
    }
}
