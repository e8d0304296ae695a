//! Draft token proposers.
//!
//! A proposer guesses a short continuation of the token history without any
//! model forward pass. The exact n-gram proposer is the workhorse; fuzzy,
//! prompt-lookup, weighted, and hybrid variants cover contexts where exact
//! repetition is rare. All variants implement [`DraftProposer`] so callers
//! and the hybrid composer can treat them uniformly.

mod batch;
mod fuzzy;
mod hybrid;
mod ngram;
mod prompt_lookup;
mod scan;
mod weighted;

pub use batch::batch_propose;
pub use fuzzy::FuzzyNgramProposer;
pub use hybrid::HybridNgramProposer;
pub use ngram::NgramProposer;
pub use prompt_lookup::PromptLookupProposer;
pub use scan::ScanBackend;
pub use weighted::{NgramStats, WeightedNgramProposer};

/// A single n-gram occurrence found in the context.
#[derive(Debug, Clone, PartialEq)]
pub struct NgramMatch {
    /// Index in the context where the matched n-gram starts.
    pub position: usize,
    /// Length of the matched n-gram.
    pub length: usize,
    /// Up to K tokens that followed the match.
    pub following_tokens: Vec<u32>,
    /// Recency weight in `[0, 1]`; matches near the end of context score
    /// higher.
    pub score: f32,
}

/// Outcome of one proposal call.
#[derive(Debug, Clone, PartialEq)]
pub struct NgramProposalResult {
    /// Proposed continuation, at most K tokens. Empty when nothing matched.
    pub draft_tokens: Vec<u32>,
    /// The match the drafts were read from, if any.
    pub match_info: Option<NgramMatch>,
    /// `match.score * len(draft_tokens) / K`; 0.0 when nothing matched.
    pub confidence: f32,
}

impl NgramProposalResult {
    /// A zero-confidence result with no drafts. Short or unmatched contexts
    /// return this rather than an error.
    pub fn empty() -> Self {
        Self {
            draft_tokens: Vec::new(),
            match_info: None,
            confidence: 0.0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.draft_tokens.is_empty()
    }
}

/// Interface shared by every proposer variant.
///
/// `Send + Sync` so one proposer can serve concurrent requests and be used
/// behind a trait object from the batch fan-out.
pub trait DraftProposer: Send + Sync {
    /// Propose draft tokens from the token history. Tokens listed in
    /// `excluded_tokens` cut the draft short at their first occurrence.
    fn propose(&self, token_ids: &[u32], excluded_tokens: Option<&[u32]>)
        -> NgramProposalResult;

    /// Propose with a known prompt boundary (`token_ids[..prompt_len]` is
    /// the original prompt). Variants that do not distinguish prompt from
    /// generation ignore the boundary.
    fn propose_with_prompt(
        &self,
        token_ids: &[u32],
        prompt_len: usize,
        excluded_tokens: Option<&[u32]>,
    ) -> NgramProposalResult {
        let _ = prompt_len;
        self.propose(token_ids, excluded_tokens)
    }

    /// Short identifier for logs and diagnostics.
    fn name(&self) -> &str;
}

/// Linear recency decay: a match right at the end of the context scores
/// 1.0, the earliest possible match approaches 0.5. An empty context is the
/// degenerate case and scores 1.0.
pub(crate) fn recency_score(position: usize, context_len: usize) -> f32 {
    if context_len == 0 {
        return 1.0;
    }
    0.5 + 0.5 * (position as f32 + 1.0) / context_len as f32
}

/// Read up to `k` tokens starting at `start`, stopping at the first token
/// present in `excluded`. Drafts must stay contiguous with the matched
/// continuation, so an excluded token truncates rather than being skipped.
pub(crate) fn collect_following(
    token_ids: &[u32],
    start: usize,
    k: usize,
    excluded: Option<&[u32]>,
) -> Vec<u32> {
    let end = (start + k).min(token_ids.len());
    let mut following = Vec::with_capacity(end.saturating_sub(start));
    for &token in &token_ids[start.min(token_ids.len())..end] {
        if excluded.is_some_and(|ex| ex.contains(&token)) {
            break;
        }
        following.push(token);
    }
    following
}

#[cfg(test)]
mod tests {
    use super::*;

    // ─── Recency scoring ───────────────────────────────────────────────────

    #[test]
    fn recency_score_at_end_is_one() {
        assert!((recency_score(9, 10) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn recency_score_at_start_is_near_half() {
        assert!((recency_score(0, 10) - 0.55).abs() < 1e-6);
    }

    #[test]
    fn recency_score_empty_context_is_one() {
        assert!((recency_score(0, 0) - 1.0).abs() < 1e-6);
    }

    // ─── Following-token collection ────────────────────────────────────────

    #[test]
    fn collect_following_respects_k() {
        let tokens = [1u32, 2, 3, 4, 5];
        assert_eq!(collect_following(&tokens, 1, 2, None), vec![2, 3]);
    }

    #[test]
    fn collect_following_stops_at_sequence_end() {
        let tokens = [1u32, 2, 3];
        assert_eq!(collect_following(&tokens, 2, 5, None), vec![3]);
        assert!(collect_following(&tokens, 3, 5, None).is_empty());
    }

    #[test]
    fn collect_following_truncates_at_excluded() {
        let tokens = [1u32, 2, 3, 4, 5];
        assert_eq!(
            collect_following(&tokens, 0, 5, Some(&[3])),
            vec![1, 2]
        );
    }

    #[test]
    fn collect_following_excluded_first_token_yields_empty() {
        let tokens = [9u32, 1, 2];
        assert!(collect_following(&tokens, 0, 3, Some(&[9])).is_empty());
    }

    // ─── Trait object safety ───────────────────────────────────────────────

    #[test]
    fn proposers_are_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<NgramProposer>();
        assert_send_sync::<FuzzyNgramProposer>();
        assert_send_sync::<PromptLookupProposer>();
        assert_send_sync::<WeightedNgramProposer>();
        assert_send_sync::<HybridNgramProposer>();
    }

    #[test]
    fn proposer_works_as_trait_object() {
        let proposer: Box<dyn DraftProposer> =
            Box::new(NgramProposer::with_defaults());
        let result = proposer.propose(&[1, 2, 3, 1, 2, 3], None);
        assert!(!result.is_empty());
    }
}
