//! Hybrid proposer.
//!
//! Composes the other variants and tries them in order of precision: exact
//! n-gram match first, then prompt lookup when a prompt boundary is known,
//! then (optionally) fuzzy matching as a last resort. The first non-empty
//! result wins.

use crate::config::NgramConfig;
use crate::types::SpecDecodeError;

use super::{
    DraftProposer, FuzzyNgramProposer, NgramProposalResult, NgramProposer, PromptLookupProposer,
};

/// Exact-then-prompt-lookup-then-fuzzy composition.
#[derive(Debug)]
pub struct HybridNgramProposer {
    exact: NgramProposer,
    prompt_lookup: PromptLookupProposer,
    fuzzy: Option<FuzzyNgramProposer>,
}

impl HybridNgramProposer {
    /// Hybrid of exact matching and prompt lookup.
    pub fn new(config: NgramConfig) -> Result<Self, SpecDecodeError> {
        Ok(Self {
            exact: NgramProposer::new(config.clone())?,
            prompt_lookup: PromptLookupProposer::new(config)?,
            fuzzy: None,
        })
    }

    /// Hybrid that additionally falls back to fuzzy matching.
    pub fn with_fuzzy(config: NgramConfig, max_distance: usize) -> Result<Self, SpecDecodeError> {
        Ok(Self {
            exact: NgramProposer::new(config.clone())?,
            prompt_lookup: PromptLookupProposer::new(config.clone())?,
            fuzzy: Some(FuzzyNgramProposer::new(config, max_distance)?),
        })
    }
}

impl DraftProposer for HybridNgramProposer {
    fn propose(&self, token_ids: &[u32], excluded_tokens: Option<&[u32]>)
        -> NgramProposalResult {
        let exact = self.exact.propose_exact(token_ids, excluded_tokens);
        if !exact.is_empty() {
            return exact;
        }
        if let Some(fuzzy) = &self.fuzzy {
            return fuzzy.propose_fuzzy(token_ids, excluded_tokens);
        }
        NgramProposalResult::empty()
    }

    fn propose_with_prompt(
        &self,
        token_ids: &[u32],
        prompt_len: usize,
        excluded_tokens: Option<&[u32]>,
    ) -> NgramProposalResult {
        let exact = self.exact.propose_exact(token_ids, excluded_tokens);
        if !exact.is_empty() {
            return exact;
        }
        let lookup =
            self.prompt_lookup
                .propose_with_prompt(token_ids, prompt_len, excluded_tokens);
        if !lookup.is_empty() {
            return lookup;
        }
        if let Some(fuzzy) = &self.fuzzy {
            return fuzzy.propose_fuzzy(token_ids, excluded_tokens);
        }
        NgramProposalResult::empty()
    }

    fn name(&self) -> &str {
        "hybrid_ngram"
    }
}
