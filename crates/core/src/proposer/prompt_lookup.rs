//! Prompt-lookup proposer.
//!
//! Searches only the original prompt for a suffix of the already-generated
//! tokens and proposes what followed the match in the prompt. Zero draft
//! cost and very effective when outputs quote their input (summarization,
//! JSON with known keys, code completion). Requires the prompt boundary, so
//! the plain `propose` entry point always returns an empty result.

use crate::config::NgramConfig;
use crate::types::SpecDecodeError;

use super::scan::ScanBackend;
use super::{collect_following, DraftProposer, NgramMatch, NgramProposalResult};

/// Proposer that matches generated suffixes against the prompt.
#[derive(Debug)]
pub struct PromptLookupProposer {
    config: NgramConfig,
    scan: ScanBackend,
}

impl PromptLookupProposer {
    pub fn new(config: NgramConfig) -> Result<Self, SpecDecodeError> {
        config.validate()?;
        Ok(Self {
            config,
            scan: ScanBackend::select(),
        })
    }
}

impl DraftProposer for PromptLookupProposer {
    fn propose(&self, _token_ids: &[u32], _excluded_tokens: Option<&[u32]>)
        -> NgramProposalResult {
        // No prompt boundary, nothing to search.
        NgramProposalResult::empty()
    }

    fn propose_with_prompt(
        &self,
        token_ids: &[u32],
        prompt_len: usize,
        excluded_tokens: Option<&[u32]>,
    ) -> NgramProposalResult {
        let k = self.config.num_speculative_tokens;
        if prompt_len == 0 || prompt_len >= token_ids.len() {
            return NgramProposalResult::empty();
        }
        let prompt = &token_ids[..prompt_len];
        let generated = &token_ids[prompt_len..];

        for n in (self.config.min_n..=self.config.max_n).rev() {
            if generated.len() < n || prompt_len < n + 1 {
                continue;
            }
            let suffix = &generated[generated.len() - n..];

            // Only occurrences with at least one following token inside the
            // prompt are useful, so the scan window drops the prompt's last
            // position.
            let Some(position) = self.scan.find_last(&prompt[..prompt_len - 1], suffix) else {
                continue;
            };
            let following = collect_following(prompt, position + n, k, excluded_tokens);
            if following.is_empty() {
                continue;
            }

            // First match wins; no recency scoring within the prompt.
            let confidence = following.len() as f32 / k as f32;
            return NgramProposalResult {
                draft_tokens: following.clone(),
                match_info: Some(NgramMatch {
                    position,
                    length: n,
                    following_tokens: following,
                    score: 1.0,
                }),
                confidence,
            };
        }

        NgramProposalResult::empty()
    }

    fn name(&self) -> &str {
        "prompt_lookup"
    }
}
