//! Fuzzy n-gram proposer.
//!
//! Like the exact proposer but tolerates near-matches: a candidate
//! occurrence qualifies when its Hamming distance to the search pattern is
//! at most `max_distance`. Candidates are ranked by following-run length,
//! then by lower distance; among fully tied candidates the first seen wins
//! (larger n first, then earlier position in the forward scan).

use crate::config::NgramConfig;
use crate::types::SpecDecodeError;

use super::{collect_following, DraftProposer, NgramMatch, NgramProposalResult};

/// N-gram proposer with bounded-Hamming-distance matching.
#[derive(Debug)]
pub struct FuzzyNgramProposer {
    config: NgramConfig,
    max_distance: usize,
}

impl FuzzyNgramProposer {
    pub fn new(config: NgramConfig, max_distance: usize) -> Result<Self, SpecDecodeError> {
        config.validate()?;
        Ok(Self {
            config,
            max_distance,
        })
    }

    pub fn max_distance(&self) -> usize {
        self.max_distance
    }

    /// Fuzzy matching loop. Exposed directly so the hybrid proposer can
    /// invoke it as a last resort without going through the trait.
    pub fn propose_fuzzy(
        &self,
        token_ids: &[u32],
        excluded_tokens: Option<&[u32]>,
    ) -> NgramProposalResult {
        // Same trailing window as the exact proposer, so the variants agree
        // on which history is searchable.
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

        let mut best: Option<(NgramMatch, usize)> = None;

        for n in (self.config.min_n..=self.config.max_n).rev() {
            if total < n + 2 {
                continue;
            }
            let pattern = &token_ids[total - 1 - n..total - 1];

            // Forward scan over every candidate start strictly before the
            // pattern itself.
            for start in 0..=total - n - 2 {
                let distance = hamming(&token_ids[start..start + n], pattern);
                if distance > self.max_distance {
                    continue;
                }
                let following = collect_following(token_ids, start + n, k, excluded_tokens);
                if following.is_empty() {
                    continue;
                }

                let replace = match &best {
                    Some((current, current_distance)) => {
                        following.len() > current.following_tokens.len()
                            || (following.len() == current.following_tokens.len()
                                && distance < *current_distance)
                    }
                    None => true,
                };
                if replace {
                    let score = 1.0 - distance as f32 / (self.max_distance as f32 + 1.0);
                    best = Some((
                        NgramMatch {
                            position: start,
                            length: n,
                            following_tokens: following,
                            score,
                        },
                        distance,
                    ));
                }
            }
        }

        match best {
            Some((m, _)) => {
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

impl DraftProposer for FuzzyNgramProposer {
    fn propose(&self, token_ids: &[u32], excluded_tokens: Option<&[u32]>)
        -> NgramProposalResult {
        self.propose_fuzzy(token_ids, excluded_tokens)
    }

    fn name(&self) -> &str {
        "fuzzy_ngram"
    }
}

fn hamming(a: &[u32], b: &[u32]) -> usize {
    debug_assert_eq!(a.len(), b.len());
    a.iter().zip(b).filter(|(x, y)| x != y).count()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn proposer(min_n: usize, max_n: usize, k: usize, max_distance: usize) -> FuzzyNgramProposer {
        FuzzyNgramProposer::new(
            NgramConfig {
                min_n,
                max_n,
                num_speculative_tokens: k,
                ..Default::default()
            },
            max_distance,
        )
        .expect("valid config")
    }

    #[test]
    fn exact_match_scores_one() {
        let tokens = [1u32, 2, 7, 8, 9, 1, 2, 3];
        let result = proposer(2, 2, 3, 1).propose(&tokens, None);
        // Pattern [1, 2] matches exactly at 0; following [7, 8, 9].
        assert_eq!(result.draft_tokens, vec![7, 8, 9]);
        let m = result.match_info.expect("match");
        assert_eq!(m.position, 0);
        assert!((m.score - 1.0).abs() < 1e-6);
    }

    #[test]
    fn accepts_near_match_within_distance() {
        // No exact occurrence of [1, 2], but [1, 9] at 0 is one substitution
        // away.
        let tokens = [1u32, 9, 7, 8, 1, 2, 3];
        let result = proposer(2, 2, 2, 1).propose(&tokens, None);
        assert_eq!(result.draft_tokens, vec![7, 8]);
        let m = result.match_info.expect("match");
        assert_eq!(m.position, 0);
        // distance 1 of max 1: score = 1 - 1/2
        assert!((m.score - 0.5).abs() < 1e-6);
    }

    #[test]
    fn rejects_match_beyond_distance() {
        let tokens = [8u32, 9, 7, 7, 1, 2, 3];
        let result = proposer(2, 2, 2, 1).propose(&tokens, None);
        // Every candidate window differs from [1, 2] in both positions.
        assert!(result.is_empty());
    }

    #[test]
    fn prefers_longer_following_over_lower_distance() {
        // The exact occurrence of [1, 1] at position 6 has only 2 following
        // tokens; the distance-1 candidate at position 0 has 3. Length wins.
        let tokens = [1u32, 9, 5, 6, 7, 2, 1, 1, 1, 4];
        let result = proposer(2, 2, 3, 1).propose(&tokens, None);
        assert_eq!(result.draft_tokens, vec![5, 6, 7]);
        assert_eq!(result.match_info.expect("match").position, 0);
    }

    #[test]
    fn ties_broken_by_lower_distance() {
        // Both candidates yield 1 following token (k=1); the exact match at
        // position 4 must win over the distance-1 match at position 0.
        let tokens = [1u32, 9, 5, 6, 1, 2, 7, 1, 2, 4];
        let result = proposer(2, 2, 1, 1).propose(&tokens, None);
        let m = result.match_info.expect("match");
        assert_eq!(m.position, 4);
        assert_eq!(result.draft_tokens, vec![7]);
    }

    #[test]
    fn candidates_outside_the_model_horizon_are_ignored() {
        let p = FuzzyNgramProposer::new(
            NgramConfig {
                min_n: 2,
                max_n: 2,
                num_speculative_tokens: 2,
                max_model_len: 8,
                ..Default::default()
            },
            1,
        )
        .expect("valid config");
        // The exact occurrence of [1, 2] at position 0 falls outside the
        // last 8 tokens; every window inside the horizon is distance 2 from
        // the pattern.
        let tokens = [1u32, 2, 9, 8, 7, 5, 5, 5, 5, 5, 1, 2, 3];
        assert!(p.propose(&tokens, None).is_empty());
    }

    #[test]
    fn short_context_returns_empty() {
        let result = proposer(2, 4, 3, 1).propose(&[5], None);
        assert!(result.is_empty());
        assert_eq!(result.confidence, 0.0);
    }

    #[test]
    fn proposer_name() {
        assert_eq!(proposer(1, 2, 3, 1).name(), "fuzzy_ngram");
    }
}
