//! Token-by-token verification.
//!
//! For callers that interleave drafting and scoring instead of building
//! batched metadata. Rejection is sticky: once a token is refused, every
//! later token is refused without a draw, preserving the same sequential
//! truncation the batched verifier applies within a request window.

use rand::rngs::StdRng;
use rand::SeedableRng;

use super::{acceptance_probability, accepts, AcceptancePolicy};

/// Incremental single-draft verifier.
#[derive(Debug)]
pub struct StreamingVerifier {
    policy: AcceptancePolicy,
    rng: StdRng,
    accepted: Vec<u32>,
    num_seen: usize,
    rejected: bool,
}

impl StreamingVerifier {
    pub fn new(policy: AcceptancePolicy) -> Self {
        Self {
            policy,
            rng: StdRng::from_entropy(),
            accepted: Vec::new(),
            num_seen: 0,
            rejected: false,
        }
    }

    /// Seeded constructor for reproducible streams.
    pub fn with_seed(policy: AcceptancePolicy, seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            ..Self::new(policy)
        }
    }

    /// Apply the single-token acceptance test. Returns whether the token
    /// was accepted; after the first rejection everything is refused.
    pub fn add_token(&mut self, token: u32, draft_logprob: f32, target_logprob: f32) -> bool {
        self.num_seen += 1;
        if self.rejected {
            return false;
        }
        let p = acceptance_probability(self.policy, draft_logprob, target_logprob);
        if accepts(&mut self.rng, p) {
            self.accepted.push(token);
            true
        } else {
            self.rejected = true;
            false
        }
    }

    /// Tokens accepted so far, in order.
    pub fn accepted_tokens(&self) -> &[u32] {
        &self.accepted
    }

    /// Tokens observed so far, accepted or not.
    pub fn num_seen(&self) -> usize {
        self.num_seen
    }

    /// Whether the stream has hit its first rejection.
    pub fn is_rejected(&self) -> bool {
        self.rejected
    }

    /// Clear accepted tokens and the rejection latch for reuse. The RNG
    /// state carries over.
    pub fn reset(&mut self) {
        self.accepted.clear();
        self.num_seen = 0;
        self.rejected = false;
    }
}
