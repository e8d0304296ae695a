//! Draft verification against the target model's distribution.
//!
//! Rejection sampling processes each request's draft strictly left to
//! right: token `i` is accepted with probability
//! `exp(min(0, target_logprob - draft_logprob))`, and the first rejection
//! marks the rest of the window rejected without further draws. This
//! sequential truncation is what makes the accepted prefix's distribution
//! equal to sampling from the target model alone.
//!
//! Rejected positions are NOT resampled here. True speculative sampling
//! draws the replacement token from the residual target distribution; that
//! needs the full logits row and is the caller's responsibility, using the
//! bonus row indices the metadata provides.

mod batch;
mod streaming;

pub use batch::{BatchVerifier, VerificationRequest};
pub use streaming::StreamingVerifier;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::metadata::SpecDecodeMetadata;
use crate::tree::TreeVerificationMetadata;
use crate::types::SpecDecodeError;

/// How a draft token's acceptance probability is computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AcceptancePolicy {
    /// `exp(min(0, target - draft))`. Distribution-preserving.
    #[default]
    RejectionSampling,
    /// The rejection-sampling ratio scaled by `max(0.1, 1 + target)` and
    /// clamped to `[0, 1]`. Accepts more plausible-but-not-argmax tokens at
    /// the cost of exact distribution matching.
    TypicalAcceptance,
    /// Deterministic limit of rejection sampling: accept iff the target
    /// assigns at least the draft's log-probability. No RNG draw.
    Exact,
}

/// Outcome of verifying one draft (or one tree path).
#[derive(Debug, Clone)]
pub struct VerificationResult {
    /// The accepted tokens, in draft order.
    pub accepted_tokens: Vec<u32>,
    pub num_accepted: usize,
    /// Per-draft-token acceptance, same length as the input drafts.
    pub acceptance_mask: Vec<bool>,
    pub target_logprobs: Vec<f32>,
    pub draft_logprobs: Vec<f32>,
    pub verification_latency: Duration,
}

impl VerificationResult {
    /// True when every draft token was accepted. Vacuously true for an
    /// empty draft.
    pub fn all_accepted(&self) -> bool {
        self.acceptance_mask.iter().all(|&accepted| accepted)
    }

    /// Fraction of draft tokens accepted; 0.0 for an empty draft.
    pub fn acceptance_rate(&self) -> f32 {
        if self.acceptance_mask.is_empty() {
            return 0.0;
        }
        self.num_accepted as f32 / self.acceptance_mask.len() as f32
    }
}

/// Serializable snapshot of a verifier's running statistics.
#[derive(Debug, Clone, Serialize)]
pub struct SpecDecodeStats {
    pub total_proposed: u64,
    pub total_accepted: u64,
    pub acceptance_rate: f64,
    /// `accepted_len_hist[n]` counts request windows that accepted exactly
    /// `n` tokens. Useful for tuning the speculation depth K.
    pub accepted_len_hist: Vec<u64>,
}

#[derive(Debug, Default)]
struct AcceptanceCounters {
    total_proposed: u64,
    total_accepted: u64,
    accepted_len_hist: Vec<u64>,
}

impl AcceptanceCounters {
    fn observe_window(&mut self, proposed: usize, accepted: usize) {
        self.total_proposed += proposed as u64;
        self.total_accepted += accepted as u64;
        if self.accepted_len_hist.len() <= accepted {
            self.accepted_len_hist.resize(accepted + 1, 0);
        }
        self.accepted_len_hist[accepted] += 1;
    }
}

/// Decides which prefix of each draft to keep.
///
/// Statistics are scoped to the instance; constructing a new verifier
/// resets them. Safe to share across threads: the counters sit behind a
/// mutex and every `verify` call derives its own private RNG, so the lock
/// is never held across a randomized draw.
#[derive(Debug)]
pub struct SpecDecodeVerifier {
    policy: AcceptancePolicy,
    counters: Mutex<AcceptanceCounters>,
    seed: Option<u64>,
    next_stream: AtomicU64,
}

impl Default for SpecDecodeVerifier {
    fn default() -> Self {
        Self::new()
    }
}

impl SpecDecodeVerifier {
    /// Rejection-sampling verifier with entropy-based randomness.
    pub fn new() -> Self {
        Self::with_policy(AcceptancePolicy::RejectionSampling)
    }

    pub fn with_policy(policy: AcceptancePolicy) -> Self {
        Self {
            policy,
            counters: Mutex::new(AcceptanceCounters::default()),
            seed: None,
            next_stream: AtomicU64::new(0),
        }
    }

    /// Fix the RNG seed for reproducible verification. Each `verify` call
    /// consumes one derived stream, so a seeded verifier replays the same
    /// sequence of decisions call by call.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn policy(&self) -> AcceptancePolicy {
        self.policy
    }

    /// Verify a batched draft against aligned log-probability arrays.
    ///
    /// `draft_logprobs[i]` and `target_logprobs[i]` describe
    /// `metadata.draft_token_ids[i]`. Each request's window is evaluated
    /// independently; windows never influence each other.
    pub fn verify(
        &self,
        metadata: &mut SpecDecodeMetadata,
        draft_logprobs: &[f32],
        target_logprobs: &[f32],
    ) -> Result<VerificationResult, SpecDecodeError> {
        let started = Instant::now();
        let expected = metadata.draft_token_ids.len();
        check_len("draft_logprobs", expected, draft_logprobs.len())?;
        check_len("target_logprobs", expected, target_logprobs.len())?;

        let mut rng = self.derive_rng();
        let mut mask = vec![false; expected];
        let mut window_outcomes = Vec::with_capacity(metadata.num_requests());

        for request in 0..metadata.num_requests() {
            let window = metadata.request_window(request);
            let mut accepted_in_window = 0usize;
            for i in window.clone() {
                let p = acceptance_probability(self.policy, draft_logprobs[i], target_logprobs[i]);
                if !accepts(&mut rng, p) {
                    break;
                }
                mask[i] = true;
                accepted_in_window += 1;
            }
            window_outcomes.push((window.len(), accepted_in_window));
        }

        let accepted_tokens: Vec<u32> = metadata
            .draft_token_ids
            .iter()
            .zip(&mask)
            .filter_map(|(&token, &accepted)| accepted.then_some(token))
            .collect();
        let num_accepted = accepted_tokens.len();

        if let Ok(mut counters) = self.counters.lock() {
            for (proposed, accepted) in &window_outcomes {
                counters.observe_window(*proposed, *accepted);
            }
        }

        let finished = Instant::now();
        metadata.record_acceptance(mask.clone(), num_accepted, started, finished);

        Ok(VerificationResult {
            accepted_tokens,
            num_accepted,
            acceptance_mask: mask,
            target_logprobs: target_logprobs.to_vec(),
            draft_logprobs: draft_logprobs.to_vec(),
            verification_latency: finished.duration_since(started),
        })
    }

    /// Verify every path of a speculation tree and keep the best one.
    ///
    /// Paths are evaluated independently with the active policy; the path
    /// accepting the most tokens wins and ties keep the lowest path index.
    /// Only the winning path's tokens enter the running statistics, since
    /// those are the drafts the step actually consumes.
    pub fn verify_tree(
        &self,
        tree: &mut TreeVerificationMetadata,
        draft_logprobs: &[f32],
        target_logprobs: &[f32],
    ) -> Result<VerificationResult, SpecDecodeError> {
        let started = Instant::now();
        let expected = tree.total_tokens();
        check_len("draft_logprobs", expected, draft_logprobs.len())?;
        check_len("target_logprobs", expected, target_logprobs.len())?;

        if tree.num_paths() == 0 {
            tree.best_path_index = None;
            return Ok(VerificationResult {
                accepted_tokens: Vec::new(),
                num_accepted: 0,
                acceptance_mask: Vec::new(),
                target_logprobs: Vec::new(),
                draft_logprobs: Vec::new(),
                verification_latency: started.elapsed(),
            });
        }

        let mut rng = self.derive_rng();
        let mut best: Option<(usize, Vec<bool>, usize)> = None;

        for path in 0..tree.num_paths() {
            let start = tree.path_start_indices[path];
            let len = tree.path_lengths[path];
            let mut mask = vec![false; len];
            let mut accepted = 0usize;
            for j in 0..len {
                let i = start + j;
                let p = acceptance_probability(self.policy, draft_logprobs[i], target_logprobs[i]);
                if !accepts(&mut rng, p) {
                    break;
                }
                mask[j] = true;
                accepted += 1;
            }
            let better = match &best {
                Some((_, _, best_accepted)) => accepted > *best_accepted,
                None => true,
            };
            if better {
                best = Some((path, mask, accepted));
            }
        }

        // num_paths() > 0 was checked above.
        let Some((winner, mask, num_accepted)) = best else {
            return Err(SpecDecodeError::MalformedTree(
                "no path could be evaluated".into(),
            ));
        };
        tree.best_path_index = Some(winner);

        let start = tree.path_start_indices[winner];
        let len = tree.path_lengths[winner];
        let path_tokens = &tree.tree_token_ids[start..start + len];
        let accepted_tokens: Vec<u32> = path_tokens
            .iter()
            .zip(&mask)
            .filter_map(|(&token, &accepted)| accepted.then_some(token))
            .collect();

        if let Ok(mut counters) = self.counters.lock() {
            counters.observe_window(len, num_accepted);
        }

        Ok(VerificationResult {
            accepted_tokens,
            num_accepted,
            acceptance_mask: mask,
            target_logprobs: target_logprobs[start..start + len].to_vec(),
            draft_logprobs: draft_logprobs[start..start + len].to_vec(),
            verification_latency: started.elapsed(),
        })
    }

    /// `total_accepted / total_proposed` over the verifier's lifetime;
    /// 0.0 before anything has been proposed.
    pub fn get_overall_acceptance_rate(&self) -> f64 {
        let Ok(counters) = self.counters.lock() else {
            return 0.0;
        };
        if counters.total_proposed == 0 {
            return 0.0;
        }
        counters.total_accepted as f64 / counters.total_proposed as f64
    }

    /// Snapshot of the running statistics for telemetry.
    pub fn stats_snapshot(&self) -> SpecDecodeStats {
        let Ok(counters) = self.counters.lock() else {
            return SpecDecodeStats {
                total_proposed: 0,
                total_accepted: 0,
                acceptance_rate: 0.0,
                accepted_len_hist: Vec::new(),
            };
        };
        let acceptance_rate = if counters.total_proposed == 0 {
            0.0
        } else {
            counters.total_accepted as f64 / counters.total_proposed as f64
        };
        SpecDecodeStats {
            total_proposed: counters.total_proposed,
            total_accepted: counters.total_accepted,
            acceptance_rate,
            accepted_len_hist: counters.accepted_len_hist.clone(),
        }
    }

    /// Private per-call RNG. Seeded verifiers derive stream `base + n` for
    /// the n-th call; unseeded verifiers draw from entropy.
    fn derive_rng(&self) -> StdRng {
        match self.seed {
            Some(base) => {
                let stream = self.next_stream.fetch_add(1, Ordering::Relaxed);
                StdRng::seed_from_u64(base.wrapping_add(stream))
            }
            None => StdRng::from_entropy(),
        }
    }
}

/// Probability of accepting a draft token under `policy`.
pub(crate) fn acceptance_probability(
    policy: AcceptancePolicy,
    draft_logprob: f32,
    target_logprob: f32,
) -> f64 {
    let ratio = f64::from(target_logprob - draft_logprob).min(0.0).exp();
    match policy {
        AcceptancePolicy::RejectionSampling => ratio,
        AcceptancePolicy::TypicalAcceptance => {
            let entropy_factor = (1.0 + f64::from(target_logprob)).max(0.1);
            (ratio * entropy_factor).clamp(0.0, 1.0)
        }
        AcceptancePolicy::Exact => {
            if target_logprob >= draft_logprob {
                1.0
            } else {
                0.0
            }
        }
    }
}

/// Single accept/reject decision. Certain outcomes skip the draw so the
/// `Exact` policy and ratio-1 tokens stay deterministic.
pub(crate) fn accepts(rng: &mut StdRng, p: f64) -> bool {
    if p >= 1.0 {
        return true;
    }
    if p <= 0.0 {
        return false;
    }
    rng.gen::<f64>() < p
}

fn check_len(what: &'static str, expected: usize, actual: usize) -> Result<(), SpecDecodeError> {
    if expected != actual {
        return Err(SpecDecodeError::LengthMismatch {
            what,
            expected,
            actual,
        });
    }
    Ok(())
}
