//! Configuration for the n-gram draft proposers.

use serde::Deserialize;

use crate::types::SpecDecodeError;

/// Shared configuration for all n-gram proposer variants.
///
/// Immutable once constructed. Proposer constructors call [`validate`]
/// and refuse inconsistent values up front rather than producing silently
/// degenerate proposals.
///
/// [`validate`]: NgramConfig::validate
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NgramConfig {
    /// Minimum n-gram length to match (inclusive).
    pub min_n: usize,
    /// Maximum n-gram length to match (inclusive).
    pub max_n: usize,
    /// Number of speculative tokens to propose per call (K).
    pub num_speculative_tokens: usize,
    /// Maximum context length the proposer will ever see.
    pub max_model_len: usize,
    /// Maximum number of concurrent sequences sharing one proposer.
    pub max_num_seqs: usize,
    /// Batches with fewer total tokens than this are proposed sequentially.
    pub num_tokens_threshold: usize,
    /// Upper bound on worker threads for batched proposal.
    pub max_threads: usize,
}

impl Default for NgramConfig {
    fn default() -> Self {
        Self {
            min_n: 1,
            max_n: 5,
            num_speculative_tokens: 5,
            max_model_len: 4096,
            max_num_seqs: 128,
            num_tokens_threshold: 8192,
            max_threads: 8,
        }
    }
}

impl NgramConfig {
    /// Check internal consistency.
    pub fn validate(&self) -> Result<(), SpecDecodeError> {
        if self.min_n == 0 {
            return Err(SpecDecodeError::InvalidConfig(
                "min_n must be at least 1".into(),
            ));
        }
        if self.min_n > self.max_n {
            return Err(SpecDecodeError::InvalidConfig(format!(
                "min_n ({}) must not exceed max_n ({})",
                self.min_n, self.max_n
            )));
        }
        if self.num_speculative_tokens == 0 {
            return Err(SpecDecodeError::InvalidConfig(
                "num_speculative_tokens must be at least 1".into(),
            ));
        }
        if self.max_threads == 0 {
            return Err(SpecDecodeError::InvalidConfig(
                "max_threads must be at least 1".into(),
            ));
        }
        Ok(())
    }
}
