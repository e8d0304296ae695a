//! Independent verification across a batch of requests.

use std::thread;

use tracing::{debug, warn};

use crate::metadata::SpecDecodeMetadata;
use crate::types::SpecDecodeError;

use super::{SpecDecodeVerifier, VerificationResult};

/// One request's verification inputs: the metadata built for its drafts and
/// the aligned log-probability arrays.
#[derive(Debug)]
pub struct VerificationRequest {
    pub metadata: SpecDecodeMetadata,
    pub draft_logprobs: Vec<f32>,
    pub target_logprobs: Vec<f32>,
}

/// Applies one verifier independently across many requests, fanning out to
/// scoped worker threads when the batch carries enough tokens.
#[derive(Debug)]
pub struct BatchVerifier {
    verifier: SpecDecodeVerifier,
    num_tokens_threshold: usize,
    max_threads: usize,
}

impl BatchVerifier {
    pub fn new(
        verifier: SpecDecodeVerifier,
        num_tokens_threshold: usize,
        max_threads: usize,
    ) -> Self {
        Self {
            verifier,
            num_tokens_threshold,
            max_threads: max_threads.max(1),
        }
    }

    pub fn verifier(&self) -> &SpecDecodeVerifier {
        &self.verifier
    }

    /// Verify every request, preserving input order.
    ///
    /// Requests never interact; they share only the verifier's running
    /// counters. A contract violation in any request fails the whole call,
    /// wrapped with that request's batch index.
    pub fn verify_batch(
        &self,
        requests: &mut [VerificationRequest],
    ) -> Result<Vec<VerificationResult>, SpecDecodeError> {
        let total_tokens: usize = requests
            .iter()
            .map(|r| r.metadata.total_draft_tokens())
            .sum();

        if requests.len() <= 1 || total_tokens < self.num_tokens_threshold {
            return requests
                .iter_mut()
                .enumerate()
                .map(|(index, request)| self.verify_one(index, request))
                .collect();
        }

        let num_threads = self.max_threads.min(requests.len());
        let chunk_size = requests.len().div_ceil(num_threads);
        debug!(
            num_requests = requests.len(),
            total_tokens, num_threads, "batched verification fan-out"
        );

        let mut results = Vec::with_capacity(requests.len());
        thread::scope(|scope| {
            let handles: Vec<_> = requests
                .chunks_mut(chunk_size)
                .enumerate()
                .map(|(chunk_idx, chunk)| {
                    let base = chunk_idx * chunk_size;
                    scope.spawn(move || {
                        chunk
                            .iter_mut()
                            .enumerate()
                            .map(|(offset, request)| self.verify_one(base + offset, request))
                            .collect::<Result<Vec<_>, _>>()
                    })
                })
                .collect();
            for handle in handles {
                results.push(handle.join().expect("verification worker panicked"));
            }
        });

        let mut merged = Vec::with_capacity(requests.len());
        for chunk_results in results {
            merged.extend(chunk_results?);
        }
        Ok(merged)
    }

    fn verify_one(
        &self,
        index: usize,
        request: &mut VerificationRequest,
    ) -> Result<VerificationResult, SpecDecodeError> {
        self.verifier
            .verify(
                &mut request.metadata,
                &request.draft_logprobs,
                &request.target_logprobs,
            )
            .map_err(|source| {
                warn!(index, %source, "verification contract violation in batch");
                SpecDecodeError::BatchItem {
                    index,
                    source: Box::new(source),
                }
            })
    }
}
