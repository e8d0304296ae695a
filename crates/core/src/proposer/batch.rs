//! Batched proposal fan-out.
//!
//! Small batches are proposed sequentially; the thread spawn cost only pays
//! off once the batch carries enough total tokens. Larger batches split
//! into contiguous chunks across scoped worker threads and the per-chunk
//! results are merged back in request order, so the output is identical to
//! the sequential path.

use std::thread;

use tracing::debug;

use crate::config::NgramConfig;

use super::{DraftProposer, NgramProposalResult};

/// Propose drafts for every request in the batch.
///
/// Requests are token histories; `excluded_tokens` applies to all of them.
/// Fan-out is bounded by `config.max_threads` and skipped entirely when the
/// batch has a single request or fewer than `config.num_tokens_threshold`
/// total tokens.
pub fn batch_propose<P: DraftProposer + ?Sized>(
    proposer: &P,
    requests: &[Vec<u32>],
    excluded_tokens: Option<&[u32]>,
    config: &NgramConfig,
) -> Vec<NgramProposalResult> {
    let total_tokens: usize = requests.iter().map(Vec::len).sum();
    if requests.len() <= 1 || total_tokens < config.num_tokens_threshold {
        return requests
            .iter()
            .map(|tokens| proposer.propose(tokens, excluded_tokens))
            .collect();
    }

    let num_threads = config.max_threads.max(1).min(requests.len());
    let chunk_size = requests.len().div_ceil(num_threads);
    debug!(
        num_requests = requests.len(),
        total_tokens, num_threads, "batched proposal fan-out"
    );

    let mut results = Vec::with_capacity(requests.len());
    thread::scope(|scope| {
        let handles: Vec<_> = requests
            .chunks(chunk_size)
            .map(|chunk| {
                scope.spawn(move || {
                    chunk
                        .iter()
                        .map(|tokens| proposer.propose(tokens, excluded_tokens))
                        .collect::<Vec<_>>()
                })
            })
            .collect();
        for handle in handles {
            results.extend(handle.join().expect("proposal worker panicked"));
        }
    });
    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proposer::NgramProposer;

    fn repetitive_request(seed: u32, len: usize) -> Vec<u32> {
        (0..len).map(|i| seed + (i % 7) as u32).collect()
    }

    fn config(num_tokens_threshold: usize, max_threads: usize) -> NgramConfig {
        NgramConfig {
            min_n: 1,
            max_n: 3,
            num_speculative_tokens: 4,
            num_tokens_threshold,
            max_threads,
            ..Default::default()
        }
    }

    fn proposer(config: &NgramConfig) -> NgramProposer {
        NgramProposer::new(config.clone()).expect("valid config")
    }

    #[test]
    fn empty_batch_yields_no_results() {
        let config = config(0, 4);
        let p = proposer(&config);
        assert!(batch_propose(&p, &[], None, &config).is_empty());
    }

    #[test]
    fn single_request_stays_sequential() {
        let config = config(0, 4);
        let p = proposer(&config);
        let requests = vec![repetitive_request(10, 64)];
        let results = batch_propose(&p, &requests, None, &config);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0], p.propose(&requests[0], None));
    }

    #[test]
    fn parallel_matches_sequential() {
        // Threshold 0 forces the parallel path.
        let config = config(0, 4);
        let p = proposer(&config);
        let requests: Vec<Vec<u32>> =
            (0..16).map(|i| repetitive_request(i * 100, 128)).collect();

        let parallel = batch_propose(&p, &requests, None, &config);
        let sequential: Vec<_> = requests.iter().map(|r| p.propose(r, None)).collect();
        assert_eq!(parallel, sequential);
    }

    #[test]
    fn below_threshold_stays_sequential_and_identical() {
        let config = config(usize::MAX, 4);
        let p = proposer(&config);
        let requests: Vec<Vec<u32>> = (0..4).map(|i| repetitive_request(i, 32)).collect();
        let results = batch_propose(&p, &requests, None, &config);
        let sequential: Vec<_> = requests.iter().map(|r| p.propose(r, None)).collect();
        assert_eq!(results, sequential);
    }

    #[test]
    fn thread_bound_larger_than_batch_is_fine() {
        let config = config(0, 64);
        let p = proposer(&config);
        let requests: Vec<Vec<u32>> = (0..3).map(|i| repetitive_request(i, 64)).collect();
        let results = batch_propose(&p, &requests, None, &config);
        assert_eq!(results.len(), 3);
    }

    #[test]
    fn excluded_tokens_apply_to_every_request() {
        let config = config(0, 3);
        let p = proposer(&config);
        let requests: Vec<Vec<u32>> = (0..6).map(|_| vec![1, 2, 9, 1, 2, 9, 1, 2]).collect();
        let results = batch_propose(&p, &requests, Some(&[9]), &config);
        for result in &results {
            assert!(!result.draft_tokens.contains(&9));
        }
    }

    #[test]
    fn fan_out_decision_reads_the_proposer_config() {
        // Same requests, same proposer: the config's threshold alone decides
        // the path, and both paths agree.
        let sequential_cfg = config(usize::MAX, 4);
        let parallel_cfg = config(0, 4);
        let p = proposer(&parallel_cfg);
        let requests: Vec<Vec<u32>> = (0..8).map(|i| repetitive_request(i, 48)).collect();
        assert_eq!(
            batch_propose(&p, &requests, None, &sequential_cfg),
            batch_propose(&p, &requests, None, &parallel_cfg),
        );
    }
}
