//! Criterion benchmarks for the speculative decoding hot loops.
//!
//! Covers the n-gram scan, batched metadata construction, and batched
//! verification -- all pure CPU.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use specdec_core::config::NgramConfig;
use specdec_core::metadata::SpecDecodeMetadata;
use specdec_core::proposer::{DraftProposer, NgramProposer};
use specdec_core::verify::SpecDecodeVerifier;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Mildly repetitive synthetic context so the scan finds matches at
/// realistic depths.
fn synthetic_context(len: usize) -> Vec<u32> {
    (0..len).map(|i| ((i * 7 + i / 13) % 97) as u32).collect()
}

// ---------------------------------------------------------------------------
// N-gram proposal
// ---------------------------------------------------------------------------

fn bench_ngram_propose(c: &mut Criterion) {
    let mut group = c.benchmark_group("ngram_propose");

    let proposer = NgramProposer::new(NgramConfig {
        min_n: 1,
        max_n: 5,
        num_speculative_tokens: 5,
        ..Default::default()
    })
    .expect("valid config");

    for &context_len in &[256usize, 1024, 4096] {
        let context = synthetic_context(context_len);
        group.bench_with_input(
            BenchmarkId::new("context_len", context_len),
            &context,
            |b, context| {
                b.iter(|| proposer.propose(black_box(context), None));
            },
        );
    }
    group.finish();
}

// ---------------------------------------------------------------------------
// Metadata construction
// ---------------------------------------------------------------------------

fn bench_metadata_build(c: &mut Criterion) {
    let mut group = c.benchmark_group("metadata_from_proposals");

    for &batch in &[8usize, 64, 256] {
        let proposals: Vec<Vec<u32>> = (0..batch)
            .map(|i| (0..(i % 6) as u32 + 1).collect())
            .collect();
        group.bench_with_input(
            BenchmarkId::new("batch", batch),
            &proposals,
            |b, proposals| {
                b.iter(|| SpecDecodeMetadata::from_proposals(black_box(proposals)));
            },
        );
    }
    group.finish();
}

// ---------------------------------------------------------------------------
// Verification
// ---------------------------------------------------------------------------

fn bench_verify(c: &mut Criterion) {
    let mut group = c.benchmark_group("verify");

    let verifier = SpecDecodeVerifier::new().with_seed(7);
    for &batch in &[8usize, 64, 256] {
        let sizes: Vec<usize> = (0..batch).map(|i| i % 6 + 1).collect();
        let template = SpecDecodeMetadata::make_dummy(&sizes);
        let total = template.total_draft_tokens();
        let draft = vec![-0.4f32; total];
        let target = vec![-0.6f32; total];
        group.bench_with_input(BenchmarkId::new("batch", batch), &batch, |b, _| {
            b.iter(|| {
                let mut metadata = template.clone();
                verifier
                    .verify(&mut metadata, black_box(&draft), black_box(&target))
                    .expect("aligned inputs")
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_ngram_propose, bench_metadata_build, bench_verify);
criterion_main!(benches);
