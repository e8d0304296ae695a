//! Shared error type for the speculative decoding subsystem.
//!
//! Recoverable conditions (context too short, no n-gram match) never surface
//! here — proposers return empty results for those. An error means a contract
//! violation at an integration seam: mismatched array lengths, an invalid
//! configuration, or a malformed speculation tree. Callers are expected to
//! log and drop the offending batch rather than crash the serving loop.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SpecDecodeError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// A logprob array does not line up with the draft tokens it describes.
    /// Silent truncation would corrupt acceptance statistics, so this fails
    /// fast with enough context for the caller to identify the batch.
    #[error("{what} length mismatch: expected {expected}, got {actual}")]
    LengthMismatch {
        what: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("malformed speculation tree: {0}")]
    MalformedTree(String),

    /// Wraps a per-item failure inside a batched verification call.
    #[error("batch item {index}: {source}")]
    BatchItem {
        index: usize,
        #[source]
        source: Box<SpecDecodeError>,
    },
}
