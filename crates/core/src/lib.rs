//! Speculative decoding support for an LLM inference engine.
//!
//! Three layers, invoked synchronously by an external scheduling loop:
//! draft proposers ([`proposer`]) guess continuation tokens from the token
//! history alone, the metadata builder ([`metadata`], [`tree`]) packs drafts
//! into flat batched index tables for a single target-model forward pass,
//! and the verifier ([`verify`]) decides which prefix of each draft to keep
//! using rejection sampling against the target distribution.
//!
//! The target model, sampler, scheduler, and KV cache are external
//! collaborators; this crate only defines the contract between them.

pub mod cache;
pub mod config;
pub mod metadata;
pub mod proposer;
pub mod tree;
pub mod types;
pub mod verify;
