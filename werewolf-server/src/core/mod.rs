//! Core deterministic primitives.
//!
//! Everything here is reproducible from a seed, so every device computes
//! the same result.

pub mod rng;
pub mod hash;

// Re-export core types
pub use rng::{DeterministicRng, derive_round_seed, shuffled};
pub use hash::{StateHash, snapshot_hash, short_hex};
