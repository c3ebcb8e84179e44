//! Snapshot Hashing
//!
//! Deterministic digests of game snapshots so devices and the registry can
//! tell at a glance whether they hold the same state.

use serde::Serialize;
use sha2::{Sha256, Digest};

/// Hash output type (256 bits / 32 bytes)
pub type StateHash = [u8; 32];

/// Deterministic hasher for game snapshots.
///
/// Wraps SHA-256 with a domain separator.
/// Order of updates is critical for determinism.
pub struct StateHasher {
    hasher: Sha256,
}

impl StateHasher {
    /// Create a new hasher with domain separator.
    pub fn new(domain: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(domain);
        Self { hasher }
    }

    /// Create hasher for a game snapshot.
    pub fn for_snapshot() -> Self {
        Self::new(b"WEREWOLF_SNAPSHOT_V1")
    }

    /// Update with raw bytes.
    #[inline]
    pub fn update_bytes(&mut self, bytes: &[u8]) {
        self.hasher.update(bytes);
    }

    /// Update with a u64 value (little-endian).
    #[inline]
    pub fn update_u64(&mut self, value: u64) {
        self.hasher.update(value.to_le_bytes());
    }

    /// Finalize and return the hash.
    pub fn finalize(self) -> StateHash {
        self.hasher.finalize().into()
    }
}

/// Hash any serializable snapshot through its canonical JSON encoding.
///
/// Maps are `BTreeMap`s throughout the game model, so the encoding is stable.
pub fn snapshot_hash<T: Serialize>(version: u64, value: &T) -> Result<StateHash, serde_json::Error> {
    let bytes = serde_json::to_vec(value)?;
    let mut hasher = StateHasher::for_snapshot();
    hasher.update_u64(version);
    hasher.update_bytes(&bytes);
    Ok(hasher.finalize())
}

/// First eight bytes of a hash as hex, for log lines.
pub fn short_hex(hash: &StateHash) -> String {
    hex::encode(&hash[..8])
}
