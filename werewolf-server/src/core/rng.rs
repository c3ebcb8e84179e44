//! Deterministic Random Number Generator
//!
//! Uses the Mulberry32 algorithm: a 32-bit mix-hash generator that is small,
//! fast and bit-for-bit reproducible. Every device that knows a game seed can
//! recompute the same role assignment without the host transmitting it.
//!
//! Not cryptographically secure.

use sha2::{Sha256, Digest};

/// 2^32 as a float, the divisor mapping a u32 onto [0, 1).
const U32_RANGE: f64 = 4_294_967_296.0;

/// Deterministic PRNG using Mulberry32.
///
/// # Example
///
/// ```
/// use werewolf::core::rng::DeterministicRng;
///
/// let mut rng = DeterministicRng::new(42);
/// assert_eq!(rng.next_u32(), 2581720956); // Always the same!
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeterministicRng {
    state: u32,
}

impl Default for DeterministicRng {
    fn default() -> Self {
        Self::new(0)
    }
}

impl DeterministicRng {
    /// Create a new RNG from a 32-bit seed.
    pub const fn new(seed: u32) -> Self {
        Self { state: seed }
    }

    /// Generate the next 32-bit random value.
    #[inline]
    pub fn next_u32(&mut self) -> u32 {
        self.state = self.state.wrapping_add(0x6D2B_79F5);
        let mut t = self.state;
        t = (t ^ (t >> 15)).wrapping_mul(t | 1);
        t ^= t.wrapping_add((t ^ (t >> 7)).wrapping_mul(t | 61));
        t ^ (t >> 14)
    }

    /// Generate a float in [0, 1).
    #[inline]
    pub fn next_f64(&mut self) -> f64 {
        f64::from(self.next_u32()) / U32_RANGE
    }

    /// Generate a random integer in range [0, max).
    ///
    /// Scales the float output rather than taking a modulo so that any
    /// implementation of the same generator picks the same index.
    #[inline]
    pub fn next_int(&mut self, max: usize) -> usize {
        if max == 0 {
            return 0;
        }
        let idx = (self.next_f64() * max as f64).floor() as usize;
        idx.min(max - 1)
    }

    /// Shuffle a slice in place using Fisher-Yates, walking from the end.
    pub fn shuffle<T>(&mut self, slice: &mut [T]) {
        let len = slice.len();
        for i in (1..len).rev() {
            let j = self.next_int(i + 1);
            slice.swap(i, j);
        }
    }

    /// Select a random element from a slice.
    pub fn choose<'a, T>(&mut self, slice: &'a [T]) -> Option<&'a T> {
        if slice.is_empty() {
            None
        } else {
            let idx = self.next_int(slice.len());
            slice.get(idx)
        }
    }
}

/// Return a shuffled copy of `items`, leaving the input untouched.
pub fn shuffled<T: Clone>(items: &[T], rng: &mut DeterministicRng) -> Vec<T> {
    let mut out = items.to_vec();
    rng.shuffle(&mut out);
    out
}

/// Derive a sub-seed for one purpose within one round of a game.
///
/// Used where a decision must be random yet identical on every device,
/// such as breaking a vote tie.
pub fn derive_round_seed(game_seed: u32, round: u32, purpose: &[u8]) -> u32 {
    let mut hasher = Sha256::new();

    // Domain separator
    hasher.update(b"WEREWOLF_ROUND_SEED_V1");
    hasher.update(game_seed.to_le_bytes());
    hasher.update(round.to_le_bytes());
    hasher.update(purpose);

    let hash = hasher.finalize();
    u32::from_le_bytes([hash[0], hash[1], hash[2], hash[3]])
}

// =============================================================================
// TESTS
// =============================================================================
