//! Deterministic random source for combat resolution and simulation.
//!
//! `CombatRng` is a 32-bit xorshift generator. Its output is a pure function of
//! its internal state, so two generators seeded identically produce identical
//! sequences forever. It is the only source of randomness in the crate: status
//! rolls, planner tie-breaks and the batch harness all draw from an explicitly
//! passed `CombatRng`, never from process-wide state.
//!
//! The generator implements [`rand::RngCore`] and [`rand::SeedableRng`], so the
//! usual `rand` adapters (`gen_range`, `choose`, ...) work on it.
//!
//! # Example
//!
//! ```
//! use runeclash_core::rng::CombatRng;
//!
//! let mut a = CombatRng::new(42);
//! let mut b = CombatRng::new(42);
//! for _ in 0..100 {
//!     assert_eq!(a.next_float(), b.next_float());
//! }
//!
//! let roll = a.roll_int(1, 6);
//! assert!((1..=6).contains(&roll));
//! ```

use rand::{RngCore, SeedableRng};
use serde::{Deserialize, Serialize};

/// Replacement state used when seed scrambling lands on zero.
///
/// Xorshift has a fixed point at zero; this keeps the generator out of it.
const ZERO_STATE_FALLBACK: u32 = 0x9E37_79B9;

/// Odd multiplier used to spread small seeds across the state space.
const SEED_SCRAMBLE: u32 = 0x85EB_CA6B;

/// Deterministic xorshift32 generator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CombatRng {
    state: u32,
}

impl CombatRng {
    /// Creates a generator from a signed 32-bit seed.
    #[must_use]
    pub fn new(seed: i32) -> Self {
        Self {
            state: Self::scramble(seed),
        }
    }

    /// Reseeds the generator in place.
    pub fn seed(&mut self, seed: i32) {
        self.state = Self::scramble(seed);
    }

    /// Returns the raw internal state.
    #[must_use]
    pub const fn state(&self) -> u32 {
        self.state
    }

    /// Returns a float in `[0, 1)`.
    pub fn next_float(&mut self) -> f64 {
        f64::from(self.step()) / 4_294_967_296.0
    }

    /// Returns an integer in `[min, max]` inclusive.
    ///
    /// Swapped bounds are normalized rather than rejected.
    #[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
    pub fn roll_int(&mut self, min: i64, max: i64) -> i64 {
        let (lo, hi) = if min <= max { (min, max) } else { (max, min) };
        // widest range is 2^64 values, which only fits in i128
        let span = i128::from(hi) - i128::from(lo) + 1;
        let offset = ((self.next_float() * span as f64).floor() as i128).clamp(0, span - 1);
        // lo + offset lies in [lo, hi], so it fits back into i64
        (i128::from(lo) + offset) as i64
    }

    /// Rolls against a probability, consuming exactly one draw.
    pub fn chance(&mut self, probability: f64) -> bool {
        let roll = self.next_float();
        roll < probability
    }

    fn scramble(seed: i32) -> u32 {
        let raw = u32::from_ne_bytes(seed.to_ne_bytes());
        let state = raw.wrapping_mul(SEED_SCRAMBLE) ^ ZERO_STATE_FALLBACK.rotate_left(7);
        if state == 0 {
            ZERO_STATE_FALLBACK
        } else {
            state
        }
    }

    fn step(&mut self) -> u32 {
        let mut x = self.state;
        x ^= x << 13;
        x ^= x >> 17;
        x ^= x << 5;
        self.state = x;
        x
    }
}

impl Default for CombatRng {
    fn default() -> Self {
        Self::new(0)
    }
}

impl RngCore for CombatRng {
    fn next_u32(&mut self) -> u32 {
        self.step()
    }

    fn next_u64(&mut self) -> u64 {
        let hi = u64::from(self.step());
        let lo = u64::from(self.step());
        (hi << 32) | lo
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        for chunk in dest.chunks_mut(4) {
            let bytes = self.step().to_le_bytes();
            chunk.copy_from_slice(&bytes[..chunk.len()]);
        }
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand::Error> {
        self.fill_bytes(dest);
        Ok(())
    }
}

impl SeedableRng for CombatRng {
    type Seed = [u8; 4];

    fn from_seed(seed: Self::Seed) -> Self {
        Self::new(i32::from_le_bytes(seed))
    }
}
