//! Seeded Random Number Generator
//!
//! Uses the Mulberry32 algorithm for fast, well-mixed, deterministic randomness.
//! Every client constructed with the same match seed draws the exact same
//! sequence, which is what makes the obstacle course identical for everyone.

use serde::{Serialize, Deserialize};

/// Mulberry32 state increment (Weyl sequence step).
const MULBERRY_INCREMENT: u32 = 0x6D2B_79F5;

/// 2^32 as f64, used to map a u32 into [0, 1).
const U32_RANGE: f64 = 4_294_967_296.0;

/// Deterministic PRNG using the Mulberry32 algorithm.
///
/// # Determinism Guarantee
///
/// Given the same seed and the same call sequence, this RNG produces the exact
/// same values on every platform. All arithmetic is wrapping `u32`; the only
/// float operation is the final division by 2^32, which is exact in IEEE-754.
///
/// # Example
///
/// ```
/// use flappygull::core::rng::SeededRandom;
///
/// let mut rng = SeededRandom::new(42);
/// assert_eq!(rng.next(), 0.6011037519201636); // Always the same!
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeededRandom {
    state: u32,
}

impl SeededRandom {
    /// Create a new RNG from a 32-bit seed.
    pub const fn new(seed: u32) -> Self {
        Self { state: seed }
    }

    /// Generate the next raw 32-bit value.
    #[inline]
    pub fn next_u32(&mut self) -> u32 {
        self.state = self.state.wrapping_add(MULBERRY_INCREMENT);
        let mut t = self.state;
        t = (t ^ (t >> 15)).wrapping_mul(t | 1);
        t ^= t.wrapping_add((t ^ (t >> 7)).wrapping_mul(t | 61));
        t ^ (t >> 14)
    }

    /// Generate a float in [0, 1).
    #[inline]
    #[allow(clippy::should_implement_trait)]
    pub fn next(&mut self) -> f64 {
        f64::from(self.next_u32()) / U32_RANGE
    }

    /// Generate an integer in [min, max] inclusive.
    ///
    /// Matches the usual "uniform integer in range" helper of browser game
    /// frameworks: `floor(next() * (max - min + 1)) + min`. Exactly one draw is
    /// consumed even when the range is degenerate.
    #[inline]
    pub fn between(&mut self, min: i32, max: i32) -> i32 {
        let roll = self.next();
        if min >= max {
            return min;
        }
        let span = f64::from(max) - f64::from(min) + 1.0;
        // roll < 1.0, so the product is strictly below span and fits in i32
        (roll * span).floor() as i32 + min
    }

    /// Generate a float in [min, max).
    #[inline]
    pub fn range(&mut self, min: f64, max: f64) -> f64 {
        self.next() * (max - min) + min
    }

    /// Generate a boolean that is true with the given probability.
    #[inline]
    pub fn chance(&mut self, probability: f64) -> bool {
        self.next() < probability
    }

    /// Get current state (for checkpointing/debugging).
    pub const fn state(&self) -> u32 {
        self.state
    }

    /// Restore from saved state.
    pub fn set_state(&mut self, state: u32) {
        self.state = state;
    }
}

// =============================================================================
// TESTS
// =============================================================================
