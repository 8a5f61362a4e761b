//! The facility's single source of randomness.
//!
//! One [`SimRng`] is seeded from the facility configuration. Layout
//! generation draws from it first (disabled flags), then every runtime
//! decision does: gate choice, spot choice, which vehicle leaves, churn
//! direction and ambient traffic. A run is therefore a pure function of the
//! seed and the sequence of ticks and toggles.
//!
//! The generator is SplitMix64, with 8 bytes of state, folded into the
//! engine's state hash.

use crate::fixed::Fixed64;

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct SimRng {
    state: u64,
}

impl SimRng {
    pub fn new(seed: u64) -> Self {
        Self { state: seed }
    }

    pub fn next_u64(&mut self) -> u64 {
        self.state = self.state.wrapping_add(0x9E37_79B9_7F4A_7C15);
        let mut z = self.state;
        z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
        z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
        z ^ (z >> 31)
    }

    /// Uniform index in `0..len`. Draws nothing and returns 0 when `len` is 0.
    pub fn next_below(&mut self, len: usize) -> usize {
        if len == 0 {
            return 0;
        }
        ((u128::from(self.next_u64()) * len as u128) >> 64) as usize
    }

    /// Uniformly pick one candidate. Walks `candidates` twice (count, then
    /// select) instead of collecting them; an empty set draws nothing.
    pub fn pick<I>(&mut self, mut candidates: I) -> Option<I::Item>
    where
        I: Iterator + Clone,
    {
        let count = candidates.clone().count();
        if count == 0 {
            return None;
        }
        let idx = self.next_below(count);
        candidates.nth(idx)
    }

    /// `true` with `probability`, clamped to `[0, 1]`. The extremes draw
    /// nothing.
    pub fn chance(&mut self, probability: Fixed64) -> bool {
        if probability <= Fixed64::ZERO {
            return false;
        }
        if probability >= Fixed64::ONE {
            return true;
        }
        // Inside (0, 1) the Q32.32 bits are the fraction scaled to 2^32.
        (self.next_u64() >> 32) < probability.to_bits() as u64
    }

    pub fn state(&self) -> u64 {
        self.state
    }
}
