use fixed::types::I32F32;
use serde::{Deserialize, Serialize};

/// Q32.32 fixed-point: 32 integer bits, 32 fractional bits.
///
/// Used for money and probabilities. Addition is exact, so revenue totals
/// always equal the sum of their per-zone parts.
pub type Fixed64 = I32F32;

/// Simulated time in milliseconds since the engine was created.
pub type Millis = u64;

/// Convert an f64 to Fixed64. Use only for configuration, never in the sim loop.
#[inline]
pub fn f64_to_fixed64(v: f64) -> Fixed64 {
    Fixed64::from_num(v)
}

/// Like [`f64_to_fixed64`], but `None` for NaN, infinities and values
/// outside the Q32.32 range. Use for untrusted input.
#[inline]
pub fn checked_f64_to_fixed64(v: f64) -> Option<Fixed64> {
    Fixed64::checked_from_num(v)
}

/// Convert Fixed64 to f64. Use only for display.
#[inline]
pub fn fixed64_to_f64(v: Fixed64) -> f64 {
    v.to_num::<f64>()
}

// ---------------------------------------------------------------------------
// Percent
// ---------------------------------------------------------------------------

/// A whole-number percentage used for occupancy ratios and thresholds.
///
/// Ratios are never materialized; comparisons cross-multiply integers so a
/// block at exactly 70% compares equal to a 70% threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Percent(pub u32);

impl Percent {
    pub const ZERO: Percent = Percent(0);
    pub const HUNDRED: Percent = Percent(100);

    /// Raw percentage value.
    pub fn get(self) -> u32 {
        self.0
    }

    /// `part / whole > self`. Always false when `whole` is zero.
    pub fn exceeded_by(self, part: u64, whole: u64) -> bool {
        whole > 0 && part * 100 > whole * u64::from(self.0)
    }

    /// `part / whole < self`. Always false when `whole` is zero.
    pub fn undershot_by(self, part: u64, whole: u64) -> bool {
        whole > 0 && part * 100 < whole * u64::from(self.0)
    }
}

/// Integer division rounding toward positive infinity.
#[inline]
pub fn ceil_div(numerator: u64, denominator: u64) -> u64 {
    if denominator == 0 {
        return 0;
    }
    numerator.div_ceil(denominator)
}
