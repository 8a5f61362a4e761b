//! Shared test helpers for unit and integration tests.
//!
//! Gated behind `#[cfg(any(test, feature = "test-utils"))]` so these helpers
//! are available in unit tests and, via the `test-utils` feature, in the
//! `tests/` directory and downstream crates.

use crate::config::{FacilityConfig, GateKind, GateSpec};
use crate::controller::AttemptOutcome;
use crate::engine::Engine;
use crate::fixed::{Fixed64, Percent};
use crate::ledger::Ticket;

// ===========================================================================
// Fixed-point helper
// ===========================================================================

pub fn fixed(v: f64) -> Fixed64 {
    Fixed64::from_num(v)
}

// ===========================================================================
// Configs
// ===========================================================================

/// The reference facility with a different seed.
pub fn seeded(seed: u64) -> FacilityConfig {
    FacilityConfig {
        seed,
        ..FacilityConfig::reference()
    }
}

/// An 8x8 grid: one zone, entry at the top-left corner, exit at the
/// bottom-left of the middle street. 36 spots in four 3x3 blocks.
pub fn small_config() -> FacilityConfig {
    FacilityConfig {
        rows: 8,
        cols: 8,
        zones: vec!["A".to_string()],
        gates: vec![
            GateSpec::new("IN", 0, GateKind::Entry),
            GateSpec::new("OUT", 32, GateKind::Exit),
        ],
        disabled_probability: Fixed64::ZERO,
        ..FacilityConfig::reference()
    }
}

/// Reference facility whose controller always admits one vehicle per tick
/// while inside the band.
pub fn always_churn_in() -> FacilityConfig {
    FacilityConfig {
        churn_probability: fixed(1.0),
        ..FacilityConfig::reference()
    }
}

/// Reference facility with a band of exactly `min%..=max%`.
pub fn with_band(min: u32, max: u32) -> FacilityConfig {
    let mut cfg = FacilityConfig::reference();
    cfg.band.min = Percent(min);
    cfg.band.max = Percent(max);
    cfg
}

// ===========================================================================
// Engines
// ===========================================================================

pub fn engine_with(config: FacilityConfig) -> Engine {
    Engine::new(config).expect("test config should be valid")
}

pub fn reference_engine() -> Engine {
    engine_with(FacilityConfig::reference())
}

/// Admit up to `n` vehicles outside the control loop, returning the
/// tickets that were issued.
pub fn admit_n(engine: &mut Engine, n: usize) -> Vec<Ticket> {
    (0..n)
        .filter_map(|_| match engine.admit_vehicle().expect("entry attempt failed") {
            AttemptOutcome::Entered(ticket) => Some(ticket),
            _ => None,
        })
        .collect()
}

/// Release up to `n` vehicles outside the control loop.
pub fn release_n(engine: &mut Engine, n: usize) -> Vec<Ticket> {
    (0..n)
        .filter_map(|_| match engine.release_vehicle().expect("exit attempt failed") {
            AttemptOutcome::Exited(ticket) => Some(ticket),
            _ => None,
        })
        .collect()
}

/// Run `n` occupancy ticks, panicking on any engine error.
pub fn run_occupancy_ticks(engine: &mut Engine, n: usize) {
    for _ in 0..n {
        engine.tick_occupancy().expect("occupancy tick failed");
    }
}
