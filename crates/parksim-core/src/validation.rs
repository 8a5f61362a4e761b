//! Structural invariant checks.
//!
//! A violation means the engine itself has a bug. It is reported as a typed
//! error and never repaired; callers should halt.

use std::collections::HashSet;

use crate::engine::Engine;
use crate::fixed::Fixed64;
use crate::id::{SpotId, ZoneId};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InvariantViolation {
    #[error("duplicate spot id {0}")]
    DuplicateSpotId(SpotId),
    #[error("{occupied} occupied spots but {assignments} active assignments")]
    OccupancyMismatch { occupied: usize, assignments: usize },
    #[error("assignment references spot {0}, which is not occupied")]
    OrphanedAssignment(SpotId),
    #[error("spot {0} is held by more than one assignment")]
    DoubleAssignment(SpotId),
    #[error("revenue total {total} does not equal zone sum {zone_sum:?}")]
    RevenueMismatch {
        total: Fixed64,
        zone_sum: Option<Fixed64>,
    },
    #[error("negative revenue")]
    NegativeRevenue,
    #[error("revenue overflow")]
    RevenueOverflow,
    #[error("revenue recorded for unknown zone {0:?}")]
    UnknownRevenueZone(ZoneId),
    #[error("ticket counter at {next} after {issued} issued tickets")]
    TicketSequenceGap { next: u64, issued: u64 },
}

/// Spot ids must be unique. Checked once at construction.
pub fn check_unique_spot_ids(engine: &Engine) -> Result<(), InvariantViolation> {
    let mut seen = HashSet::new();
    for spot in engine.layout.spots() {
        if !seen.insert(spot.id) {
            return Err(InvariantViolation::DuplicateSpotId(spot.id));
        }
    }
    Ok(())
}

/// Check every runtime invariant of `engine`.
pub fn check_invariants(engine: &Engine) -> Result<(), InvariantViolation> {
    // Occupancy <-> assignments.
    let occupied = engine.layout.occupied_count();
    let assignments = engine.cars.len();
    if occupied != assignments {
        return Err(InvariantViolation::OccupancyMismatch {
            occupied,
            assignments,
        });
    }

    let mut held = HashSet::with_capacity(assignments);
    for assignment in engine.cars.values() {
        let spot = assignment.ticket.spot;
        if !engine.layout.spot(spot).is_some_and(|s| s.occupied) {
            return Err(InvariantViolation::OrphanedAssignment(spot));
        }
        if !held.insert(spot) {
            return Err(InvariantViolation::DoubleAssignment(spot));
        }
    }

    // Revenue.
    let revenue = engine.ledger.revenue();
    let zone_sum = revenue.zone_sum();
    if zone_sum != Some(revenue.total) {
        return Err(InvariantViolation::RevenueMismatch {
            total: revenue.total,
            zone_sum,
        });
    }
    if revenue.total < Fixed64::ZERO || revenue.per_zone.iter().any(|&v| v < Fixed64::ZERO) {
        return Err(InvariantViolation::NegativeRevenue);
    }

    // Tickets.
    let next = engine.ledger.next_number().0;
    let issued = engine.sim_state.tickets_issued;
    if next != issued + 1 {
        return Err(InvariantViolation::TicketSequenceGap { next, issued });
    }

    Ok(())
}
