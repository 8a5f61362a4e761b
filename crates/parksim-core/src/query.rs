//! Read-only query API for inspecting simulation state.
//!
//! Snapshot types aggregate engine state into owned views for rendering and
//! dashboards. Nothing here borrows engine storage.

use serde::Serialize;

use crate::engine::Engine;
use crate::fixed::{Fixed64, Millis};
use crate::id::{Orientation, SpotId, ZoneId};
use crate::ledger::RevenueLedger;
use crate::maintenance::MaintenanceRegistry;
use crate::traffic::{TrafficHistogram, TrafficLevel};

// ---------------------------------------------------------------------------
// Snapshot types
// ---------------------------------------------------------------------------

/// One spot as a renderer sees it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SpotSnapshot {
    pub id: SpotId,
    pub zone: ZoneId,
    pub row: usize,
    pub col: usize,
    pub disabled: bool,
    pub occupied: bool,
    /// Its zone or the spot itself is under maintenance.
    pub under_maintenance: bool,
}

/// Per-zone occupancy and revenue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ZoneStats {
    pub zone: ZoneId,
    pub name: String,
    pub total: usize,
    pub occupied: usize,
    pub available: usize,
    pub revenue: Fixed64,
}

/// Street traffic levels by orientation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrafficSnapshot {
    pub horizontal: Vec<TrafficLevel>,
    pub vertical: Vec<TrafficLevel>,
    pub histogram: TrafficHistogram,
    /// High-traffic segment counts as `(horizontal, vertical)`.
    pub high_counts: (usize, usize),
}

/// Everything a dashboard needs, copied out of the engine.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FacilitySnapshot {
    pub spots: Vec<SpotSnapshot>,
    pub occupied: usize,
    pub total: usize,
    pub available: usize,
    pub revenue: RevenueLedger,
    pub traffic: TrafficSnapshot,
    pub maintenance: MaintenanceRegistry,
    pub zones: Vec<ZoneStats>,
    pub pending_commands: usize,
    pub clock: Millis,
    pub occupancy_ticks: u64,
    pub traffic_ticks: u64,
    pub tickets_issued: u64,
}

impl FacilitySnapshot {
    pub fn zone(&self, zone: ZoneId) -> Option<&ZoneStats> {
        self.zones.get(zone.index())
    }

    /// Occupancy as a whole-number percentage, rounded down.
    pub fn occupancy_percent(&self) -> u32 {
        if self.total == 0 {
            return 0;
        }
        (self.occupied * 100 / self.total) as u32
    }
}

// ---------------------------------------------------------------------------
// Engine queries
// ---------------------------------------------------------------------------

impl Engine {
    pub fn snapshot(&self) -> FacilitySnapshot {
        let spots: Vec<SpotSnapshot> = self
            .layout
            .spots()
            .iter()
            .map(|s| SpotSnapshot {
                id: s.id,
                zone: s.zone,
                row: s.row,
                col: s.col,
                disabled: s.disabled,
                occupied: s.occupied,
                under_maintenance: self.maintenance.spot_blocked(s),
            })
            .collect();

        let total = spots.len();
        let occupied = spots.iter().filter(|s| s.occupied).count();
        let revenue = self.ledger.totals();

        FacilitySnapshot {
            total,
            occupied,
            available: total - occupied,
            zones: self.zone_stats(&spots, &revenue),
            spots,
            revenue,
            traffic: TrafficSnapshot {
                horizontal: self.traffic.levels(Orientation::Horizontal).to_vec(),
                vertical: self.traffic.levels(Orientation::Vertical).to_vec(),
                histogram: self.traffic.histogram(),
                high_counts: self.traffic.high_counts(),
            },
            maintenance: self.maintenance.clone(),
            pending_commands: self.commands.pending_count(),
            clock: self.sim_state.clock,
            occupancy_ticks: self.sim_state.occupancy_ticks,
            traffic_ticks: self.sim_state.traffic_ticks,
            tickets_issued: self.sim_state.tickets_issued,
        }
    }

    fn zone_stats(&self, spots: &[SpotSnapshot], revenue: &RevenueLedger) -> Vec<ZoneStats> {
        self.layout
            .zone_ids()
            .map(|zone| {
                let (total, occupied) = spots
                    .iter()
                    .filter(|s| s.zone == zone)
                    .fold((0, 0), |(total, occupied), s| {
                        (total + 1, occupied + usize::from(s.occupied))
                    });
                ZoneStats {
                    zone,
                    name: self.layout.zone_name(zone).unwrap_or_default().to_string(),
                    total,
                    occupied,
                    available: total - occupied,
                    revenue: revenue.zone(zone).unwrap_or(Fixed64::ZERO),
                }
            })
            .collect()
    }
}
