//! The occupancy control loop.
//!
//! Each occupancy tick compares the occupancy ratio with the target band:
//!
//! 1. Below the band: admit `ceil((min - ratio) * total * gain)` vehicles.
//! 2. Above the band: release `ceil((ratio - max) * total * gain)` vehicles.
//! 3. Inside the band: one entry or one exit, chosen by the churn
//!    probability, so the facility never freezes at equilibrium.
//!
//! Every attempt is independent. A failed precondition (no open gate, no
//! eligible spot, blocked street, nobody parked) skips that one attempt and
//! is recorded in the [`TickReport`]; nothing is retried within the tick.

use log::debug;

use crate::allocator::{find_free, streets_clear};
use crate::config::{FacilityConfig, GateKind, TargetBand};
use crate::engine::{Assignment, Engine, EngineError};
use crate::event::Event;
use crate::fixed::{Fixed64, Percent, ceil_div};
use crate::id::{BlockCoord, GateId};
use crate::ledger::Ticket;
use crate::rng::SimRng;

// ---------------------------------------------------------------------------
// Decisions and outcomes
// ---------------------------------------------------------------------------

/// What the controller decided to do this tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlDecision {
    /// Below the band: attempt this many entries.
    Admit(u64),
    /// Above the band: attempt this many exits.
    Release(u64),
    /// Inside the band: one entry.
    ChurnEntry,
    /// Inside the band: one exit.
    ChurnExit,
}

/// Why a single attempt did nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SkipReason {
    NoEntryGate,
    NoExitGate,
    NoFreeSpot,
    StreetBlocked,
    NoVehicles,
}

/// Outcome of one entry or exit attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptOutcome {
    Entered(Ticket),
    Exited(Ticket),
    Skipped(SkipReason),
}

/// Summary of one occupancy tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TickReport {
    pub decision: ControlDecision,
    pub entered: Vec<Ticket>,
    pub exited: Vec<Ticket>,
    pub skipped: Vec<SkipReason>,
}

impl TickReport {
    fn new(decision: ControlDecision) -> Self {
        Self {
            decision,
            entered: Vec::new(),
            exited: Vec::new(),
            skipped: Vec::new(),
        }
    }

    fn record(&mut self, outcome: AttemptOutcome) {
        match outcome {
            AttemptOutcome::Entered(ticket) => self.entered.push(ticket),
            AttemptOutcome::Exited(ticket) => self.exited.push(ticket),
            AttemptOutcome::Skipped(reason) => self.skipped.push(reason),
        }
    }

    /// How many attempts were skipped for `reason`.
    pub fn skipped_for(&self, reason: SkipReason) -> usize {
        self.skipped.iter().filter(|&&r| r == reason).count()
    }
}

// ---------------------------------------------------------------------------
// Controller
// ---------------------------------------------------------------------------

/// Controller tuning. Holds no per-tick state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OccupancyController {
    pub band: TargetBand,
    pub gain: Percent,
    pub churn_probability: Fixed64,
}

impl OccupancyController {
    pub fn new(band: TargetBand, gain: Percent, churn_probability: Fixed64) -> Self {
        Self {
            band,
            gain,
            churn_probability,
        }
    }

    pub fn from_config(config: &FacilityConfig) -> Self {
        Self::new(config.band, config.gain, config.churn_probability)
    }

    /// Decide this tick's action for `occupied` of `total` spots.
    ///
    /// Only consumes randomness inside the band.
    pub fn decide(&self, occupied: usize, total: usize, rng: &mut SimRng) -> ControlDecision {
        let (occupied, total) = (occupied as u64, total as u64);
        let gain = u64::from(self.gain.get());

        if self.band.min.undershot_by(occupied, total) {
            // (min% * total - 100 * occupied) * gain% / 100^2, rounded up.
            let deficit = u64::from(self.band.min.get()) * total - 100 * occupied;
            ControlDecision::Admit(ceil_div(deficit * gain, 100 * 100))
        } else if self.band.max.exceeded_by(occupied, total) {
            let surplus = 100 * occupied - u64::from(self.band.max.get()) * total;
            ControlDecision::Release(ceil_div(surplus * gain, 100 * 100))
        } else if rng.chance(self.churn_probability) {
            ControlDecision::ChurnEntry
        } else {
            ControlDecision::ChurnExit
        }
    }
}

// ---------------------------------------------------------------------------
// Engine integration
// ---------------------------------------------------------------------------

impl Engine {
    /// Run one control step against the current state.
    pub(crate) fn phase_occupancy(&mut self) -> Result<TickReport, EngineError> {
        let decision = self.controller.decide(
            self.layout.occupied_count(),
            self.layout.total_spots(),
            &mut self.rng,
        );
        debug!(
            "occupancy tick {}: {}/{} occupied, decision {:?}",
            self.sim_state.occupancy_ticks,
            self.layout.occupied_count(),
            self.layout.total_spots(),
            decision
        );

        let mut report = TickReport::new(decision);
        match decision {
            ControlDecision::Admit(n) => {
                for _ in 0..n {
                    report.record(self.attempt_entry()?);
                }
            }
            ControlDecision::Release(n) => {
                for _ in 0..n {
                    report.record(self.attempt_exit()?);
                }
            }
            ControlDecision::ChurnEntry => report.record(self.attempt_entry()?),
            ControlDecision::ChurnExit => report.record(self.attempt_exit()?),
        }
        Ok(report)
    }

    fn open_gate(&mut self, kind: GateKind) -> Option<GateId> {
        let maintenance = &self.maintenance;
        let open = self
            .layout
            .gates_of_kind(kind)
            .filter(|g| maintenance.is_gate_operable(g.id));
        self.rng.pick(open).map(|g| g.id)
    }

    /// One entry attempt: gate, spot, street access, then commit.
    pub(crate) fn attempt_entry(&mut self) -> Result<AttemptOutcome, EngineError> {
        let Some(gate) = self.open_gate(GateKind::Entry) else {
            return Ok(skip(SkipReason::NoEntryGate));
        };
        let Some(spot_id) = find_free(&self.layout, &self.maintenance, &mut self.rng) else {
            return Ok(skip(SkipReason::NoFreeSpot));
        };
        let Some((zone, block)) = self.layout.spot(spot_id).map(|s| (s.zone, s.block())) else {
            return Ok(skip(SkipReason::NoFreeSpot));
        };
        if !streets_clear(&self.maintenance, block)? {
            return Ok(skip(SkipReason::StreetBlocked));
        }

        // Accrue first: a revenue failure must leave the spot and the
        // ticket counter untouched.
        self.ledger.record(zone)?;
        if let Some(spot) = self.layout.spot_mut(spot_id) {
            spot.occupied = true;
        }
        let ticket = self.ledger.issue(gate, spot_id, self.sim_state.clock);
        self.sim_state.tickets_issued += 1;
        self.cars.insert(Assignment { ticket, zone });
        self.notify_traffic(block);

        debug!("ticket {} issued at gate {:?} for spot {}", ticket.number, gate, spot_id);
        self.event_bus.emit(Event::TicketIssued {
            ticket,
            zone,
            tick: self.sim_state.tick(),
        });
        Ok(AttemptOutcome::Entered(ticket))
    }

    /// One exit attempt: vehicle present, gate, street access, then release.
    pub(crate) fn attempt_exit(&mut self) -> Result<AttemptOutcome, EngineError> {
        if self.cars.is_empty() {
            return Ok(skip(SkipReason::NoVehicles));
        }
        let Some(gate) = self.open_gate(GateKind::Exit) else {
            return Ok(skip(SkipReason::NoExitGate));
        };
        let idx = self.rng.next_below(self.cars.len());
        let Some((car, assignment)) = self.cars.iter().nth(idx) else {
            return Ok(skip(SkipReason::NoVehicles));
        };
        let ticket = assignment.ticket;
        let Some(block) = self.layout.spot(ticket.spot).map(|s| s.block()) else {
            return Ok(skip(SkipReason::NoVehicles));
        };
        if !streets_clear(&self.maintenance, block)? {
            return Ok(skip(SkipReason::StreetBlocked));
        }

        self.cars.remove(car);
        if let Some(spot) = self.layout.spot_mut(ticket.spot) {
            spot.occupied = false;
        }
        self.notify_traffic(block);

        debug!("ticket {} left through gate {:?}", ticket.number, gate);
        self.event_bus.emit(Event::VehicleExited {
            ticket: ticket.number,
            spot: ticket.spot,
            exit_gate: gate,
            tick: self.sim_state.tick(),
        });
        Ok(AttemptOutcome::Exited(ticket))
    }

    fn notify_traffic(&mut self, block: BlockCoord) {
        let (occupied, total) = self.layout.block_occupancy(block);
        let level = self.traffic.on_block_changed(block, occupied, total);
        self.event_bus.emit(Event::TrafficDensity {
            block,
            level,
            tick: self.sim_state.tick(),
        });
    }
}

fn skip(reason: SkipReason) -> AttemptOutcome {
    debug!("attempt skipped: {reason:?}");
    AttemptOutcome::Skipped(reason)
}
