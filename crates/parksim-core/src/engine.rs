//! The simulation engine: owns the facility and orchestrates both periodic
//! tasks.
//!
//! # Architecture
//!
//! The `Engine` owns:
//! - The [`Layout`] (grid, gates, spots) and its [`MaintenanceRegistry`]
//! - The [`TicketLedger`] and the active assignments, keyed by [`CarId`]
//! - The [`TrafficModel`] and the [`OccupancyController`] tuning
//! - A single seeded [`SimRng`], a [`Scheduler`] and a [`SimState`]
//! - A [`CommandQueue`] for deferred toggles and an [`EventBus`]
//!
//! # Tick structure
//!
//! Both `tick_occupancy()` and `tick_traffic()` run:
//! 1. **Commands** -- apply queued maintenance toggles.
//! 2. **Step** -- one control step, or one ambient traffic pass.
//! 3. **Bookkeeping** -- bump the tick counter; after occupancy ticks, check
//!    invariants.
//! 4. **Delivery** -- hand buffered events to listeners.

use log::{debug, info, warn};
use slotmap::SlotMap;

use crate::command_queue::{AppliedCommand, Command, CommandQueue};
use crate::config::{ConfigError, FacilityConfig, GateKind};
use crate::controller::{AttemptOutcome, OccupancyController, TickReport};
use crate::event::{Event, EventBus, EventFilter, EventKind, PassiveListener, SubscriberPriority};
use crate::fixed::Millis;
use crate::id::{CarId, Orientation, ZoneId};
use crate::layout::Layout;
use crate::ledger::{Ticket, TicketLedger, TicketReceipt};
use crate::maintenance::{MaintenanceError, MaintenanceRegistry, Toggle, ToggleKind};
use crate::rng::SimRng;
use crate::sim::{AdvanceResult, Scheduler, SimState, StateHash, TaskKind};
use crate::traffic::{TrafficLevel, TrafficModel};
use crate::validation::{InvariantViolation, check_invariants, check_unique_spot_ids};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EngineError {
    #[error("invalid facility configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("maintenance: {0}")]
    Maintenance(#[from] MaintenanceError),
    #[error("invariant violated: {0}")]
    Invariant(#[from] InvariantViolation),
}

// ---------------------------------------------------------------------------
// Assignment
// ---------------------------------------------------------------------------

/// A parked vehicle: its ticket and the zone of the spot it holds. Exists
/// exactly while that spot is occupied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Assignment {
    pub ticket: Ticket,
    pub zone: ZoneId,
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct Engine {
    pub(crate) config: FacilityConfig,
    pub(crate) layout: Layout,
    pub(crate) maintenance: MaintenanceRegistry,
    pub(crate) ledger: TicketLedger,

    /// Active assignments. Slot-map iteration order is deterministic for a
    /// given sequence of inserts and removes.
    pub(crate) cars: SlotMap<CarId, Assignment>,

    pub(crate) traffic: TrafficModel,
    pub(crate) controller: OccupancyController,

    /// Drives layout generation first, then every runtime decision.
    pub(crate) rng: SimRng,

    pub(crate) scheduler: Scheduler,
    pub(crate) commands: CommandQueue,

    /// Typed event bus for simulation events.
    pub event_bus: EventBus,

    pub(crate) sim_state: SimState,
}

impl Engine {
    /// Build the facility described by `config`.
    pub fn new(config: FacilityConfig) -> Result<Self, EngineError> {
        let mut rng = SimRng::new(config.seed);
        let layout = Layout::build(&config, &mut rng)?;
        let maintenance = MaintenanceRegistry::new(&layout);
        let traffic = TrafficModel::new(
            layout.segment_count(Orientation::Horizontal),
            layout.segment_count(Orientation::Vertical),
            config.density,
            config.traffic_precedence,
        );

        let engine = Self {
            ledger: TicketLedger::new(config.rate, layout.zone_count()),
            cars: SlotMap::with_key(),
            controller: OccupancyController::from_config(&config),
            scheduler: Scheduler::new(config.occupancy_period, config.traffic_period),
            commands: CommandQueue::new(config.command_history),
            event_bus: EventBus::new(config.event_capacity),
            sim_state: SimState::new(),
            config,
            layout,
            maintenance,
            traffic,
            rng,
        };

        check_unique_spot_ids(&engine)?;
        check_invariants(&engine)?;

        info!(
            "facility built: {}x{} grid, {} spots, {} gates, {} zones",
            engine.layout.rows(),
            engine.layout.cols(),
            engine.layout.total_spots(),
            engine.layout.gates().len(),
            engine.layout.zone_count()
        );
        Ok(engine)
    }

    // -----------------------------------------------------------------------
    // Commands
    // -----------------------------------------------------------------------

    /// Queue a command for the next tick. Toggles are validated now, so a
    /// bad target is reported to the caller rather than at tick time.
    pub fn submit(&mut self, command: Command) -> Result<(), EngineError> {
        match &command {
            Command::Toggle(toggle) => self.maintenance.validate(toggle)?,
        }
        self.commands.push(command, self.sim_state.clock);
        Ok(())
    }

    /// Queue a maintenance toggle.
    pub fn toggle(&mut self, toggle: Toggle) -> Result<(), EngineError> {
        self.submit(Command::Toggle(toggle))
    }

    /// Queue a toggle addressed the way the maintenance panel names things:
    /// gate label, street index, zone name or spot id.
    pub fn toggle_by_key(
        &mut self,
        kind: ToggleKind,
        key: &str,
        under_maintenance: bool,
    ) -> Result<(), EngineError> {
        let toggle = Toggle::parse(kind, key, under_maintenance, &self.layout)?;
        self.toggle(toggle)
    }

    pub fn pending_commands(&self) -> usize {
        self.commands.pending_count()
    }

    /// Recently applied commands, oldest first. Empty unless
    /// `command_history` is configured.
    pub fn command_history(&self) -> impl ExactSizeIterator<Item = &AppliedCommand> + '_ {
        self.commands.history()
    }

    fn apply_pending_commands(&mut self) -> Result<(), EngineError> {
        if self.commands.is_empty() {
            return Ok(());
        }
        let tick = self.sim_state.tick();
        for command in self.commands.drain(tick) {
            match command {
                Command::Toggle(toggle) => {
                    self.maintenance.apply(&toggle)?;
                    debug!(
                        "maintenance {:?} set to {}",
                        toggle.target, toggle.under_maintenance
                    );
                    self.event_bus
                        .emit(Event::MaintenanceApplied { toggle, tick });
                }
            }
        }
        for kind in [GateKind::Entry, GateKind::Exit] {
            if !self.has_open_gate(kind) {
                warn!("every {kind:?} gate is under maintenance");
            }
        }
        Ok(())
    }

    fn has_open_gate(&self, kind: GateKind) -> bool {
        self.layout
            .gates_of_kind(kind)
            .any(|g| self.maintenance.is_gate_operable(g.id))
    }

    // -----------------------------------------------------------------------
    // Ticks
    // -----------------------------------------------------------------------

    /// Run one occupancy tick now, regardless of the scheduler.
    pub fn tick_occupancy(&mut self) -> Result<TickReport, EngineError> {
        self.apply_pending_commands()?;
        let report = self.phase_occupancy()?;
        self.sim_state.occupancy_ticks += 1;
        self.verify()?;
        self.event_bus.deliver();
        Ok(report)
    }

    /// Run one ambient traffic pass now, regardless of the scheduler.
    /// Returns how many segments were rewritten.
    pub fn tick_traffic(&mut self) -> Result<usize, EngineError> {
        self.apply_pending_commands()?;
        let rewritten = self.traffic.ambient_pass(&mut self.rng);
        debug!("ambient traffic pass rewrote {rewritten} segments");
        self.event_bus.emit(Event::TrafficAmbient {
            rewritten,
            tick: self.sim_state.tick(),
        });
        self.sim_state.traffic_ticks += 1;
        self.event_bus.deliver();
        Ok(rewritten)
    }

    /// Advance the simulated clock by `dt` milliseconds, running every task
    /// that comes due in time order. A no-op while stopped.
    pub fn advance(&mut self, dt: Millis) -> Result<AdvanceResult, EngineError> {
        let mut result = AdvanceResult::default();
        if !self.scheduler.is_running() {
            return Ok(result);
        }
        let target = self.sim_state.clock.saturating_add(dt);
        while let Some((kind, due)) = self.scheduler.pop_due(target) {
            self.sim_state.clock = due;
            match kind {
                TaskKind::Occupancy => result.occupancy_reports.push(self.tick_occupancy()?),
                TaskKind::Traffic => {
                    self.tick_traffic()?;
                    result.traffic_ticks += 1;
                }
            }
        }
        self.sim_state.clock = target;
        Ok(result)
    }

    /// A single entry attempt outside the control loop.
    pub fn admit_vehicle(&mut self) -> Result<AttemptOutcome, EngineError> {
        let outcome = self.attempt_entry()?;
        self.verify()?;
        self.event_bus.deliver();
        Ok(outcome)
    }

    /// A single exit attempt outside the control loop.
    pub fn release_vehicle(&mut self) -> Result<AttemptOutcome, EngineError> {
        let outcome = self.attempt_exit()?;
        self.verify()?;
        self.event_bus.deliver();
        Ok(outcome)
    }

    fn verify(&self) -> Result<(), EngineError> {
        check_invariants(self).map_err(|violation| {
            warn!("invariant check failed: {violation}");
            EngineError::from(violation)
        })
    }

    // -----------------------------------------------------------------------
    // Start / Stop
    // -----------------------------------------------------------------------

    /// Resume both periodic tasks; each restarts its period from now.
    pub fn start(&mut self) {
        if self.scheduler.is_running() {
            return;
        }
        self.scheduler.start(self.sim_state.clock);
        info!("simulation started at {} ms", self.sim_state.clock);
    }

    /// Cancel both periodic tasks.
    pub fn stop(&mut self) {
        if !self.scheduler.is_running() {
            return;
        }
        self.scheduler.stop();
        info!("simulation stopped at {} ms", self.sim_state.clock);
    }

    pub fn is_running(&self) -> bool {
        self.scheduler.is_running()
    }

    // -----------------------------------------------------------------------
    // Event system
    // -----------------------------------------------------------------------

    /// Suppress an event kind. Suppressed events are never allocated or buffered.
    pub fn suppress_event(&mut self, kind: EventKind) {
        self.event_bus.suppress(kind);
    }

    /// Register a passive listener for an event kind.
    pub fn on_passive(&mut self, kind: EventKind, listener: PassiveListener) {
        self.event_bus.on_passive(kind, listener);
    }

    pub fn on_passive_filtered(
        &mut self,
        kind: EventKind,
        priority: SubscriberPriority,
        filter: Option<EventFilter>,
        listener: PassiveListener,
    ) {
        self.event_bus
            .on_passive_filtered(kind, priority, filter, listener);
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    pub fn config(&self) -> &FacilityConfig {
        &self.config
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    pub fn maintenance(&self) -> &MaintenanceRegistry {
        &self.maintenance
    }

    pub fn ledger(&self) -> &TicketLedger {
        &self.ledger
    }

    pub fn traffic(&self) -> &TrafficModel {
        &self.traffic
    }

    pub fn sim_state(&self) -> &SimState {
        &self.sim_state
    }

    pub fn clock(&self) -> Millis {
        self.sim_state.clock
    }

    pub fn vehicle_count(&self) -> usize {
        self.cars.len()
    }

    /// Tickets of every parked vehicle, oldest first.
    pub fn active_tickets(&self) -> Vec<Ticket> {
        let mut tickets: Vec<Ticket> = self.cars.values().map(|a| a.ticket).collect();
        tickets.sort_by_key(|t| t.number);
        tickets
    }

    /// Resolve gate label and zone name for `ticket`.
    pub fn receipt(&self, ticket: &Ticket) -> Option<TicketReceipt> {
        let gate = self.layout.gate(ticket.entry_gate)?;
        let zone = self.layout.spot(ticket.spot)?.zone;
        Some(ticket.receipt(&gate.label, self.layout.zone_name(zone)?))
    }

    // -----------------------------------------------------------------------
    // State hash
    // -----------------------------------------------------------------------

    /// Hash of everything a replay must reproduce.
    pub fn state_hash(&self) -> u64 {
        let mut h = StateHash::new();
        h.write_u64(self.sim_state.clock);
        h.write_u64(self.sim_state.occupancy_ticks);
        h.write_u64(self.sim_state.traffic_ticks);
        h.write_u64(self.rng.state());

        for spot in self.layout.spots() {
            h.write_u32(spot.id.0);
            h.write_bool(spot.occupied);
            h.write_bool(self.maintenance.spot_blocked(spot));
        }
        for ticket in self.active_tickets() {
            h.write_u64(ticket.number.0);
            h.write_u64(ticket.entry_time);
            h.write_u32(ticket.spot.0);
            h.write(&[ticket.entry_gate.0]);
        }

        let revenue = self.ledger.revenue();
        h.write_fixed64(revenue.total);
        for &amount in &revenue.per_zone {
            h.write_fixed64(amount);
        }
        h.write_u64(self.ledger.next_number().0);

        for orientation in [Orientation::Horizontal, Orientation::Vertical] {
            for level in self.traffic.levels(orientation) {
                h.write(&[traffic_byte(*level)]);
            }
            for &flag in self.maintenance.streets(orientation) {
                h.write_bool(flag);
            }
        }
        for &flag in self.maintenance.gates() {
            h.write_bool(flag);
        }
        h.finish()
    }
}

fn traffic_byte(level: TrafficLevel) -> u8 {
    match level {
        TrafficLevel::Low => 0,
        TrafficLevel::Medium => 1,
        TrafficLevel::High => 2,
    }
}
