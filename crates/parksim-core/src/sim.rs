//! Simulated time, periodic task scheduling and state hashing.
//!
//! The engine runs two periodic tasks on a simulated millisecond clock: the
//! occupancy controller and the ambient traffic pass. A driver either calls
//! `Engine::tick_occupancy()` / `Engine::tick_traffic()` directly (tests,
//! external timers) or hands elapsed time to `Engine::advance(dt)`, which
//! fires every task that came due, in time order.

use crate::controller::TickReport;
use crate::fixed::{Fixed64, Millis};

// ---------------------------------------------------------------------------
// Simulation state
// ---------------------------------------------------------------------------

/// Mutable counters tracked by the engine.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct SimState {
    /// Simulated time.
    pub clock: Millis,
    pub occupancy_ticks: u64,
    pub traffic_ticks: u64,
    /// Tickets committed by the controller; mirrors the ledger's counter.
    pub tickets_issued: u64,
}

impl SimState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total ticks of either kind; stamps events and command history.
    pub fn tick(&self) -> u64 {
        self.occupancy_ticks + self.traffic_ticks
    }
}

// ---------------------------------------------------------------------------
// Scheduler
// ---------------------------------------------------------------------------

/// The two periodic tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskKind {
    Occupancy,
    Traffic,
}

/// A task that fires every `period` milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeriodicTask {
    pub period: Millis,
    pub next_due: Millis,
}

impl PeriodicTask {
    /// First firing one full period after `now`.
    pub fn starting_at(period: Millis, now: Millis) -> Self {
        Self {
            period,
            next_due: now.saturating_add(period),
        }
    }
}

/// Schedules the occupancy and traffic tasks. Stopping cancels both.
#[derive(Debug, Clone)]
pub struct Scheduler {
    occupancy: PeriodicTask,
    traffic: PeriodicTask,
    running: bool,
}

impl Scheduler {
    pub fn new(occupancy_period: Millis, traffic_period: Millis) -> Self {
        Self {
            occupancy: PeriodicTask::starting_at(occupancy_period, 0),
            traffic: PeriodicTask::starting_at(traffic_period, 0),
            running: true,
        }
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn stop(&mut self) {
        self.running = false;
    }

    /// Resume; both tasks restart their period from `now`.
    pub fn start(&mut self, now: Millis) {
        self.running = true;
        self.occupancy = PeriodicTask::starting_at(self.occupancy.period, now);
        self.traffic = PeriodicTask::starting_at(self.traffic.period, now);
    }

    pub fn task(&self, kind: TaskKind) -> PeriodicTask {
        match kind {
            TaskKind::Occupancy => self.occupancy,
            TaskKind::Traffic => self.traffic,
        }
    }

    /// Take the earliest task due at or before `until`, rescheduling it.
    /// Occupancy wins ties. `None` when stopped or nothing is due.
    pub fn pop_due(&mut self, until: Millis) -> Option<(TaskKind, Millis)> {
        if !self.running {
            return None;
        }
        let (kind, task) = if self.occupancy.next_due <= self.traffic.next_due {
            (TaskKind::Occupancy, &mut self.occupancy)
        } else {
            (TaskKind::Traffic, &mut self.traffic)
        };
        if task.next_due > until {
            return None;
        }
        let due = task.next_due;
        task.next_due = due.saturating_add(task.period);
        Some((kind, due))
    }
}

// ---------------------------------------------------------------------------
// Advance result
// ---------------------------------------------------------------------------

/// Result of an `Engine::advance()` call.
#[derive(Debug, Default)]
pub struct AdvanceResult {
    /// One report per occupancy tick that ran.
    pub occupancy_reports: Vec<TickReport>,
    pub traffic_ticks: u64,
}

// ---------------------------------------------------------------------------
// State hash
// ---------------------------------------------------------------------------

/// A simple deterministic hash of simulation state for replay checks.
///
/// Uses FNV-1a (64-bit). Not cryptographic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateHash(pub u64);

impl StateHash {
    const FNV_OFFSET: u64 = 0xcbf29ce484222325;
    const FNV_PRIME: u64 = 0x100000001b3;

    pub fn new() -> Self {
        Self(Self::FNV_OFFSET)
    }

    pub fn write(&mut self, bytes: &[u8]) {
        for &b in bytes {
            self.0 ^= b as u64;
            self.0 = self.0.wrapping_mul(Self::FNV_PRIME);
        }
    }

    pub fn write_u64(&mut self, v: u64) {
        self.write(&v.to_le_bytes());
    }

    pub fn write_u32(&mut self, v: u32) {
        self.write(&v.to_le_bytes());
    }

    pub fn write_bool(&mut self, v: bool) {
        self.write(&[v as u8]);
    }

    pub fn write_fixed64(&mut self, v: Fixed64) {
        self.write(&v.to_bits().to_le_bytes());
    }

    pub fn finish(self) -> u64 {
        self.0
    }
}

impl Default for StateHash {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drain(s: &mut Scheduler, until: Millis) -> Vec<(TaskKind, Millis)> {
        std::iter::from_fn(|| s.pop_due(until)).collect()
    }

    #[test]
    fn tasks_fire_in_time_order() {
        let mut s = Scheduler::new(2000, 3000);
        assert_eq!(
            drain(&mut s, 6000),
            vec![
                (TaskKind::Occupancy, 2000),
                (TaskKind::Traffic, 3000),
                (TaskKind::Occupancy, 4000),
                (TaskKind::Occupancy, 6000),
                (TaskKind::Traffic, 6000),
            ]
        );
        assert_eq!(s.task(TaskKind::Occupancy).next_due, 8000);
        assert_eq!(s.task(TaskKind::Traffic).next_due, 9000);
    }

    #[test]
    fn nothing_due_before_first_period() {
        let mut s = Scheduler::new(2000, 3000);
        assert!(s.pop_due(1999).is_none());
    }

    #[test]
    fn stop_cancels_and_start_reschedules() {
        let mut s = Scheduler::new(2000, 3000);
        s.stop();
        assert!(!s.is_running());
        assert!(s.pop_due(100_000).is_none());

        s.start(10_000);
        assert_eq!(s.pop_due(100_000), Some((TaskKind::Occupancy, 12_000)));
        assert_eq!(s.pop_due(100_000), Some((TaskKind::Traffic, 13_000)));
    }

    #[test]
    fn sim_state_tick_sums_both_counters() {
        let state = SimState {
            occupancy_ticks: 3,
            traffic_ticks: 2,
            ..SimState::new()
        };
        assert_eq!(state.tick(), 5);
    }

    #[test]
    fn state_hash_order_matters() {
        let mut h1 = StateHash::new();
        h1.write_u32(1);
        h1.write_u32(2);

        let mut h2 = StateHash::new();
        h2.write_u32(2);
        h2.write_u32(1);

        assert_ne!(h1.finish(), h2.finish());
    }
}
