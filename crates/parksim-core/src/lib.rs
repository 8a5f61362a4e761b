//! Parksim Core -- a deterministic parking facility simulation engine.
//!
//! The facility is a grid of street lines every fourth row and column, with
//! parking spots filling the blocks between them and gates on the streets.
//! A target-seeking controller admits and releases vehicles to keep
//! occupancy inside a band, revenue accrues per zone, maintenance flags can
//! take any gate, street, zone or spot out of service, and street traffic is
//! derived from local occupancy density.
//!
//! # Tasks
//!
//! Two periodic tasks run on a simulated millisecond clock:
//!
//! 1. **Occupancy** (every 2000 ms by default) -- apply queued toggles, run
//!    one control step, check invariants, deliver events.
//! 2. **Traffic** (every 3000 ms by default) -- apply queued toggles, run one
//!    ambient traffic pass, deliver events.
//!
//! Drive them with [`engine::Engine::advance`], or call
//! [`engine::Engine::tick_occupancy`] / [`engine::Engine::tick_traffic`]
//! directly.
//!
//! # Key Types
//!
//! - [`engine::Engine`] -- Owns the facility and runs both tasks.
//! - [`layout::Layout`] -- Grid classification, gates, spots and zones.
//! - [`maintenance::MaintenanceRegistry`] -- Per-element maintenance flags.
//! - [`controller::OccupancyController`] -- The band-seeking control law.
//! - [`ledger::TicketLedger`] -- Ticket numbering and per-zone revenue.
//! - [`traffic::TrafficModel`] -- Ambient and density-driven street levels.
//! - [`query::FacilitySnapshot`] -- Owned read-only view for dashboards.
//! - [`fixed::Fixed64`] -- Q32.32 fixed-point type for exact money sums.

pub mod allocator;
pub mod command_queue;
pub mod config;
pub mod controller;
pub mod engine;
pub mod event;
pub mod fixed;
pub mod id;
pub mod layout;
pub mod ledger;
pub mod maintenance;
pub mod query;
pub mod rng;
pub mod sim;
pub mod traffic;
pub mod validation;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
