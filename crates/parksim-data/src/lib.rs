//! Facility definition files for the parking simulation engine.
//!
//! Facilities are described in RON, TOML or JSON (format chosen by file
//! extension) using the human-facing schema in [`schema`], then converted by
//! [`loader`] into a `parksim_core::config::FacilityConfig` or a ready
//! `Engine`.

pub mod loader;
pub mod schema;

pub use loader::{DataLoadError, FacilitySetup, load_engine, load_facility, load_facility_config};
