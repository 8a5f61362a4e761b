//! Serde data file structs for facility definitions.
//!
//! These structs define the on-disk format. Ratios and probabilities are
//! written as decimal fractions (`0.5`), money as a decimal amount (`1.40`),
//! and gates by label with either a linear position or a `(row, col)` pair.
//! The loader converts them into a `FacilityConfig`.

use serde::Deserialize;

// ===========================================================================
// Facility
// ===========================================================================

/// A complete facility file.
#[derive(Debug, Clone, Deserialize)]
pub struct FacilityData {
    pub rows: usize,
    pub cols: usize,
    pub zones: Vec<String>,
    pub gates: Vec<GateData>,
    #[serde(default = "default_seed")]
    pub seed: u64,
    #[serde(default)]
    pub pricing: PricingData,
    #[serde(default)]
    pub control: ControlData,
    #[serde(default)]
    pub traffic: TrafficData,
    #[serde(default)]
    pub timing: TimingData,
    #[serde(default)]
    pub events: EventsData,
    /// Elements that start out under maintenance.
    #[serde(default)]
    pub maintenance: Vec<MaintenanceData>,
}

fn default_seed() -> u64 {
    0x5EED
}

// ===========================================================================
// Gates
// ===========================================================================

/// A gate, placed either by `position` (row-major cell index) or by `row`
/// and `col`.
#[derive(Debug, Clone, Deserialize)]
pub struct GateData {
    pub label: String,
    pub kind: GateKindData,
    #[serde(default)]
    pub position: Option<usize>,
    #[serde(default)]
    pub row: Option<usize>,
    #[serde(default)]
    pub col: Option<usize>,
}

impl GateData {
    /// The placement this entry describes; `None` if it gives neither form
    /// completely, or both.
    pub fn placement(&self) -> Option<GatePlacement> {
        match (self.position, self.row, self.col) {
            (Some(position), None, None) => Some(GatePlacement::Position(position)),
            (None, Some(row), Some(col)) => Some(GatePlacement::Cell { row, col }),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GateKindData {
    Entry,
    Exit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatePlacement {
    Position(usize),
    Cell { row: usize, col: usize },
}

// ===========================================================================
// Tuning sections
// ===========================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct PricingData {
    /// Flat fee charged at entry.
    #[serde(default = "default_rate")]
    pub rate: f64,
    /// Fraction of spots flagged for accessible parking.
    #[serde(default = "default_disabled")]
    pub disabled_fraction: f64,
}

impl Default for PricingData {
    fn default() -> Self {
        Self {
            rate: default_rate(),
            disabled_fraction: default_disabled(),
        }
    }
}

fn default_rate() -> f64 {
    1.4
}

fn default_disabled() -> f64 {
    0.1
}

#[derive(Debug, Clone, Deserialize)]
pub struct ControlData {
    #[serde(default = "default_min")]
    pub min_occupancy: f64,
    #[serde(default = "default_max")]
    pub max_occupancy: f64,
    #[serde(default = "default_gain")]
    pub gain: f64,
    /// Probability of an entry (vs. an exit) inside the band.
    #[serde(default = "default_churn")]
    pub churn: f64,
}

impl Default for ControlData {
    fn default() -> Self {
        Self {
            min_occupancy: default_min(),
            max_occupancy: default_max(),
            gain: default_gain(),
            churn: default_churn(),
        }
    }
}

fn default_min() -> f64 {
    0.5
}

fn default_max() -> f64 {
    0.9
}

fn default_gain() -> f64 {
    0.2
}

fn default_churn() -> f64 {
    0.5
}

#[derive(Debug, Clone, Deserialize)]
pub struct TrafficData {
    #[serde(default = "default_medium")]
    pub medium_above: f64,
    #[serde(default = "default_high")]
    pub high_above: f64,
    #[serde(default)]
    pub precedence: PrecedenceData,
}

impl Default for TrafficData {
    fn default() -> Self {
        Self {
            medium_above: default_medium(),
            high_above: default_high(),
            precedence: PrecedenceData::default(),
        }
    }
}

fn default_medium() -> f64 {
    0.4
}

fn default_high() -> f64 {
    0.7
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrecedenceData {
    #[default]
    DensityAuthoritative,
    LastWriteWins,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TimingData {
    #[serde(default = "default_occupancy_ms")]
    pub occupancy_ms: u64,
    #[serde(default = "default_traffic_ms")]
    pub traffic_ms: u64,
}

impl Default for TimingData {
    fn default() -> Self {
        Self {
            occupancy_ms: default_occupancy_ms(),
            traffic_ms: default_traffic_ms(),
        }
    }
}

fn default_occupancy_ms() -> u64 {
    2000
}

fn default_traffic_ms() -> u64 {
    3000
}

#[derive(Debug, Clone, Deserialize)]
pub struct EventsData {
    #[serde(default = "default_capacity")]
    pub capacity: usize,
    #[serde(default)]
    pub command_history: usize,
}

impl Default for EventsData {
    fn default() -> Self {
        Self {
            capacity: default_capacity(),
            command_history: 0,
        }
    }
}

fn default_capacity() -> usize {
    1024
}

// ===========================================================================
// Maintenance presets
// ===========================================================================

/// One element under maintenance at startup, named the way the maintenance
/// panel names it.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct MaintenanceData {
    pub kind: MaintenanceKindData,
    pub key: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MaintenanceKindData {
    Gate,
    StreetHorizontal,
    StreetVertical,
    Zone,
    Spot,
}
