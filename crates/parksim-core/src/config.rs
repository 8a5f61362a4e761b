//! Facility configuration and its validation.
//!
//! A [`FacilityConfig`] fully determines a facility: grid geometry, zones,
//! gates, economics, controller tuning and task periods. Validation happens
//! once, at engine construction, and every failure is a [`ConfigError`].

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::fixed::{Fixed64, Millis, Percent, f64_to_fixed64};
use crate::id::SpotId;
use crate::layout::{BLOCK_SIZE, is_street};

/// Largest accepted row or column count.
pub const MAX_DIMENSION: usize = 1024;

/// Largest accepted number of zones or gates (both are `u8` indexed).
pub const MAX_TABLE_LEN: usize = u8::MAX as usize + 1;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Invalid facility configuration. Always fatal at setup.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid layout dimensions {rows}x{cols} (need 2..={MAX_DIMENSION} per side)")]
    InvalidDimensions { rows: usize, cols: usize },
    #[error("facility must define at least one zone")]
    NoZones,
    #[error("too many zones: {0}")]
    TooManyZones(usize),
    #[error("duplicate zone name '{0}'")]
    DuplicateZone(String),
    #[error("too many gates: {0}")]
    TooManyGates(usize),
    #[error("gate '{label}' position {position} is outside the {cells}-cell grid")]
    GateOutOfRange {
        label: String,
        position: usize,
        cells: usize,
    },
    #[error("two gates share position {0}")]
    DuplicateGatePosition(usize),
    #[error("duplicate gate label '{0}'")]
    DuplicateGateLabel(String),
    #[error("gate '{label}' at ({row}, {col}) is not on the street grid")]
    GateOffStreet { label: String, row: usize, col: usize },
    #[error("facility has no {0:?} gate")]
    MissingGateKind(GateKind),
    #[error("{field} must be within [0, 1], got {value}")]
    ProbabilityOutOfRange { field: &'static str, value: f64 },
    #[error("parking rate must not be negative")]
    NegativeRate,
    #[error("invalid target band {min}%..{max}%")]
    InvalidBand { min: u32, max: u32 },
    #[error("invalid density thresholds medium {medium}% / high {high}%")]
    InvalidThresholds { medium: u32, high: u32 },
    #[error("controller gain must be within 1..=100%, got {0}%")]
    InvalidGain(u32),
    #[error("{0} period must be positive")]
    ZeroPeriod(&'static str),
    #[error("duplicate spot id {0}")]
    DuplicateSpotId(SpotId),
}

// ---------------------------------------------------------------------------
// Config types
// ---------------------------------------------------------------------------

/// Whether a gate admits or releases vehicles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GateKind {
    Entry,
    Exit,
}

/// Placement of one gate on the grid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateSpec {
    pub label: String,
    /// Linear cell index, `row * cols + col`.
    pub position: usize,
    pub kind: GateKind,
}

impl GateSpec {
    pub fn new(label: impl Into<String>, position: usize, kind: GateKind) -> Self {
        Self {
            label: label.into(),
            position,
            kind,
        }
    }
}

/// The `[min, max]` occupancy band the controller steers toward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetBand {
    pub min: Percent,
    pub max: Percent,
}

/// Block occupancy above `medium` is Medium traffic, above `high` is High.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DensityThresholds {
    pub medium: Percent,
    pub high: Percent,
}

/// Which traffic writer wins when the ambient and density paths disagree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TrafficPrecedence {
    /// Density updates stick; an ambient pass only rewrites segments with
    /// no density update since the previous ambient pass.
    #[default]
    DensityAuthoritative,
    /// Whichever path wrote most recently wins.
    LastWriteWins,
}

/// Complete description of a simulated facility.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FacilityConfig {
    pub rows: usize,
    pub cols: usize,
    pub zones: Vec<String>,
    pub gates: Vec<GateSpec>,
    pub seed: u64,
    /// Probability that a spot is reserved (accessible parking).
    pub disabled_probability: Fixed64,
    /// Flat amount charged per vehicle at entry.
    pub rate: Fixed64,
    pub band: TargetBand,
    /// Fraction of the gap to the band closed per occupancy tick.
    pub gain: Percent,
    /// Probability of an entry (vs. an exit) while inside the band.
    pub churn_probability: Fixed64,
    pub density: DensityThresholds,
    pub occupancy_period: Millis,
    pub traffic_period: Millis,
    #[serde(default)]
    pub traffic_precedence: TrafficPrecedence,
    pub event_capacity: usize,
    pub command_history: usize,
}

impl FacilityConfig {
    /// The 20x20 reference facility: zones A-E, entries E1/E2 on the top
    /// street, exits S1/S2 on the second horizontal street.
    pub fn reference() -> Self {
        Self {
            rows: 20,
            cols: 20,
            zones: ["A", "B", "C", "D", "E"].iter().map(|z| z.to_string()).collect(),
            gates: vec![
                GateSpec::new("E1", 0, GateKind::Entry),
                GateSpec::new("E2", 19, GateKind::Entry),
                GateSpec::new("S1", 80, GateKind::Exit),
                GateSpec::new("S2", 99, GateKind::Exit),
            ],
            seed: 0x5EED,
            disabled_probability: f64_to_fixed64(0.1),
            rate: f64_to_fixed64(1.4),
            band: TargetBand {
                min: Percent(50),
                max: Percent(90),
            },
            gain: Percent(20),
            churn_probability: f64_to_fixed64(0.5),
            density: DensityThresholds {
                medium: Percent(40),
                high: Percent(70),
            },
            occupancy_period: 2000,
            traffic_period: 3000,
            traffic_precedence: TrafficPrecedence::default(),
            event_capacity: 1024,
            command_history: 0,
        }
    }

    /// Number of horizontal street segments (one per street row).
    pub fn horizontal_segments(&self) -> usize {
        self.rows.div_ceil(BLOCK_SIZE)
    }

    /// Number of vertical street segments (one per street column).
    pub fn vertical_segments(&self) -> usize {
        self.cols.div_ceil(BLOCK_SIZE)
    }

    /// Check every configuration rule. Geometry-dependent gate rules are
    /// checked here too so a layout is never built from a bad config.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(2..=MAX_DIMENSION).contains(&self.rows) || !(2..=MAX_DIMENSION).contains(&self.cols) {
            return Err(ConfigError::InvalidDimensions {
                rows: self.rows,
                cols: self.cols,
            });
        }

        if self.zones.is_empty() {
            return Err(ConfigError::NoZones);
        }
        if self.zones.len() > MAX_TABLE_LEN {
            return Err(ConfigError::TooManyZones(self.zones.len()));
        }
        let mut names = HashSet::new();
        for zone in &self.zones {
            if !names.insert(zone.as_str()) {
                return Err(ConfigError::DuplicateZone(zone.clone()));
            }
        }

        self.validate_gates()?;

        for (field, value) in [
            ("disabled_probability", self.disabled_probability),
            ("churn_probability", self.churn_probability),
        ] {
            if value < Fixed64::ZERO || value > Fixed64::from_num(1) {
                return Err(ConfigError::ProbabilityOutOfRange {
                    field,
                    value: value.to_num::<f64>(),
                });
            }
        }

        if self.rate < Fixed64::ZERO {
            return Err(ConfigError::NegativeRate);
        }

        let TargetBand { min, max } = self.band;
        if min > max || max > Percent::HUNDRED {
            return Err(ConfigError::InvalidBand {
                min: min.get(),
                max: max.get(),
            });
        }

        let DensityThresholds { medium, high } = self.density;
        if medium > high || high > Percent::HUNDRED {
            return Err(ConfigError::InvalidThresholds {
                medium: medium.get(),
                high: high.get(),
            });
        }

        if self.gain == Percent::ZERO || self.gain > Percent::HUNDRED {
            return Err(ConfigError::InvalidGain(self.gain.get()));
        }

        if self.occupancy_period == 0 {
            return Err(ConfigError::ZeroPeriod("occupancy"));
        }
        if self.traffic_period == 0 {
            return Err(ConfigError::ZeroPeriod("traffic"));
        }

        Ok(())
    }

    fn validate_gates(&self) -> Result<(), ConfigError> {
        if self.gates.len() > MAX_TABLE_LEN {
            return Err(ConfigError::TooManyGates(self.gates.len()));
        }

        let cells = self.rows * self.cols;
        let mut positions = HashSet::new();
        let mut labels = HashSet::new();

        for gate in &self.gates {
            if gate.position >= cells {
                return Err(ConfigError::GateOutOfRange {
                    label: gate.label.clone(),
                    position: gate.position,
                    cells,
                });
            }
            if !positions.insert(gate.position) {
                return Err(ConfigError::DuplicateGatePosition(gate.position));
            }
            if !labels.insert(gate.label.as_str()) {
                return Err(ConfigError::DuplicateGateLabel(gate.label.clone()));
            }
            let (row, col) = (gate.position / self.cols, gate.position % self.cols);
            if !is_street(row, col) {
                return Err(ConfigError::GateOffStreet {
                    label: gate.label.clone(),
                    row,
                    col,
                });
            }
        }

        for kind in [GateKind::Entry, GateKind::Exit] {
            if !self.gates.iter().any(|g| g.kind == kind) {
                return Err(ConfigError::MissingGateKind(kind));
            }
        }

        Ok(())
    }
}

impl Default for FacilityConfig {
    fn default() -> Self {
        Self::reference()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reference_config_is_valid() {
        assert_eq!(FacilityConfig::reference().validate(), Ok(()));
    }

    #[test]
    fn reference_segment_counts() {
        let cfg = FacilityConfig::reference();
        assert_eq!(cfg.horizontal_segments(), 5);
        assert_eq!(cfg.vertical_segments(), 5);
    }

    #[test]
    fn rejects_tiny_grid() {
        let cfg = FacilityConfig {
            rows: 1,
            ..FacilityConfig::reference()
        };
        assert_eq!(
            cfg.validate(),
            Err(ConfigError::InvalidDimensions { rows: 1, cols: 20 })
        );
    }

    #[test]
    fn rejects_gate_out_of_range() {
        let mut cfg = FacilityConfig::reference();
        cfg.gates[3].position = 400;
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::GateOutOfRange { position: 400, .. })
        ));
    }

    #[test]
    fn rejects_gate_that_would_replace_a_spot() {
        let mut cfg = FacilityConfig::reference();
        // (1, 1) is a spot cell.
        cfg.gates[0].position = 21;
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::GateOffStreet { row: 1, col: 1, .. })
        ));
    }

    #[test]
    fn rejects_shared_gate_position() {
        let mut cfg = FacilityConfig::reference();
        cfg.gates[1].position = 0;
        assert_eq!(cfg.validate(), Err(ConfigError::DuplicateGatePosition(0)));
    }

    #[test]
    fn rejects_missing_exit() {
        let mut cfg = FacilityConfig::reference();
        cfg.gates.retain(|g| g.kind == GateKind::Entry);
        assert_eq!(
            cfg.validate(),
            Err(ConfigError::MissingGateKind(GateKind::Exit))
        );
    }

    #[test]
    fn rejects_duplicate_zone() {
        let mut cfg = FacilityConfig::reference();
        cfg.zones.push("A".into());
        assert_eq!(cfg.validate(), Err(ConfigError::DuplicateZone("A".into())));
    }

    #[test]
    fn rejects_inverted_band() {
        let mut cfg = FacilityConfig::reference();
        cfg.band = TargetBand {
            min: Percent(80),
            max: Percent(20),
        };
        assert_eq!(
            cfg.validate(),
            Err(ConfigError::InvalidBand { min: 80, max: 20 })
        );
    }

    #[test]
    fn rejects_probability_above_one() {
        let cfg = FacilityConfig {
            disabled_probability: f64_to_fixed64(1.5),
            ..FacilityConfig::reference()
        };
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::ProbabilityOutOfRange {
                field: "disabled_probability",
                ..
            })
        ));
    }

    #[test]
    fn rejects_negative_rate_and_zero_period() {
        let cfg = FacilityConfig {
            rate: f64_to_fixed64(-1.0),
            ..FacilityConfig::reference()
        };
        assert_eq!(cfg.validate(), Err(ConfigError::NegativeRate));

        let cfg = FacilityConfig {
            traffic_period: 0,
            ..FacilityConfig::reference()
        };
        assert_eq!(cfg.validate(), Err(ConfigError::ZeroPeriod("traffic")));
    }

    #[test]
    fn config_round_trips_through_json() {
        let cfg = FacilityConfig::reference();
        let json = serde_json::to_string(&cfg).unwrap();
        let back: FacilityConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(cfg, back);
    }
}
