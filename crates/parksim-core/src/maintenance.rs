//! Maintenance flags for gates, street segments, zones and spots.
//!
//! A flag set to `true` means "under maintenance": the element must not take
//! part in any entry or exit. Every flag starts cleared. Flags only change
//! through [`Toggle`]s, which the engine routes through its command queue.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::id::{GateId, Orientation, SpotId, ZoneId};
use crate::layout::{Layout, Spot};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MaintenanceError {
    #[error("unknown gate {0:?}")]
    UnknownGate(GateId),
    #[error("{orientation:?} street index {index} out of bounds (len {len})")]
    StreetOutOfRange {
        orientation: Orientation,
        index: usize,
        len: usize,
    },
    #[error("unknown zone {0:?}")]
    UnknownZone(ZoneId),
    #[error("unknown spot {0}")]
    UnknownSpot(SpotId),
    #[error("cannot resolve {kind:?} key '{key}'")]
    InvalidKey { kind: ToggleKind, key: String },
}

// ---------------------------------------------------------------------------
// Toggles
// ---------------------------------------------------------------------------

/// The kind of element a toggle targets, as named by the UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ToggleKind {
    Gate,
    StreetHorizontal,
    StreetVertical,
    Zone,
    Spot,
}

/// A resolved maintenance target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ToggleTarget {
    Gate(GateId),
    Street(Orientation, usize),
    Zone(ZoneId),
    Spot(SpotId),
}

impl ToggleTarget {
    pub fn kind(&self) -> ToggleKind {
        match self {
            ToggleTarget::Gate(_) => ToggleKind::Gate,
            ToggleTarget::Street(Orientation::Horizontal, _) => ToggleKind::StreetHorizontal,
            ToggleTarget::Street(Orientation::Vertical, _) => ToggleKind::StreetVertical,
            ToggleTarget::Zone(_) => ToggleKind::Zone,
            ToggleTarget::Spot(_) => ToggleKind::Spot,
        }
    }
}

/// Set or clear the maintenance flag of one element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Toggle {
    pub target: ToggleTarget,
    pub under_maintenance: bool,
}

impl Toggle {
    pub fn new(target: ToggleTarget, under_maintenance: bool) -> Self {
        Self {
            target,
            under_maintenance,
        }
    }

    /// Resolve a UI-level `(kind, key, value)` triple against `layout`.
    ///
    /// Keys are gate labels (`"E1"`), zero-based street indices (`"3"`),
    /// zone names (`"B"`) and spot ids (`"42"`).
    pub fn parse(
        kind: ToggleKind,
        key: &str,
        under_maintenance: bool,
        layout: &Layout,
    ) -> Result<Self, MaintenanceError> {
        let invalid = || MaintenanceError::InvalidKey {
            kind,
            key: key.to_string(),
        };
        let target = match kind {
            ToggleKind::Gate => ToggleTarget::Gate(layout.gate_by_label(key).ok_or_else(invalid)?.id),
            ToggleKind::StreetHorizontal => ToggleTarget::Street(
                Orientation::Horizontal,
                key.trim().parse().map_err(|_| invalid())?,
            ),
            ToggleKind::StreetVertical => ToggleTarget::Street(
                Orientation::Vertical,
                key.trim().parse().map_err(|_| invalid())?,
            ),
            ToggleKind::Zone => ToggleTarget::Zone(layout.zone_by_name(key).ok_or_else(invalid)?),
            ToggleKind::Spot => ToggleTarget::Spot(SpotId(key.trim().parse().map_err(|_| invalid())?)),
        };
        Ok(Self::new(target, under_maintenance))
    }
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Current maintenance flags. Cloned wholesale into snapshots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaintenanceRegistry {
    gates: Vec<bool>,
    horizontal: Vec<bool>,
    vertical: Vec<bool>,
    zones: Vec<bool>,
    /// Only spots that have ever been toggled appear here.
    spots: BTreeMap<SpotId, bool>,
    spot_count: usize,
}

impl MaintenanceRegistry {
    /// All-operable registry sized for `layout`.
    pub fn new(layout: &Layout) -> Self {
        Self {
            gates: vec![false; layout.gates().len()],
            horizontal: vec![false; layout.segment_count(Orientation::Horizontal)],
            vertical: vec![false; layout.segment_count(Orientation::Vertical)],
            zones: vec![false; layout.zone_count()],
            spots: BTreeMap::new(),
            spot_count: layout.total_spots(),
        }
    }

    // -- Mutation --

    pub fn set_gate(&mut self, gate: GateId, under_maintenance: bool) -> Result<(), MaintenanceError> {
        let flag = self
            .gates
            .get_mut(gate.index())
            .ok_or(MaintenanceError::UnknownGate(gate))?;
        *flag = under_maintenance;
        Ok(())
    }

    pub fn set_street(
        &mut self,
        orientation: Orientation,
        index: usize,
        under_maintenance: bool,
    ) -> Result<(), MaintenanceError> {
        let streets = match orientation {
            Orientation::Horizontal => &mut self.horizontal,
            Orientation::Vertical => &mut self.vertical,
        };
        let len = streets.len();
        let flag = streets
            .get_mut(index)
            .ok_or(MaintenanceError::StreetOutOfRange {
                orientation,
                index,
                len,
            })?;
        *flag = under_maintenance;
        Ok(())
    }

    pub fn set_zone(&mut self, zone: ZoneId, under_maintenance: bool) -> Result<(), MaintenanceError> {
        let flag = self
            .zones
            .get_mut(zone.index())
            .ok_or(MaintenanceError::UnknownZone(zone))?;
        *flag = under_maintenance;
        Ok(())
    }

    pub fn set_spot(&mut self, spot: SpotId, under_maintenance: bool) -> Result<(), MaintenanceError> {
        self.check_spot(spot)?;
        self.spots.insert(spot, under_maintenance);
        Ok(())
    }

    /// Check that `toggle` names an element this registry knows about.
    pub fn validate(&self, toggle: &Toggle) -> Result<(), MaintenanceError> {
        match toggle.target {
            ToggleTarget::Gate(gate) if gate.index() >= self.gates.len() => {
                Err(MaintenanceError::UnknownGate(gate))
            }
            ToggleTarget::Street(orientation, index) => {
                let len = self.streets(orientation).len();
                if index >= len {
                    Err(MaintenanceError::StreetOutOfRange {
                        orientation,
                        index,
                        len,
                    })
                } else {
                    Ok(())
                }
            }
            ToggleTarget::Zone(zone) if zone.index() >= self.zones.len() => {
                Err(MaintenanceError::UnknownZone(zone))
            }
            ToggleTarget::Spot(spot) => self.check_spot(spot),
            _ => Ok(()),
        }
    }

    /// Apply one toggle.
    pub fn apply(&mut self, toggle: &Toggle) -> Result<(), MaintenanceError> {
        let value = toggle.under_maintenance;
        match toggle.target {
            ToggleTarget::Gate(gate) => self.set_gate(gate, value),
            ToggleTarget::Street(orientation, index) => self.set_street(orientation, index, value),
            ToggleTarget::Zone(zone) => self.set_zone(zone, value),
            ToggleTarget::Spot(spot) => self.set_spot(spot, value),
        }
    }

    fn check_spot(&self, spot: SpotId) -> Result<(), MaintenanceError> {
        match spot.index() {
            Some(idx) if idx < self.spot_count => Ok(()),
            _ => Err(MaintenanceError::UnknownSpot(spot)),
        }
    }

    // -- Queries --

    /// Unknown gates are reported as not operable.
    pub fn is_gate_operable(&self, gate: GateId) -> bool {
        self.gates.get(gate.index()).is_some_and(|&m| !m)
    }

    /// Street queries are bounds-checked: an out-of-range index is a caller bug.
    pub fn is_street_operable(&self, orientation: Orientation, index: usize) -> Result<bool, MaintenanceError> {
        let streets = self.streets(orientation);
        streets
            .get(index)
            .map(|&m| !m)
            .ok_or(MaintenanceError::StreetOutOfRange {
                orientation,
                index,
                len: streets.len(),
            })
    }

    /// Unknown zones are reported as not operable.
    pub fn is_zone_operable(&self, zone: ZoneId) -> bool {
        self.zones.get(zone.index()).is_some_and(|&m| !m)
    }

    pub fn is_spot_operable(&self, spot: SpotId) -> bool {
        !self.spots.get(&spot).copied().unwrap_or(false)
    }

    /// A spot is blocked when its own flag or its zone's flag is set.
    pub fn spot_blocked(&self, spot: &Spot) -> bool {
        !self.is_zone_operable(spot.zone) || !self.is_spot_operable(spot.id)
    }

    // -- Read access for snapshots --

    pub fn gates(&self) -> &[bool] {
        &self.gates
    }

    pub fn streets(&self, orientation: Orientation) -> &[bool] {
        match orientation {
            Orientation::Horizontal => &self.horizontal,
            Orientation::Vertical => &self.vertical,
        }
    }

    pub fn zones(&self) -> &[bool] {
        &self.zones
    }

    /// Spots currently under maintenance.
    pub fn spots_under_maintenance(&self) -> impl Iterator<Item = SpotId> + '_ {
        self.spots.iter().filter(|(_, m)| **m).map(|(id, _)| *id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FacilityConfig;
    use crate::rng::SimRng;

    fn layout() -> Layout {
        Layout::build(&FacilityConfig::reference(), &mut SimRng::new(1)).unwrap()
    }

    #[test]
    fn defaults_are_operable() {
        let layout = layout();
        let reg = MaintenanceRegistry::new(&layout);
        assert!(reg.is_gate_operable(GateId(0)));
        assert_eq!(reg.is_street_operable(Orientation::Vertical, 4), Ok(true));
        assert!(reg.is_zone_operable(ZoneId(4)));
        assert!(reg.is_spot_operable(SpotId(225)));
        assert_eq!(reg.streets(Orientation::Horizontal).len(), 5);
    }

    #[test]
    fn set_and_clear_each_kind() {
        let layout = layout();
        let mut reg = MaintenanceRegistry::new(&layout);

        reg.set_gate(GateId(1), true).unwrap();
        reg.set_street(Orientation::Horizontal, 2, true).unwrap();
        reg.set_zone(ZoneId(3), true).unwrap();
        reg.set_spot(SpotId(7), true).unwrap();

        assert!(!reg.is_gate_operable(GateId(1)));
        assert_eq!(reg.is_street_operable(Orientation::Horizontal, 2), Ok(false));
        assert!(!reg.is_zone_operable(ZoneId(3)));
        assert!(!reg.is_spot_operable(SpotId(7)));
        assert_eq!(reg.spots_under_maintenance().collect::<Vec<_>>(), vec![SpotId(7)]);

        reg.set_spot(SpotId(7), false).unwrap();
        assert!(reg.is_spot_operable(SpotId(7)));
        assert_eq!(reg.spots_under_maintenance().count(), 0);
    }

    #[test]
    fn street_out_of_range_is_an_error() {
        let layout = layout();
        let mut reg = MaintenanceRegistry::new(&layout);
        let err = reg.set_street(Orientation::Vertical, 5, true).unwrap_err();
        assert_eq!(
            err,
            MaintenanceError::StreetOutOfRange {
                orientation: Orientation::Vertical,
                index: 5,
                len: 5,
            }
        );
        assert!(reg.is_street_operable(Orientation::Horizontal, 99).is_err());
    }

    #[test]
    fn unknown_ids_are_rejected() {
        let layout = layout();
        let mut reg = MaintenanceRegistry::new(&layout);
        assert_eq!(reg.set_gate(GateId(9), true), Err(MaintenanceError::UnknownGate(GateId(9))));
        assert_eq!(reg.set_zone(ZoneId(5), true), Err(MaintenanceError::UnknownZone(ZoneId(5))));
        assert_eq!(reg.set_spot(SpotId(0), true), Err(MaintenanceError::UnknownSpot(SpotId(0))));
        assert_eq!(reg.set_spot(SpotId(226), true), Err(MaintenanceError::UnknownSpot(SpotId(226))));
        assert!(!reg.is_gate_operable(GateId(9)));
    }

    #[test]
    fn zone_flag_blocks_its_spots() {
        let layout = layout();
        let mut reg = MaintenanceRegistry::new(&layout);
        let spot = layout.spot(SpotId(1)).unwrap();
        assert!(!reg.spot_blocked(spot));
        reg.set_zone(spot.zone, true).unwrap();
        assert!(reg.spot_blocked(spot));
    }

    #[test]
    fn parse_ui_keys() {
        let layout = layout();
        let t = Toggle::parse(ToggleKind::Gate, "S1", true, &layout).unwrap();
        assert_eq!(t.target, ToggleTarget::Gate(GateId(2)));
        let t = Toggle::parse(ToggleKind::StreetVertical, "3", false, &layout).unwrap();
        assert_eq!(t.target, ToggleTarget::Street(Orientation::Vertical, 3));
        assert_eq!(t.target.kind(), ToggleKind::StreetVertical);
        let t = Toggle::parse(ToggleKind::Zone, "E", true, &layout).unwrap();
        assert_eq!(t.target, ToggleTarget::Zone(ZoneId(4)));
        let t = Toggle::parse(ToggleKind::Spot, "42", true, &layout).unwrap();
        assert_eq!(t.target, ToggleTarget::Spot(SpotId(42)));

        assert!(matches!(
            Toggle::parse(ToggleKind::Gate, "X9", true, &layout),
            Err(MaintenanceError::InvalidKey { kind: ToggleKind::Gate, .. })
        ));
        assert!(Toggle::parse(ToggleKind::StreetHorizontal, "north", true, &layout).is_err());
    }

    #[test]
    fn validate_does_not_mutate() {
        let layout = layout();
        let reg = MaintenanceRegistry::new(&layout);
        let bad = Toggle::new(ToggleTarget::Street(Orientation::Horizontal, 5), true);
        assert!(reg.validate(&bad).is_err());
        let good = Toggle::new(ToggleTarget::Zone(ZoneId(0)), true);
        assert_eq!(reg.validate(&good), Ok(()));
        assert!(reg.is_zone_operable(ZoneId(0)));
    }
}
