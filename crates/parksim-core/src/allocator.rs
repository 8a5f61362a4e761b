//! Free-spot selection under maintenance constraints.

use crate::id::{BlockCoord, Orientation, SpotId};
use crate::layout::{Layout, Spot};
use crate::maintenance::{MaintenanceError, MaintenanceRegistry};
use crate::rng::SimRng;

/// Spots a new vehicle may take: free, in an operable zone, and not
/// individually flagged.
pub fn eligible_spots<'a>(
    layout: &'a Layout,
    maintenance: &'a MaintenanceRegistry,
) -> impl Iterator<Item = &'a Spot> + Clone + 'a {
    layout
        .spots()
        .iter()
        .filter(move |s| !s.occupied && !maintenance.spot_blocked(s))
}

/// Pick a uniformly random eligible spot.
///
/// `None` is the ordinary "full or locked" condition, not an error. Street
/// access is not checked here; see [`streets_clear`].
pub fn find_free(layout: &Layout, maintenance: &MaintenanceRegistry, rng: &mut SimRng) -> Option<SpotId> {
    rng.pick(eligible_spots(layout, maintenance)).map(|s| s.id)
}

/// Whether both streets serving `block` are operable.
pub fn streets_clear(maintenance: &MaintenanceRegistry, block: BlockCoord) -> Result<bool, MaintenanceError> {
    Ok(maintenance.is_street_operable(Orientation::Horizontal, block.row)?
        && maintenance.is_street_operable(Orientation::Vertical, block.col)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FacilityConfig;
    use crate::id::ZoneId;

    fn setup() -> (Layout, MaintenanceRegistry) {
        let layout = Layout::build(&FacilityConfig::reference(), &mut SimRng::new(3)).unwrap();
        let reg = MaintenanceRegistry::new(&layout);
        (layout, reg)
    }

    #[test]
    fn empty_facility_always_finds_a_spot() {
        let (layout, reg) = setup();
        let mut rng = SimRng::new(9);
        for _ in 0..50 {
            assert!(find_free(&layout, &reg, &mut rng).is_some());
        }
    }

    #[test]
    fn never_returns_flagged_zone_or_spot() {
        let (layout, mut reg) = setup();
        reg.set_zone(ZoneId(0), true).unwrap();
        reg.set_zone(ZoneId(2), true).unwrap();
        reg.set_spot(SpotId(10), true).unwrap();
        let mut rng = SimRng::new(11);
        for _ in 0..500 {
            let id = find_free(&layout, &reg, &mut rng).unwrap();
            let spot = layout.spot(id).unwrap();
            assert_ne!(spot.zone, ZoneId(0));
            assert_ne!(spot.zone, ZoneId(2));
            assert_ne!(id, SpotId(10));
        }
    }

    #[test]
    fn never_returns_occupied_spot() {
        let (mut layout, reg) = setup();
        for id in 1..=224 {
            layout.spot_mut(SpotId(id)).unwrap().occupied = true;
        }
        let mut rng = SimRng::new(5);
        assert_eq!(find_free(&layout, &reg, &mut rng), Some(SpotId(225)));
        layout.spot_mut(SpotId(225)).unwrap().occupied = true;
        assert_eq!(find_free(&layout, &reg, &mut rng), None);
    }

    #[test]
    fn all_zones_locked_yields_none() {
        let (layout, mut reg) = setup();
        for zone in layout.zone_ids().collect::<Vec<_>>() {
            reg.set_zone(zone, true).unwrap();
        }
        assert_eq!(eligible_spots(&layout, &reg).count(), 0);
        assert_eq!(find_free(&layout, &reg, &mut SimRng::new(1)), None);
    }

    #[test]
    fn streets_clear_checks_both_orientations() {
        let (_, mut reg) = setup();
        let block = BlockCoord { row: 1, col: 3 };
        assert_eq!(streets_clear(&reg, block), Ok(true));
        reg.set_street(Orientation::Vertical, 3, true).unwrap();
        assert_eq!(streets_clear(&reg, block), Ok(false));
        reg.set_street(Orientation::Vertical, 3, false).unwrap();
        reg.set_street(Orientation::Horizontal, 1, true).unwrap();
        assert_eq!(streets_clear(&reg, block), Ok(false));
        assert!(streets_clear(&reg, BlockCoord { row: 0, col: 7 }).is_err());
    }
}
