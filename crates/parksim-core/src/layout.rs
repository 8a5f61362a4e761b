//! Static facility geometry: which cells are gates, streets or spots.
//!
//! The grid is divided into 4x4 blocks. Every fourth row is a horizontal
//! street and every fourth column a vertical street; the remaining cells of
//! each block are parking spots. Gates sit on street cells and take priority
//! over the street rule when the cell is classified.

use serde::{Deserialize, Serialize};

use crate::config::{ConfigError, FacilityConfig, GateKind};
use crate::id::{BlockCoord, GateId, Orientation, SpotId, ZoneId};
use crate::rng::SimRng;

/// Side length of a block, street row/column included.
pub const BLOCK_SIZE: usize = 4;

/// Whether the cell at `(row, col)` lies on the street grid.
pub fn is_street(row: usize, col: usize) -> bool {
    row % BLOCK_SIZE == 0 || col % BLOCK_SIZE == 0
}

/// Orientation of the street at `(row, col)`, or `None` for non-street cells.
/// Intersections count as horizontal.
pub fn street_orientation(row: usize, col: usize) -> Option<Orientation> {
    if row % BLOCK_SIZE == 0 {
        Some(Orientation::Horizontal)
    } else if col % BLOCK_SIZE == 0 {
        Some(Orientation::Vertical)
    } else {
        None
    }
}

/// Zone assignment: zones cycle diagonally across blocks.
pub fn zone_for(row: usize, col: usize, zone_count: usize) -> ZoneId {
    let idx = (row / BLOCK_SIZE + col / BLOCK_SIZE) % zone_count.max(1);
    ZoneId(idx as u8)
}

// ---------------------------------------------------------------------------
// Cells, gates, spots
// ---------------------------------------------------------------------------

/// Classification of one grid cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Cell {
    Gate(GateId),
    Street(Orientation),
    Spot(SpotId),
}

/// An entry or exit point.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Gate {
    pub id: GateId,
    pub label: String,
    pub row: usize,
    pub col: usize,
    pub kind: GateKind,
}

/// A single parking space. Only `occupied` changes after construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Spot {
    pub id: SpotId,
    pub zone: ZoneId,
    pub row: usize,
    pub col: usize,
    /// Reserved (accessible) spot. Informational; does not affect allocation.
    pub disabled: bool,
    pub occupied: bool,
}

impl Spot {
    /// The block this spot belongs to; also the indices of its streets.
    pub fn block(&self) -> BlockCoord {
        BlockCoord {
            row: self.row / BLOCK_SIZE,
            col: self.col / BLOCK_SIZE,
        }
    }
}

// ---------------------------------------------------------------------------
// Layout
// ---------------------------------------------------------------------------

/// The built facility grid.
#[derive(Debug, Clone)]
pub struct Layout {
    rows: usize,
    cols: usize,
    cells: Vec<Cell>,
    gates: Vec<Gate>,
    spots: Vec<Spot>,
    zone_names: Vec<String>,
}

impl Layout {
    /// Build the grid described by `config`. Disabled-spot flags are drawn
    /// from `rng`, so the same seed always yields the same layout.
    pub fn build(config: &FacilityConfig, rng: &mut SimRng) -> Result<Self, ConfigError> {
        config.validate()?;

        let (rows, cols) = (config.rows, config.cols);
        let mut cells = Vec::with_capacity(rows * cols);
        let mut spots = Vec::new();

        let gates: Vec<Gate> = config
            .gates
            .iter()
            .enumerate()
            .map(|(i, spec)| Gate {
                id: GateId(i as u8),
                label: spec.label.clone(),
                row: spec.position / cols,
                col: spec.position % cols,
                kind: spec.kind,
            })
            .collect();

        for row in 0..rows {
            for col in 0..cols {
                let position = row * cols + col;
                if let Some(idx) = config.gates.iter().position(|g| g.position == position) {
                    cells.push(Cell::Gate(GateId(idx as u8)));
                } else if let Some(orientation) = street_orientation(row, col) {
                    cells.push(Cell::Street(orientation));
                } else {
                    let id = SpotId(spots.len() as u32 + 1);
                    spots.push(Spot {
                        id,
                        zone: zone_for(row, col, config.zones.len()),
                        row,
                        col,
                        disabled: rng.chance(config.disabled_probability),
                        occupied: false,
                    });
                    cells.push(Cell::Spot(id));
                }
            }
        }

        Ok(Self {
            rows,
            cols,
            cells,
            gates,
            spots,
            zone_names: config.zones.clone(),
        })
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Classification of the cell at `(row, col)`.
    pub fn cell(&self, row: usize, col: usize) -> Option<Cell> {
        if row >= self.rows || col >= self.cols {
            return None;
        }
        self.cells.get(row * self.cols + col).copied()
    }

    // -- Gates --

    pub fn gates(&self) -> &[Gate] {
        &self.gates
    }

    pub fn gate(&self, id: GateId) -> Option<&Gate> {
        self.gates.get(id.index())
    }

    pub fn gate_by_label(&self, label: &str) -> Option<&Gate> {
        self.gates.iter().find(|g| g.label == label)
    }

    pub fn gates_of_kind(&self, kind: GateKind) -> impl Iterator<Item = &Gate> + Clone {
        self.gates.iter().filter(move |g| g.kind == kind)
    }

    // -- Spots --

    pub fn spots(&self) -> &[Spot] {
        &self.spots
    }

    pub fn spot(&self, id: SpotId) -> Option<&Spot> {
        self.spots.get(id.index()?).filter(|s| s.id == id)
    }

    pub(crate) fn spot_mut(&mut self, id: SpotId) -> Option<&mut Spot> {
        self.spots.get_mut(id.index()?).filter(|s| s.id == id)
    }

    pub fn total_spots(&self) -> usize {
        self.spots.len()
    }

    pub fn occupied_count(&self) -> usize {
        self.spots.iter().filter(|s| s.occupied).count()
    }

    /// `(occupied, total)` spot counts for one block.
    pub fn block_occupancy(&self, block: BlockCoord) -> (usize, usize) {
        self.spots
            .iter()
            .filter(|s| s.block() == block)
            .fold((0, 0), |(occupied, total), s| {
                (occupied + usize::from(s.occupied), total + 1)
            })
    }

    // -- Zones --

    pub fn zone_count(&self) -> usize {
        self.zone_names.len()
    }

    pub fn zone_ids(&self) -> impl Iterator<Item = ZoneId> + '_ {
        (0..self.zone_names.len()).map(|i| ZoneId(i as u8))
    }

    pub fn zone_name(&self, zone: ZoneId) -> Option<&str> {
        self.zone_names.get(zone.index()).map(String::as_str)
    }

    pub fn spots_in_zone(&self, zone: ZoneId) -> impl Iterator<Item = &Spot> + '_ {
        self.spots.iter().filter(move |s| s.zone == zone)
    }

    pub fn zone_by_name(&self, name: &str) -> Option<ZoneId> {
        self.zone_names
            .iter()
            .position(|z| z == name)
            .map(|i| ZoneId(i as u8))
    }

    // -- Streets --

    /// Number of street segments in the given orientation.
    pub fn segment_count(&self, orientation: Orientation) -> usize {
        match orientation {
            Orientation::Horizontal => self.rows.div_ceil(BLOCK_SIZE),
            Orientation::Vertical => self.cols.div_ceil(BLOCK_SIZE),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reference_layout(seed: u64) -> Layout {
        let cfg = FacilityConfig {
            seed,
            ..FacilityConfig::reference()
        };
        Layout::build(&cfg, &mut SimRng::new(seed)).unwrap()
    }

    #[test]
    fn street_rule() {
        assert!(is_street(0, 3));
        assert!(is_street(5, 8));
        assert!(!is_street(5, 7));
        assert_eq!(street_orientation(4, 4), Some(Orientation::Horizontal));
        assert_eq!(street_orientation(5, 4), Some(Orientation::Vertical));
        assert_eq!(street_orientation(5, 5), None);
    }

    #[test]
    fn reference_has_225_spots() {
        let layout = reference_layout(1);
        // 15 non-street rows x 15 non-street columns.
        assert_eq!(layout.total_spots(), 225);
    }

    #[test]
    fn spot_ids_are_sequential_row_major() {
        let layout = reference_layout(1);
        for (i, spot) in layout.spots().iter().enumerate() {
            assert_eq!(spot.id, SpotId(i as u32 + 1));
        }
        let first = layout.spot(SpotId(1)).unwrap();
        assert_eq!((first.row, first.col), (1, 1));
        assert!(layout.spot(SpotId(0)).is_none());
        assert!(layout.spot(SpotId(226)).is_none());
    }

    #[test]
    fn gates_override_street_cells() {
        let layout = reference_layout(1);
        assert_eq!(layout.cell(0, 0), Some(Cell::Gate(GateId(0))));
        assert_eq!(layout.cell(0, 19), Some(Cell::Gate(GateId(1))));
        assert_eq!(layout.cell(4, 0), Some(Cell::Gate(GateId(2))));
        assert_eq!(layout.cell(4, 19), Some(Cell::Gate(GateId(3))));
        assert_eq!(layout.cell(0, 1), Some(Cell::Street(Orientation::Horizontal)));
        assert_eq!(layout.cell(1, 0), Some(Cell::Street(Orientation::Vertical)));
        assert_eq!(layout.cell(20, 0), None);
    }

    #[test]
    fn zones_cycle_by_block() {
        let layout = reference_layout(1);
        let zone_at = |row, col| match layout.cell(row, col) {
            Some(Cell::Spot(id)) => layout.spot(id).unwrap().zone,
            other => panic!("expected spot, got {other:?}"),
        };
        assert_eq!(zone_at(1, 1), ZoneId(0));
        assert_eq!(zone_at(1, 5), ZoneId(1));
        assert_eq!(zone_at(5, 5), ZoneId(2));
        assert_eq!(zone_at(17, 17), ZoneId(3));
        assert_eq!(layout.zone_name(ZoneId(3)), Some("D"));
    }

    #[test]
    fn same_seed_same_disabled_flags() {
        let a = reference_layout(77);
        let b = reference_layout(77);
        let flags = |l: &Layout| l.spots().iter().map(|s| s.disabled).collect::<Vec<_>>();
        assert_eq!(flags(&a), flags(&b));
        let disabled = flags(&a).iter().filter(|&&d| d).count();
        assert!(disabled > 0 && disabled < 60, "~10% expected, got {disabled}");
    }

    #[test]
    fn zone_spot_lists_partition_the_spots() {
        let layout = reference_layout(1);
        let total: usize = layout.zone_ids().map(|z| layout.spots_in_zone(z).count()).sum();
        assert_eq!(total, layout.total_spots());
        assert!(layout.spots_in_zone(ZoneId(2)).all(|s| s.zone == ZoneId(2)));
    }

    #[test]
    fn block_occupancy_counts_block_spots() {
        let mut layout = reference_layout(1);
        let block = BlockCoord { row: 0, col: 0 };
        assert_eq!(layout.block_occupancy(block), (0, 9));
        layout.spot_mut(SpotId(1)).unwrap().occupied = true;
        assert_eq!(layout.block_occupancy(block), (1, 9));
        assert_eq!(layout.block_occupancy(BlockCoord { row: 9, col: 9 }), (0, 0));
    }

    #[test]
    fn build_rejects_invalid_config() {
        let mut cfg = FacilityConfig::reference();
        cfg.gates[0].position = 21;
        assert!(Layout::build(&cfg, &mut SimRng::new(0)).is_err());
    }

    #[test]
    fn lookup_by_name_and_label() {
        let layout = reference_layout(1);
        assert_eq!(layout.zone_by_name("C"), Some(ZoneId(2)));
        assert_eq!(layout.zone_by_name("Z"), None);
        assert_eq!(layout.gate_by_label("S2").map(|g| g.id), Some(GateId(3)));
        assert_eq!(layout.gates_of_kind(GateKind::Entry).count(), 2);
    }
}
