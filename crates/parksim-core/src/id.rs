use serde::{Deserialize, Serialize};
use slotmap::new_key_type;
use std::fmt;

new_key_type! {
    /// Identifies a parked vehicle (an active assignment) while it holds a spot.
    pub struct CarId;
}

/// Identifies a zone by its index in the facility's zone table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ZoneId(pub u8);

impl ZoneId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Identifies a gate by its index in the facility's gate table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct GateId(pub u8);

impl GateId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Identifies a parking spot. Spot ids run from 1 to N in row-major order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SpotId(pub u32);

impl SpotId {
    /// Zero-based position in the layout's spot table.
    pub fn index(self) -> Option<usize> {
        (self.0 as usize).checked_sub(1)
    }
}

impl fmt::Display for SpotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A ticket number. Strictly increasing from 1 over an engine's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TicketNumber(pub u64);

impl fmt::Display for TicketNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Street segment orientation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Orientation {
    Horizontal,
    Vertical,
}

/// Coordinates of a block: the spots bounded by horizontal street `row` and
/// vertical street `col`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BlockCoord {
    pub row: usize,
    pub col: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spot_id_index_is_zero_based() {
        assert_eq!(SpotId(1).index(), Some(0));
        assert_eq!(SpotId(0).index(), None);
    }

    #[test]
    fn ticket_number_display() {
        assert_eq!(TicketNumber(12).to_string(), "#12");
    }

    #[test]
    fn ids_are_hashable() {
        use std::collections::HashMap;
        let mut map = HashMap::new();
        map.insert(ZoneId(0), "A");
        map.insert(ZoneId(1), "B");
        assert_eq!(map[&ZoneId(1)], "B");
    }
}
