//! Per-segment traffic levels.
//!
//! Two writers share the level arrays:
//!
//! - **Ambient**: a periodic pass that assigns every segment a uniformly
//!   random level, independent of occupancy.
//! - **Density**: after an entry or exit, the horizontal and vertical
//!   segments of the affected block are set from that block's occupancy.
//!
//! [`TrafficPrecedence`] decides which writer wins. Under
//! `DensityAuthoritative` a segment written by the density path is skipped
//! by the next ambient pass.

use serde::{Deserialize, Serialize};

use crate::config::{DensityThresholds, TrafficPrecedence};
use crate::id::{BlockCoord, Orientation};
use crate::rng::SimRng;

/// Discrete traffic intensity on one street segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub enum TrafficLevel {
    #[default]
    Low,
    Medium,
    High,
}

impl TrafficLevel {
    pub const ALL: [TrafficLevel; 3] = [TrafficLevel::Low, TrafficLevel::Medium, TrafficLevel::High];

    /// Level for a block with `occupied` of `total` spots taken. Thresholds
    /// are exclusive; an empty block is `Low`.
    pub fn from_density(occupied: usize, total: usize, thresholds: DensityThresholds) -> Self {
        let (occupied, total) = (occupied as u64, total as u64);
        if thresholds.high.exceeded_by(occupied, total) {
            TrafficLevel::High
        } else if thresholds.medium.exceeded_by(occupied, total) {
            TrafficLevel::Medium
        } else {
            TrafficLevel::Low
        }
    }

    fn random(rng: &mut SimRng) -> Self {
        Self::ALL[rng.next_below(Self::ALL.len())]
    }
}

/// Count of segments at each level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TrafficHistogram {
    pub low: usize,
    pub medium: usize,
    pub high: usize,
}

/// Traffic state for every street segment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrafficModel {
    horizontal: Vec<TrafficLevel>,
    vertical: Vec<TrafficLevel>,
    /// Set by the density path, cleared by each ambient pass.
    touched_horizontal: Vec<bool>,
    touched_vertical: Vec<bool>,
    thresholds: DensityThresholds,
    precedence: TrafficPrecedence,
}

impl TrafficModel {
    pub fn new(
        horizontal_segments: usize,
        vertical_segments: usize,
        thresholds: DensityThresholds,
        precedence: TrafficPrecedence,
    ) -> Self {
        Self {
            horizontal: vec![TrafficLevel::Low; horizontal_segments],
            vertical: vec![TrafficLevel::Low; vertical_segments],
            touched_horizontal: vec![false; horizontal_segments],
            touched_vertical: vec![false; vertical_segments],
            thresholds,
            precedence,
        }
    }

    /// Ambient pass. Returns how many segments were rewritten.
    pub fn ambient_pass(&mut self, rng: &mut SimRng) -> usize {
        let respect_density = self.precedence == TrafficPrecedence::DensityAuthoritative;
        let mut rewritten = 0;
        for (levels, touched) in [
            (&mut self.horizontal, &mut self.touched_horizontal),
            (&mut self.vertical, &mut self.touched_vertical),
        ] {
            for (level, touched) in levels.iter_mut().zip(touched.iter_mut()) {
                if respect_density && *touched {
                    *touched = false;
                    continue;
                }
                *level = TrafficLevel::random(rng);
                *touched = false;
                rewritten += 1;
            }
        }
        rewritten
    }

    /// Density path: set both segments serving `block` from its occupancy.
    /// Segments outside the model are ignored.
    pub fn on_block_changed(&mut self, block: BlockCoord, occupied: usize, total: usize) -> TrafficLevel {
        let level = TrafficLevel::from_density(occupied, total, self.thresholds);
        if let Some(slot) = self.horizontal.get_mut(block.row) {
            *slot = level;
            self.touched_horizontal[block.row] = true;
        }
        if let Some(slot) = self.vertical.get_mut(block.col) {
            *slot = level;
            self.touched_vertical[block.col] = true;
        }
        level
    }

    pub fn level(&self, orientation: Orientation, index: usize) -> Option<TrafficLevel> {
        self.levels(orientation).get(index).copied()
    }

    pub fn levels(&self, orientation: Orientation) -> &[TrafficLevel] {
        match orientation {
            Orientation::Horizontal => &self.horizontal,
            Orientation::Vertical => &self.vertical,
        }
    }

    pub fn histogram(&self) -> TrafficHistogram {
        let mut hist = TrafficHistogram::default();
        for level in self.horizontal.iter().chain(&self.vertical) {
            match level {
                TrafficLevel::Low => hist.low += 1,
                TrafficLevel::Medium => hist.medium += 1,
                TrafficLevel::High => hist.high += 1,
            }
        }
        hist
    }

    /// `(horizontal, vertical)` counts of high-traffic segments.
    pub fn high_counts(&self) -> (usize, usize) {
        let count = |levels: &[TrafficLevel]| levels.iter().filter(|&&l| l == TrafficLevel::High).count();
        (count(&self.horizontal), count(&self.vertical))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixed::Percent;

    fn thresholds() -> DensityThresholds {
        DensityThresholds {
            medium: Percent(40),
            high: Percent(70),
        }
    }

    fn model(precedence: TrafficPrecedence) -> TrafficModel {
        TrafficModel::new(5, 5, thresholds(), precedence)
    }

    #[test]
    fn density_step_function() {
        let t = thresholds();
        assert_eq!(TrafficLevel::from_density(0, 10, t), TrafficLevel::Low);
        assert_eq!(TrafficLevel::from_density(4, 10, t), TrafficLevel::Low);
        assert_eq!(TrafficLevel::from_density(5, 10, t), TrafficLevel::Medium);
        assert_eq!(TrafficLevel::from_density(7, 10, t), TrafficLevel::Medium);
        assert_eq!(TrafficLevel::from_density(8, 10, t), TrafficLevel::High);
        assert_eq!(TrafficLevel::from_density(9, 9, t), TrafficLevel::High);
    }

    #[test]
    fn empty_block_is_low() {
        assert_eq!(TrafficLevel::from_density(0, 0, thresholds()), TrafficLevel::Low);
    }

    #[test]
    fn density_is_monotonic_in_occupancy() {
        let t = thresholds();
        for total in 1..=30 {
            let mut prev = TrafficLevel::Low;
            for occupied in 0..=total {
                let level = TrafficLevel::from_density(occupied, total, t);
                assert!(level >= prev);
                prev = level;
            }
        }
    }

    #[test]
    fn block_change_sets_both_segments() {
        let mut m = model(TrafficPrecedence::DensityAuthoritative);
        let level = m.on_block_changed(BlockCoord { row: 2, col: 3 }, 8, 9);
        assert_eq!(level, TrafficLevel::High);
        assert_eq!(m.level(Orientation::Horizontal, 2), Some(TrafficLevel::High));
        assert_eq!(m.level(Orientation::Vertical, 3), Some(TrafficLevel::High));
        assert_eq!(m.level(Orientation::Horizontal, 3), Some(TrafficLevel::Low));
    }

    #[test]
    fn block_change_outside_model_is_ignored() {
        let mut m = model(TrafficPrecedence::LastWriteWins);
        m.on_block_changed(BlockCoord { row: 9, col: 9 }, 9, 9);
        assert_eq!(m.histogram().low, 10);
    }

    #[test]
    fn ambient_rewrites_everything_under_last_write_wins() {
        let mut m = model(TrafficPrecedence::LastWriteWins);
        m.on_block_changed(BlockCoord { row: 0, col: 0 }, 9, 9);
        assert_eq!(m.ambient_pass(&mut SimRng::new(4)), 10);
    }

    #[test]
    fn ambient_skips_density_touched_segments_once() {
        let mut m = model(TrafficPrecedence::DensityAuthoritative);
        m.on_block_changed(BlockCoord { row: 1, col: 4 }, 9, 9);
        let mut rng = SimRng::new(4);

        assert_eq!(m.ambient_pass(&mut rng), 8);
        assert_eq!(m.level(Orientation::Horizontal, 1), Some(TrafficLevel::High));
        assert_eq!(m.level(Orientation::Vertical, 4), Some(TrafficLevel::High));

        // The density write only protects the segment for one ambient pass.
        assert_eq!(m.ambient_pass(&mut rng), 10);
    }

    #[test]
    fn histogram_and_high_counts() {
        let mut m = model(TrafficPrecedence::DensityAuthoritative);
        m.on_block_changed(BlockCoord { row: 0, col: 1 }, 9, 9);
        m.on_block_changed(BlockCoord { row: 3, col: 1 }, 5, 9);
        let hist = m.histogram();
        assert_eq!(hist.low + hist.medium + hist.high, 10);
        assert_eq!(hist.high, 1);
        assert_eq!(hist.medium, 2);
        assert_eq!(m.high_counts(), (1, 0));
    }
}
