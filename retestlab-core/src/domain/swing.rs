//! Swing points: confirmed local price extrema.

use serde::{Deserialize, Serialize};

/// Which extreme of the bar a swing point marks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SwingKind {
    High,
    Low,
}

/// A local extremum confirmed over `swing_window` bars on each side.
///
/// Never mutated after creation. `index` is the absolute bar index within the
/// engine's stream, not a position inside the rolling window.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SwingPoint {
    pub price: f64,
    pub index: usize,
    pub kind: SwingKind,
}

impl SwingPoint {
    /// Number of bars between the swing and `current_index`.
    pub fn age(&self, current_index: usize) -> usize {
        current_index.saturating_sub(self.index)
    }

    /// Whether the swing is past the horizon and ineligible for levels/stops.
    pub fn is_expired(&self, current_index: usize, horizon: usize) -> bool {
        self.age(current_index) > horizon
    }
}
