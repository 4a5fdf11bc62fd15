//! Support/resistance levels derived from clustered swing points.

use serde::{Deserialize, Serialize};

use super::swing::SwingKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LevelKind {
    Support,
    Resistance,
}

impl From<SwingKind> for LevelKind {
    fn from(kind: SwingKind) -> Self {
        match kind {
            SwingKind::High => LevelKind::Resistance,
            SwingKind::Low => LevelKind::Support,
        }
    }
}

/// A price band where several same-kind swing points cluster.
///
/// Levels are a derived view: recomputed from the live swing set whenever they
/// are needed and never stored independently.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Level {
    pub price: f64,
    pub kind: LevelKind,
    /// Number of swing points supporting the level.
    pub strength: usize,
    /// Bar index of the newest member swing.
    pub last_touch_index: usize,
}
