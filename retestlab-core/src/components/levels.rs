//! Level Detector: swing points and the support/resistance levels clustered from them.
//!
//! Swings are confirmed with a centered window of `k` bars on each side, so a
//! swing at bar `c` becomes visible at bar `c + k`. Each bar is evaluated
//! exactly once. Swings live in a bounded ring arena; the ones older than the
//! horizon stay there for diagnostics but no longer feed levels or stops.

use std::collections::VecDeque;

use tracing::debug;

use crate::config::EngineConfig;
use crate::domain::{Bar, Level, LevelKind, SwingKind, SwingPoint};

/// Bounded, append-only swing history. Oldest entries are evicted on overflow.
#[derive(Debug, Clone)]
pub struct SwingArena {
    slots: VecDeque<SwingPoint>,
    capacity: usize,
}

impl SwingArena {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, swing: SwingPoint) {
        if self.slots.len() == self.capacity {
            self.slots.pop_front();
        }
        self.slots.push_back(swing);
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Every retained swing, oldest first, expired ones included.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &SwingPoint> {
        self.slots.iter()
    }

    /// Swings still inside the horizon, oldest first.
    pub fn active(
        &self,
        current_index: usize,
        horizon: usize,
    ) -> impl DoubleEndedIterator<Item = &SwingPoint> {
        self.slots
            .iter()
            .filter(move |s| !s.is_expired(current_index, horizon))
    }
}

#[derive(Debug, Clone)]
pub struct LevelDetector {
    lookback_period: usize,
    swing_window: usize,
    horizon: usize,
    tolerance: f64,
    min_strength: usize,
    max_levels: usize,
    arena: SwingArena,
    /// Global index of the next bar that has not been tested as a swing candidate.
    next_candidate: usize,
    levels: Vec<Level>,
}

impl LevelDetector {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            lookback_period: config.lookback_period,
            swing_window: config.swing_window,
            horizon: config.swing_horizon,
            tolerance: config.level_tolerance,
            min_strength: config.min_level_strength,
            max_levels: config.max_levels,
            arena: SwingArena::with_capacity(config.swing_history_capacity),
            next_candidate: 0,
            levels: Vec::new(),
        }
    }

    /// Fold in the bar at `bar_index`, which must be the last bar of `window`.
    ///
    /// Returns the number of swings confirmed on this bar. Until
    /// `lookback_period` bars have been seen no swing is emitted.
    pub fn on_bar(&mut self, window: &VecDeque<Bar>, bar_index: usize) -> usize {
        let k = self.swing_window;
        let mut confirmed = 0;

        if bar_index + 1 >= self.lookback_period && bar_index >= k {
            let first = bar_index + 1 - window.len();
            let start = self.next_candidate.max(first + k);
            let end = bar_index - k;
            for c in start..=end {
                let pos = c - first;
                for kind in [SwingKind::High, SwingKind::Low] {
                    if let Some(price) = swing_price(window, pos, k, kind) {
                        self.arena.push(SwingPoint {
                            price,
                            index: c,
                            kind,
                        });
                        confirmed += 1;
                        debug!(index = c, price, kind = ?kind, "swing confirmed");
                    }
                }
            }
            self.next_candidate = self.next_candidate.max(end + 1);
        }

        self.rebuild_levels(bar_index);
        confirmed
    }

    /// Current levels, support and resistance, each group ranked by strength.
    pub fn levels(&self) -> &[Level] {
        &self.levels
    }

    pub fn resistances(&self) -> impl Iterator<Item = &Level> {
        self.levels
            .iter()
            .filter(|l| l.kind == LevelKind::Resistance)
    }

    pub fn supports(&self) -> impl Iterator<Item = &Level> {
        self.levels.iter().filter(|l| l.kind == LevelKind::Support)
    }

    pub fn arena(&self) -> &SwingArena {
        &self.arena
    }

    pub fn active_swings(&self, current_index: usize) -> impl DoubleEndedIterator<Item = &SwingPoint> {
        self.arena.active(current_index, self.horizon)
    }

    fn rebuild_levels(&mut self, current_index: usize) {
        self.levels.clear();
        for kind in [SwingKind::High, SwingKind::Low] {
            let mut clusters = cluster_swings(
                self.arena
                    .active(current_index, self.horizon)
                    .filter(|s| s.kind == kind),
                self.tolerance,
                kind.into(),
            );
            clusters.retain(|l| l.strength >= self.min_strength);
            clusters.sort_by(|a, b| {
                b.strength
                    .cmp(&a.strength)
                    .then(b.last_touch_index.cmp(&a.last_touch_index))
            });
            clusters.truncate(self.max_levels);
            self.levels.extend(clusters);
        }
    }
}

/// Price of a strict local extremum at `pos`, or `None`.
fn swing_price(window: &VecDeque<Bar>, pos: usize, k: usize, kind: SwingKind) -> Option<f64> {
    let center = window.get(pos)?;
    let value = |bar: &Bar| match kind {
        SwingKind::High => bar.high,
        SwingKind::Low => bar.low,
    };
    let pivot = value(center);
    let beats = |other: f64| match kind {
        SwingKind::High => pivot > other,
        SwingKind::Low => pivot < other,
    };
    for offset in 1..=k {
        let left = window.get(pos.checked_sub(offset)?)?;
        let right = window.get(pos + offset)?;
        if !beats(value(left)) || !beats(value(right)) {
            return None;
        }
    }
    Some(pivot)
}

/// Chronological clustering: each swing joins the first cluster whose mean is
/// within `tolerance`, otherwise it seeds a new one.
fn cluster_swings<'a>(
    swings: impl Iterator<Item = &'a SwingPoint>,
    tolerance: f64,
    kind: LevelKind,
) -> Vec<Level> {
    struct Cluster {
        sum: f64,
        count: usize,
        last_index: usize,
    }

    let mut clusters: Vec<Cluster> = Vec::new();
    for swing in swings {
        let joined = clusters.iter_mut().find(|c| {
            let mean = c.sum / c.count as f64;
            ((swing.price - mean) / mean).abs() <= tolerance
        });
        match joined {
            Some(cluster) => {
                cluster.sum += swing.price;
                cluster.count += 1;
                cluster.last_index = cluster.last_index.max(swing.index);
            }
            None => clusters.push(Cluster {
                sum: swing.price,
                count: 1,
                last_index: swing.index,
            }),
        }
    }

    clusters
        .into_iter()
        .map(|c| Level {
            price: c.sum / c.count as f64,
            kind,
            strength: c.count,
            last_touch_index: c.last_index,
        })
        .collect()
}
