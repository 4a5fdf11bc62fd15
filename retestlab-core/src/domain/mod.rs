//! Domain types for the retest engine.

pub mod bar;
pub mod ids;
pub mod level;
pub mod signal;
pub mod swing;

pub use bar::Bar;
pub use ids::{CandidateId, ConfigHash, IdGen, SignalId};
pub use level::{Level, LevelKind};
pub use signal::{
    BreakoutCandidate, Direction, Disposition, MuteReason, Signal, SignalEvent, StopSource,
    TargetSource,
};
pub use swing::{SwingKind, SwingPoint};
