use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of an emitted signal, unique within one engine instance.
///
/// Assigned sequentially so that replaying a bar stream reproduces the same ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SignalId(pub u64);

impl fmt::Display for SignalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sig-{}", self.0)
    }
}

/// Identifier of a breakout candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CandidateId(pub u64);

impl fmt::Display for CandidateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cand-{}", self.0)
    }
}

/// Deterministic hash of an engine configuration (BLAKE3 hex).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConfigHash(pub String);

impl ConfigHash {
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self(blake3::hash(bytes).to_hex().to_string())
    }
}

impl fmt::Display for ConfigHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Monotonic id generator.
#[derive(Debug, Clone, Default)]
pub struct IdGen {
    next_signal: u64,
    next_candidate: u64,
}

impl IdGen {
    pub fn next_signal_id(&mut self) -> SignalId {
        self.next_signal += 1;
        SignalId(self.next_signal)
    }

    pub fn was_issued(&self, id: SignalId) -> bool {
        id.0 >= 1 && id.0 <= self.next_signal
    }

    pub fn next_candidate_id(&mut self) -> CandidateId {
        self.next_candidate += 1;
        CandidateId(self.next_candidate)
    }
}
