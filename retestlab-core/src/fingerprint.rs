//! Signal fingerprinting: deterministic identification of an engine's output.
//!
//! - `SignalDigest`: BLAKE3 over the canonical JSON of emitted events.
//! - `SignalDigester`: the same digest, built one event at a time.
//!
//! Replaying the same bars with the same configuration must reproduce the same
//! digest; tests compare digests instead of walking event vectors.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::SignalEvent;

/// Hex BLAKE3 digest of a signal event sequence.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SignalDigest(pub String);

impl SignalDigest {
    pub fn of(events: &[SignalEvent]) -> Self {
        let mut digester = SignalDigester::default();
        for event in events {
            digester.push(event);
        }
        digester.finish()
    }
}

impl fmt::Display for SignalDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Incremental digest, for callers that stream events instead of collecting them.
#[derive(Debug, Clone, Default)]
pub struct SignalDigester {
    hasher: blake3::Hasher,
    count: usize,
}

impl SignalDigester {
    pub fn push(&mut self, event: &SignalEvent) {
        // Events are plain structs of numbers and unit enums; serialization cannot fail.
        if let Ok(json) = serde_json::to_vec(event) {
            self.hasher.update(&json);
            self.hasher.update(b"\n");
        }
        self.count += 1;
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn finish(&self) -> SignalDigest {
        SignalDigest(self.hasher.finalize().to_hex().to_string())
    }
}
