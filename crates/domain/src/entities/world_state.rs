//! Game-system owned world state entries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::authority::{AuthorityLevel, MutationSource};

/// A keyed world-state value owned by the game system. Model proposals
/// can never write these; only `Designer` or `GameSystem` sources may.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WorldStateEntry {
    /// Stable key (e.g. "weather", "gate_open")
    pub key: String,
    /// Current value
    pub value: String,
    /// Source of the most recent write
    pub source: MutationSource,
    /// Number of times this entry has been overwritten; monotonically increasing
    pub modification_count: u64,
    /// Timestamp of the most recent write
    pub last_modified: DateTime<Utc>,
}

impl WorldStateEntry {
    pub fn new(
        key: impl Into<String>,
        value: impl Into<String>,
        source: MutationSource,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            source,
            modification_count: 0,
            last_modified: now,
        }
    }

    /// Overwrite the value, bumping the modification counter.
    pub fn overwrite(&mut self, value: impl Into<String>, source: MutationSource, now: DateTime<Utc>) {
        self.value = value.into();
        self.source = source;
        self.modification_count += 1;
        self.last_modified = now;
    }

    pub fn authority(&self) -> AuthorityLevel {
        AuthorityLevel::WorldState
    }
}
