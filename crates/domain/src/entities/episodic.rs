//! Episodic memories - time-stamped recollections with decaying strength.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::authority::AuthorityLevel;

/// Episodic entries below this strength are invisible to retrieval but
/// retained until capacity pruning removes them.
pub const ACTIVE_STRENGTH_FLOOR: f32 = 0.1;

/// Kind of recollection an episodic entry records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EpisodeType {
    /// Something said in conversation
    Dialogue,
    /// Something witnessed
    Observation,
    /// An internal reflection
    Thought,
    /// Something that happened
    Event,
    /// Information learned from another party
    LearnedInfo,
}

impl std::fmt::Display for EpisodeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EpisodeType::Dialogue => write!(f, "Dialogue"),
            EpisodeType::Observation => write!(f, "Observation"),
            EpisodeType::Thought => write!(f, "Thought"),
            EpisodeType::Event => write!(f, "Event"),
            EpisodeType::LearnedInfo => write!(f, "LearnedInfo"),
        }
    }
}

/// A single episodic memory. Strength decays over time; significance
/// slows the decay.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EpisodicMemoryEntry {
    /// Unique identifier assigned by the memory system's id generator
    pub id: String,
    /// What is remembered
    pub description: String,
    /// Kind of recollection
    pub episode_type: EpisodeType,
    /// Other party involved, if any
    pub participant: Option<String>,
    /// In-game time display string, if known
    pub game_time: Option<String>,
    /// How important this memory is, in [0, 1]
    pub significance: f32,
    /// How vivid this memory currently is, in [0, 1]
    pub strength: f32,
    /// When the memory was formed
    pub created_at: DateTime<Utc>,
    /// When retrieval last touched this memory
    pub last_accessed_at: DateTime<Utc>,
}

impl EpisodicMemoryEntry {
    pub fn new(
        id: impl Into<String>,
        description: impl Into<String>,
        episode_type: EpisodeType,
        significance: f32,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            description: description.into(),
            episode_type,
            participant: None,
            game_time: None,
            significance: significance.clamp(0.0, 1.0),
            strength: 1.0,
            created_at: now,
            last_accessed_at: now,
        }
    }

    pub fn with_participant(mut self, participant: impl Into<String>) -> Self {
        self.participant = Some(participant.into());
        self
    }

    pub fn with_game_time(mut self, game_time: impl Into<String>) -> Self {
        self.game_time = Some(game_time.into());
        self
    }

    /// Visible to retrieval iff strength is above the floor.
    pub fn is_active(&self) -> bool {
        self.strength > ACTIVE_STRENGTH_FLOOR
    }

    /// Reduce strength by `delta * (1 - significance * 0.5)`, clamped at 0.
    /// Significant memories fade more slowly.
    pub fn decay(&mut self, delta: f32) {
        let reduction = delta * (1.0 - self.significance * 0.5);
        self.strength = (self.strength - reduction).max(0.0);
    }

    pub fn authority(&self) -> AuthorityLevel {
        AuthorityLevel::Episodic
    }
}
