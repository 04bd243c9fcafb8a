//! Interaction context - what triggered a dialogue turn.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Why an NPC is being asked to speak.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TriggerReason {
    /// The player said something to the NPC
    PlayerUtterance,
    /// The player entered a zone the NPC watches
    ZoneTrigger,
    /// An in-game time boundary passed
    TimeTrigger,
    /// A quest state changed
    QuestTrigger,
    /// Another NPC initiated contact
    NpcInteraction,
    /// A world event fired
    WorldEvent,
    /// Host-defined trigger
    Custom,
}

impl std::fmt::Display for TriggerReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TriggerReason::PlayerUtterance => write!(f, "PlayerUtterance"),
            TriggerReason::ZoneTrigger => write!(f, "ZoneTrigger"),
            TriggerReason::TimeTrigger => write!(f, "TimeTrigger"),
            TriggerReason::QuestTrigger => write!(f, "QuestTrigger"),
            TriggerReason::NpcInteraction => write!(f, "NpcInteraction"),
            TriggerReason::WorldEvent => write!(f, "WorldEvent"),
            TriggerReason::Custom => write!(f, "Custom"),
        }
    }
}

/// Context for a single interaction with an NPC.
///
/// `extras` uses a BTreeMap so the context never carries
/// insertion-order-dependent state into prompt assembly.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct InteractionContext {
    /// What triggered this turn
    pub trigger_reason: TriggerReason,
    /// The NPC being driven
    pub npc_id: String,
    /// What the player said, if the trigger was an utterance
    pub player_input: Option<String>,
    /// In-game time display string
    pub game_time: String,
    /// How many interactions this NPC has had with the player so far
    pub interaction_count: u64,
    /// Host-supplied key/value extras (zone name, quest id, ...)
    pub extras: BTreeMap<String, String>,
}

impl InteractionContext {
    pub fn new(trigger_reason: TriggerReason, npc_id: impl Into<String>) -> Self {
        Self {
            trigger_reason,
            npc_id: npc_id.into(),
            player_input: None,
            game_time: String::new(),
            interaction_count: 0,
            extras: BTreeMap::new(),
        }
    }

    /// Convenience constructor for the common player-utterance case.
    pub fn player_utterance(npc_id: impl Into<String>, input: impl Into<String>) -> Self {
        let mut ctx = Self::new(TriggerReason::PlayerUtterance, npc_id);
        ctx.player_input = Some(input.into());
        ctx
    }

    pub fn with_game_time(mut self, game_time: impl Into<String>) -> Self {
        self.game_time = game_time.into();
        self
    }

    pub fn with_interaction_count(mut self, count: u64) -> Self {
        self.interaction_count = count;
        self
    }

    pub fn with_extra(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extras.insert(key.into(), value.into());
        self
    }

    /// The text retrieval should match against: the player input when
    /// present, otherwise the trigger description.
    pub fn trigger_text(&self) -> &str {
        self.player_input.as_deref().unwrap_or("")
    }
}
