//! State snapshots - immutable bundles of everything prompt assembly needs.
//!
//! All prompt rendering reads from a snapshot, never from live memory, so
//! a turn (and its retries) can be replayed byte-for-byte.

use serde::{Deserialize, Serialize};

use crate::entities::{BeliefMemoryEntry, CanonicalFact, EpisodicMemoryEntry, WorldStateEntry};
use crate::value_objects::constraint::ConstraintSet;
use crate::value_objects::interaction::InteractionContext;

/// One prior exchange in the running dialogue.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DialogueTurn {
    /// Display name of the speaker
    pub speaker: String,
    /// What was said
    pub text: String,
}

impl DialogueTurn {
    pub fn new(speaker: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            speaker: speaker.into(),
            text: text.into(),
        }
    }
}

/// Immutable bundle of all inputs needed to regenerate a prompt.
///
/// Collections are sorted by id/key at build time, so two snapshots built
/// from logically identical memory contents compare and render identically
/// regardless of insertion order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StateSnapshot {
    /// Logical time the snapshot was taken, in ticks from the injected clock
    pub snapshot_time_ticks: i64,
    pub context: InteractionContext,
    pub constraints: ConstraintSet,
    pub system_prompt: String,
    pub player_input: String,
    pub canonical_facts: Vec<CanonicalFact>,
    pub world_state: Vec<WorldStateEntry>,
    pub episodic_memories: Vec<EpisodicMemoryEntry>,
    pub beliefs: Vec<BeliefMemoryEntry>,
    /// Chronological, oldest first
    pub dialogue_history: Vec<DialogueTurn>,
    /// 0 for the first attempt of a turn
    pub attempt_number: u32,
    pub max_attempts: u32,
}

impl StateSnapshot {
    /// Derive the snapshot for a retry attempt: same inputs, bumped attempt
    /// counter, constraints unioned with the escalations (escalated wins on
    /// id collision).
    pub fn for_retry(&self, escalated: &ConstraintSet) -> StateSnapshot {
        let mut next = self.clone();
        next.attempt_number = self.attempt_number + 1;
        next.constraints = self.constraints.union_escalated(escalated);
        next
    }
}

/// Accumulates the pieces of a snapshot, then seals them.
#[derive(Debug, Clone, Default)]
pub struct StateSnapshotBuilder {
    snapshot_time_ticks: i64,
    context: Option<InteractionContext>,
    constraints: ConstraintSet,
    system_prompt: String,
    player_input: String,
    canonical_facts: Vec<CanonicalFact>,
    world_state: Vec<WorldStateEntry>,
    episodic_memories: Vec<EpisodicMemoryEntry>,
    beliefs: Vec<BeliefMemoryEntry>,
    dialogue_history: Vec<DialogueTurn>,
    max_attempts: u32,
}

impl StateSnapshotBuilder {
    pub fn new() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    pub fn snapshot_time_ticks(mut self, ticks: i64) -> Self {
        self.snapshot_time_ticks = ticks;
        self
    }

    pub fn context(mut self, context: InteractionContext) -> Self {
        if self.player_input.is_empty() {
            if let Some(input) = &context.player_input {
                self.player_input = input.clone();
            }
        }
        self.context = Some(context);
        self
    }

    pub fn constraints(mut self, constraints: ConstraintSet) -> Self {
        self.constraints = constraints;
        self
    }

    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    pub fn player_input(mut self, input: impl Into<String>) -> Self {
        self.player_input = input.into();
        self
    }

    pub fn canonical_facts(mut self, facts: Vec<CanonicalFact>) -> Self {
        self.canonical_facts = facts;
        self
    }

    pub fn world_state(mut self, entries: Vec<WorldStateEntry>) -> Self {
        self.world_state = entries;
        self
    }

    pub fn episodic_memories(mut self, entries: Vec<EpisodicMemoryEntry>) -> Self {
        self.episodic_memories = entries;
        self
    }

    pub fn beliefs(mut self, entries: Vec<BeliefMemoryEntry>) -> Self {
        self.beliefs = entries;
        self
    }

    pub fn dialogue_history(mut self, turns: Vec<DialogueTurn>) -> Self {
        self.dialogue_history = turns;
        self
    }

    pub fn max_attempts(mut self, max: u32) -> Self {
        self.max_attempts = max.max(1);
        self
    }

    /// Seal the snapshot. Memory collections are sorted into their total,
    /// content-defined order here; dialogue history keeps its chronological
    /// order. Episodic memories keep retrieval's ranked order (the ranking
    /// itself is deterministic).
    pub fn build(self) -> StateSnapshot {
        let context = self
            .context
            .unwrap_or_else(|| InteractionContext::new(
                crate::value_objects::interaction::TriggerReason::Custom,
                "",
            ));

        let mut canonical_facts = self.canonical_facts;
        canonical_facts.sort_by(|a, b| a.domain.cmp(&b.domain).then_with(|| a.id.cmp(&b.id)));

        let mut world_state = self.world_state;
        world_state.sort_by(|a, b| a.key.cmp(&b.key));

        let mut beliefs = self.beliefs;
        beliefs.sort_by(|a, b| {
            b.confidence
                .total_cmp(&a.confidence)
                .then_with(|| a.subject.cmp(&b.subject))
                .then_with(|| a.id.cmp(&b.id))
        });

        StateSnapshot {
            snapshot_time_ticks: self.snapshot_time_ticks,
            context,
            constraints: self.constraints,
            system_prompt: self.system_prompt,
            player_input: self.player_input,
            canonical_facts,
            world_state,
            episodic_memories: self.episodic_memories,
            beliefs,
            dialogue_history: self.dialogue_history,
            attempt_number: 0,
            max_attempts: self.max_attempts,
        }
    }
}
