//! Prompt assembly - byte-deterministic rendering of a state snapshot.
//!
//! Two modes, both pure functions of the snapshot: a sectioned text
//! prompt and a structured JSON context object. No wall-clock value is
//! ever rendered, and every collection is emitted in a total order, so
//! identical snapshots yield identical bytes no matter when or where
//! assembly runs.

use serde::Serialize;

use loreguard_domain::{
    BeliefMemoryEntry, Constraint, ConstraintType, DialogueTurn, EpisodicMemoryEntry,
    StateSnapshot,
};

use crate::infrastructure::app_settings::PromptConfig;

/// Rendering mode for the assembler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptMode {
    /// Fixed-order text sections
    Text,
    /// JSON object with a fixed key order
    Structured { pretty: bool },
}

/// Per-section byte sizes of the rendered prompt.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptBreakdown {
    pub system_bytes: usize,
    pub canonical_bytes: usize,
    pub world_state_bytes: usize,
    pub episodic_bytes: usize,
    pub belief_bytes: usize,
    pub dialogue_bytes: usize,
    pub player_input_bytes: usize,
}

/// The rendered prompt plus accounting.
#[derive(Debug, Clone, PartialEq)]
pub struct AssembledPrompt {
    pub text: String,
    pub breakdown: PromptBreakdown,
    pub estimated_tokens: usize,
    pub was_truncated: bool,
}

/// Rough chars/4 token estimate; the truncation budget itself is exact
/// bytes.
pub fn estimate_tokens(text: &str) -> usize {
    text.chars().count().div_ceil(4)
}

const RESPONSE_MARKER: &str = "### Response:";
const BULLET: &str = "- ";

/// Deterministic snapshot-to-bytes renderer.
pub struct PromptAssembler {
    config: PromptConfig,
}

impl PromptAssembler {
    pub fn new(config: PromptConfig) -> Self {
        Self { config }
    }

    /// Render the snapshot. If the result exceeds the byte budget, items
    /// are dropped lowest-priority-first: oldest dialogue, then
    /// lowest-confidence beliefs, then lowest-scored episodic memories.
    /// Canonical facts and the player input are never dropped.
    pub fn assemble(&self, snapshot: &StateSnapshot) -> AssembledPrompt {
        let mut dialogue = snapshot.dialogue_history.clone();
        // Beliefs arrive confidence-descending and episodic memories
        // rank-descending, so popping from the back drops the least
        // valuable entry.
        let mut beliefs = snapshot.beliefs.clone();
        let mut episodic = snapshot.episodic_memories.clone();

        let mut was_truncated = false;
        loop {
            let (text, breakdown) = self.render(snapshot, &dialogue, &beliefs, &episodic);
            let budget = self.config.max_prompt_bytes;
            if budget == 0 || text.len() <= budget {
                return AssembledPrompt {
                    estimated_tokens: estimate_tokens(&text),
                    text,
                    breakdown,
                    was_truncated,
                };
            }

            if !dialogue.is_empty() {
                dialogue.remove(0);
            } else if !beliefs.is_empty() {
                beliefs.pop();
            } else if !episodic.is_empty() {
                episodic.pop();
            } else {
                // Nothing left to drop; emit over budget.
                return AssembledPrompt {
                    estimated_tokens: estimate_tokens(&text),
                    text,
                    breakdown,
                    was_truncated: true,
                };
            }
            was_truncated = true;
        }
    }

    fn render(
        &self,
        snapshot: &StateSnapshot,
        dialogue: &[DialogueTurn],
        beliefs: &[BeliefMemoryEntry],
        episodic: &[EpisodicMemoryEntry],
    ) -> (String, PromptBreakdown) {
        match self.config.mode {
            PromptMode::Text => render_text(snapshot, dialogue, beliefs, episodic),
            PromptMode::Structured { pretty } => {
                render_structured(snapshot, dialogue, beliefs, episodic, pretty)
            }
        }
    }
}

fn constraint_directive(constraint: &Constraint) -> String {
    match constraint.constraint_type {
        ConstraintType::Prohibition => format!("{BULLET}MUST NOT: {}", constraint.description),
        ConstraintType::Requirement => format!("{BULLET}MUST: {}", constraint.description),
    }
}

fn render_text(
    snapshot: &StateSnapshot,
    dialogue: &[DialogueTurn],
    beliefs: &[BeliefMemoryEntry],
    episodic: &[EpisodicMemoryEntry],
) -> (String, PromptBreakdown) {
    let mut prompt = String::new();
    let mut breakdown = PromptBreakdown::default();

    // System prompt, with behavior directives folded in.
    let start = prompt.len();
    prompt.push_str(&snapshot.system_prompt);
    prompt.push('\n');
    if !snapshot.constraints.is_empty() {
        prompt.push_str("\nBEHAVIOR RULES:\n");
        for constraint in snapshot.constraints.iter() {
            prompt.push_str(&constraint_directive(constraint));
            prompt.push('\n');
        }
    }
    breakdown.system_bytes = prompt.len() - start;

    // Canonical facts. Never dropped.
    let start = prompt.len();
    if !snapshot.canonical_facts.is_empty() {
        prompt.push_str("\nESTABLISHED FACTS (never contradict these):\n");
        for fact in &snapshot.canonical_facts {
            prompt.push_str(&format!("{BULLET}{}\n", fact.fact));
        }
    }
    breakdown.canonical_bytes = prompt.len() - start;

    // World state, by key.
    let start = prompt.len();
    if !snapshot.world_state.is_empty() {
        prompt.push_str("\nWORLD STATE:\n");
        for entry in &snapshot.world_state {
            prompt.push_str(&format!("{BULLET}{}: {}\n", entry.key, entry.value));
        }
    }
    breakdown.world_state_bytes = prompt.len() - start;

    // Ranked episodic memories.
    let start = prompt.len();
    if !episodic.is_empty() {
        prompt.push_str("\nTHINGS YOU REMEMBER:\n");
        for entry in episodic {
            prompt.push_str(&format!("{BULLET}{}\n", entry.description));
        }
    }
    breakdown.episodic_bytes = prompt.len() - start;

    // Beliefs, confidence-descending.
    let start = prompt.len();
    if !beliefs.is_empty() {
        prompt.push_str("\nTHINGS YOU BELIEVE:\n");
        for belief in beliefs {
            prompt.push_str(&format!("{BULLET}{}\n", belief.belief_content));
        }
    }
    breakdown.belief_bytes = prompt.len() - start;

    // Dialogue history, chronological.
    let start = prompt.len();
    if !dialogue.is_empty() {
        prompt.push_str("\nCONVERSATION SO FAR:\n");
        for turn in dialogue {
            prompt.push_str(&format!("{}: {}\n", turn.speaker, turn.text));
        }
    }
    breakdown.dialogue_bytes = prompt.len() - start;

    // Player input. Never dropped.
    let start = prompt.len();
    if !snapshot.player_input.is_empty() {
        prompt.push_str(&format!("\nPlayer: {}\n", snapshot.player_input));
    }
    breakdown.player_input_bytes = prompt.len() - start;

    prompt.push_str(&format!("\n{RESPONSE_MARKER}\n"));

    (prompt, breakdown)
}

// =============================================================================
// Structured-context mode
// =============================================================================

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StructuredPrompt<'a> {
    system: &'a str,
    context: StructuredContext,
    constraints: Vec<ConstraintDto>,
    player_input: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StructuredContext {
    canonical_facts: Vec<FactDto>,
    world_state: Vec<WorldStateDto>,
    episodic_memories: Vec<EpisodicDto>,
    beliefs: Vec<BeliefDto>,
    dialogue: Vec<DialogueDto>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct FactDto {
    id: String,
    domain: String,
    fact: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct WorldStateDto {
    key: String,
    value: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct EpisodicDto {
    id: String,
    description: String,
    significance: f32,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct BeliefDto {
    id: String,
    subject: String,
    content: String,
    confidence: f32,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct DialogueDto {
    speaker: String,
    text: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ConstraintDto {
    id: String,
    kind: &'static str,
    severity: String,
    description: String,
}

fn render_structured(
    snapshot: &StateSnapshot,
    dialogue: &[DialogueTurn],
    beliefs: &[BeliefMemoryEntry],
    episodic: &[EpisodicMemoryEntry],
    pretty: bool,
) -> (String, PromptBreakdown) {
    // Arrays are sorted by id/key here; the working slices keep their
    // drop-priority order for truncation, this is presentation only.
    let canonical_facts: Vec<FactDto> = {
        let mut facts: Vec<&_> = snapshot.canonical_facts.iter().collect();
        facts.sort_by(|a, b| a.id.cmp(&b.id));
        facts
            .into_iter()
            .map(|f| FactDto {
                id: f.id.clone(),
                domain: f.domain.clone(),
                fact: f.fact.clone(),
            })
            .collect()
    };

    let world_state: Vec<WorldStateDto> = snapshot
        .world_state
        .iter()
        .map(|e| WorldStateDto {
            key: e.key.clone(),
            value: e.value.clone(),
        })
        .collect();

    let episodic_memories: Vec<EpisodicDto> = {
        let mut entries: Vec<&_> = episodic.iter().collect();
        entries.sort_by(|a, b| a.id.cmp(&b.id));
        entries
            .into_iter()
            .map(|e| EpisodicDto {
                id: e.id.clone(),
                description: e.description.clone(),
                significance: e.significance,
            })
            .collect()
    };

    let belief_dtos: Vec<BeliefDto> = {
        let mut entries: Vec<&_> = beliefs.iter().collect();
        entries.sort_by(|a, b| a.id.cmp(&b.id));
        entries
            .into_iter()
            .map(|b| BeliefDto {
                id: b.id.clone(),
                subject: b.subject.clone(),
                content: b.belief_content.clone(),
                confidence: b.confidence,
            })
            .collect()
    };

    let dialogue_dtos: Vec<DialogueDto> = dialogue
        .iter()
        .map(|t| DialogueDto {
            speaker: t.speaker.clone(),
            text: t.text.clone(),
        })
        .collect();

    let constraints: Vec<ConstraintDto> = snapshot
        .constraints
        .iter()
        .map(|c| ConstraintDto {
            id: c.id.clone(),
            kind: match c.constraint_type {
                ConstraintType::Prohibition => "prohibition",
                ConstraintType::Requirement => "requirement",
            },
            severity: c.severity.to_string(),
            description: c.description.clone(),
        })
        .collect();

    let doc = StructuredPrompt {
        system: &snapshot.system_prompt,
        context: StructuredContext {
            canonical_facts,
            world_state,
            episodic_memories,
            beliefs: belief_dtos,
            dialogue: dialogue_dtos,
        },
        constraints,
        player_input: &snapshot.player_input,
    };

    // Serialization of these DTOs cannot fail; fall back to an empty
    // object rather than panicking on untrusted content.
    let text = if pretty {
        serde_json::to_string_pretty(&doc).unwrap_or_else(|_| "{}".to_string())
    } else {
        serde_json::to_string(&doc).unwrap_or_else(|_| "{}".to_string())
    };

    let breakdown = PromptBreakdown {
        system_bytes: snapshot.system_prompt.len(),
        player_input_bytes: snapshot.player_input.len(),
        ..PromptBreakdown::default()
    };

    (text, breakdown)
}
