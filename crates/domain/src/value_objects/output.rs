//! Parsed model output - the typed proposal extracted from raw LLM text.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Which parsing path produced a `ParsedOutput`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ParseMode {
    /// JSON matching the structured response schema
    Structured,
    /// Marker extraction over free-form prose
    Regex,
    /// Whole string treated as dialogue
    Fallback,
}

impl std::fmt::Display for ParseMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParseMode::Structured => write!(f, "Structured"),
            ParseMode::Regex => write!(f, "Regex"),
            ParseMode::Fallback => write!(f, "Fallback"),
        }
    }
}

/// A change to authoritative memory proposed by the model. Targets are
/// opaque strings resolved at the memory boundary; a missing id becomes a
/// creation path or an authority rejection there, never a dangling
/// reference.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ProposedMutation {
    /// Record an episodic memory of this turn
    AppendEpisodic {
        content: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        source_text: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        confidence: Option<f32>,
    },
    /// Create or revise a belief
    TransformBelief {
        /// Belief id; required by the schema filter
        #[serde(default, skip_serializing_if = "Option::is_none")]
        target: Option<String>,
        content: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        confidence: Option<f32>,
    },
    /// Revise the relationship belief toward a character
    TransformRelationship {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        target: Option<String>,
        content: String,
    },
    /// Signal the host engine; not a memory change
    EmitWorldIntent { intent_type: String, content: String },
}

impl ProposedMutation {
    /// Short kind name for logs and statistics.
    pub fn kind(&self) -> &'static str {
        match self {
            ProposedMutation::AppendEpisodic { .. } => "AppendEpisodic",
            ProposedMutation::TransformBelief { .. } => "TransformBelief",
            ProposedMutation::TransformRelationship { .. } => "TransformRelationship",
            ProposedMutation::EmitWorldIntent { .. } => "EmitWorldIntent",
        }
    }

    /// The free-text payload of the mutation.
    pub fn content(&self) -> &str {
        match self {
            ProposedMutation::AppendEpisodic { content, .. }
            | ProposedMutation::TransformBelief { content, .. }
            | ProposedMutation::TransformRelationship { content, .. }
            | ProposedMutation::EmitWorldIntent { content, .. } => content,
        }
    }

    /// The id/key the mutation points at, if any.
    pub fn target(&self) -> Option<&str> {
        match self {
            ProposedMutation::AppendEpisodic { .. } => None,
            ProposedMutation::TransformBelief { target, .. }
            | ProposedMutation::TransformRelationship { target, .. } => target.as_deref(),
            ProposedMutation::EmitWorldIntent { .. } => None,
        }
    }
}

/// A side-effect signal proposed by the model, addressed to the host.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WorldIntent {
    pub intent_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    #[serde(default)]
    pub parameters: BTreeMap<String, String>,
}

impl WorldIntent {
    pub fn new(intent_type: impl Into<String>) -> Self {
        Self {
            intent_type: intent_type.into(),
            target: None,
            parameters: BTreeMap::new(),
        }
    }
}

/// A `WorldIntent` stamped with its originating NPC, ready for the
/// outbound channel. Delivery is at-least-once from the pipeline's side;
/// the channel owner dedups if needed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OutboundIntent {
    pub intent_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    #[serde(default)]
    pub parameters: BTreeMap<String, String>,
    pub source_npc_id: String,
    pub priority: i32,
}

impl OutboundIntent {
    pub fn from_intent(intent: WorldIntent, source_npc_id: impl Into<String>, priority: i32) -> Self {
        Self {
            intent_type: intent.intent_type,
            target: intent.target,
            parameters: intent.parameters,
            source_npc_id: source_npc_id.into(),
            priority,
        }
    }
}

/// A function call the model asked for. Arguments are kept as the raw
/// JSON string; interpretation belongs to the host.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FunctionCall {
    pub name: String,
    pub arguments: String,
}

/// The typed proposal extracted from one raw model response.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ParsedOutput {
    /// False when no mode could extract usable dialogue (or meta-text was
    /// detected); the gate fails such outputs with `InvalidFormat`
    pub success: bool,
    pub dialogue_text: String,
    pub proposed_mutations: Vec<ProposedMutation>,
    pub world_intents: Vec<WorldIntent>,
    pub function_calls: Vec<FunctionCall>,
    /// The untouched model response, kept for the replay log
    pub raw_output: String,
    pub parse_mode: ParseMode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl ParsedOutput {
    /// A successful parse with just dialogue.
    pub fn dialogue(text: impl Into<String>, raw: impl Into<String>, mode: ParseMode) -> Self {
        Self {
            success: true,
            dialogue_text: text.into(),
            proposed_mutations: Vec::new(),
            world_intents: Vec::new(),
            function_calls: Vec::new(),
            raw_output: raw.into(),
            parse_mode: mode,
            error_message: None,
        }
    }

    /// A failed parse carrying the reason.
    pub fn failure(raw: impl Into<String>, mode: ParseMode, message: impl Into<String>) -> Self {
        Self {
            success: false,
            dialogue_text: String::new(),
            proposed_mutations: Vec::new(),
            world_intents: Vec::new(),
            function_calls: Vec::new(),
            raw_output: raw.into(),
            parse_mode: mode,
            error_message: Some(message.into()),
        }
    }
}
