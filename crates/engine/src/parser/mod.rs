//! Output parser - converts raw model text into a typed proposal.
//!
//! Three modes with a fallback chain: structured JSON, marker extraction
//! over free-form prose, and whole-string dialogue. The parser is pure
//! (same bytes in, same `ParsedOutput` out) and never trusts the model:
//! unknown mutation types degrade to `AppendEpisodic`, malformed JSON
//! degrades to the next mode, and meta-text fails the parse outright.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex_lite::Regex;
use serde::Deserialize;

use loreguard_domain::{FunctionCall, ParseMode, ParsedOutput, ProposedMutation, WorldIntent};

/// JSON schema sent to the structured completion endpoint.
pub const STRUCTURED_OUTPUT_SCHEMA: &str = r#"{
  "type": "object",
  "properties": {
    "dialogueText": { "type": "string" },
    "proposedMutations": {
      "type": "array",
      "items": {
        "type": "object",
        "properties": {
          "type": { "type": "string" },
          "target": { "type": "string" },
          "content": { "type": "string" },
          "confidence": { "type": "number" },
          "sourceText": { "type": "string" }
        },
        "required": ["type", "content"]
      }
    },
    "worldIntents": {
      "type": "array",
      "items": {
        "type": "object",
        "properties": {
          "intentType": { "type": "string" },
          "target": { "type": "string" },
          "parameters": { "type": "object" }
        },
        "required": ["intentType"]
      }
    },
    "functionCalls": {
      "type": "array",
      "items": {
        "type": "object",
        "properties": {
          "name": { "type": "string" },
          "arguments": { "type": "object" }
        },
        "required": ["name"]
      }
    }
  },
  "required": ["dialogueText"]
}"#;

// Mutation/intent markers in free-form output:
//   [MUTATION: TransformBelief(belief_king)] The king seems tired
//   [INTENT: OpenGate] the north gate
static MUTATION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^\s*\[MUTATION:\s*([A-Za-z]+)(?:\(([^)]*)\))?\]\s*(.+)$")
        .expect("valid regex")
});
static INTENT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^\s*\[INTENT:\s*([A-Za-z_]+)\]\s*(.+)$").expect("valid regex")
});

// Model chat-template tokens that leak through some servers:
// <|...|> style, [INST]/[/INST], <<SYS>>/<</SYS>>.
static SPECIAL_TOKENS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<\|[^|>]+\|>|\[/?INST\]|<</?SYS>>").expect("valid regex"));

// Harmony-style responses put the payload after a final-channel marker.
static FINAL_CONTENT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<\|channel\|>final<\|message\|>(.*)$").expect("valid regex"));

// Meta-text that means the model broke character.
static META_TEXT_RES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?i)\bas an ai\b",
        r"(?i)\bas a language model\b",
        r"(?i)\bexample answer\b",
        r"(?i)\byour response here\b",
        r"(?i)\bi cannot roleplay\b",
        r"(?i)\[insert",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("valid regex"))
    .collect()
});

/// Remove model-specific special tokens that may leak through from LLM
/// output, extracting the final-channel payload when present.
pub fn strip_special_tokens(raw: &str) -> String {
    if let Some(caps) = FINAL_CONTENT_RE.captures(raw) {
        if let Some(content) = caps.get(1) {
            let extracted = content.as_str().trim();
            return SPECIAL_TOKENS_RE.replace_all(extracted, "").to_string();
        }
    }
    SPECIAL_TOKENS_RE.replace_all(raw, "").to_string()
}

fn detect_meta_text(dialogue: &str) -> Option<String> {
    for re in META_TEXT_RES.iter() {
        if let Some(m) = re.find(dialogue) {
            return Some(format!("Meta-text detected: '{}'", m.as_str()));
        }
    }
    None
}

/// Stateless parser front-end.
#[derive(Debug, Clone, Copy, Default)]
pub struct OutputParser;

impl OutputParser {
    pub fn new() -> Self {
        Self
    }

    /// Full fallback chain: structured (when expected), then marker
    /// extraction, then whole-string dialogue.
    pub fn parse(&self, raw: &str, expect_structured: bool) -> ParsedOutput {
        if expect_structured {
            let parsed = self.parse_structured(raw);
            if parsed.success {
                return parsed;
            }
            // Meta-text failures are terminal, format failures fall
            // through to marker extraction.
            if parsed
                .error_message
                .as_deref()
                .is_some_and(|m| m.starts_with("Meta-text"))
            {
                return parsed;
            }
        }
        self.parse_free_form(raw)
    }

    /// Structured mode: the whole response is a JSON document.
    pub fn parse_structured(&self, raw: &str) -> ParsedOutput {
        let cleaned = strip_special_tokens(raw);
        let Some(json_text) = extract_json(&cleaned) else {
            return ParsedOutput::failure(raw, ParseMode::Structured, "No JSON object found");
        };

        let response: StructuredResponse = match serde_json::from_str(&json_text) {
            Ok(r) => r,
            Err(e) => {
                return ParsedOutput::failure(
                    raw,
                    ParseMode::Structured,
                    format!("JSON parse error: {e}"),
                );
            }
        };

        let dialogue = response.dialogue_text.trim().to_string();
        if dialogue.is_empty() {
            return ParsedOutput::failure(raw, ParseMode::Structured, "Empty dialogueText");
        }
        if let Some(message) = detect_meta_text(&dialogue) {
            return ParsedOutput::failure(raw, ParseMode::Structured, message);
        }

        let mut output = ParsedOutput::dialogue(dialogue, raw, ParseMode::Structured);
        output.proposed_mutations = response
            .proposed_mutations
            .into_iter()
            .map(RawMutation::into_mutation)
            .collect();
        output.world_intents = response
            .world_intents
            .into_iter()
            .map(|raw| WorldIntent {
                intent_type: raw.intent_type,
                target: raw.target,
                parameters: raw.parameters,
            })
            .collect();
        output.function_calls = response
            .function_calls
            .into_iter()
            .map(|raw| FunctionCall {
                name: raw.name,
                arguments: raw.arguments.to_string(),
            })
            .collect();
        output
    }

    /// Regex mode: prose dialogue with optional `[MUTATION: ...]` and
    /// `[INTENT: ...]` marker lines.
    pub fn parse_free_form(&self, raw: &str) -> ParsedOutput {
        let cleaned = strip_special_tokens(raw);

        let mut mutations = Vec::new();
        for caps in MUTATION_RE.captures_iter(&cleaned) {
            let kind = caps.get(1).map_or("", |m| m.as_str());
            let target = caps
                .get(2)
                .map(|m| m.as_str().trim().to_string())
                .filter(|t| !t.is_empty());
            let content = caps.get(3).map_or("", |m| m.as_str()).trim().to_string();
            mutations.push(build_mutation(kind, target, content, None, None));
        }

        let mut intents = Vec::new();
        for caps in INTENT_RE.captures_iter(&cleaned) {
            let intent_type = caps.get(1).map_or("", |m| m.as_str()).to_string();
            let content = caps.get(2).map_or("", |m| m.as_str()).trim().to_string();
            let mut parameters = BTreeMap::new();
            if !content.is_empty() {
                parameters.insert("content".to_string(), content);
            }
            intents.push(WorldIntent {
                intent_type,
                target: None,
                parameters,
            });
        }

        // Dialogue is whatever remains after the marker lines.
        let dialogue: String = cleaned
            .lines()
            .filter(|line| !MUTATION_RE.is_match(line) && !INTENT_RE.is_match(line))
            .map(|line| line.trim())
            .filter(|line| !line.is_empty())
            .collect::<Vec<_>>()
            .join("\n");

        let (dialogue, parse_mode) = if dialogue.is_empty() {
            // Fallback mode: the whole string is the dialogue.
            (cleaned.trim().to_string(), ParseMode::Fallback)
        } else {
            (dialogue, ParseMode::Regex)
        };

        if dialogue.is_empty() {
            return ParsedOutput::failure(raw, ParseMode::Fallback, "Empty response");
        }
        if let Some(message) = detect_meta_text(&dialogue) {
            return ParsedOutput::failure(raw, parse_mode, message);
        }

        let mut output = ParsedOutput::dialogue(dialogue, raw, parse_mode);
        if parse_mode == ParseMode::Regex {
            output.proposed_mutations = mutations;
            output.world_intents = intents;
        }
        output
    }
}

/// Pull a JSON object out of the cleaned response: direct, fenced, or the
/// outermost brace span.
fn extract_json(text: &str) -> Option<String> {
    let trimmed = text.trim();
    if trimmed.starts_with('{') && trimmed.ends_with('}') {
        return Some(trimmed.to_string());
    }
    // Fenced code block.
    if let Some(start) = trimmed.find("```") {
        let after = &trimmed[start + 3..];
        let after = after.strip_prefix("json").unwrap_or(after);
        if let Some(end) = after.find("```") {
            let inner = after[..end].trim();
            if inner.starts_with('{') {
                return Some(inner.to_string());
            }
        }
    }
    // Outermost braces.
    let start = trimmed.find('{')?;
    let end = trimmed.rfind('}')?;
    if end > start {
        return Some(trimmed[start..=end].to_string());
    }
    None
}

fn build_mutation(
    kind: &str,
    target: Option<String>,
    content: String,
    confidence: Option<f32>,
    source_text: Option<String>,
) -> ProposedMutation {
    match kind.to_ascii_lowercase().as_str() {
        "appendepisodic" => ProposedMutation::AppendEpisodic {
            content,
            source_text,
            confidence,
        },
        "transformbelief" => ProposedMutation::TransformBelief {
            target,
            content,
            confidence,
        },
        "transformrelationship" => ProposedMutation::TransformRelationship { target, content },
        "emitworldintent" => ProposedMutation::EmitWorldIntent {
            intent_type: target.unwrap_or_else(|| "unspecified".to_string()),
            content,
        },
        // Unknown mutation types degrade to an episodic note carrying the
        // raw content.
        _ => ProposedMutation::AppendEpisodic {
            content,
            source_text,
            confidence,
        },
    }
}

// =============================================================================
// Structured response wire types
// =============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StructuredResponse {
    #[serde(default)]
    dialogue_text: String,
    #[serde(default)]
    proposed_mutations: Vec<RawMutation>,
    #[serde(default)]
    world_intents: Vec<RawIntent>,
    #[serde(default)]
    function_calls: Vec<RawFunctionCall>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawMutation {
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(default)]
    target: Option<String>,
    #[serde(default)]
    content: String,
    #[serde(default)]
    confidence: Option<f32>,
    #[serde(default)]
    source_text: Option<String>,
}

impl RawMutation {
    fn into_mutation(self) -> ProposedMutation {
        build_mutation(
            &self.kind,
            self.target,
            self.content,
            self.confidence,
            self.source_text,
        )
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawIntent {
    #[serde(default)]
    intent_type: String,
    #[serde(default)]
    target: Option<String>,
    #[serde(default)]
    parameters: BTreeMap<String, String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawFunctionCall {
    name: String,
    #[serde(default)]
    arguments: serde_json::Value,
}
