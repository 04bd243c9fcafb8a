//! Port traits for infrastructure boundaries.
//!
//! These are the only abstractions in the engine. Ports exist for:
//! - LLM transport (could swap llama-server -> any completion server)
//! - The outbound world-intent channel (host-owned delivery)
//! - Clock and id generation (deterministic tests inject fixed variants)
//!
//! The pipeline has no process-wide singletons: everything here is an
//! injected dependency with explicit construction.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;

use loreguard_domain::OutboundIntent;

// =============================================================================
// Error Types
// =============================================================================

#[derive(Debug, Clone, thiserror::Error)]
pub enum LlmError {
    #[error("LLM request failed: {0}")]
    RequestFailed(String),
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
    #[error("Request canceled")]
    Canceled,
}

#[derive(Debug, thiserror::Error)]
pub enum IntentError {
    #[error("Intent channel closed")]
    ChannelClosed,
}

// =============================================================================
// LLM Transport
// =============================================================================

/// How a structured-output schema is transmitted to the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StructuredFormat {
    /// Server-side JSON-schema constrained sampling
    JsonSchema,
    /// A GBNF grammar string
    Grammar,
    /// OpenAI-style `response_format` field
    ResponseFormat,
    /// No server-side constraint; the schema is advisory only
    None,
}

/// A single completion request. The prompt is the full rendered byte
/// sequence; the transport adds nothing to it.
#[derive(Debug, Clone, Default)]
pub struct CompletionRequest {
    pub prompt: String,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
    pub seed: Option<u64>,
    pub top_k: Option<u32>,
    /// Ask the server to reuse its KV cache for a shared prompt prefix
    pub cache_prompt: bool,
}

impl CompletionRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            ..Self::default()
        }
    }
}

/// Transport to the external LLM server. Responses are untrusted strings;
/// the governance plane owns all validation.
#[async_trait]
pub trait LlmPort: Send + Sync {
    /// Plain completion.
    async fn complete(
        &self,
        request: CompletionRequest,
        cancel: CancellationToken,
    ) -> Result<String, LlmError>;

    /// Completion with a structured-output constraint. `schema_json` is a
    /// JSON schema (or a GBNF grammar when `format` is `Grammar`).
    async fn complete_structured(
        &self,
        request: CompletionRequest,
        schema_json: &str,
        format: StructuredFormat,
        cancel: CancellationToken,
    ) -> Result<String, LlmError>;
}

// =============================================================================
// Outbound World Intents
// =============================================================================

/// Receiver side of world-intent emission. Enqueueing is synchronous;
/// delivery is asynchronous and at-least-once from the pipeline's side -
/// the channel owner dedups if needed.
pub trait IntentSink: Send + Sync {
    fn emit(&self, intent: OutboundIntent) -> Result<(), IntentError>;
}

// =============================================================================
// Clock / Ids
// =============================================================================

pub trait ClockPort: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    /// Logical tick value for snapshot stamping.
    fn ticks(&self) -> i64 {
        self.now().timestamp_millis()
    }
}

pub trait IdPort: Send + Sync {
    fn next_id(&self) -> String;
}
