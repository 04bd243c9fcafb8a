//! Engine configuration
//!
//! Every option is an enumerated, typed field - there is no dynamic
//! key/value surface, so unknown options cannot exist past load time.
//! Environment loading goes through `from_env()` constructors; hosts that
//! configure programmatically just build the structs.

use loreguard_domain::DomainError;

use crate::prompt::PromptMode;

/// Capacity bounds for the authoritative memory store.
#[derive(Debug, Clone)]
pub struct MemoryConfig {
    /// Capacity bound on episodic entries; lowest-strength entries are
    /// pruned when the active count exceeds this
    pub max_episodic_memories: usize,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            max_episodic_memories: 200,
        }
    }
}

/// Selection caps, filters, and ranking weights for context retrieval.
#[derive(Debug, Clone)]
pub struct RetrievalConfig {
    /// 0 = include all canonical facts; otherwise topic-filter then cap
    pub max_canonical_facts: usize,
    pub max_world_state: usize,
    pub max_episodic_memories: usize,
    pub max_beliefs: usize,
    pub max_dialogue_history: usize,
    pub min_episodic_strength: f32,
    pub min_belief_confidence: f32,
    /// Episodic ranking weights; must sum to 1
    pub recency_weight: f32,
    pub relevance_weight: f32,
    pub significance_weight: f32,
    pub include_contradicted_beliefs: bool,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            max_canonical_facts: 0,
            max_world_state: 50,
            max_episodic_memories: 10,
            max_beliefs: 10,
            max_dialogue_history: 10,
            min_episodic_strength: 0.2,
            min_belief_confidence: 0.3,
            recency_weight: 0.4,
            relevance_weight: 0.4,
            significance_weight: 0.2,
            include_contradicted_beliefs: false,
        }
    }
}

impl RetrievalConfig {
    /// Ranking weights must sum to 1 (within floating tolerance).
    pub fn validate(&self) -> Result<(), DomainError> {
        let sum = self.recency_weight + self.relevance_weight + self.significance_weight;
        if (sum - 1.0).abs() > 1e-3 {
            return Err(DomainError::configuration(format!(
                "retrieval ranking weights must sum to 1.0, got {sum}"
            )));
        }
        Ok(())
    }
}

/// Prompt rendering options.
#[derive(Debug, Clone)]
pub struct PromptConfig {
    pub mode: PromptMode,
    /// Byte budget for the rendered prompt; 0 = unlimited
    pub max_prompt_bytes: usize,
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            mode: PromptMode::Text,
            max_prompt_bytes: 0,
        }
    }
}

/// Turn orchestration options.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Cap on validation-retry attempts per turn (transport retries are
    /// handled separately by the resilient client)
    pub max_retries: u32,
    /// Try the structured endpoint first
    pub use_structured_output: bool,
    /// On structured error, retry via the plain endpoint
    pub fallback_to_regex: bool,
    pub validate_mutation_schemas: bool,
    pub validate_intent_schemas: bool,
    /// Per-mutation logging; disabled by default
    pub enable_logging: bool,
    /// Strength decay applied to episodic memories after each turn
    pub episodic_decay_per_turn: f32,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            use_structured_output: true,
            fallback_to_regex: true,
            validate_mutation_schemas: true,
            validate_intent_schemas: true,
            enable_logging: false,
            episodic_decay_per_turn: 0.02,
        }
    }
}

/// Transport request parameters passed through to the LLM server.
#[derive(Debug, Clone)]
pub struct LlmSettings {
    pub base_url: String,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
    pub seed: Option<u64>,
    pub top_k: Option<u32>,
    pub cache_prompt: bool,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            base_url: crate::infrastructure::llama_server::DEFAULT_LLAMA_BASE_URL.to_string(),
            max_tokens: Some(512),
            temperature: Some(0.7),
            seed: None,
            top_k: None,
            cache_prompt: true,
        }
    }
}

/// Top-level engine configuration.
#[derive(Debug, Clone, Default)]
pub struct EngineConfig {
    pub memory: MemoryConfig,
    pub retrieval: RetrievalConfig,
    pub prompt: PromptConfig,
    pub pipeline: PipelineConfig,
    pub llm: LlmSettings,
}

impl EngineConfig {
    /// Load configuration from the environment (`.env` is honored).
    /// Unset variables keep their defaults; set-but-invalid values are a
    /// load error, not a silent fallback.
    pub fn from_env() -> Result<Self, DomainError> {
        dotenvy::dotenv().ok();

        let mut config = Self::default();

        if let Some(v) = read_env("LOREGUARD_LLM_BASE_URL")? {
            config.llm.base_url = v;
        }
        if let Some(v) = read_env("LOREGUARD_MAX_RETRIES")? {
            config.pipeline.max_retries = parse_env("LOREGUARD_MAX_RETRIES", &v)?;
        }
        if let Some(v) = read_env("LOREGUARD_USE_STRUCTURED_OUTPUT")? {
            config.pipeline.use_structured_output =
                parse_env("LOREGUARD_USE_STRUCTURED_OUTPUT", &v)?;
        }
        if let Some(v) = read_env("LOREGUARD_FALLBACK_TO_REGEX")? {
            config.pipeline.fallback_to_regex = parse_env("LOREGUARD_FALLBACK_TO_REGEX", &v)?;
        }
        if let Some(v) = read_env("LOREGUARD_MAX_EPISODIC_MEMORIES")? {
            config.memory.max_episodic_memories =
                parse_env("LOREGUARD_MAX_EPISODIC_MEMORIES", &v)?;
        }
        if let Some(v) = read_env("LOREGUARD_MAX_PROMPT_BYTES")? {
            config.prompt.max_prompt_bytes = parse_env("LOREGUARD_MAX_PROMPT_BYTES", &v)?;
        }

        config.retrieval.validate()?;
        Ok(config)
    }
}

fn read_env(key: &str) -> Result<Option<String>, DomainError> {
    match std::env::var(key) {
        Ok(v) if v.trim().is_empty() => Ok(None),
        Ok(v) => Ok(Some(v)),
        Err(std::env::VarError::NotPresent) => Ok(None),
        Err(e) => Err(DomainError::configuration(format!("{key}: {e}"))),
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, DomainError> {
    value
        .trim()
        .parse()
        .map_err(|_| DomainError::configuration(format!("{key}: invalid value '{value}'")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_weights_are_valid() {
        assert!(RetrievalConfig::default().validate().is_ok());
    }

    #[test]
    fn test_bad_weights_rejected() {
        let config = RetrievalConfig {
            recency_weight: 0.9,
            relevance_weight: 0.9,
            significance_weight: 0.9,
            ..RetrievalConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(DomainError::Configuration(_))
        ));
    }

    #[test]
    fn test_parse_env_rejects_garbage() {
        let result: Result<u32, _> = parse_env("LOREGUARD_MAX_RETRIES", "not-a-number");
        assert!(result.is_err());
    }
}
