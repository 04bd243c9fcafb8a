//! llama-server LLM client (llama.cpp completion API)

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::infrastructure::ports::{
    CompletionRequest, LlmError, LlmPort, StructuredFormat,
};

/// Client for a llama.cpp-style `/completion` endpoint.
#[derive(Clone)]
pub struct LlamaServerClient {
    client: Client,
    base_url: String,
}

/// Default llama-server base URL.
pub const DEFAULT_LLAMA_BASE_URL: &str = "http://localhost:8080";

impl LlamaServerClient {
    pub fn new(base_url: &str) -> Self {
        // LLM requests can be slow; allow two minutes.
        let client = Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Create client with custom timeout (for testing).
    pub fn with_timeout(base_url: &str, timeout_secs: u64) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Create client from the `LOREGUARD_LLM_BASE_URL` environment
    /// variable, falling back to the default if not set.
    pub fn from_env() -> Self {
        let base_url = std::env::var("LOREGUARD_LLM_BASE_URL")
            .unwrap_or_else(|_| DEFAULT_LLAMA_BASE_URL.to_string());
        Self::new(&base_url)
    }

    async fn post_completion(
        &self,
        api_request: LlamaCompletionRequest,
        cancel: CancellationToken,
    ) -> Result<String, LlmError> {
        let send = async {
            let response = self
                .client
                .post(format!("{}/completion", self.base_url))
                .json(&api_request)
                .send()
                .await
                .map_err(|e| LlmError::RequestFailed(e.to_string()))?;

            if !response.status().is_success() {
                let error_text = response
                    .text()
                    .await
                    .map_err(|e| LlmError::RequestFailed(e.to_string()))?;
                return Err(LlmError::RequestFailed(error_text));
            }

            let api_response: LlamaCompletionResponse = response
                .json()
                .await
                .map_err(|e| LlmError::InvalidResponse(e.to_string()))?;

            Ok(api_response.content)
        };

        tokio::select! {
            _ = cancel.cancelled() => Err(LlmError::Canceled),
            result = send => result,
        }
    }
}

impl Default for LlamaServerClient {
    fn default() -> Self {
        Self::new(DEFAULT_LLAMA_BASE_URL)
    }
}

#[async_trait]
impl LlmPort for LlamaServerClient {
    async fn complete(
        &self,
        request: CompletionRequest,
        cancel: CancellationToken,
    ) -> Result<String, LlmError> {
        self.post_completion(build_request(&request), cancel).await
    }

    async fn complete_structured(
        &self,
        request: CompletionRequest,
        schema_json: &str,
        format: StructuredFormat,
        cancel: CancellationToken,
    ) -> Result<String, LlmError> {
        let mut api_request = build_request(&request);

        match format {
            StructuredFormat::JsonSchema => {
                let schema: serde_json::Value = serde_json::from_str(schema_json)
                    .map_err(|e| LlmError::RequestFailed(format!("Invalid schema JSON: {e}")))?;
                api_request.json_schema = Some(schema);
            }
            StructuredFormat::Grammar => {
                api_request.grammar = Some(schema_json.to_string());
            }
            StructuredFormat::ResponseFormat => {
                let schema: serde_json::Value = serde_json::from_str(schema_json)
                    .map_err(|e| LlmError::RequestFailed(format!("Invalid schema JSON: {e}")))?;
                api_request.response_format = Some(ResponseFormat {
                    r#type: "json_schema".to_string(),
                    json_schema: schema,
                });
            }
            StructuredFormat::None => {}
        }

        self.post_completion(api_request, cancel).await
    }
}

fn build_request(request: &CompletionRequest) -> LlamaCompletionRequest {
    LlamaCompletionRequest {
        prompt: request.prompt.clone(),
        n_predict: request.max_tokens,
        temperature: request.temperature,
        seed: request.seed,
        top_k: request.top_k,
        cache_prompt: request.cache_prompt,
        json_schema: None,
        grammar: None,
        response_format: None,
    }
}

// =============================================================================
// llama.cpp API types
// =============================================================================

#[derive(Debug, Serialize)]
struct LlamaCompletionRequest {
    prompt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    n_predict: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    seed: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_k: Option<u32>,
    cache_prompt: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    json_schema: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    grammar: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    r#type: String,
    json_schema: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct LlamaCompletionResponse {
    content: String,
}
