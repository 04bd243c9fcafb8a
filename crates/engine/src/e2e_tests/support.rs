//! Shared fixtures for the end-to-end tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::infrastructure::app_settings::EngineConfig;
use crate::infrastructure::clock::{SequentialIds, TickClock};
use crate::infrastructure::intents::CollectingIntentSink;
use crate::infrastructure::ports::{
    CompletionRequest, LlmError, LlmPort, StructuredFormat,
};
use crate::memory::MemorySystem;
use crate::pipeline::DialoguePipeline;

/// LLM port that replays a scripted list of responses and counts calls.
pub struct ScriptedLlm {
    responses: Mutex<VecDeque<Result<String, LlmError>>>,
    calls: AtomicU32,
}

impl ScriptedLlm {
    pub fn new(responses: Vec<&str>) -> Self {
        Self {
            responses: Mutex::new(
                responses.into_iter().map(|r| Ok(r.to_string())).collect(),
            ),
            calls: AtomicU32::new(0),
        }
    }

    pub fn with_results(results: Vec<Result<String, LlmError>>) -> Self {
        Self {
            responses: Mutex::new(results.into_iter().collect()),
            calls: AtomicU32::new(0),
        }
    }

    pub fn call_count(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    fn next(&self) -> Result<String, LlmError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.responses
            .lock()
            .expect("script lock poisoned")
            .pop_front()
            .unwrap_or_else(|| Err(LlmError::RequestFailed("script exhausted".to_string())))
    }
}

#[async_trait]
impl LlmPort for ScriptedLlm {
    async fn complete(
        &self,
        _request: CompletionRequest,
        cancel: CancellationToken,
    ) -> Result<String, LlmError> {
        if cancel.is_cancelled() {
            return Err(LlmError::Canceled);
        }
        self.next()
    }

    async fn complete_structured(
        &self,
        _request: CompletionRequest,
        _schema_json: &str,
        _format: StructuredFormat,
        cancel: CancellationToken,
    ) -> Result<String, LlmError> {
        if cancel.is_cancelled() {
            return Err(LlmError::Canceled);
        }
        self.next()
    }
}

/// A fully deterministic pipeline over a scripted model.
pub struct Fixture {
    pub pipeline: DialoguePipeline,
    pub llm: Arc<ScriptedLlm>,
    pub intents: Arc<CollectingIntentSink>,
}

impl Fixture {
    pub fn new(llm: ScriptedLlm, configure: impl FnOnce(&mut EngineConfig)) -> Self {
        let mut config = EngineConfig::default();
        configure(&mut config);

        let memory = MemorySystem::new(
            Arc::new(TickClock::from_epoch()),
            Arc::new(SequentialIds::new("mem")),
            config.memory.clone(),
        );
        let llm = Arc::new(llm);
        let intents = Arc::new(CollectingIntentSink::new());

        let pipeline = DialoguePipeline::new(
            memory,
            llm.clone(),
            intents.clone(),
            Arc::new(TickClock::from_epoch()),
            config,
        )
        .with_system_prompt("You are Aldric, gatekeeper of Camelot.");

        Self {
            pipeline,
            llm,
            intents,
        }
    }
}
