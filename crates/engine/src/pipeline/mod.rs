//! Dialogue pipeline - sequences a full turn.
//!
//! retrieval -> snapshot -> prompt -> inference -> parse -> gate ->
//! mutate, with validation retries under constraint escalation and a
//! deterministic fallback when validation cannot succeed. The only
//! suspension point is the transport call; cancellation is honored at
//! every await and a canceled turn executes no mutations.

use std::sync::Arc;

use serde::Serialize;
use tokio_util::sync::CancellationToken;

use loreguard_domain::{
    Constraint, ConstraintSet, ConstraintSeverity, GateResult, InteractionContext,
    MutationBatchResult, ParseMode, ParsedOutput, StateSnapshotBuilder, TriggerReason,
};

use crate::expectancy::ExpectancyEvaluator;
use crate::fallback::{FallbackLibrary, FallbackStats};
use crate::gate::{ValidationContext, ValidationGate};
use crate::infrastructure::app_settings::{EngineConfig, LlmSettings, PipelineConfig};
use crate::infrastructure::ports::{
    ClockPort, CompletionRequest, IntentSink, LlmError, LlmPort, StructuredFormat,
};
use crate::memory::MemorySystem;
use crate::mutation::{MutationController, MutationStats};
use crate::parser::{OutputParser, STRUCTURED_OUTPUT_SCHEMA};
use crate::prompt::PromptAssembler;
use crate::retrieval::ContextRetriever;

/// Terminal state of a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum TurnOutcome {
    Success,
    Failure,
    /// Distinct from failure: the host canceled mid-turn
    Canceled,
}

/// What the caller gets back for every turn. `dialogue_text` is non-empty
/// for success and failure outcomes (failures carry a fallback utterance);
/// canceled turns return no dialogue.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TurnResult {
    pub outcome: TurnOutcome,
    pub dialogue_text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parse_mode: Option<ParseMode>,
    pub retry_count: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gate_result: Option<GateResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mutation_result: Option<MutationBatchResult>,
    pub replay: ReplayLog,
}

impl TurnResult {
    pub fn is_success(&self) -> bool {
        self.outcome == TurnOutcome::Success
    }
}

/// One inference attempt in the audit record.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplayAttempt {
    pub attempt: u32,
    pub prompt_text: String,
    pub prompt_was_truncated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_output: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parse_mode: Option<ParseMode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gate_passed: Option<bool>,
    pub failure_descriptions: Vec<String>,
}

/// Replayable audit record for a turn: with the recorded prompts and raw
/// outputs, every downstream stage is a pure function and can be rerun.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplayLog {
    pub npc_id: String,
    pub trigger_reason: TriggerReason,
    pub snapshot_time_ticks: i64,
    pub attempts: Vec<ReplayAttempt>,
    pub outcome: Option<TurnOutcome>,
}

impl ReplayLog {
    fn new(ctx: &InteractionContext, ticks: i64) -> Self {
        Self {
            npc_id: ctx.npc_id.clone(),
            trigger_reason: ctx.trigger_reason,
            snapshot_time_ticks: ticks,
            attempts: Vec::new(),
            outcome: None,
        }
    }
}

/// Counters across the pipeline's lifetime. Canceled turns move only the
/// `canceled` counter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineMetrics {
    pub total_requests: u64,
    pub structured_success: u64,
    pub structured_failure: u64,
    pub regex_direct: u64,
    pub validation_failure: u64,
    pub mutations_executed: u64,
    pub intents_emitted: u64,
    pub total_retries: u64,
    pub canceled: u64,
    pub emergency_fallback: u64,
}

/// Per-turn counter deltas, committed only for non-canceled turns.
#[derive(Debug, Default)]
struct TurnDeltas {
    structured_success: u64,
    structured_failure: u64,
    regex_direct: u64,
    validation_failure: u64,
    mutations_executed: u64,
    intents_emitted: u64,
    total_retries: u64,
    emergency_fallback: u64,
}

impl PipelineMetrics {
    fn commit(&mut self, deltas: &TurnDeltas) {
        self.total_requests += 1;
        self.structured_success += deltas.structured_success;
        self.structured_failure += deltas.structured_failure;
        self.regex_direct += deltas.regex_direct;
        self.validation_failure += deltas.validation_failure;
        self.mutations_executed += deltas.mutations_executed;
        self.intents_emitted += deltas.intents_emitted;
        self.total_retries += deltas.total_retries;
        self.emergency_fallback += deltas.emergency_fallback;
    }
}

/// Owns one NPC's memory and drives its turns. Per the concurrency
/// contract, a pipeline processes one turn at a time; different NPCs get
/// independent pipelines.
pub struct DialoguePipeline {
    memory: MemorySystem,
    llm: Arc<dyn LlmPort>,
    intents: Arc<dyn IntentSink>,
    clock: Arc<dyn ClockPort>,
    evaluator: ExpectancyEvaluator,
    retriever: ContextRetriever,
    assembler: PromptAssembler,
    parser: OutputParser,
    gate: ValidationGate,
    controller: MutationController,
    fallbacks: FallbackLibrary,
    config: PipelineConfig,
    llm_settings: LlmSettings,
    system_prompt: String,
    forbidden_knowledge: Vec<String>,
    metrics: PipelineMetrics,
}

impl DialoguePipeline {
    pub fn new(
        memory: MemorySystem,
        llm: Arc<dyn LlmPort>,
        intents: Arc<dyn IntentSink>,
        clock: Arc<dyn ClockPort>,
        config: EngineConfig,
    ) -> Self {
        Self {
            memory,
            llm,
            intents,
            clock,
            evaluator: ExpectancyEvaluator::with_default_rules(),
            retriever: ContextRetriever::new(config.retrieval),
            assembler: PromptAssembler::new(config.prompt),
            parser: OutputParser::new(),
            gate: ValidationGate::new(),
            controller: MutationController::new(config.pipeline.enable_logging),
            fallbacks: FallbackLibrary::default(),
            config: config.pipeline,
            llm_settings: config.llm,
            system_prompt: String::new(),
            forbidden_knowledge: Vec::new(),
            metrics: PipelineMetrics::default(),
        }
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    pub fn with_forbidden_knowledge(mut self, terms: Vec<String>) -> Self {
        self.forbidden_knowledge = terms;
        self
    }

    pub fn with_evaluator(mut self, evaluator: ExpectancyEvaluator) -> Self {
        self.evaluator = evaluator;
        self
    }

    pub fn with_fallbacks(mut self, fallbacks: FallbackLibrary) -> Self {
        self.fallbacks = fallbacks;
        self
    }

    /// Read access to authoritative memory (e.g. for host snapshots).
    pub fn memory(&self) -> &MemorySystem {
        &self.memory
    }

    /// Mutable access for host-side init (canonical facts, world state).
    pub fn memory_mut(&mut self) -> &mut MemorySystem {
        &mut self.memory
    }

    pub fn metrics(&self) -> PipelineMetrics {
        self.metrics
    }

    pub fn mutation_stats(&self) -> MutationStats {
        self.controller.stats()
    }

    pub fn fallback_stats(&self) -> &FallbackStats {
        self.fallbacks.stats()
    }

    /// Run one turn end-to-end.
    pub async fn run_turn(
        &mut self,
        ctx: InteractionContext,
        cancel: CancellationToken,
    ) -> TurnResult {
        let mut deltas = TurnDeltas::default();
        let mut result = self.run_turn_inner(&ctx, &cancel, &mut deltas).await;
        result.replay.outcome = Some(result.outcome);

        match result.outcome {
            TurnOutcome::Canceled => self.metrics.canceled += 1,
            _ => self.metrics.commit(&deltas),
        }
        result
    }

    async fn run_turn_inner(
        &mut self,
        ctx: &InteractionContext,
        cancel: &CancellationToken,
        deltas: &mut TurnDeltas,
    ) -> TurnResult {
        let ticks = self.clock.ticks();
        let mut replay = ReplayLog::new(ctx, ticks);

        let constraints = self.evaluator.evaluate(ctx);
        let retrieved = self
            .retriever
            .retrieve(&self.memory, ctx.trigger_text(), &[]);
        let episodic_ids = retrieved.episodic_ids();

        let mut snapshot = retrieved
            .apply(
                StateSnapshotBuilder::new()
                    .snapshot_time_ticks(ticks)
                    .context(ctx.clone())
                    .constraints(constraints)
                    .system_prompt(self.system_prompt.clone())
                    .max_attempts(self.config.max_retries + 1),
            )
            .build();

        let mut retry_count = 0u32;
        loop {
            if cancel.is_cancelled() {
                return self.canceled(replay);
            }

            let prompt = self.assembler.assemble(&snapshot);
            let mut attempt_log = ReplayAttempt {
                attempt: snapshot.attempt_number,
                prompt_text: prompt.text.clone(),
                prompt_was_truncated: prompt.was_truncated,
                raw_output: None,
                parse_mode: None,
                gate_passed: None,
                failure_descriptions: Vec::new(),
            };

            let parsed = match self.obtain_parsed(&prompt.text, deltas, cancel).await {
                Ok(parsed) => parsed,
                Err(LlmError::Canceled) => {
                    replay.attempts.push(attempt_log);
                    return self.canceled(replay);
                }
                Err(e) => {
                    replay.attempts.push(attempt_log);
                    let reason = format!("transport: {e}");
                    let text = self.fallback_text(ctx, &reason, ticks, deltas);
                    return self.failure(text, Some(e.to_string()), retry_count, None, replay);
                }
            };

            attempt_log.raw_output = Some(parsed.raw_output.clone());
            attempt_log.parse_mode = Some(parsed.parse_mode);

            let gate_result = self.gate.validate(
                &parsed,
                &ValidationContext {
                    constraints: &snapshot.constraints,
                    memory: &self.memory,
                    snapshot: &snapshot,
                    forbidden_knowledge: &self.forbidden_knowledge,
                    validate_mutation_schemas: self.config.validate_mutation_schemas,
                    validate_intent_schemas: self.config.validate_intent_schemas,
                },
            );
            attempt_log.gate_passed = Some(gate_result.passed);
            attempt_log.failure_descriptions = gate_result
                .failures
                .iter()
                .map(|f| format!("{} [{}]: {}", f.reason, f.severity, f.description))
                .collect();
            replay.attempts.push(attempt_log);

            if gate_result.passed {
                return self.accept(ctx, &parsed, gate_result, &episodic_ids, retry_count, deltas, replay);
            }

            deltas.validation_failure += 1;

            if gate_result.has_critical_failure {
                let reason = summarize_failures(&gate_result);
                tracing::warn!(npc_id = %ctx.npc_id, reason = %reason, "Turn failed critically; no retry");
                let text = self.fallback_text(ctx, &reason, ticks, deltas);
                return self.failure(
                    text,
                    Some(reason),
                    retry_count,
                    Some(gate_result),
                    replay,
                );
            }

            if snapshot.attempt_number < self.config.max_retries {
                let escalated = escalation_constraints(&gate_result, snapshot.attempt_number);
                snapshot = snapshot.for_retry(&escalated);
                retry_count += 1;
                deltas.total_retries += 1;
                continue;
            }

            let reason = summarize_failures(&gate_result);
            let text = self.fallback_text(ctx, &reason, ticks, deltas);
            return self.failure(text, Some(reason), retry_count, Some(gate_result), replay);
        }
    }

    /// Invoke the transport and parse: structured-first when configured,
    /// with an optional plain-endpoint retry on structured failure.
    async fn obtain_parsed(
        &self,
        prompt_text: &str,
        deltas: &mut TurnDeltas,
        cancel: &CancellationToken,
    ) -> Result<ParsedOutput, LlmError> {
        if !self.config.use_structured_output {
            let raw = self
                .llm
                .complete(self.request(prompt_text), cancel.clone())
                .await?;
            deltas.regex_direct += 1;
            return Ok(self.parser.parse(&raw, false));
        }

        let structured = self
            .llm
            .complete_structured(
                self.request(prompt_text),
                STRUCTURED_OUTPUT_SCHEMA,
                StructuredFormat::JsonSchema,
                cancel.clone(),
            )
            .await;

        match structured {
            Ok(raw) => {
                let parsed = self.parser.parse(&raw, true);
                if parsed.success && parsed.parse_mode == ParseMode::Structured {
                    deltas.structured_success += 1;
                    return Ok(parsed);
                }
                deltas.structured_failure += 1;
                if !self.config.fallback_to_regex {
                    return Ok(parsed);
                }
            }
            Err(LlmError::Canceled) => return Err(LlmError::Canceled),
            Err(e) => {
                deltas.structured_failure += 1;
                if !self.config.fallback_to_regex {
                    return Err(e);
                }
                tracing::warn!(error = %e, "Structured endpoint failed; retrying plain");
            }
        }

        let raw = self
            .llm
            .complete(self.request(prompt_text), cancel.clone())
            .await?;
        Ok(self.parser.parse_free_form(&raw))
    }

    fn request(&self, prompt_text: &str) -> CompletionRequest {
        CompletionRequest {
            prompt: prompt_text.to_string(),
            max_tokens: self.llm_settings.max_tokens,
            temperature: self.llm_settings.temperature,
            seed: self.llm_settings.seed,
            top_k: self.llm_settings.top_k,
            cache_prompt: self.llm_settings.cache_prompt,
        }
    }

    /// Accepted turn: execute mutations, record dialogue, decay and touch
    /// episodic memory.
    #[allow(clippy::too_many_arguments)]
    fn accept(
        &mut self,
        ctx: &InteractionContext,
        parsed: &ParsedOutput,
        gate_result: GateResult,
        episodic_ids: &[String],
        retry_count: u32,
        deltas: &mut TurnDeltas,
        replay: ReplayLog,
    ) -> TurnResult {
        let batch =
            self.controller
                .execute(&mut self.memory, &gate_result, self.intents.as_ref(), &ctx.npc_id);
        deltas.mutations_executed += batch.success_count as u64;
        deltas.intents_emitted += batch.emitted_intents.len() as u64;

        let dialogue = gate_result
            .validated_output
            .clone()
            .unwrap_or_else(|| parsed.dialogue_text.clone());

        if let Some(input) = &ctx.player_input {
            self.memory.record_dialogue("Player", input);
        }
        self.memory.record_dialogue(&ctx.npc_id, &dialogue);
        self.memory
            .apply_episodic_decay(self.config.episodic_decay_per_turn);
        self.memory.touch_episodic(episodic_ids);

        TurnResult {
            outcome: TurnOutcome::Success,
            dialogue_text: dialogue,
            error_message: None,
            parse_mode: Some(parsed.parse_mode),
            retry_count,
            gate_result: Some(gate_result),
            mutation_result: Some(batch),
            replay,
        }
    }

    fn failure(
        &self,
        dialogue_text: String,
        error_message: Option<String>,
        retry_count: u32,
        gate_result: Option<GateResult>,
        replay: ReplayLog,
    ) -> TurnResult {
        TurnResult {
            outcome: TurnOutcome::Failure,
            dialogue_text,
            error_message,
            parse_mode: None,
            retry_count,
            gate_result,
            mutation_result: None,
            replay,
        }
    }

    fn canceled(&self, replay: ReplayLog) -> TurnResult {
        TurnResult {
            outcome: TurnOutcome::Canceled,
            dialogue_text: String::new(),
            error_message: None,
            parse_mode: None,
            retry_count: 0,
            gate_result: None,
            mutation_result: None,
            replay,
        }
    }

    fn fallback_text(
        &mut self,
        ctx: &InteractionContext,
        reason: &str,
        ticks: i64,
        deltas: &mut TurnDeltas,
    ) -> String {
        let seed = (ticks as u64) ^ ctx.interaction_count;
        let text = self.fallbacks.select(ctx, reason, seed, None);
        if text == crate::fallback::LAST_RESORT {
            deltas.emergency_fallback += 1;
        }
        text
    }
}

/// Additive prohibition constraints describing the attempt's failures,
/// rendered into the next prompt alongside the originals.
fn escalation_constraints(gate_result: &GateResult, attempt: u32) -> ConstraintSet {
    let mut set = ConstraintSet::new();
    for (index, failure) in gate_result.failures.iter().enumerate() {
        if failure.severity < ConstraintSeverity::Hard {
            continue;
        }
        let rule = failure.violated_rule.as_deref().unwrap_or("format");
        set.add(Constraint::prohibition(
            format!("escalation_a{attempt}_{index}_{rule}"),
            ConstraintSeverity::Hard,
            format!("Your previous answer was rejected: {}", failure.description),
            vec![],
        ));
    }
    set
}

fn summarize_failures(gate_result: &GateResult) -> String {
    gate_result
        .failures
        .iter()
        .map(|f| f.description.as_str())
        .collect::<Vec<_>>()
        .join("; ")
}
