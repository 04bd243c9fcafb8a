//! Property tests for the governance invariants: canonical immutability,
//! authority monotonicity, prompt determinism, insertion-order
//! independence, serialization round-trips, gate purity, fallback
//! determinism, and the transport retry bound.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use proptest::prelude::*;
use tokio_util::sync::CancellationToken;

use loreguard_domain::{
    BeliefType, Constraint, ConstraintSet, ConstraintSeverity, EpisodeType, InteractionContext,
    MutationSource, ParseMode, ParsedOutput, ProposedMutation, StateSnapshotBuilder,
    TriggerReason,
};
use loreguard_engine::fallback::FallbackLibrary;
use loreguard_engine::gate::{ValidationContext, ValidationGate};
use loreguard_engine::infrastructure::app_settings::{EngineConfig, MemoryConfig};
use loreguard_engine::infrastructure::clock::{FixedClock, SequentialIds, TickClock};
use loreguard_engine::infrastructure::intents::NullIntentSink;
use loreguard_engine::infrastructure::ports::{
    CompletionRequest, LlmError, LlmPort, StructuredFormat,
};
use loreguard_engine::memory::{persistence, BeliefDraft, EpisodicDraft, MemorySystem};
use loreguard_engine::pipeline::{DialoguePipeline, TurnOutcome, TurnResult};
use loreguard_engine::prompt::PromptAssembler;
use loreguard_engine::retrieval::ContextRetriever;

fn ident() -> impl Strategy<Value = String> {
    proptest::string::string_regex("[a-z][a-z0-9_]{0,8}").unwrap()
}

fn text() -> impl Strategy<Value = String> {
    proptest::string::string_regex("[A-Za-z][A-Za-z0-9 ,.']{0,40}").unwrap()
}

fn unit_interval() -> impl Strategy<Value = f32> {
    (0u32..=100).prop_map(|n| n as f32 / 100.0)
}

fn non_designer_source() -> impl Strategy<Value = MutationSource> {
    prop_oneof![
        Just(MutationSource::GameSystem),
        Just(MutationSource::ValidatedOutput),
        Just(MutationSource::LlmSuggestion),
    ]
}

fn model_source() -> impl Strategy<Value = MutationSource> {
    prop_oneof![
        Just(MutationSource::ValidatedOutput),
        Just(MutationSource::LlmSuggestion),
    ]
}

/// A runtime mutation attempt against the memory system.
#[derive(Debug, Clone)]
enum Op {
    SetWorldState {
        key: String,
        value: String,
        source: MutationSource,
    },
    AddEpisodic {
        description: String,
        significance: f32,
        source: MutationSource,
    },
    SetBelief {
        id: String,
        subject: String,
        content: String,
        confidence: f32,
        source: MutationSource,
    },
    Decay(f32),
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (ident(), text(), non_designer_source()).prop_map(|(key, value, source)| {
            Op::SetWorldState { key, value, source }
        }),
        (text(), unit_interval(), non_designer_source()).prop_map(
            |(description, significance, source)| Op::AddEpisodic {
                description,
                significance,
                source,
            }
        ),
        (ident(), ident(), text(), unit_interval(), non_designer_source()).prop_map(
            |(id, subject, content, confidence, source)| Op::SetBelief {
                id,
                subject,
                content,
                confidence,
                source,
            }
        ),
        unit_interval().prop_map(Op::Decay),
    ]
}

fn apply(memory: &mut MemorySystem, op: &Op) {
    match op {
        Op::SetWorldState { key, value, source } => {
            memory.set_world_state(key.clone(), value.clone(), *source);
        }
        Op::AddEpisodic {
            description,
            significance,
            source,
        } => {
            memory.add_episodic(
                EpisodicDraft::new(description.clone(), EpisodeType::Event, *significance),
                *source,
            );
        }
        Op::SetBelief {
            id,
            subject,
            content,
            confidence,
            source,
        } => {
            memory.set_belief(
                id.clone(),
                BeliefDraft::new(subject.clone(), content.clone(), BeliefType::Opinion, *confidence),
                *source,
            );
        }
        Op::Decay(delta) => memory.apply_episodic_decay(*delta),
    }
}

fn tick_memory() -> MemorySystem {
    MemorySystem::new(
        Arc::new(TickClock::from_epoch()),
        Arc::new(SequentialIds::new("p")),
        MemoryConfig::default(),
    )
}

fn fixed_memory() -> MemorySystem {
    MemorySystem::new(
        Arc::new(FixedClock::epoch()),
        Arc::new(SequentialIds::new("p")),
        MemoryConfig::default(),
    )
}

fn proposed_mutation() -> impl Strategy<Value = ProposedMutation> {
    prop_oneof![
        (text(), proptest::option::of(text())).prop_map(|(content, source_text)| {
            ProposedMutation::AppendEpisodic {
                content,
                source_text,
                confidence: None,
            }
        }),
        (proptest::option::of(ident()), text()).prop_map(|(target, content)| {
            ProposedMutation::TransformBelief {
                target,
                content,
                confidence: None,
            }
        }),
        (proptest::option::of(ident()), text()).prop_map(|(target, content)| {
            ProposedMutation::TransformRelationship { target, content }
        }),
        (ident(), text()).prop_map(|(intent_type, content)| {
            ProposedMutation::EmitWorldIntent {
                intent_type,
                content,
            }
        }),
    ]
}

/// LLM port that always answers the same line and counts transport calls.
struct CountingLlm {
    response: String,
    calls: AtomicU32,
}

impl CountingLlm {
    fn new(response: &str) -> Self {
        Self {
            response: response.to_string(),
            calls: AtomicU32::new(0),
        }
    }

    fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LlmPort for CountingLlm {
    async fn complete(
        &self,
        _request: CompletionRequest,
        cancel: CancellationToken,
    ) -> Result<String, LlmError> {
        if cancel.is_cancelled() {
            return Err(LlmError::Canceled);
        }
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.response.clone())
    }

    async fn complete_structured(
        &self,
        request: CompletionRequest,
        _schema_json: &str,
        _format: StructuredFormat,
        cancel: CancellationToken,
    ) -> Result<String, LlmError> {
        self.complete(request, cancel).await
    }
}

/// A deterministic pipeline whose model always answers `response`; plain
/// endpoint only, so transport calls map 1:1 to validation attempts.
fn pipeline_over(
    response: &str,
    max_retries: u32,
    with_canon: bool,
) -> (DialoguePipeline, Arc<CountingLlm>) {
    let mut config = EngineConfig::default();
    config.pipeline.use_structured_output = false;
    config.pipeline.max_retries = max_retries;

    let mut memory = MemorySystem::new(
        Arc::new(TickClock::from_epoch()),
        Arc::new(SequentialIds::new("p")),
        config.memory.clone(),
    );
    if with_canon {
        memory.add_canonical_fact("king_name", "The king is named Arthur", "royalty");
    }

    let llm = Arc::new(CountingLlm::new(response));
    let pipeline = DialoguePipeline::new(
        memory,
        llm.clone(),
        Arc::new(NullIntentSink),
        Arc::new(TickClock::from_epoch()),
        config,
    );
    (pipeline, llm)
}

fn block_on_turn(pipeline: &mut DialoguePipeline, input: &str) -> TurnResult {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("tokio runtime");
    runtime.block_on(pipeline.run_turn(
        InteractionContext::player_utterance("npc_1", input),
        CancellationToken::new(),
    ))
}

proptest! {
    /// No sequence of non-designer mutations changes the canonical set.
    #[test]
    fn canonical_facts_survive_any_mutation_sequence(ops in proptest::collection::vec(op(), 0..40)) {
        let mut memory = tick_memory();
        memory.add_canonical_fact("king_name", "The king is named Arthur", "royalty");
        memory.add_canonical_fact("capital", "The capital is Camelot", "geography");

        let before: Vec<(String, String)> = memory
            .canonical_facts()
            .map(|f| (f.id.clone(), f.fact.clone()))
            .collect();

        for op in &ops {
            apply(&mut memory, op);
        }

        let after: Vec<(String, String)> = memory
            .canonical_facts()
            .map(|f| (f.id.clone(), f.fact.clone()))
            .collect();
        prop_assert_eq!(before, after);
    }

    /// A mutation whose source ranks below the target authority leaves the
    /// whole state byte-identical.
    #[test]
    fn underranked_mutations_are_no_ops(
        key in ident(),
        value in text(),
        source in model_source(),
    ) {
        let mut memory = fixed_memory();
        memory.add_canonical_fact("king_name", "The king is named Arthur", "royalty");
        memory.set_world_state(key.clone(), "initial", MutationSource::GameSystem);
        let before = persistence::serialize(&memory).unwrap();

        // Model-ranked sources cannot write world state, nor shadow a
        // canonical id with a belief.
        let denied = memory.set_world_state(key, value.clone(), source);
        prop_assert!(!denied.success);
        let denied = memory.set_belief(
            "king_name",
            BeliefDraft::new("king", value, BeliefType::Fact, 0.9),
            source,
        );
        prop_assert!(!denied.success);

        let after = persistence::serialize(&memory).unwrap();
        prop_assert_eq!(before, after);
    }

    /// Identical snapshots render identical bytes, over repeated calls and
    /// fresh assembler instances.
    #[test]
    fn prompt_assembly_is_deterministic(
        facts in proptest::collection::btree_map(ident(), (text(), ident()), 0..5),
        world in proptest::collection::btree_map(ident(), text(), 0..5),
        input in text(),
    ) {
        let mut memory = fixed_memory();
        for (id, (fact, domain)) in &facts {
            memory.add_canonical_fact(id.clone(), fact.clone(), domain.clone());
        }
        for (key, value) in &world {
            memory.set_world_state(key.clone(), value.clone(), MutationSource::GameSystem);
        }

        let retriever = ContextRetriever::new(Default::default());
        let retrieved = retriever.retrieve(&memory, &input, &[]);
        let snapshot = retrieved
            .apply(
                StateSnapshotBuilder::new()
                    .system_prompt("You are a guard.")
                    .player_input(input),
            )
            .build();

        let assembler = PromptAssembler::new(Default::default());
        let first = assembler.assemble(&snapshot).text;
        for _ in 0..10 {
            prop_assert_eq!(&assembler.assemble(&snapshot).text, &first);
        }
        let fresh = PromptAssembler::new(Default::default());
        prop_assert_eq!(&fresh.assemble(&snapshot).text, &first);
    }

    /// Insertion order of beliefs and world state never leaks into
    /// serialized bytes or prompt bytes.
    #[test]
    fn insertion_order_independence(
        beliefs in proptest::collection::btree_map(ident(), text(), 1..8),
        world in proptest::collection::btree_map(ident(), text(), 1..8),
        seed in any::<u64>(),
    ) {
        let forward: Vec<(String, String)> = beliefs.clone().into_iter().collect();
        let mut shuffled = forward.clone();
        // Deterministic shuffle driven by the seed.
        let len = shuffled.len();
        for i in 0..len {
            let j = (seed as usize).wrapping_mul(31).wrapping_add(i * 17) % len;
            shuffled.swap(i, j);
        }
        let world_forward: Vec<(String, String)> = world.into_iter().collect();
        let mut world_shuffled = world_forward.clone();
        world_shuffled.reverse();

        let build = |belief_order: &[(String, String)], world_order: &[(String, String)]| {
            let mut memory = fixed_memory();
            for (key, value) in world_order {
                memory.set_world_state(key.clone(), value.clone(), MutationSource::GameSystem);
            }
            for (id, content) in belief_order {
                memory.set_belief(
                    format!("belief_{id}"),
                    BeliefDraft::new(id.clone(), content.clone(), BeliefType::Opinion, 0.8),
                    MutationSource::ValidatedOutput,
                );
            }
            memory
        };

        let a = build(&forward, &world_forward);
        let b = build(&shuffled, &world_shuffled);

        prop_assert_eq!(
            persistence::serialize(&a).unwrap(),
            persistence::serialize(&b).unwrap()
        );

        let retriever = ContextRetriever::new(Default::default());
        let assembler = PromptAssembler::new(Default::default());
        let render = |memory: &MemorySystem| {
            let snapshot = retriever
                .retrieve(memory, "hello", &[])
                .apply(StateSnapshotBuilder::new().system_prompt("You are a guard."))
                .build();
            assembler.assemble(&snapshot).text
        };
        prop_assert_eq!(render(&a), render(&b));
    }

    /// serialize(reconstruct(serialize(S))) == serialize(S).
    #[test]
    fn serialization_round_trip(ops in proptest::collection::vec(op(), 0..30)) {
        let mut memory = tick_memory();
        memory.add_canonical_fact("king_name", "The king is named Arthur", "royalty");
        for op in &ops {
            apply(&mut memory, op);
        }

        let first = persistence::serialize(&memory).unwrap();
        let rebuilt = persistence::reconstruct(
            &first,
            Arc::new(TickClock::from_epoch()),
            Arc::new(SequentialIds::new("p")),
            MemoryConfig::default(),
        )
        .unwrap();
        let second = persistence::serialize(&rebuilt).unwrap();
        prop_assert_eq!(first, second);
    }

    /// Same (trigger, failure reason, seed) always picks the same
    /// fallback line.
    #[test]
    fn fallback_selection_is_deterministic(
        seed in any::<u64>(),
        reason in text(),
        trigger in prop_oneof![
            Just(TriggerReason::PlayerUtterance),
            Just(TriggerReason::ZoneTrigger),
            Just(TriggerReason::TimeTrigger),
            Just(TriggerReason::QuestTrigger),
            Just(TriggerReason::NpcInteraction),
            Just(TriggerReason::WorldEvent),
            Just(TriggerReason::Custom),
        ],
    ) {
        let ctx = InteractionContext::new(trigger, "npc_1");
        let mut first_library = FallbackLibrary::default();
        let mut second_library = FallbackLibrary::default();

        let first = first_library.select(&ctx, &reason, seed, None);
        let second = second_library.select(&ctx, &reason, seed, None);
        prop_assert_eq!(&first, &second);
        // And stable across repeated selections on the same library.
        prop_assert_eq!(&first_library.select(&ctx, &reason, seed, None), &first);
    }

    /// The gate is observably pure: memory bytes are untouched and the
    /// same (parsed, context) pair always yields the same result.
    #[test]
    fn gate_validation_is_pure(
        dialogue in text(),
        mutations in proptest::collection::vec(proposed_mutation(), 0..6),
        keywords in proptest::collection::vec(ident(), 0..4),
        forbidden in proptest::collection::vec(ident(), 0..3),
    ) {
        let mut memory = fixed_memory();
        memory.add_canonical_fact("king_name", "The king is named Arthur", "royalty");
        memory.set_world_state("gate_open", "true", MutationSource::GameSystem);

        let mut constraints = ConstraintSet::new();
        constraints.add(Constraint::prohibition(
            "no_keywords",
            ConstraintSeverity::Hard,
            "assorted prohibited keywords",
            keywords,
        ));

        let snapshot = StateSnapshotBuilder::new()
            .context(InteractionContext::player_utterance("npc_1", "hello"))
            .constraints(constraints.clone())
            .canonical_facts(memory.canonical_facts().cloned().collect())
            .build();

        let mut parsed = ParsedOutput::dialogue(dialogue, "raw", ParseMode::Regex);
        parsed.proposed_mutations = mutations;

        let before = persistence::serialize(&memory).unwrap();
        let ctx = ValidationContext {
            constraints: &constraints,
            memory: &memory,
            snapshot: &snapshot,
            forbidden_knowledge: &forbidden,
            validate_mutation_schemas: true,
            validate_intent_schemas: true,
        };
        let first = ValidationGate::new().validate(&parsed, &ctx);
        let second = ValidationGate::new().validate(&parsed, &ctx);
        let after = persistence::serialize(&memory).unwrap();

        prop_assert_eq!(before, after);
        prop_assert_eq!(first, second);
    }

    /// The transport is invoked at most max_retries + 1 times per turn.
    #[test]
    fn transport_calls_bounded_by_retry_budget(max_retries in 0u32..6) {
        // Every answer violates a hard prohibition, so the pipeline
        // retries until the budget is spent.
        let (mut pipeline, llm) = pipeline_over("The hell you say.", max_retries, false);
        let result = block_on_turn(&mut pipeline, "Hm?");

        prop_assert_eq!(result.outcome, TurnOutcome::Failure);
        prop_assert_eq!(llm.calls(), max_retries + 1);
        prop_assert_eq!(result.retry_count, max_retries);
    }

    /// A critical failure invokes the transport exactly once, whatever
    /// the retry budget.
    #[test]
    fn critical_failure_stops_after_one_call(max_retries in 0u32..6) {
        let (mut pipeline, llm) =
            pipeline_over("The king is not named Arthur.", max_retries, true);
        let result = block_on_turn(&mut pipeline, "Who rules?");

        prop_assert_eq!(result.outcome, TurnOutcome::Failure);
        prop_assert!(result.gate_result.as_ref().unwrap().has_critical_failure);
        prop_assert_eq!(llm.calls(), 1);
        prop_assert_eq!(result.retry_count, 0);
    }
}
