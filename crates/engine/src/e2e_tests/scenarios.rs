//! The seed scenarios for the governance contract.

use loreguard_domain::{FailureReason, InteractionContext, ProposedMutation};
use tokio_util::sync::CancellationToken;

use crate::e2e_tests::support::{Fixture, ScriptedLlm};
use crate::pipeline::TurnOutcome;

fn player_says(input: &str) -> InteractionContext {
    InteractionContext::player_utterance("npc_aldric", input)
}

/// S1 - Canonical protection: a response that negates canon fails
/// critically, without retry, and canon is untouched.
#[tokio::test]
async fn canonical_contradiction_fails_critically() {
    let mut fixture = Fixture::new(
        ScriptedLlm::new(vec!["The king is not named Arthur. His name is Bob."]),
        |config| {
            config.pipeline.use_structured_output = false;
            config.pipeline.max_retries = 2;
        },
    );
    fixture
        .pipeline
        .memory_mut()
        .add_canonical_fact("king_name", "The king is named Arthur", "royalty");

    let result = fixture
        .pipeline
        .run_turn(player_says("Who rules here?"), CancellationToken::new())
        .await;

    assert_eq!(result.outcome, TurnOutcome::Failure);
    let gate = result.gate_result.as_ref().unwrap();
    assert!(!gate.passed);
    assert!(gate.has_critical_failure);
    assert!(gate
        .failures
        .iter()
        .any(|f| f.reason == FailureReason::CanonicalFactContradiction));

    // Exactly one transport call: critical failures are not retried.
    assert_eq!(fixture.llm.call_count(), 1);
    // Canon unchanged, and nothing was written on the failed turn.
    assert_eq!(
        fixture.pipeline.memory().get_canonical("king_name").unwrap().fact,
        "The king is named Arthur"
    );
    assert_eq!(fixture.pipeline.memory().episodic_count(), 0);
    assert!(result.mutation_result.is_none());
    // The caller still gets something to say.
    assert!(!result.dialogue_text.is_empty());
}

/// S2 - Prohibition retry-then-succeed: a hard keyword violation
/// escalates and retries, the clean second answer is accepted and its
/// episodic mutation executes.
#[tokio::test]
async fn prohibition_violation_retries_then_succeeds() {
    let mut fixture = Fixture::new(
        ScriptedLlm::new(vec![
            "What the hell do you want?",
            "Hi there! How can I help you today?\n[MUTATION: AppendEpisodic] Greeted a traveler politely",
        ]),
        |config| {
            config.pipeline.use_structured_output = false;
            config.pipeline.max_retries = 2;
        },
    );

    let result = fixture
        .pipeline
        .run_turn(player_says("Open the gate."), CancellationToken::new())
        .await;

    assert_eq!(result.outcome, TurnOutcome::Success);
    assert_eq!(result.retry_count, 1);
    assert!(result.dialogue_text.starts_with("Hi there!"));

    let batch = result.mutation_result.as_ref().unwrap();
    assert_eq!(batch.success_count, 1);
    assert_eq!(fixture.pipeline.memory().episodic_count(), 1);

    let metrics = fixture.pipeline.metrics();
    assert_eq!(metrics.total_retries, 1);
    assert_eq!(metrics.validation_failure, 1);

    // The replay log captured both attempts, and the retry prompt carries
    // the escalation.
    assert_eq!(result.replay.attempts.len(), 2);
    assert!(result.replay.attempts[1]
        .prompt_text
        .contains("previous answer was rejected"));
}

/// S3 - A mutation targeting a canonical id is rejected while the
/// dialogue itself is admitted.
#[tokio::test]
async fn mutation_targeting_canonical_is_rejected() {
    let response = r#"{
        "dialogueText": "The king is a good man.",
        "proposedMutations": [
            {"type": "TransformBelief", "target": "king_name", "content": "Bob"}
        ]
    }"#;
    let mut fixture = Fixture::new(ScriptedLlm::new(vec![response]), |config| {
        config.pipeline.use_structured_output = true;
        config.pipeline.fallback_to_regex = false;
    });
    fixture
        .pipeline
        .memory_mut()
        .add_canonical_fact("king_name", "The king is named Arthur", "royalty");

    let result = fixture
        .pipeline
        .run_turn(player_says("What do you think of the king?"), CancellationToken::new())
        .await;

    assert_eq!(result.outcome, TurnOutcome::Success);
    let gate = result.gate_result.as_ref().unwrap();
    assert!(gate.approved_mutations.is_empty());
    assert_eq!(gate.rejected_mutations.len(), 1);
    assert_eq!(
        gate.rejected_mutations[0].reason,
        FailureReason::CanonicalMutationAttempt
    );
    assert_eq!(
        fixture.pipeline.memory().get_canonical("king_name").unwrap().fact,
        "The king is named Arthur"
    );
    assert!(fixture.pipeline.memory().get_belief("king_name").is_none());
}

/// S4 - Structured-output schema filter: unknown mutation types degrade
/// to AppendEpisodic, incomplete mutations are filtered, dialogue passes.
#[tokio::test]
async fn schema_filter_on_structured_output() {
    let response = r#"{
        "dialogueText": "Strange times at the gate.",
        "proposedMutations": [
            {"type": "InvalidMutationType", "content": "a stranger passed through"},
            {"type": "TransformBelief", "content": "no target on this one"}
        ]
    }"#;
    let mut fixture = Fixture::new(ScriptedLlm::new(vec![response]), |config| {
        config.pipeline.use_structured_output = true;
        config.pipeline.fallback_to_regex = false;
    });

    let result = fixture
        .pipeline
        .run_turn(player_says("Anything to report?"), CancellationToken::new())
        .await;

    assert_eq!(result.outcome, TurnOutcome::Success);
    assert_eq!(result.dialogue_text, "Strange times at the gate.");

    let gate = result.gate_result.as_ref().unwrap();
    assert_eq!(gate.approved_mutations.len(), 1);
    assert!(matches!(
        gate.approved_mutations[0],
        ProposedMutation::AppendEpisodic { .. }
    ));
    assert_eq!(gate.rejected_mutations.len(), 1);
    assert_eq!(
        gate.rejected_mutations[0].reason,
        FailureReason::SchemaViolation
    );

    // The surviving mutation executed.
    assert_eq!(fixture.pipeline.memory().episodic_count(), 1);
}

/// S5 - Fallback path: when every attempt is rejected, the caller gets a
/// deterministic fallback utterance, never an empty string.
#[tokio::test]
async fn exhausted_retries_produce_fallback_dialogue() {
    let mut fixture = Fixture::new(
        ScriptedLlm::new(vec![
            "What the hell is this?",
            "Hell if I know.",
            "To hell with it.",
        ]),
        |config| {
            config.pipeline.use_structured_output = false;
            config.pipeline.max_retries = 2;
        },
    );

    let result = fixture
        .pipeline
        .run_turn(player_says("Well?"), CancellationToken::new())
        .await;

    assert_eq!(result.outcome, TurnOutcome::Failure);
    assert_eq!(result.retry_count, 2);
    assert!(!result.dialogue_text.is_empty());
    assert!(result.error_message.is_some());
    // All three attempts used the transport; none mutated memory.
    assert_eq!(fixture.llm.call_count(), 3);
    assert_eq!(fixture.pipeline.memory().episodic_count(), 0);
    assert_eq!(fixture.pipeline.fallback_stats().total_selections, 1);
}

/// S6 - Insertion-order tripwire: belief insertion order affects neither
/// serialized bytes nor prompt bytes.
#[tokio::test]
async fn insertion_order_does_not_leak_into_bytes() {
    use crate::infrastructure::app_settings::MemoryConfig;
    use crate::infrastructure::clock::{FixedClock, SequentialIds};
    use crate::memory::persistence;
    use crate::memory::{BeliefDraft, MemorySystem};
    use crate::prompt::PromptAssembler;
    use crate::retrieval::ContextRetriever;
    use loreguard_domain::{BeliefType, MutationSource, StateSnapshotBuilder};
    use std::sync::Arc;

    let build = |order: &[&str]| {
        let mut memory = MemorySystem::new(
            Arc::new(FixedClock::epoch()),
            Arc::new(SequentialIds::new("mem")),
            MemoryConfig::default(),
        );
        for id in order {
            memory.set_belief(
                format!("belief_{id}"),
                BeliefDraft::new(
                    id.to_string(),
                    format!("{id} can be trusted"),
                    BeliefType::Opinion,
                    0.8,
                ),
                MutationSource::ValidatedOutput,
            );
        }
        memory
    };

    let first = build(&["e", "c", "a", "d", "b"]);
    let second = build(&["a", "b", "c", "d", "e"]);

    assert_eq!(
        persistence::serialize(&first).unwrap(),
        persistence::serialize(&second).unwrap()
    );

    let retriever = ContextRetriever::new(Default::default());
    let assembler = PromptAssembler::new(Default::default());
    let assemble = |memory: &MemorySystem| {
        let retrieved = retriever.retrieve(memory, "hello", &[]);
        let snapshot = retrieved
            .apply(StateSnapshotBuilder::new().system_prompt("You are a guard."))
            .build();
        assembler.assemble(&snapshot).text
    };

    assert_eq!(assemble(&first), assemble(&second));
}
