//! Mutation controller - executes approved mutations against memory.
//!
//! Runs after the gate, with source `ValidatedOutput`. Every mutation is
//! still authority-checked at the memory boundary; a denial there is a
//! local failure that never aborts the rest of the batch.

use loreguard_domain::{
    BeliefType, EpisodeType, GateResult, MutationBatchResult, MutationResult, MutationSource,
    OutboundIntent, ProposedMutation, WorldIntent,
};

use crate::infrastructure::ports::IntentSink;
use crate::memory::{BeliefDraft, EpisodicDraft, MemorySystem};

/// Baseline significance for episodic entries created from dialogue.
const BASE_EPISODIC_SIGNIFICANCE: f32 = 0.5;
/// Boost applied when the model cites the source text it drew from.
const SOURCE_TEXT_SIGNIFICANCE_BOOST: f32 = 0.2;
/// Confidence for relationship updates that carry none.
const DEFAULT_RELATIONSHIP_CONFIDENCE: f32 = 0.6;
/// Priority stamped on outbound intents.
const DEFAULT_INTENT_PRIORITY: i32 = 0;

/// Running totals per mutation kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MutationStats {
    pub episodic_appended: u64,
    pub beliefs_transformed: u64,
    pub relationships_transformed: u64,
    pub intents_emitted: u64,
    pub failures: u64,
}

/// Executes approved batches. Holds only statistics; memory and the
/// intent sink are passed per call so ownership stays with the pipeline.
#[derive(Debug, Default)]
pub struct MutationController {
    stats: MutationStats,
    enable_logging: bool,
}

impl MutationController {
    pub fn new(enable_logging: bool) -> Self {
        Self {
            stats: MutationStats::default(),
            enable_logging,
        }
    }

    pub fn stats(&self) -> MutationStats {
        self.stats
    }

    /// Apply every approved mutation and emit every approved intent from
    /// a gate result. Per-mutation failure is local.
    pub fn execute(
        &mut self,
        memory: &mut MemorySystem,
        gate_result: &GateResult,
        intents: &dyn IntentSink,
        npc_id: &str,
    ) -> MutationBatchResult {
        let mut batch = MutationBatchResult::default();

        for mutation in &gate_result.approved_mutations {
            let result = self.execute_one(memory, mutation, intents, npc_id, &mut batch);
            if self.enable_logging {
                tracing::debug!(
                    kind = mutation.kind(),
                    success = result.success,
                    affected = result.affected_entry.as_deref().unwrap_or(""),
                    "Executed mutation"
                );
            }
            if !result.success {
                self.stats.failures += 1;
            }
            batch.record(mutation.kind(), result);
        }

        for intent in &gate_result.approved_intents {
            let result = self.emit_intent(intent.clone(), intents, npc_id, &mut batch);
            if !result.success {
                self.stats.failures += 1;
            }
        }

        batch
    }

    fn execute_one(
        &mut self,
        memory: &mut MemorySystem,
        mutation: &ProposedMutation,
        intents: &dyn IntentSink,
        npc_id: &str,
        batch: &mut MutationBatchResult,
    ) -> MutationResult {
        match mutation {
            ProposedMutation::AppendEpisodic {
                content,
                source_text,
                ..
            } => {
                let significance = if source_text.is_some() {
                    BASE_EPISODIC_SIGNIFICANCE + SOURCE_TEXT_SIGNIFICANCE_BOOST
                } else {
                    BASE_EPISODIC_SIGNIFICANCE
                };
                let result = memory.add_episodic(
                    EpisodicDraft::new(content.clone(), EpisodeType::Dialogue, significance),
                    MutationSource::ValidatedOutput,
                );
                if result.success {
                    self.stats.episodic_appended += 1;
                }
                result
            }
            ProposedMutation::TransformBelief {
                target,
                content,
                confidence,
            } => {
                let Some(target) = target.as_deref().filter(|t| !t.trim().is_empty()) else {
                    return MutationResult::denied("TransformBelief is missing a target");
                };
                // The gate already screens canonical targets; the memory
                // boundary enforces it again for callers that skip the gate.
                let result = memory.set_belief(
                    target,
                    BeliefDraft::new(
                        target,
                        content.clone(),
                        BeliefType::Fact,
                        confidence.unwrap_or(DEFAULT_RELATIONSHIP_CONFIDENCE),
                    ),
                    MutationSource::ValidatedOutput,
                );
                if result.success {
                    self.stats.beliefs_transformed += 1;
                }
                result
            }
            ProposedMutation::TransformRelationship { target, content } => {
                let Some(target) = target.as_deref().filter(|t| !t.trim().is_empty()) else {
                    return MutationResult::denied("TransformRelationship is missing a target");
                };
                let belief_id = format!("relationship_{target}");
                let result = memory.set_belief(
                    belief_id,
                    BeliefDraft::new(
                        target,
                        content.clone(),
                        BeliefType::Relationship,
                        DEFAULT_RELATIONSHIP_CONFIDENCE,
                    ),
                    MutationSource::ValidatedOutput,
                );
                if result.success {
                    self.stats.relationships_transformed += 1;
                }
                result
            }
            ProposedMutation::EmitWorldIntent {
                intent_type,
                content,
            } => {
                let mut intent = WorldIntent::new(intent_type.clone());
                if !content.is_empty() {
                    intent
                        .parameters
                        .insert("content".to_string(), content.clone());
                }
                self.emit_intent(intent, intents, npc_id, batch)
            }
        }
    }

    /// Memory is never touched for intents; they go straight to the
    /// outbound channel.
    fn emit_intent(
        &mut self,
        intent: WorldIntent,
        intents: &dyn IntentSink,
        npc_id: &str,
        batch: &mut MutationBatchResult,
    ) -> MutationResult {
        let outbound = OutboundIntent::from_intent(intent, npc_id, DEFAULT_INTENT_PRIORITY);
        let intent_type = outbound.intent_type.clone();
        match intents.emit(outbound.clone()) {
            Ok(()) => {
                self.stats.intents_emitted += 1;
                batch.emitted_intents.push(outbound);
                MutationResult::ok(intent_type)
            }
            Err(e) => {
                tracing::warn!(intent_type = %intent_type, error = %e, "Intent emission failed");
                MutationResult::denied(format!("intent channel error: {e}"))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gate::{ValidationContext, ValidationGate};
    use crate::infrastructure::intents::CollectingIntentSink;
    use crate::memory::test_support::deterministic_memory;
    use loreguard_domain::{
        ConstraintSet, InteractionContext, ParseMode, ParsedOutput, StateSnapshotBuilder,
    };

    fn gate_result_with(
        memory: &MemorySystem,
        mutations: Vec<ProposedMutation>,
        intents: Vec<WorldIntent>,
    ) -> GateResult {
        let constraints = ConstraintSet::new();
        let snapshot = StateSnapshotBuilder::new()
            .context(InteractionContext::player_utterance("npc_1", "hi"))
            .canonical_facts(memory.canonical_facts().cloned().collect())
            .build();
        let mut parsed = ParsedOutput::dialogue("Fine words.", "raw", ParseMode::Structured);
        parsed.proposed_mutations = mutations;
        parsed.world_intents = intents;

        ValidationGate::new().validate(
            &parsed,
            &ValidationContext {
                constraints: &constraints,
                memory,
                snapshot: &snapshot,
                forbidden_knowledge: &[],
                validate_mutation_schemas: true,
                validate_intent_schemas: true,
            },
        )
    }

    #[test]
    fn test_append_episodic_with_source_boost() {
        let mut memory = deterministic_memory();
        let gate_result = gate_result_with(
            &memory,
            vec![
                ProposedMutation::AppendEpisodic {
                    content: "Heard about the dragon".into(),
                    source_text: Some("the dragon attacked us".into()),
                    confidence: None,
                },
                ProposedMutation::AppendEpisodic {
                    content: "Small talk about weather".into(),
                    source_text: None,
                    confidence: None,
                },
            ],
            vec![],
        );

        let sink = CollectingIntentSink::new();
        let mut controller = MutationController::new(false);
        let batch = controller.execute(&mut memory, &gate_result, &sink, "npc_1");

        assert_eq!(batch.total_attempted, 2);
        assert_eq!(batch.success_count, 2);
        let boosted = memory.get_episodic("mem_0").unwrap();
        let plain = memory.get_episodic("mem_1").unwrap();
        assert!(boosted.significance > plain.significance);
        assert_eq!(controller.stats().episodic_appended, 2);
    }

    #[test]
    fn test_transform_belief_creates_and_rechecks_canon() {
        let mut memory = deterministic_memory();
        memory.add_canonical_fact("king_name", "The king is named Arthur", "royalty");

        // A belief about the king that does not touch canon.
        let gate_result = gate_result_with(
            &memory,
            vec![ProposedMutation::TransformBelief {
                target: Some("belief_king_mood".into()),
                content: "The king is not named Arthur".into(),
                confidence: Some(0.9),
            }],
            vec![],
        );

        let sink = CollectingIntentSink::new();
        let mut controller = MutationController::new(false);
        let batch = controller.execute(&mut memory, &gate_result, &sink, "npc_1");

        assert_eq!(batch.success_count, 1);
        // Belief was admitted but flagged and demoted by the canon check.
        let belief = memory.get_belief("belief_king_mood").unwrap();
        assert!(belief.is_contradicted);
        assert!(belief.confidence <= 0.2);
    }

    #[test]
    fn test_transform_relationship_uses_prefixed_id() {
        let mut memory = deterministic_memory();
        let gate_result = gate_result_with(
            &memory,
            vec![ProposedMutation::TransformRelationship {
                target: Some("player".into()),
                content: "Starting to trust them".into(),
            }],
            vec![],
        );

        let sink = CollectingIntentSink::new();
        let mut controller = MutationController::new(false);
        controller.execute(&mut memory, &gate_result, &sink, "npc_1");

        let belief = memory.get_belief("relationship_player").unwrap();
        assert_eq!(belief.belief_type, BeliefType::Relationship);
        assert_eq!(belief.subject, "player");
        assert_eq!(controller.stats().relationships_transformed, 1);
    }

    #[test]
    fn test_emit_world_intent_does_not_touch_memory() {
        let mut memory = deterministic_memory();
        let gate_result = gate_result_with(
            &memory,
            vec![ProposedMutation::EmitWorldIntent {
                intent_type: "open_gate".into(),
                content: "the north gate".into(),
            }],
            vec![WorldIntent::new("ring_bell")],
        );

        let sink = CollectingIntentSink::new();
        let mut controller = MutationController::new(false);
        let batch = controller.execute(&mut memory, &gate_result, &sink, "npc_guard");

        assert_eq!(memory.episodic_count(), 0);
        assert_eq!(memory.belief_count(), 0);
        assert_eq!(batch.emitted_intents.len(), 2);

        let emitted = sink.emitted();
        assert_eq!(emitted.len(), 2);
        assert!(emitted.iter().all(|i| i.source_npc_id == "npc_guard"));
        assert_eq!(emitted[0].intent_type, "open_gate");
        assert_eq!(emitted[1].intent_type, "ring_bell");
        assert_eq!(controller.stats().intents_emitted, 2);
    }

    #[test]
    fn test_failure_is_local_to_the_mutation() {
        let mut memory = deterministic_memory();
        // Bypass the gate to hand the controller a mutation missing its
        // target; execution must deny it and continue.
        let mut gate_result = gate_result_with(&memory, vec![], vec![]);
        gate_result.approved_mutations = vec![
            ProposedMutation::TransformBelief {
                target: None,
                content: "orphaned".into(),
                confidence: None,
            },
            ProposedMutation::AppendEpisodic {
                content: "still recorded".into(),
                source_text: None,
                confidence: None,
            },
        ];

        let sink = CollectingIntentSink::new();
        let mut controller = MutationController::new(false);
        let batch = controller.execute(&mut memory, &gate_result, &sink, "npc_1");

        assert_eq!(batch.total_attempted, 2);
        assert_eq!(batch.failure_count, 1);
        assert_eq!(batch.success_count, 1);
        assert_eq!(memory.episodic_count(), 1);
        assert_eq!(controller.stats().failures, 1);
    }
}
