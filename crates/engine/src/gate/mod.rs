//! Validation gate - the sole admission point between model proposals
//! and authoritative state.
//!
//! Applies the rule sequence from the governance contract: parse check,
//! prohibitions, requirements, canonical protection, knowledge boundary,
//! mutation authority, and schema filters. The gate is pure; it reads the
//! memory system but never mutates anything.

use regex_lite::Regex;

use loreguard_domain::{
    ConstraintSet, ConstraintSeverity, ConstraintType, FailureReason, GateResult, ParsedOutput,
    ProposedMutation, RejectedMutation, StateSnapshot, ValidationFailure, WorldIntent,
};

use crate::memory::{contradiction, MemorySystem};

/// Everything the gate consults for one validation pass.
pub struct ValidationContext<'a> {
    pub constraints: &'a ConstraintSet,
    /// Read-only view of authoritative memory
    pub memory: &'a MemorySystem,
    pub snapshot: &'a StateSnapshot,
    /// Terms the NPC must not know about
    pub forbidden_knowledge: &'a [String],
    pub validate_mutation_schemas: bool,
    pub validate_intent_schemas: bool,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ValidationGate;

impl ValidationGate {
    pub fn new() -> Self {
        Self
    }

    pub fn validate(&self, parsed: &ParsedOutput, ctx: &ValidationContext<'_>) -> GateResult {
        // Rule 1: parse success.
        if !parsed.success {
            let failure = ValidationFailure::new(
                FailureReason::InvalidFormat,
                ConstraintSeverity::Hard,
                parsed
                    .error_message
                    .clone()
                    .unwrap_or_else(|| "Unparseable model output".to_string()),
            );
            return GateResult::assemble(false, "", vec![failure], vec![], vec![], vec![]);
        }

        let dialogue = parsed.dialogue_text.as_str();
        let dialogue_lower = dialogue.to_lowercase();
        let mut failures = Vec::new();

        // Rules 2-3: prohibition and requirement constraints.
        for constraint in ctx.constraints.iter() {
            match constraint.constraint_type {
                ConstraintType::Prohibition => {
                    for keyword in &constraint.keywords {
                        if !keyword.is_empty() && dialogue_lower.contains(&keyword.to_lowercase()) {
                            failures.push(
                                ValidationFailure::new(
                                    FailureReason::ProhibitionViolation,
                                    constraint.severity,
                                    format!("matched prohibited keyword '{keyword}'"),
                                )
                                .with_rule(constraint.id.clone()),
                            );
                        }
                    }
                    if let Some(pattern) = &constraint.pattern {
                        // An unparseable pattern never blocks dialogue.
                        if let Ok(re) = Regex::new(pattern) {
                            if re.is_match(dialogue) {
                                failures.push(
                                    ValidationFailure::new(
                                        FailureReason::ProhibitionViolation,
                                        constraint.severity,
                                        format!("matched prohibited pattern '{pattern}'"),
                                    )
                                    .with_rule(constraint.id.clone()),
                                );
                            }
                        } else {
                            tracing::warn!(
                                constraint = %constraint.id,
                                pattern,
                                "Skipping unparseable constraint pattern"
                            );
                        }
                    }
                }
                ConstraintType::Requirement => {
                    let satisfied = constraint
                        .keywords
                        .iter()
                        .any(|k| !k.is_empty() && dialogue_lower.contains(&k.to_lowercase()));
                    if !constraint.keywords.is_empty() && !satisfied {
                        failures.push(
                            ValidationFailure::new(
                                FailureReason::RequirementMissing,
                                constraint.severity,
                                format!("missing required content: {}", constraint.description),
                            )
                            .with_rule(constraint.id.clone()),
                        );
                    }
                }
            }
        }

        // Rule 4: canonical protection. Always critical.
        for fact in &ctx.snapshot.canonical_facts {
            if contradiction::contradicts(&fact.fact, dialogue) {
                failures.push(
                    ValidationFailure::new(
                        FailureReason::CanonicalFactContradiction,
                        ConstraintSeverity::Critical,
                        format!("dialogue contradicts established fact: {}", fact.fact),
                    )
                    .with_rule(fact.id.clone()),
                );
            }
        }

        // Rule 5: knowledge boundary.
        for term in ctx.forbidden_knowledge {
            if !term.is_empty() && dialogue_lower.contains(&term.to_lowercase()) {
                failures.push(ValidationFailure::new(
                    FailureReason::KnowledgeBoundaryViolation,
                    ConstraintSeverity::Hard,
                    format!("dialogue mentions forbidden knowledge '{term}'"),
                ));
            }
        }

        // Rules 6-7: mutation authority + schema filtering.
        let mut approved_mutations = Vec::new();
        let mut rejected_mutations = Vec::new();
        for mutation in &parsed.proposed_mutations {
            match self.check_mutation(mutation, ctx) {
                Ok(()) => approved_mutations.push(mutation.clone()),
                Err((reason, detail)) => rejected_mutations.push(RejectedMutation {
                    mutation: mutation.clone(),
                    reason,
                    detail,
                }),
            }
        }

        // Rule 8: intent schema.
        let approved_intents: Vec<WorldIntent> = parsed
            .world_intents
            .iter()
            .filter(|intent| !ctx.validate_intent_schemas || !intent.intent_type.trim().is_empty())
            .cloned()
            .collect();

        GateResult::assemble(
            true,
            dialogue,
            failures,
            approved_mutations,
            rejected_mutations,
            approved_intents,
        )
    }

    /// Authority and schema checks for one proposed mutation. Model
    /// proposals execute as `ValidatedOutput` (rank Episodic), so any
    /// canonical id or world-state key is out of reach.
    fn check_mutation(
        &self,
        mutation: &ProposedMutation,
        ctx: &ValidationContext<'_>,
    ) -> Result<(), (FailureReason, String)> {
        if let Some(target) = mutation.target() {
            if ctx.memory.has_canonical(target) {
                return Err((
                    FailureReason::CanonicalMutationAttempt,
                    format!("mutation targets canonical fact '{target}'"),
                ));
            }
            if ctx.memory.get_world_state(target).is_some() {
                return Err((
                    FailureReason::CanonicalMutationAttempt,
                    format!("mutation targets world-state key '{target}'"),
                ));
            }
        }

        if ctx.validate_mutation_schemas {
            if mutation.content().trim().is_empty() {
                return Err((
                    FailureReason::SchemaViolation,
                    format!("{} has empty content", mutation.kind()),
                ));
            }
            match mutation {
                ProposedMutation::TransformBelief { target, .. }
                | ProposedMutation::TransformRelationship { target, .. } => {
                    if target.as_deref().map_or(true, |t| t.trim().is_empty()) {
                        return Err((
                            FailureReason::SchemaViolation,
                            format!("{} is missing a target", mutation.kind()),
                        ));
                    }
                }
                ProposedMutation::EmitWorldIntent { intent_type, .. } => {
                    if intent_type.trim().is_empty() {
                        return Err((
                            FailureReason::SchemaViolation,
                            "EmitWorldIntent has empty intentType".to_string(),
                        ));
                    }
                }
                ProposedMutation::AppendEpisodic { .. } => {}
            }
        }

        Ok(())
    }
}
