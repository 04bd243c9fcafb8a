//! Validation gate results - the admission record for one model proposal.

use serde::{Deserialize, Serialize};

use crate::value_objects::constraint::ConstraintSeverity;
use crate::value_objects::output::{ProposedMutation, WorldIntent};

/// Why a validation rule failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FailureReason {
    /// The parser produced no usable output
    InvalidFormat,
    /// A prohibition constraint matched the dialogue
    ProhibitionViolation,
    /// A requirement constraint found none of its keywords
    RequirementMissing,
    /// Dialogue negates a canonical fact
    CanonicalFactContradiction,
    /// Dialogue mentions forbidden knowledge
    KnowledgeBoundaryViolation,
    /// A mutation targeted canonical or world-state data without authority
    CanonicalMutationAttempt,
    /// A mutation or intent was structurally incomplete
    SchemaViolation,
    /// A component raised an unexpected error
    InternalError,
}

impl std::fmt::Display for FailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureReason::InvalidFormat => write!(f, "InvalidFormat"),
            FailureReason::ProhibitionViolation => write!(f, "ProhibitionViolation"),
            FailureReason::RequirementMissing => write!(f, "RequirementMissing"),
            FailureReason::CanonicalFactContradiction => write!(f, "CanonicalFactContradiction"),
            FailureReason::KnowledgeBoundaryViolation => write!(f, "KnowledgeBoundaryViolation"),
            FailureReason::CanonicalMutationAttempt => write!(f, "CanonicalMutationAttempt"),
            FailureReason::SchemaViolation => write!(f, "SchemaViolation"),
            FailureReason::InternalError => write!(f, "InternalError"),
        }
    }
}

/// One rule violation found by the gate.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ValidationFailure {
    pub reason: FailureReason,
    pub severity: ConstraintSeverity,
    /// What exactly went wrong (matched keyword, contradicted fact, ...)
    pub description: String,
    /// Id of the violated constraint, when one applies
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub violated_rule: Option<String>,
}

impl ValidationFailure {
    pub fn new(
        reason: FailureReason,
        severity: ConstraintSeverity,
        description: impl Into<String>,
    ) -> Self {
        Self {
            reason,
            severity,
            description: description.into(),
            violated_rule: None,
        }
    }

    pub fn with_rule(mut self, rule_id: impl Into<String>) -> Self {
        self.violated_rule = Some(rule_id.into());
        self
    }
}

/// A mutation the gate refused, with the reason kept alongside.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RejectedMutation {
    pub mutation: ProposedMutation,
    pub reason: FailureReason,
    pub detail: String,
}

/// Outcome of gating one parsed output.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GateResult {
    /// True iff parsing succeeded and no Hard-or-worse failure was found
    pub passed: bool,
    pub failures: Vec<ValidationFailure>,
    pub approved_mutations: Vec<ProposedMutation>,
    pub rejected_mutations: Vec<RejectedMutation>,
    pub approved_intents: Vec<WorldIntent>,
    /// True iff any failure is Critical; critical turns are not retried
    pub has_critical_failure: bool,
    /// True iff the turn failed but is worth retrying with escalation
    pub should_retry: bool,
    /// The dialogue text as admitted, present only when passed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validated_output: Option<String>,
}

impl GateResult {
    /// Assemble the result flags from collected failures, per the gate's
    /// result rules: Soft failures pass, Hard fails with retry, Critical
    /// fails without retry.
    pub fn assemble(
        parse_success: bool,
        dialogue: &str,
        failures: Vec<ValidationFailure>,
        approved_mutations: Vec<ProposedMutation>,
        rejected_mutations: Vec<RejectedMutation>,
        approved_intents: Vec<WorldIntent>,
    ) -> Self {
        let has_blocking = failures
            .iter()
            .any(|f| f.severity >= ConstraintSeverity::Hard);
        let has_critical = failures
            .iter()
            .any(|f| f.severity == ConstraintSeverity::Critical);
        let passed = parse_success && !has_blocking;

        Self {
            passed,
            failures,
            approved_mutations,
            rejected_mutations,
            approved_intents,
            has_critical_failure: has_critical,
            should_retry: !passed && !has_critical,
            validated_output: passed.then(|| dialogue.to_string()),
        }
    }
}
