//! Mutation outcomes - what actually happened at the memory boundary.

use serde::{Deserialize, Serialize};

use crate::value_objects::output::OutboundIntent;

/// Outcome of one mutation against the memory system. Authority failures
/// never panic or abort; they come back as `success = false` with a
/// reason.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MutationResult {
    pub success: bool,
    /// Id/key of the entry that was created or modified
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub affected_entry: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
}

impl MutationResult {
    pub fn ok(affected_entry: impl Into<String>) -> Self {
        Self {
            success: true,
            affected_entry: Some(affected_entry.into()),
            failure_reason: None,
        }
    }

    pub fn denied(reason: impl Into<String>) -> Self {
        Self {
            success: false,
            affected_entry: None,
            failure_reason: Some(reason.into()),
        }
    }
}

/// One approved mutation paired with its execution outcome.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MutationExecutionResult {
    /// Kind name of the executed mutation (e.g. "AppendEpisodic")
    pub mutation_kind: String,
    pub result: MutationResult,
}

/// Aggregate outcome for a whole approved batch. Per-mutation failure is
/// local and does not abort the rest of the batch.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MutationBatchResult {
    pub total_attempted: usize,
    pub success_count: usize,
    pub failure_count: usize,
    /// Intents handed to the outbound channel, in emission order
    pub emitted_intents: Vec<OutboundIntent>,
    pub results: Vec<MutationExecutionResult>,
}

impl MutationBatchResult {
    pub fn record(&mut self, kind: &str, result: MutationResult) {
        self.total_attempted += 1;
        if result.success {
            self.success_count += 1;
        } else {
            self.failure_count += 1;
        }
        self.results.push(MutationExecutionResult {
            mutation_kind: kind.to_string(),
            result,
        });
    }

    /// True when nothing in the batch changed memory or emitted intents.
    pub fn is_empty(&self) -> bool {
        self.total_attempted == 0 && self.emitted_intents.is_empty()
    }
}
