//! Value objects shared across the governance pipeline.

mod constraint;
mod gate;
mod interaction;
mod mutation;
mod output;
mod snapshot;

pub use constraint::{Constraint, ConstraintSet, ConstraintSeverity, ConstraintType};
pub use gate::{FailureReason, GateResult, RejectedMutation, ValidationFailure};
pub use interaction::{InteractionContext, TriggerReason};
pub use mutation::{MutationBatchResult, MutationExecutionResult, MutationResult};
pub use output::{
    FunctionCall, OutboundIntent, ParseMode, ParsedOutput, ProposedMutation, WorldIntent,
};
pub use snapshot::{DialogueTurn, StateSnapshot, StateSnapshotBuilder};
