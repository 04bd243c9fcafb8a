//! LoreGuard domain types.
//!
//! Pure data: the authority hierarchy, memory entry entities, and the
//! value objects that flow through the governance pipeline. No I/O, no
//! async, no randomness - everything here is deterministic by
//! construction so the engine can satisfy its replay guarantees.

pub mod authority;
pub mod entities;
pub mod error;
pub mod value_objects;

pub use authority::{AuthorityLevel, MutationSource};
pub use error::DomainError;

pub use entities::{
    BeliefMemoryEntry, BeliefType, CanonicalFact, EpisodeType, EpisodicMemoryEntry,
    WorldStateEntry, ACTIVE_STRENGTH_FLOOR, CONTRADICTED_CONFIDENCE_CEILING,
};

pub use value_objects::{
    Constraint, ConstraintSet, ConstraintSeverity, ConstraintType, DialogueTurn, FailureReason,
    FunctionCall, GateResult, InteractionContext, MutationBatchResult, MutationExecutionResult,
    MutationResult, OutboundIntent, ParseMode, ParsedOutput, ProposedMutation, RejectedMutation,
    StateSnapshot, StateSnapshotBuilder, TriggerReason, ValidationFailure, WorldIntent,
};
