//! LoreGuard engine.
//!
//! The deterministic governance plane around a stochastic LLM used to
//! drive NPCs. The model is treated as an untrusted, stateless text
//! generator; continuity lives entirely in this crate's authoritative
//! memory, and model proposals only reach it through the validation gate.
//!
//! ## Structure
//!
//! - `memory/` - authoritative memory system (+ contradiction detection,
//!   persistence)
//! - `expectancy/` - context -> constraint rules
//! - `retrieval/` - bounded, ranked memory selection
//! - `prompt/` - byte-deterministic prompt assembly
//! - `parser/` - model output -> typed proposal
//! - `gate/` - the sole admission point for proposals
//! - `mutation/` - executes approved mutations
//! - `fallback/` - deterministic fallback utterances
//! - `pipeline/` - per-turn orchestration with retry and cancellation
//! - `infrastructure/` - ports and adapters (LLM transport, clock, ids,
//!   intents, configuration, logging)

pub mod expectancy;
pub mod fallback;
pub mod gate;
pub mod infrastructure;
pub mod memory;
pub mod mutation;
pub mod parser;
pub mod pipeline;
pub mod prompt;
pub mod retrieval;

/// End-to-end scenario tests driven by a scripted LLM port.
#[cfg(test)]
mod e2e_tests;

pub use pipeline::{DialoguePipeline, PipelineMetrics, ReplayLog, TurnOutcome, TurnResult};
