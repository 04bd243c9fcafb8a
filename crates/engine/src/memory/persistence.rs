//! Byte-stable serialization of the memory system.
//!
//! The document is versioned JSON with every collection emitted in
//! ascending id/key order, so two memory systems with identical logical
//! contents serialize byte-identically and
//! `serialize(reconstruct(serialize(S))) == serialize(S)` holds exactly.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use loreguard_domain::{
    BeliefMemoryEntry, CanonicalFact, DialogueTurn, EpisodicMemoryEntry, WorldStateEntry,
};

use crate::infrastructure::app_settings::MemoryConfig;
use crate::infrastructure::ports::{ClockPort, IdPort};
use crate::memory::MemorySystem;

const FORMAT_VERSION: u32 = 1;

#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    #[error("I/O error: {0}")]
    Io(String),
    #[error("Serialization error: {0}")]
    Serialization(String),
    #[error("Unsupported format version: {0}")]
    UnsupportedVersion(u32),
}

/// On-disk document. Field order is the byte order; collections are
/// sorted before writing.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SerializedMemory {
    version: u32,
    canonical_facts: Vec<CanonicalFact>,
    world_state: Vec<WorldStateEntry>,
    episodic_memories: Vec<EpisodicMemoryEntry>,
    beliefs: Vec<BeliefMemoryEntry>,
    dialogue_history: Vec<DialogueTurn>,
}

/// Serialize a memory system to its canonical text form.
pub fn serialize(memory: &MemorySystem) -> Result<String, PersistenceError> {
    // Reads already iterate in key order; collect preserves it.
    let doc = SerializedMemory {
        version: FORMAT_VERSION,
        canonical_facts: memory.canonical_facts().cloned().collect(),
        world_state: memory.world_state().cloned().collect(),
        episodic_memories: memory.episodic_memories().cloned().collect(),
        beliefs: memory.beliefs().cloned().collect(),
        dialogue_history: memory.dialogue_history().to_vec(),
    };
    serde_json::to_string_pretty(&doc).map_err(|e| PersistenceError::Serialization(e.to_string()))
}

/// Reconstruct a memory system from its serialized form, attaching fresh
/// ports and configuration.
pub fn reconstruct(
    text: &str,
    clock: Arc<dyn ClockPort>,
    ids: Arc<dyn IdPort>,
    config: MemoryConfig,
) -> Result<MemorySystem, PersistenceError> {
    let doc: SerializedMemory =
        serde_json::from_str(text).map_err(|e| PersistenceError::Serialization(e.to_string()))?;
    if doc.version != FORMAT_VERSION {
        return Err(PersistenceError::UnsupportedVersion(doc.version));
    }

    let canonical: BTreeMap<String, CanonicalFact> = doc
        .canonical_facts
        .into_iter()
        .map(|f| (f.id.clone(), f))
        .collect();
    let world_state: BTreeMap<String, WorldStateEntry> = doc
        .world_state
        .into_iter()
        .map(|e| (e.key.clone(), e))
        .collect();
    let episodic: BTreeMap<String, EpisodicMemoryEntry> = doc
        .episodic_memories
        .into_iter()
        .map(|e| (e.id.clone(), e))
        .collect();
    let beliefs: BTreeMap<String, BeliefMemoryEntry> = doc
        .beliefs
        .into_iter()
        .map(|b| (b.id.clone(), b))
        .collect();

    Ok(MemorySystem::rebuild(
        clock,
        ids,
        config,
        canonical,
        world_state,
        episodic,
        beliefs,
        doc.dialogue_history,
    ))
}

/// Write the serialized form to a file.
pub fn save_to_path(memory: &MemorySystem, path: &Path) -> Result<(), PersistenceError> {
    let text = serialize(memory)?;
    std::fs::write(path, text).map_err(|e| PersistenceError::Io(e.to_string()))
}

/// Load a memory system from a file.
pub fn load_from_path(
    path: &Path,
    clock: Arc<dyn ClockPort>,
    ids: Arc<dyn IdPort>,
    config: MemoryConfig,
) -> Result<MemorySystem, PersistenceError> {
    let text = std::fs::read_to_string(path).map_err(|e| PersistenceError::Io(e.to_string()))?;
    reconstruct(&text, clock, ids, config)
}
