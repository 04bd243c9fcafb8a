//! Context retrieval - selects a bounded, ranked subset of memories for
//! prompt inclusion.
//!
//! Pure given (memory view, input, config): no I/O, no randomness, and
//! every ranking has a total tie-break so the output order is fully
//! deterministic.

use loreguard_domain::{
    BeliefMemoryEntry, CanonicalFact, DialogueTurn, EpisodicMemoryEntry, StateSnapshotBuilder,
    WorldStateEntry,
};

use crate::infrastructure::app_settings::RetrievalConfig;
use crate::memory::contradiction::{content_words, overlap_fraction, tokenize};
use crate::memory::MemorySystem;

/// The bounded selection retrieval hands to the snapshot builder.
#[derive(Debug, Clone, Default)]
pub struct RetrievedContext {
    pub canonical_facts: Vec<CanonicalFact>,
    pub world_state: Vec<WorldStateEntry>,
    /// Ranked, best first
    pub episodic_memories: Vec<EpisodicMemoryEntry>,
    pub beliefs: Vec<BeliefMemoryEntry>,
    /// Chronological, oldest first
    pub dialogue_history: Vec<DialogueTurn>,
}

impl RetrievedContext {
    /// Feed the selection into a snapshot builder.
    pub fn apply(self, builder: StateSnapshotBuilder) -> StateSnapshotBuilder {
        builder
            .canonical_facts(self.canonical_facts)
            .world_state(self.world_state)
            .episodic_memories(self.episodic_memories)
            .beliefs(self.beliefs)
            .dialogue_history(self.dialogue_history)
    }

    /// Ids of the episodic entries that made the cut (for access-time
    /// touching after a successful turn).
    pub fn episodic_ids(&self) -> Vec<String> {
        self.episodic_memories.iter().map(|e| e.id.clone()).collect()
    }
}

/// Deterministic memory selection.
pub struct ContextRetriever {
    config: RetrievalConfig,
}

impl ContextRetriever {
    pub fn new(config: RetrievalConfig) -> Self {
        Self { config }
    }

    pub fn retrieve(
        &self,
        memory: &MemorySystem,
        input: &str,
        topic_hints: &[String],
    ) -> RetrievedContext {
        let mut query = content_words(input);
        for hint in topic_hints {
            query.extend(content_words(hint));
        }

        RetrievedContext {
            canonical_facts: self.select_canonical(memory, &query),
            world_state: self.select_world_state(memory),
            episodic_memories: self.select_episodic(memory, &query),
            beliefs: self.select_beliefs(memory),
            dialogue_history: self.select_dialogue(memory),
        }
    }

    /// All canonical facts by (domain, id); with a cap set, topic-matching
    /// facts are kept first and the list is truncated to the cap.
    fn select_canonical(&self, memory: &MemorySystem, query: &[String]) -> Vec<CanonicalFact> {
        let mut facts: Vec<CanonicalFact> = memory.canonical_facts().cloned().collect();
        facts.sort_by(|a, b| a.domain.cmp(&b.domain).then_with(|| a.id.cmp(&b.id)));

        if self.config.max_canonical_facts == 0 {
            return facts;
        }

        facts.retain(|fact| {
            let fact_tokens = tokenize(&fact.fact);
            query.iter().any(|w| fact_tokens.contains(w))
        });
        facts.truncate(self.config.max_canonical_facts);
        facts
    }

    fn select_world_state(&self, memory: &MemorySystem) -> Vec<WorldStateEntry> {
        memory
            .world_state()
            .take(self.config.max_world_state)
            .cloned()
            .collect()
    }

    /// Score = recency_weight * 1/(1 + age) + relevance_weight * overlap
    /// + significance_weight * significance, where age is the entry's rank
    /// by creation time (0 = newest). Ties break by created_at desc, then
    /// id asc. Eligibility is the strength threshold alone; access time
    /// never expires an entry, decay does.
    fn select_episodic(&self, memory: &MemorySystem, query: &[String]) -> Vec<EpisodicMemoryEntry> {
        let mut eligible: Vec<&EpisodicMemoryEntry> = memory
            .episodic_memories()
            .filter(|e| e.strength >= self.config.min_episodic_strength)
            .collect();

        // Age rank: newest first.
        eligible.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));

        let mut scored: Vec<(f32, &EpisodicMemoryEntry)> = eligible
            .into_iter()
            .enumerate()
            .map(|(age, entry)| {
                let recency = 1.0 / (1.0 + age as f32);
                let relevance = overlap_fraction(query, &tokenize(&entry.description));
                let score = self.config.recency_weight * recency
                    + self.config.relevance_weight * relevance
                    + self.config.significance_weight * entry.significance;
                (score, entry)
            })
            .collect();

        scored.sort_by(|(sa, a), (sb, b)| {
            sb.total_cmp(sa)
                .then_with(|| b.created_at.cmp(&a.created_at))
                .then_with(|| a.id.cmp(&b.id))
        });

        scored
            .into_iter()
            .take(self.config.max_episodic_memories)
            .map(|(_, e)| e.clone())
            .collect()
    }

    fn select_beliefs(&self, memory: &MemorySystem) -> Vec<BeliefMemoryEntry> {
        let mut beliefs: Vec<&BeliefMemoryEntry> = memory
            .beliefs()
            .filter(|b| b.confidence >= self.config.min_belief_confidence)
            .filter(|b| self.config.include_contradicted_beliefs || !b.is_contradicted)
            .collect();

        beliefs.sort_by(|a, b| {
            b.confidence
                .total_cmp(&a.confidence)
                .then_with(|| a.subject.cmp(&b.subject))
                .then_with(|| a.id.cmp(&b.id))
        });

        beliefs
            .into_iter()
            .take(self.config.max_beliefs)
            .cloned()
            .collect()
    }

    fn select_dialogue(&self, memory: &MemorySystem) -> Vec<DialogueTurn> {
        let history = memory.dialogue_history();
        let start = history.len().saturating_sub(self.config.max_dialogue_history);
        history[start..].to_vec()
    }
}
