//! The authoritative memory system.
//!
//! Sole owner of durable character/world state. Every mutation carries a
//! `MutationSource` and is authority-checked at this boundary; denials
//! come back as `MutationResult { success: false, .. }`, never a panic.
//! All read operations iterate in stable, content-defined order (BTreeMap
//! key order), so serialization and prompt assembly are independent of
//! insertion order.

pub mod contradiction;
pub mod persistence;

use std::collections::BTreeMap;
use std::sync::Arc;

use loreguard_domain::{
    AuthorityLevel, BeliefMemoryEntry, BeliefType, CanonicalFact, DialogueTurn, EpisodeType,
    EpisodicMemoryEntry, MutationResult, MutationSource, WorldStateEntry,
};

use crate::infrastructure::app_settings::MemoryConfig;
use crate::infrastructure::ports::{ClockPort, IdPort};

/// Episodic entry fields the caller supplies; id and timestamps are
/// assigned by the memory system's injected ports.
#[derive(Debug, Clone)]
pub struct EpisodicDraft {
    pub description: String,
    pub episode_type: EpisodeType,
    pub participant: Option<String>,
    pub game_time: Option<String>,
    pub significance: f32,
}

impl EpisodicDraft {
    pub fn new(description: impl Into<String>, episode_type: EpisodeType, significance: f32) -> Self {
        Self {
            description: description.into(),
            episode_type,
            participant: None,
            game_time: None,
            significance,
        }
    }

    pub fn with_participant(mut self, participant: impl Into<String>) -> Self {
        self.participant = Some(participant.into());
        self
    }
}

/// Belief entry fields the caller supplies.
#[derive(Debug, Clone)]
pub struct BeliefDraft {
    pub subject: String,
    pub belief_content: String,
    pub belief_type: BeliefType,
    pub confidence: f32,
    pub sentiment: f32,
    pub evidence: Option<String>,
}

impl BeliefDraft {
    pub fn new(
        subject: impl Into<String>,
        belief_content: impl Into<String>,
        belief_type: BeliefType,
        confidence: f32,
    ) -> Self {
        Self {
            subject: subject.into(),
            belief_content: belief_content.into(),
            belief_type,
            confidence,
            sentiment: 0.0,
            evidence: None,
        }
    }

    pub fn with_sentiment(mut self, sentiment: f32) -> Self {
        self.sentiment = sentiment;
        self
    }

    pub fn with_evidence(mut self, evidence: impl Into<String>) -> Self {
        self.evidence = Some(evidence.into());
        self
    }
}

/// The typed store of facts, world state, episodes, and beliefs.
pub struct MemorySystem {
    clock: Arc<dyn ClockPort>,
    ids: Arc<dyn IdPort>,
    config: MemoryConfig,
    canonical: BTreeMap<String, CanonicalFact>,
    world_state: BTreeMap<String, WorldStateEntry>,
    episodic: BTreeMap<String, EpisodicMemoryEntry>,
    beliefs: BTreeMap<String, BeliefMemoryEntry>,
    dialogue: Vec<DialogueTurn>,
}

impl MemorySystem {
    pub fn new(clock: Arc<dyn ClockPort>, ids: Arc<dyn IdPort>, config: MemoryConfig) -> Self {
        Self {
            clock,
            ids,
            config,
            canonical: BTreeMap::new(),
            world_state: BTreeMap::new(),
            episodic: BTreeMap::new(),
            beliefs: BTreeMap::new(),
            dialogue: Vec::new(),
        }
    }

    // =========================================================================
    // Mutations
    // =========================================================================

    /// Create a canonical fact. Fails on duplicate id. Only the designer
    /// creates canon, at init; there is no update or delete path at all.
    pub fn add_canonical_fact(
        &mut self,
        id: impl Into<String>,
        fact: impl Into<String>,
        domain: impl Into<String>,
    ) -> MutationResult {
        let id = id.into();
        if self.canonical.contains_key(&id) {
            return MutationResult::denied(format!("canonical fact '{id}' already exists"));
        }
        let fact = CanonicalFact::new(id.clone(), fact, domain, self.clock.now());
        self.canonical.insert(id.clone(), fact);
        MutationResult::ok(id)
    }

    /// Create or overwrite a world-state entry. Requires at least
    /// WorldState rank (`Designer` or `GameSystem`).
    pub fn set_world_state(
        &mut self,
        key: impl Into<String>,
        value: impl Into<String>,
        source: MutationSource,
    ) -> MutationResult {
        let key = key.into();
        if !source.can_write(AuthorityLevel::WorldState) {
            return MutationResult::denied(format!(
                "{source} cannot write WorldState entry '{key}'"
            ));
        }
        let now = self.clock.now();
        match self.world_state.get_mut(&key) {
            Some(entry) => entry.overwrite(value, source, now),
            None => {
                let entry = WorldStateEntry::new(key.clone(), value, source, now);
                self.world_state.insert(key.clone(), entry);
            }
        }
        MutationResult::ok(key)
    }

    /// Append an episodic memory. Requires at least Episodic rank. The id
    /// comes from the injected generator, timestamps from the injected
    /// clock. May trigger capacity pruning.
    pub fn add_episodic(&mut self, draft: EpisodicDraft, source: MutationSource) -> MutationResult {
        if !source.can_write(AuthorityLevel::Episodic) {
            return MutationResult::denied(format!("{source} cannot append episodic memories"));
        }
        let id = self.ids.next_id();
        let mut entry = EpisodicMemoryEntry::new(
            id.clone(),
            draft.description,
            draft.episode_type,
            draft.significance,
            self.clock.now(),
        );
        entry.participant = draft.participant;
        entry.game_time = draft.game_time;
        self.episodic.insert(id.clone(), entry);
        self.prune_episodic();
        MutationResult::ok(id)
    }

    /// Create or update a belief. Requires at least Belief rank (any
    /// source). The entry is checked against matching canonical facts;
    /// conflicts flag it as contradicted and demote its confidence.
    pub fn set_belief(
        &mut self,
        id: impl Into<String>,
        draft: BeliefDraft,
        source: MutationSource,
    ) -> MutationResult {
        let id = id.into();
        if !source.can_write(AuthorityLevel::Belief) {
            return MutationResult::denied(format!("{source} cannot write belief '{id}'"));
        }
        // Belief ids never shadow higher-authority entries.
        if self.canonical.contains_key(&id) {
            return MutationResult::denied(format!(
                "{source} cannot write Canonical entry '{id}'"
            ));
        }
        let now = self.clock.now();
        let contradicted = self.conflicts_with_canon(&draft.subject, &draft.belief_content);

        let entry = self
            .beliefs
            .entry(id.clone())
            .or_insert_with(|| {
                BeliefMemoryEntry::new(id.clone(), "", "", BeliefType::Opinion, 0.0, now)
            });
        entry.subject = draft.subject;
        entry.belief_content = draft.belief_content;
        entry.belief_type = draft.belief_type;
        entry.confidence = draft.confidence.clamp(0.0, 1.0);
        entry.sentiment = draft.sentiment.clamp(-1.0, 1.0);
        if draft.evidence.is_some() {
            entry.evidence = draft.evidence;
        }
        entry.updated_at = now;

        if contradicted {
            entry.mark_contradicted(now);
        } else if entry.is_contradicted {
            entry.clear_contradicted(now);
        }
        MutationResult::ok(id)
    }

    /// Reduce the strength of every episodic memory. Significant memories
    /// fade more slowly; entries that fall below the active floor stay in
    /// the store until capacity pruning removes them.
    pub fn apply_episodic_decay(&mut self, delta: f32) {
        for entry in self.episodic.values_mut() {
            entry.decay(delta);
        }
    }

    /// Mark episodic entries as recently accessed (retrieval itself is a
    /// pure read; the pipeline calls this for the entries it used).
    pub fn touch_episodic(&mut self, ids: &[String]) {
        let now = self.clock.now();
        for id in ids {
            if let Some(entry) = self.episodic.get_mut(id) {
                entry.last_accessed_at = now;
            }
        }
    }

    /// Append a dialogue turn to the rolling session history.
    pub fn record_dialogue(&mut self, speaker: impl Into<String>, text: impl Into<String>) {
        self.dialogue.push(DialogueTurn::new(speaker, text));
    }

    // =========================================================================
    // Reads (stable order)
    // =========================================================================

    pub fn canonical_facts(&self) -> impl Iterator<Item = &CanonicalFact> {
        self.canonical.values()
    }

    pub fn world_state(&self) -> impl Iterator<Item = &WorldStateEntry> {
        self.world_state.values()
    }

    pub fn episodic_memories(&self) -> impl Iterator<Item = &EpisodicMemoryEntry> {
        self.episodic.values()
    }

    pub fn beliefs(&self) -> impl Iterator<Item = &BeliefMemoryEntry> {
        self.beliefs.values()
    }

    pub fn dialogue_history(&self) -> &[DialogueTurn] {
        &self.dialogue
    }

    pub fn get_canonical(&self, id: &str) -> Option<&CanonicalFact> {
        self.canonical.get(id)
    }

    pub fn has_canonical(&self, id: &str) -> bool {
        self.canonical.contains_key(id)
    }

    pub fn get_world_state(&self, key: &str) -> Option<&WorldStateEntry> {
        self.world_state.get(key)
    }

    pub fn get_belief(&self, id: &str) -> Option<&BeliefMemoryEntry> {
        self.beliefs.get(id)
    }

    pub fn get_episodic(&self, id: &str) -> Option<&EpisodicMemoryEntry> {
        self.episodic.get(id)
    }

    pub fn canonical_count(&self) -> usize {
        self.canonical.len()
    }

    pub fn episodic_count(&self) -> usize {
        self.episodic.len()
    }

    pub fn active_episodic_count(&self) -> usize {
        self.episodic.values().filter(|e| e.is_active()).count()
    }

    pub fn belief_count(&self) -> usize {
        self.beliefs.len()
    }

    // =========================================================================
    // Internals
    // =========================================================================

    fn conflicts_with_canon(&self, subject: &str, content: &str) -> bool {
        self.canonical.values().any(|fact| {
            contradiction::subject_overlaps(subject, &fact.fact)
                && contradiction::contradicts(&fact.fact, content)
        })
    }

    /// While the active count exceeds capacity, remove the weakest entry.
    /// Tiebreak: oldest `created_at`, then smallest id.
    fn prune_episodic(&mut self) {
        while self.active_episodic_count() > self.config.max_episodic_memories {
            let victim = self
                .episodic
                .values()
                .min_by(|a, b| {
                    a.strength
                        .total_cmp(&b.strength)
                        .then_with(|| a.created_at.cmp(&b.created_at))
                        .then_with(|| a.id.cmp(&b.id))
                })
                .map(|e| e.id.clone());
            match victim {
                Some(id) => {
                    self.episodic.remove(&id);
                }
                None => break,
            }
        }
    }

    pub(crate) fn rebuild(
        clock: Arc<dyn ClockPort>,
        ids: Arc<dyn IdPort>,
        config: MemoryConfig,
        canonical: BTreeMap<String, CanonicalFact>,
        world_state: BTreeMap<String, WorldStateEntry>,
        episodic: BTreeMap<String, EpisodicMemoryEntry>,
        beliefs: BTreeMap<String, BeliefMemoryEntry>,
        dialogue: Vec<DialogueTurn>,
    ) -> Self {
        Self {
            clock,
            ids,
            config,
            canonical,
            world_state,
            episodic,
            beliefs,
            dialogue,
        }
    }
}
