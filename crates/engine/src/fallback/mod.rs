//! Fallback system - deterministic canned utterances for turns that
//! cannot be validated.
//!
//! Selection is a pure function of (trigger reason, seed): the chosen
//! list depends on the trigger, the index comes from a seeded RNG, and
//! empty lists fall through generic -> emergency -> a hard-coded line.

use std::collections::BTreeMap;

use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};

use loreguard_domain::{InteractionContext, TriggerReason};

/// The line of last resort when every configured list is empty.
pub const LAST_RESORT: &str = "*remains silent*";

/// How much of a failure reason the statistics retain.
const REASON_TRUNCATE_LEN: usize = 32;

/// Selection totals by trigger reason and truncated failure reason.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FallbackStats {
    pub total_selections: u64,
    pub by_trigger: BTreeMap<String, u64>,
    pub by_failure_reason: BTreeMap<String, u64>,
}

/// Keyed fallback lists plus selection statistics.
#[derive(Debug, Clone)]
pub struct FallbackLibrary {
    pub player_utterance: Vec<String>,
    pub zone_trigger: Vec<String>,
    pub time_trigger: Vec<String>,
    pub quest_trigger: Vec<String>,
    pub npc_interaction: Vec<String>,
    pub world_event: Vec<String>,
    pub custom_trigger: Vec<String>,
    pub generic: Vec<String>,
    pub emergency: Vec<String>,
    stats: FallbackStats,
}

impl Default for FallbackLibrary {
    fn default() -> Self {
        Self {
            player_utterance: vec![
                "Hm? Say that again.".to_string(),
                "Forgive me, my mind wandered.".to_string(),
                "Let me think on that a moment.".to_string(),
            ],
            zone_trigger: vec![
                "*glances up briefly*".to_string(),
                "*nods in acknowledgement*".to_string(),
            ],
            time_trigger: vec!["*stretches and looks at the sky*".to_string()],
            quest_trigger: vec!["There is work to be done, I hear.".to_string()],
            npc_interaction: vec!["*exchanges a look*".to_string()],
            world_event: vec!["Did you feel that?".to_string()],
            custom_trigger: vec![],
            generic: vec![
                "Hmm.".to_string(),
                "*pauses thoughtfully*".to_string(),
            ],
            emergency: vec!["*stares into the distance*".to_string()],
            stats: FallbackStats::default(),
        }
    }
}

impl FallbackLibrary {
    /// An empty library (every selection lands on the hard-coded line).
    pub fn empty() -> Self {
        Self {
            player_utterance: vec![],
            zone_trigger: vec![],
            time_trigger: vec![],
            quest_trigger: vec![],
            npc_interaction: vec![],
            world_event: vec![],
            custom_trigger: vec![],
            generic: vec![],
            emergency: vec![],
            stats: FallbackStats::default(),
        }
    }

    pub fn stats(&self) -> &FallbackStats {
        &self.stats
    }

    /// Pick a fallback utterance. Same (trigger, seed, overrides) in,
    /// same text out. `overrides` wins when non-empty; otherwise the
    /// trigger's list, then generic, then emergency, then the hard-coded
    /// last resort.
    pub fn select(
        &mut self,
        ctx: &InteractionContext,
        failure_reason: &str,
        seed: u64,
        overrides: Option<&[String]>,
    ) -> String {
        self.stats.total_selections += 1;
        *self
            .stats
            .by_trigger
            .entry(ctx.trigger_reason.to_string())
            .or_insert(0) += 1;
        let truncated: String = failure_reason.chars().take(REASON_TRUNCATE_LEN).collect();
        *self.stats.by_failure_reason.entry(truncated).or_insert(0) += 1;

        let trigger_list = match ctx.trigger_reason {
            TriggerReason::PlayerUtterance => &self.player_utterance,
            TriggerReason::ZoneTrigger => &self.zone_trigger,
            TriggerReason::TimeTrigger => &self.time_trigger,
            TriggerReason::QuestTrigger => &self.quest_trigger,
            TriggerReason::NpcInteraction => &self.npc_interaction,
            TriggerReason::WorldEvent => &self.world_event,
            TriggerReason::Custom => &self.custom_trigger,
        };

        let list = match overrides {
            Some(list) if !list.is_empty() => list,
            _ if !trigger_list.is_empty() => trigger_list,
            _ if !self.generic.is_empty() => &self.generic,
            _ if !self.emergency.is_empty() => &self.emergency,
            _ => return LAST_RESORT.to_string(),
        };

        let mut rng = StdRng::seed_from_u64(seed);
        let index = (rng.next_u64() % list.len() as u64) as usize;
        list[index].clone()
    }
}
