//! Built-in expectancy rules.

use loreguard_domain::{Constraint, ConstraintSet, ConstraintSeverity, InteractionContext};

use crate::expectancy::ExpectancyRule;

/// NPCs must never break character or acknowledge being generated.
pub struct MetaTextRule;

impl ExpectancyRule for MetaTextRule {
    fn id(&self) -> &str {
        "meta_text"
    }

    fn priority(&self) -> i32 {
        100
    }

    fn applies(&self, _ctx: &InteractionContext) -> bool {
        true
    }

    fn generate_constraints(&self, _ctx: &InteractionContext, set: &mut ConstraintSet) {
        set.add(Constraint::prohibition(
            "no_meta_text",
            ConstraintSeverity::Critical,
            "Never refer to yourself as an AI, a model, or an assistant",
            vec![
                "as an ai".into(),
                "language model".into(),
                "i am an assistant".into(),
            ],
        ));
    }
}

/// Keep NPC speech free of profanity.
pub struct ProfanityRule;

impl ExpectancyRule for ProfanityRule {
    fn id(&self) -> &str {
        "profanity"
    }

    fn priority(&self) -> i32 {
        90
    }

    fn applies(&self, _ctx: &InteractionContext) -> bool {
        true
    }

    fn generate_constraints(&self, _ctx: &InteractionContext, set: &mut ConstraintSet) {
        set.add(Constraint::prohibition(
            "no_profanity",
            ConstraintSeverity::Hard,
            "Keep language clean; no swearing",
            vec!["hell".into(), "damn".into(), "bastard".into()],
        ));
    }
}

/// On a first meeting the NPC should greet the player.
pub struct FirstMeetingRule;

impl ExpectancyRule for FirstMeetingRule {
    fn id(&self) -> &str {
        "first_meeting"
    }

    fn priority(&self) -> i32 {
        50
    }

    fn applies(&self, ctx: &InteractionContext) -> bool {
        ctx.interaction_count == 0
    }

    fn generate_constraints(&self, _ctx: &InteractionContext, set: &mut ConstraintSet) {
        set.add(Constraint::requirement(
            "greet_on_first_meeting",
            ConstraintSeverity::Soft,
            "Greet the player on a first meeting",
            vec![
                "hello".into(),
                "greetings".into(),
                "welcome".into(),
                "hi".into(),
            ],
        ));
    }
}

/// Host-configurable keyword prohibition (e.g. spoiler topics for a
/// specific quest stage).
pub struct KeywordProhibitionRule {
    id: String,
    priority: i32,
    constraint_id: String,
    severity: ConstraintSeverity,
    description: String,
    keywords: Vec<String>,
}

impl KeywordProhibitionRule {
    pub fn new(
        id: impl Into<String>,
        priority: i32,
        severity: ConstraintSeverity,
        description: impl Into<String>,
        keywords: Vec<String>,
    ) -> Self {
        let id = id.into();
        Self {
            constraint_id: format!("prohibit_{id}"),
            id,
            priority,
            severity,
            description: description.into(),
            keywords,
        }
    }
}

impl ExpectancyRule for KeywordProhibitionRule {
    fn id(&self) -> &str {
        &self.id
    }

    fn priority(&self) -> i32 {
        self.priority
    }

    fn applies(&self, _ctx: &InteractionContext) -> bool {
        true
    }

    fn generate_constraints(&self, _ctx: &InteractionContext, set: &mut ConstraintSet) {
        set.add(Constraint::prohibition(
            self.constraint_id.clone(),
            self.severity,
            self.description.clone(),
            self.keywords.clone(),
        ));
    }
}
