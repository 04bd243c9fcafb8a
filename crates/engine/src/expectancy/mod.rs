//! Expectancy evaluator - maps interaction context to a constraint set.
//!
//! A registry of pluggable rules. Evaluation is pure: rules are ordered
//! by (priority desc, id asc), each enabled rule that applies appends its
//! constraints, and the resulting set deduplicates by id with
//! higher-severity-wins semantics.

pub mod rules;

use loreguard_domain::{ConstraintSet, InteractionContext};

/// One pluggable expectancy rule.
pub trait ExpectancyRule: Send + Sync {
    fn id(&self) -> &str;

    /// Higher priority rules run first.
    fn priority(&self) -> i32;

    fn enabled(&self) -> bool {
        true
    }

    /// Does this rule apply to the given context?
    fn applies(&self, ctx: &InteractionContext) -> bool;

    /// Append this rule's constraints to the set.
    fn generate_constraints(&self, ctx: &InteractionContext, set: &mut ConstraintSet);
}

/// Rule registry + evaluation.
#[derive(Default)]
pub struct ExpectancyEvaluator {
    rules: Vec<Box<dyn ExpectancyRule>>,
}

impl ExpectancyEvaluator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Evaluator pre-loaded with the built-in rule set.
    pub fn with_default_rules() -> Self {
        let mut evaluator = Self::new();
        evaluator.register(Box::new(rules::MetaTextRule));
        evaluator.register(Box::new(rules::ProfanityRule));
        evaluator.register(Box::new(rules::FirstMeetingRule));
        evaluator
    }

    pub fn register(&mut self, rule: Box<dyn ExpectancyRule>) {
        self.rules.push(rule);
    }

    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }

    /// Produce the constraint set for a context. Pure: no I/O, no
    /// randomness, and registration order does not matter.
    pub fn evaluate(&self, ctx: &InteractionContext) -> ConstraintSet {
        let mut ordered: Vec<&dyn ExpectancyRule> =
            self.rules.iter().map(|r| r.as_ref()).collect();
        ordered.sort_by(|a, b| {
            b.priority()
                .cmp(&a.priority())
                .then_with(|| a.id().cmp(b.id()))
        });

        let mut set = ConstraintSet::new();
        for rule in ordered {
            if rule.enabled() && rule.applies(ctx) {
                rule.generate_constraints(ctx, &mut set);
            }
        }
        set
    }
}
