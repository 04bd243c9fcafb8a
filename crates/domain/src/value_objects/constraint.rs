//! Constraints - machine-checkable rules applied by the validation gate.

use serde::{Deserialize, Serialize};

/// Whether a constraint forbids or demands something.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ConstraintType {
    /// Dialogue must not match any of the keywords/pattern
    Prohibition,
    /// Dialogue must contain at least one of the keywords
    Requirement,
}

/// Severity of a constraint violation. Declared in ascending order so the
/// derived `Ord` can be used directly for "higher severity wins".
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ConstraintSeverity {
    /// Logged but passes
    Soft,
    /// Fails the gate; eligible for retry
    Hard,
    /// Fails the gate; terminates the turn without retry
    Critical,
}

impl std::fmt::Display for ConstraintSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConstraintSeverity::Soft => write!(f, "Soft"),
            ConstraintSeverity::Hard => write!(f, "Hard"),
            ConstraintSeverity::Critical => write!(f, "Critical"),
        }
    }
}

/// A single machine-checkable rule.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Constraint {
    /// Unique identifier; collisions are resolved by severity
    pub id: String,
    pub constraint_type: ConstraintType,
    pub severity: ConstraintSeverity,
    /// Human-readable statement, also rendered into the prompt
    pub description: String,
    /// Keywords checked case-insensitively against dialogue
    pub keywords: Vec<String>,
    /// Optional regex applied in addition to keywords
    pub pattern: Option<String>,
}

impl Constraint {
    pub fn prohibition(
        id: impl Into<String>,
        severity: ConstraintSeverity,
        description: impl Into<String>,
        keywords: Vec<String>,
    ) -> Self {
        Self {
            id: id.into(),
            constraint_type: ConstraintType::Prohibition,
            severity,
            description: description.into(),
            keywords,
            pattern: None,
        }
    }

    pub fn requirement(
        id: impl Into<String>,
        severity: ConstraintSeverity,
        description: impl Into<String>,
        keywords: Vec<String>,
    ) -> Self {
        Self {
            id: id.into(),
            constraint_type: ConstraintType::Requirement,
            severity,
            description: description.into(),
            keywords,
            pattern: None,
        }
    }

    pub fn with_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.pattern = Some(pattern.into());
        self
    }
}

/// An ordered, id-deduplicated collection of constraints.
///
/// Insertion order is preserved (it follows deterministic rule ordering);
/// on an id collision the higher-severity constraint wins in place, and on
/// tied severity the first-added constraint is kept.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ConstraintSet {
    constraints: Vec<Constraint>,
}

impl ConstraintSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a constraint, applying the collision rules.
    pub fn add(&mut self, constraint: Constraint) {
        match self.constraints.iter_mut().find(|c| c.id == constraint.id) {
            Some(existing) => {
                if constraint.severity > existing.severity {
                    *existing = constraint;
                }
            }
            None => self.constraints.push(constraint),
        }
    }

    /// Set union by id where `escalated` wins on collision regardless of
    /// severity. Used when building retry snapshots.
    pub fn union_escalated(&self, escalated: &ConstraintSet) -> ConstraintSet {
        let mut merged = self.clone();
        for constraint in &escalated.constraints {
            match merged.constraints.iter_mut().find(|c| c.id == constraint.id) {
                Some(existing) => *existing = constraint.clone(),
                None => merged.constraints.push(constraint.clone()),
            }
        }
        merged
    }

    pub fn iter(&self) -> impl Iterator<Item = &Constraint> {
        self.constraints.iter()
    }

    pub fn len(&self) -> usize {
        self.constraints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.constraints.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Constraint> {
        self.constraints.iter().find(|c| c.id == id)
    }
}

impl FromIterator<Constraint> for ConstraintSet {
    fn from_iter<T: IntoIterator<Item = Constraint>>(iter: T) -> Self {
        let mut set = ConstraintSet::new();
        for c in iter {
            set.add(c);
        }
        set
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prohibition(id: &str, severity: ConstraintSeverity) -> Constraint {
        Constraint::prohibition(id, severity, "no profanity", vec!["hell".into()])
    }

    #[test]
    fn test_severity_ordering() {
        assert!(ConstraintSeverity::Critical > ConstraintSeverity::Hard);
        assert!(ConstraintSeverity::Hard > ConstraintSeverity::Soft);
    }

    #[test]
    fn test_dedup_higher_severity_wins() {
        let mut set = ConstraintSet::new();
        set.add(prohibition("no_profanity", ConstraintSeverity::Soft));
        set.add(prohibition("no_profanity", ConstraintSeverity::Hard));

        assert_eq!(set.len(), 1);
        assert_eq!(
            set.get("no_profanity").unwrap().severity,
            ConstraintSeverity::Hard
        );
    }

    #[test]
    fn test_dedup_tied_severity_first_wins() {
        let mut set = ConstraintSet::new();
        let mut first = prohibition("no_profanity", ConstraintSeverity::Hard);
        first.description = "first".into();
        let mut second = prohibition("no_profanity", ConstraintSeverity::Hard);
        second.description = "second".into();

        set.add(first);
        set.add(second);

        assert_eq!(set.len(), 1);
        assert_eq!(set.get("no_profanity").unwrap().description, "first");
    }

    #[test]
    fn test_union_escalated_wins_on_collision() {
        let mut original = ConstraintSet::new();
        original.add(prohibition("no_profanity", ConstraintSeverity::Hard));
        original.add(prohibition("stay_polite", ConstraintSeverity::Soft));

        let mut escalated = ConstraintSet::new();
        let mut stronger = prohibition("no_profanity", ConstraintSeverity::Soft);
        stronger.description = "escalated".into();
        escalated.add(stronger);

        let merged = original.union_escalated(&escalated);
        assert_eq!(merged.len(), 2);
        // Escalated wins even though its severity is lower.
        assert_eq!(merged.get("no_profanity").unwrap().description, "escalated");
    }

    #[test]
    fn test_insertion_order_preserved() {
        let mut set = ConstraintSet::new();
        set.add(prohibition("b", ConstraintSeverity::Soft));
        set.add(prohibition("a", ConstraintSeverity::Soft));
        let ids: Vec<&str> = set.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "a"]);
    }
}
