//! Beliefs - model-originated convictions about the world.
//!
//! A belief that contradicts a canonical fact is never deleted; it is
//! flagged and demoted so the audit trail survives.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::authority::AuthorityLevel;

/// Confidence ceiling applied to beliefs that contradict canon.
pub const CONTRADICTED_CONFIDENCE_CEILING: f32 = 0.2;

/// What kind of conviction a belief expresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BeliefType {
    /// A subjective judgement
    Opinion,
    /// A stance toward another character
    Relationship,
    /// Something held to be factually true
    Fact,
    /// An unconfirmed guess
    Speculation,
}

impl std::fmt::Display for BeliefType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BeliefType::Opinion => write!(f, "Opinion"),
            BeliefType::Relationship => write!(f, "Relationship"),
            BeliefType::Fact => write!(f, "Fact"),
            BeliefType::Speculation => write!(f, "Speculation"),
        }
    }
}

/// A single belief entry, lowest rung of the authority hierarchy.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BeliefMemoryEntry {
    /// Unique identifier
    pub id: String,
    /// Who or what the belief is about
    pub subject: String,
    /// The belief itself, stated as prose
    pub belief_content: String,
    /// Kind of conviction
    pub belief_type: BeliefType,
    /// How strongly the belief is held, in [0, 1]
    pub confidence: f32,
    /// Emotional valence toward the subject, in [-1, 1]
    pub sentiment: f32,
    /// What the belief is based on, if recorded
    pub evidence: Option<String>,
    /// True when the belief conflicts with a canonical fact
    pub is_contradicted: bool,
    /// When the belief was first formed
    pub created_at: DateTime<Utc>,
    /// When the belief was last revised
    pub updated_at: DateTime<Utc>,
}

impl BeliefMemoryEntry {
    pub fn new(
        id: impl Into<String>,
        subject: impl Into<String>,
        belief_content: impl Into<String>,
        belief_type: BeliefType,
        confidence: f32,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            subject: subject.into(),
            belief_content: belief_content.into(),
            belief_type,
            confidence: confidence.clamp(0.0, 1.0),
            sentiment: 0.0,
            evidence: None,
            is_contradicted: false,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_sentiment(mut self, sentiment: f32) -> Self {
        self.sentiment = sentiment.clamp(-1.0, 1.0);
        self
    }

    pub fn with_evidence(mut self, evidence: impl Into<String>) -> Self {
        self.evidence = Some(evidence.into());
        self
    }

    /// Flag this belief as contradicting canon and demote its confidence.
    pub fn mark_contradicted(&mut self, now: DateTime<Utc>) {
        self.is_contradicted = true;
        self.confidence = self.confidence.min(CONTRADICTED_CONFIDENCE_CEILING);
        self.updated_at = now;
    }

    /// Clear the contradiction flag (e.g. when the belief is revised to
    /// no longer conflict). Confidence is not restored.
    pub fn clear_contradicted(&mut self, now: DateTime<Utc>) {
        self.is_contradicted = false;
        self.updated_at = now;
    }

    pub fn authority(&self) -> AuthorityLevel {
        AuthorityLevel::Belief
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mark_contradicted_demotes_confidence() {
        let now = Utc::now();
        let mut belief = BeliefMemoryEntry::new(
            "belief_king",
            "king",
            "The king is named Bob",
            BeliefType::Fact,
            0.9,
            now,
        );

        belief.mark_contradicted(now);

        assert!(belief.is_contradicted);
        assert!(belief.confidence <= CONTRADICTED_CONFIDENCE_CEILING);
    }

    #[test]
    fn test_mark_contradicted_keeps_low_confidence() {
        let now = Utc::now();
        let mut belief = BeliefMemoryEntry::new("b1", "s", "c", BeliefType::Opinion, 0.05, now);
        belief.mark_contradicted(now);
        assert_eq!(belief.confidence, 0.05);
    }

    #[test]
    fn test_confidence_clamped_on_construction() {
        let now = Utc::now();
        let belief = BeliefMemoryEntry::new("b1", "s", "c", BeliefType::Opinion, 1.7, now);
        assert_eq!(belief.confidence, 1.0);
    }

    #[test]
    fn test_sentiment_clamped() {
        let now = Utc::now();
        let belief =
            BeliefMemoryEntry::new("b1", "s", "c", BeliefType::Relationship, 0.5, now).with_sentiment(-2.0);
        assert_eq!(belief.sentiment, -1.0);
    }
}
