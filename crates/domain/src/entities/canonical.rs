//! Designer-authored canonical facts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::authority::{AuthorityLevel, MutationSource};

/// An immutable truth set by the designer. No runtime source may modify
/// or delete a canonical fact after creation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CanonicalFact {
    /// Unique identifier; duplicate ids are rejected on insert
    pub id: String,
    /// The fact itself, stated as prose (e.g. "The king is named Arthur")
    pub fact: String,
    /// Grouping key for retrieval ordering (e.g. "royalty", "geography")
    pub domain: String,
    /// When the fact was created
    pub created_at: DateTime<Utc>,
}

impl CanonicalFact {
    pub fn new(
        id: impl Into<String>,
        fact: impl Into<String>,
        domain: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            fact: fact.into(),
            domain: domain.into(),
            created_at,
        }
    }

    /// Canonical facts always sit at the top of the hierarchy.
    pub fn authority(&self) -> AuthorityLevel {
        AuthorityLevel::Canonical
    }

    /// Canonical facts are always designer-sourced.
    pub fn source(&self) -> MutationSource {
        MutationSource::Designer
    }
}
