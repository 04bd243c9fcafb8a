//! Authority hierarchy for the authoritative memory store.
//!
//! Every memory entry carries an authority level and every mutation carries
//! a source. A mutation may touch an entry iff the source's rank is at
//! least the entry's authority. The hierarchy is a strict total order:
//! `Canonical > WorldState > Episodic > Belief`.

use serde::{Deserialize, Serialize};

/// Authority level of a memory entry. Declared in ascending order so the
/// derived `Ord` matches the hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AuthorityLevel {
    /// Model-suggested beliefs, lowest authority
    Belief,
    /// Per-turn recollections
    Episodic,
    /// Game-system owned world state
    WorldState,
    /// Designer-authored truth, immutable at runtime
    Canonical,
}

impl AuthorityLevel {
    /// Numeric rank of this level (higher = more authoritative).
    pub fn rank(&self) -> u8 {
        match self {
            AuthorityLevel::Belief => 25,
            AuthorityLevel::Episodic => 50,
            AuthorityLevel::WorldState => 75,
            AuthorityLevel::Canonical => 100,
        }
    }
}

impl std::fmt::Display for AuthorityLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthorityLevel::Belief => write!(f, "Belief"),
            AuthorityLevel::Episodic => write!(f, "Episodic"),
            AuthorityLevel::WorldState => write!(f, "WorldState"),
            AuthorityLevel::Canonical => write!(f, "Canonical"),
        }
    }
}

/// Origin of a mutation. Determines the maximum authority the mutation
/// may write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MutationSource {
    /// Authored content; may write anything including canonical facts
    Designer,
    /// The host game system; may write world state and below
    GameSystem,
    /// Model output that passed the validation gate
    ValidatedOutput,
    /// Raw model proposal; beliefs only
    LlmSuggestion,
}

impl MutationSource {
    /// Highest authority level this source is allowed to write.
    pub fn max_authority(&self) -> AuthorityLevel {
        match self {
            MutationSource::Designer => AuthorityLevel::Canonical,
            MutationSource::GameSystem => AuthorityLevel::WorldState,
            MutationSource::ValidatedOutput => AuthorityLevel::Episodic,
            MutationSource::LlmSuggestion => AuthorityLevel::Belief,
        }
    }

    /// Numeric rank of this source, equal to the rank of its maximum
    /// writable authority.
    pub fn rank(&self) -> u8 {
        self.max_authority().rank()
    }

    /// True if this source may modify an entry of the given authority.
    pub fn can_write(&self, authority: AuthorityLevel) -> bool {
        self.rank() >= authority.rank()
    }
}

impl std::fmt::Display for MutationSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MutationSource::Designer => write!(f, "Designer"),
            MutationSource::GameSystem => write!(f, "GameSystem"),
            MutationSource::ValidatedOutput => write!(f, "ValidatedOutput"),
            MutationSource::LlmSuggestion => write!(f, "LlmSuggestion"),
        }
    }
}
