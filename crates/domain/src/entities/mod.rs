//! Memory entry entities, one module per authority tier.

mod belief;
mod canonical;
mod episodic;
mod world_state;

pub use belief::{BeliefMemoryEntry, BeliefType, CONTRADICTED_CONFIDENCE_CEILING};
pub use canonical::CanonicalFact;
pub use episodic::{EpisodeType, EpisodicMemoryEntry, ACTIVE_STRENGTH_FLOOR};
pub use world_state::WorldStateEntry;
