//! Unified error types for the domain layer
//!
//! Provides a common error type usable across all domain operations,
//! enabling consistent error handling without forcing callers onto
//! String or anyhow.

use thiserror::Error;

/// Unified error type for domain operations
#[derive(Debug, Error, Clone, PartialEq)]
pub enum DomainError {
    /// Validation failed (e.g., invalid field values)
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Duplicate identifier on insert
    #[error("Duplicate id: {0}")]
    DuplicateId(String),

    /// Entity not found
    #[error("Entity not found: {entity_type} with id {id}")]
    NotFound {
        entity_type: &'static str,
        id: String,
    },

    /// A write was attempted by a source whose rank is below the target authority
    #[error("Authority violation: {source_actor} cannot write {authority} entry '{target}'")]
    Authority {
        source_actor: String,
        authority: String,
        target: String,
    },

    /// Configuration is inconsistent (e.g., ranking weights do not sum to 1)
    #[error("Invalid configuration: {0}")]
    Configuration(String),

    /// Parse error (for value objects)
    #[error("Parse error: {0}")]
    Parse(String),
}

impl DomainError {
    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a not found error
    pub fn not_found(entity_type: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity_type,
            id: id.into(),
        }
    }

    /// Create an authority violation error
    pub fn authority(
        source: impl Into<String>,
        authority: impl Into<String>,
        target: impl Into<String>,
    ) -> Self {
        Self::Authority {
            source_actor: source.into(),
            authority: authority.into(),
            target: target.into(),
        }
    }

    /// Create a configuration error
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Create a parse error
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse(msg.into())
    }
}
