// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Compensation Engine - Errors

use std::fmt;

/// Entities that can be missing from the data source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entity {
    Distributor,
    Period,
    Node,
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Distributor => "distributor",
            Self::Period => "period",
            Self::Node => "node",
        };
        f.write_str(name)
    }
}

/// Errors surfaced by the engine and its collaborator ports.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("{entity} {id} not found")]
    NotFound { entity: Entity, id: String },

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("upstream {source_name} unavailable: {reason}")]
    UpstreamUnavailable {
        source_name: String,
        reason: String,
        retryable: bool,
    },

    /// A data integrity bug; never corrected silently.
    #[error("invariant violated ({check}): expected {expected}, got {actual}")]
    InvariantViolation {
        check: &'static str,
        expected: String,
        actual: String,
    },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl EngineError {
    pub fn not_found(entity: Entity, id: impl fmt::Display) -> Self {
        Self::NotFound { entity, id: id.to_string() }
    }

    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    pub fn upstream(source_name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::UpstreamUnavailable {
            source_name: source_name.into(),
            reason: reason.into(),
            retryable: true,
        }
    }

    /// Only transient upstream failures are worth another attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::UpstreamUnavailable { retryable: true, .. })
    }

    /// Business-level errors are expected outcomes of a query; invariant
    /// violations and upstream outages are not.
    pub fn is_business_error(&self) -> bool {
        matches!(self, Self::NotFound { .. } | Self::InvalidInput(_))
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;
