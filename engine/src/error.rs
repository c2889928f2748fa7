//! Error taxonomy of the lifecycle engine.

use crate::types::TicketId;
use thiserror::Error;

/// Errors returned by engine operations.
///
/// The engine is deterministic, so none of these are retried internally.
/// Callers re-read fresh state and try again at the orchestration boundary.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// A priority, status, category or sort field did not name a known value.
    #[error("Invalid {field} value: {value:?}")]
    InvalidEnumValue {
        /// Which input field was malformed
        field: &'static str,
        /// The rejected input
        value: String,
    },

    /// A free-text field broke a shape rule (blank, too long).
    #[error("Invalid {field}: {reason}")]
    InvalidField {
        /// Which input field was malformed
        field: &'static str,
        /// What was wrong with it
        reason: String,
    },

    /// The actor lacks the capability the operation needs.
    #[error("Forbidden: actor may not {action}")]
    Forbidden {
        /// Operation that was refused
        action: &'static str,
    },

    /// The operation is illegal in the ticket's current state.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// The ticket does not exist. Raised by repositories, never by the engine.
    #[error("Ticket not found: {0}")]
    NotFound(TicketId),
}

impl EngineError {
    pub(crate) fn invalid_enum(field: &'static str, value: &str) -> Self {
        Self::InvalidEnumValue {
            field,
            value: value.to_string(),
        }
    }

    pub(crate) fn invalid_field(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidField {
            field,
            reason: reason.into(),
        }
    }

    /// Whether re-reading the ticket and retrying could succeed.
    #[must_use]
    pub const fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict(_))
    }
}
