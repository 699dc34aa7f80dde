//! Validation errors for join specifications.
//!
//! All of these are terminal: a malformed specification never becomes valid
//! by retrying, so callers should turn them straight into a client-facing
//! failure.

use crate::pointer::JsonPointer;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum JoinError {
    #[error("missing field `{field}` at {at}")]
    MissingField { field: &'static str, at: JsonPointer },

    #[error("malformed join specification at {at}: {reason}")]
    MalformedShape { at: JsonPointer, reason: String },

    #[error("unknown field `{field}` in relation endpoint at {at}")]
    UnknownField { field: String, at: JsonPointer },

    #[error("filters for index `{index}` cannot be attached at the root of a join set; there is no parent join to carry them")]
    IllegalRootFilters { index: String },

    #[error("queries already set: the root-side endpoint at {at} must not carry `queries`")]
    DuplicateRootQueries { at: JsonPointer },

    #[error("loops in the join set are not supported: relation at {at} joins index `{index}` with itself")]
    Loop { index: String, at: JsonPointer },

    #[error("cannot replace `{label}` at {at}: the enclosing object must not contain other keys")]
    SpliceConflict { label: String, at: JsonPointer },
}

impl JoinError {
    pub(crate) fn malformed(at: &JsonPointer, reason: impl Into<String>) -> Self {
        JoinError::MalformedShape {
            at: at.clone(),
            reason: reason.into(),
        }
    }

    pub(crate) fn missing(field: &'static str, at: &JsonPointer) -> Self {
        JoinError::MissingField {
            field,
            at: at.clone(),
        }
    }

    /// Pointer to the offending object, when the error is tied to one.
    pub fn location(&self) -> Option<&JsonPointer> {
        match self {
            JoinError::MissingField { at, .. }
            | JoinError::MalformedShape { at, .. }
            | JoinError::UnknownField { at, .. }
            | JoinError::DuplicateRootQueries { at }
            | JoinError::Loop { at, .. }
            | JoinError::SpliceConflict { at, .. } => Some(at),
            JoinError::IllegalRootFilters { .. } => None,
        }
    }
}
