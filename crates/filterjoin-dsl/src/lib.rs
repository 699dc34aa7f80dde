//! Filterjoin join-specification DSL
//!
//! Clients embed relational joins in an ordinary search document under one
//! of two labels:
//! - `join_set`: a graph of relations walked from a focus index
//! - `join_sequence`: an explicit chain of relations, optionally branching
//!
//! This crate defines the typed model for both forms, parses them out of
//! `serde_json` values, and validates their shape. Compiling them into
//! filterjoin clauses is the job of `filterjoin-compiler`.

pub mod endpoint;
pub mod error;
pub mod join_sequence;
pub mod join_set;
pub mod pointer;

pub use endpoint::{FilterClause, RelationEndpoint, TermsLimit, ENDPOINT_FIELDS};
pub use error::JoinError;
pub use join_sequence::{GroupStep, JoinSequenceSpec, JoinSequenceStep, RelationStep};
pub use join_set::{JoinSetSpec, RelationEdge};
pub use pointer::{JsonPointer, Segment};

use serde::{Deserialize, Serialize};
use std::fmt;

/// The document keys that introduce a join specification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JoinLabel {
    JoinSet,
    JoinSequence,
}

impl JoinLabel {
    pub const ALL: [JoinLabel; 2] = [JoinLabel::JoinSet, JoinLabel::JoinSequence];

    pub fn as_str(self) -> &'static str {
        match self {
            JoinLabel::JoinSet => "join_set",
            JoinLabel::JoinSequence => "join_sequence",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|label| label.as_str() == key)
    }
}

impl fmt::Display for JoinLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A parsed join specification of either form.
#[derive(Debug, Clone, PartialEq)]
pub enum JoinSpec {
    Set(JoinSetSpec),
    Sequence(JoinSequenceSpec),
}

impl JoinSpec {
    /// Parses `value`, the content found under `label` at `at`.
    pub fn parse(label: JoinLabel, value: &serde_json::Value, at: &JsonPointer) -> Result<Self, JoinError> {
        match label {
            JoinLabel::JoinSet => JoinSetSpec::from_value(value, at).map(JoinSpec::Set),
            JoinLabel::JoinSequence => JoinSequenceSpec::from_value(value, at).map(JoinSpec::Sequence),
        }
    }

    pub fn label(&self) -> JoinLabel {
        match self {
            JoinSpec::Set(_) => JoinLabel::JoinSet,
            JoinSpec::Sequence(_) => JoinLabel::JoinSequence,
        }
    }
}
