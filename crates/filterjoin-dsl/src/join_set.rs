//! Graph-shaped join specifications (`join_set`).
//!
//! ```json
//! { "join_set": {
//!     "focus": "articles",
//!     "relations": [
//!       [ {"indices": ["articles"], "path": "company"}, {"indices": ["companies"], "path": "id"} ]
//!     ],
//!     "queries": { "companies": [ {"term": {"country": "fr"}} ] }
//! } }
//! ```
//!
//! Relations are unordered edges between two indices. The walk that turns the
//! graph into nested joins lives in the compiler; this module only owns the
//! shape and the checks that do not depend on the walk.

use crate::endpoint::{parse_clauses, FilterClause, RelationEndpoint};
use crate::error::JoinError;
use crate::pointer::JsonPointer;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// An undirected relation between two endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationEdge {
    pub endpoints: [RelationEndpoint; 2],
    #[serde(default)]
    pub negate: bool,
    /// Where the edge was declared; root when built in code.
    #[serde(default)]
    pub origin: JsonPointer,
}

impl RelationEdge {
    pub fn new(a: RelationEndpoint, b: RelationEndpoint) -> Self {
        Self {
            endpoints: [a, b],
            negate: false,
            origin: JsonPointer::root(),
        }
    }

    pub fn negated(mut self) -> Self {
        self.negate = true;
        self
    }

    /// Accepts `[a, b]` or `{"relation": [a, b], "negate": bool}`.
    pub fn from_value(value: &Value, at: &JsonPointer) -> Result<Self, JoinError> {
        let (pair, pair_at, negate) = match value {
            Value::Array(_) => (value, at.clone(), false),
            Value::Object(object) => {
                let pair = object
                    .get("relation")
                    .ok_or_else(|| JoinError::missing("relation", at))?;
                (pair, at.key("relation"), parse_negate(object.get("negate"), at)?)
            }
            _ => {
                return Err(JoinError::malformed(
                    at,
                    "a relation must be a pair of endpoints",
                ))
            }
        };

        let [a, b] = parse_pair(pair, &pair_at)?;
        Ok(Self {
            endpoints: [a, b],
            negate,
            origin: at.clone(),
        })
    }

    /// If this edge touches `index`, returns `(near, far)` as seen from it.
    pub fn oriented_from(&self, index: &str) -> Option<(&RelationEndpoint, &RelationEndpoint)> {
        let [a, b] = &self.endpoints;
        if a.index() == Some(index) {
            Some((a, b))
        } else if b.index() == Some(index) {
            Some((b, a))
        } else {
            None
        }
    }

    /// Both endpoints name the same index.
    pub fn is_loop(&self) -> bool {
        let [a, b] = &self.endpoints;
        a.index().is_some() && a.index() == b.index()
    }
}

pub(crate) fn parse_negate(value: Option<&Value>, at: &JsonPointer) -> Result<bool, JoinError> {
    match value {
        None | Some(Value::Null) => Ok(false),
        Some(Value::Bool(negate)) => Ok(*negate),
        Some(_) => Err(JoinError::malformed(&at.key("negate"), "`negate` must be a boolean")),
    }
}

pub(crate) fn parse_pair(
    value: &Value,
    at: &JsonPointer,
) -> Result<[RelationEndpoint; 2], JoinError> {
    match value.as_array().map(Vec::as_slice) {
        Some([a, b]) => Ok([
            RelationEndpoint::from_value(a, &at.index(0))?,
            RelationEndpoint::from_value(b, &at.index(1))?,
        ]),
        _ => Err(JoinError::malformed(
            at,
            "a relation must be an array of exactly two endpoints",
        )),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JoinSetSpec {
    pub focus: String,
    pub relations: Vec<RelationEdge>,
    /// Filters to apply on each index, keyed by index name.
    #[serde(default)]
    pub queries: BTreeMap<String, Vec<FilterClause>>,
}

impl JoinSetSpec {
    pub fn new(focus: impl Into<String>, relations: Vec<RelationEdge>) -> Self {
        Self {
            focus: focus.into(),
            relations,
            queries: BTreeMap::new(),
        }
    }

    pub fn with_queries(mut self, index: impl Into<String>, clauses: Vec<FilterClause>) -> Self {
        self.queries.insert(index.into(), clauses);
        self
    }

    /// Parses the value found under a `join_set` key and validates it.
    pub fn from_value(value: &Value, at: &JsonPointer) -> Result<Self, JoinError> {
        let object = value
            .as_object()
            .ok_or_else(|| JoinError::malformed(at, "`join_set` must be an object"))?;

        let focus = match object.get("focus") {
            None | Some(Value::Null) => return Err(JoinError::missing("focus", at)),
            Some(Value::String(focus)) => focus.clone(),
            Some(_) => return Err(JoinError::malformed(&at.key("focus"), "`focus` must be a string")),
        };

        let relations = match object.get("relations") {
            None | Some(Value::Null) => return Err(JoinError::missing("relations", at)),
            Some(Value::Array(items)) => {
                let relations_at = at.key("relations");
                items
                    .iter()
                    .enumerate()
                    .map(|(i, item)| RelationEdge::from_value(item, &relations_at.index(i)))
                    .collect::<Result<Vec<_>, _>>()?
            }
            Some(_) => {
                return Err(JoinError::malformed(
                    &at.key("relations"),
                    "`relations` must be an array",
                ))
            }
        };

        let mut queries = BTreeMap::new();
        match object.get("queries") {
            None | Some(Value::Null) => {}
            Some(Value::Object(by_index)) => {
                let queries_at = at.key("queries");
                for (index, clauses) in by_index {
                    queries.insert(index.clone(), parse_clauses(clauses, &queries_at.key(index))?);
                }
            }
            Some(_) => {
                return Err(JoinError::malformed(
                    &at.key("queries"),
                    "`queries` must be an object keyed by index",
                ))
            }
        }

        let spec = Self {
            focus,
            relations,
            queries,
        };
        spec.validate()?;
        Ok(spec)
    }

    /// Rejects self-edges, whether or not they are reachable from the focus.
    pub fn validate(&self) -> Result<(), JoinError> {
        match self.relations.iter().find(|edge| edge.is_loop()) {
            Some(edge) => Err(JoinError::Loop {
                index: edge.endpoints[0].index().unwrap_or_default().to_string(),
                at: edge.origin.clone(),
            }),
            None => Ok(()),
        }
    }

    /// Filters declared for `index`, if any.
    pub fn queries_for(&self, index: &str) -> &[FilterClause] {
        self.queries.get(index).map(Vec::as_slice).unwrap_or_default()
    }
}
