//! Relation endpoints: one side of a relation between two indices.

use crate::error::JoinError;
use crate::pointer::JsonPointer;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Keys an endpoint object may carry. Anything else is rejected.
pub const ENDPOINT_FIELDS: [&str; 7] = [
    "path",
    "indices",
    "types",
    "orderBy",
    "maxTermsPerShard",
    "termsEncoding",
    "queries",
];

/// Cap on the number of terms each shard contributes to a join.
///
/// Requests use `-1` to mean "no cap"; any negative value is treated the same
/// way and never reaches the compiled output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TermsLimit {
    #[default]
    Unset,
    Capped(u64),
}

impl TermsLimit {
    pub fn from_raw(raw: i64) -> Self {
        if raw > -1 {
            TermsLimit::Capped(raw as u64)
        } else {
            TermsLimit::Unset
        }
    }

    pub fn cap(self) -> Option<u64> {
        match self {
            TermsLimit::Unset => None,
            TermsLimit::Capped(n) => Some(n),
        }
    }
}

/// A filter clause supplied by the client for some index.
///
/// A clause with a top-level `query` member is a full scored clause and takes
/// part in ranking; anything else is a plain, non-scoring filter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "clause", rename_all = "snake_case")]
pub enum FilterClause {
    Scored(Value),
    Filter(Value),
}

impl FilterClause {
    pub fn new(clause: Value) -> Self {
        let scored = clause
            .as_object()
            .map_or(false, |object| object.contains_key("query"));
        if scored {
            FilterClause::Scored(clause)
        } else {
            FilterClause::Filter(clause)
        }
    }

    pub fn from_value(value: &Value, at: &JsonPointer) -> Result<Self, JoinError> {
        if !value.is_object() {
            return Err(JoinError::malformed(at, "a filter clause must be an object"));
        }
        Ok(Self::new(value.clone()))
    }

    pub fn is_scored(&self) -> bool {
        matches!(self, FilterClause::Scored(_))
    }

    pub fn as_value(&self) -> &Value {
        match self {
            FilterClause::Scored(value) | FilterClause::Filter(value) => value,
        }
    }
}

/// Parses an array of filter clauses.
pub fn parse_clauses(value: &Value, at: &JsonPointer) -> Result<Vec<FilterClause>, JoinError> {
    match value {
        Value::Null => Ok(Vec::new()),
        Value::Array(items) => items
            .iter()
            .enumerate()
            .map(|(i, item)| FilterClause::from_value(item, &at.index(i)))
            .collect(),
        _ => Err(JoinError::malformed(at, "`queries` must be an array of filter clauses")),
    }
}

/// One side of a relation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelationEndpoint {
    /// Field holding the join values.
    pub path: String,
    pub indices: Vec<String>,
    pub types: Vec<String>,
    pub order_by: Option<String>,
    pub max_terms_per_shard: TermsLimit,
    pub terms_encoding: Option<String>,
    pub queries: Vec<FilterClause>,
}

impl RelationEndpoint {
    pub fn new(index: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            indices: vec![index.into()],
            ..Self::default()
        }
    }

    /// Identity of the endpoint in a join set: its first index.
    pub fn index(&self) -> Option<&str> {
        self.indices.first().map(String::as_str)
    }

    pub fn from_value(value: &Value, at: &JsonPointer) -> Result<Self, JoinError> {
        let object = value
            .as_object()
            .ok_or_else(|| JoinError::malformed(at, "a relation endpoint must be an object"))?;

        if let Some(field) = object
            .keys()
            .find(|key| !ENDPOINT_FIELDS.contains(&key.as_str()))
        {
            return Err(JoinError::UnknownField {
                field: field.clone(),
                at: at.clone(),
            });
        }

        let path = match object.get("path") {
            None | Some(Value::Null) => return Err(JoinError::missing("path", at)),
            Some(Value::String(path)) if !path.is_empty() => path.clone(),
            Some(Value::String(_)) => return Err(JoinError::missing("path", at)),
            Some(_) => return Err(JoinError::malformed(&at.key("path"), "`path` must be a string")),
        };

        Ok(Self {
            path,
            indices: string_list(object, "indices", at)?,
            types: string_list(object, "types", at)?,
            order_by: non_empty_string(object, "orderBy", at)?,
            max_terms_per_shard: terms_limit(object, at)?,
            terms_encoding: non_empty_string(object, "termsEncoding", at)?,
            queries: parse_clauses(object.get("queries").unwrap_or(&Value::Null), &at.key("queries"))?,
        })
    }
}

/// A string or array of strings, normalized to a list; absent means empty.
fn string_list(
    object: &Map<String, Value>,
    key: &'static str,
    at: &JsonPointer,
) -> Result<Vec<String>, JoinError> {
    match object.get(key) {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::String(single)) => Ok(vec![single.clone()]),
        Some(Value::Array(items)) => items
            .iter()
            .enumerate()
            .map(|(i, item)| {
                item.as_str().map(str::to_string).ok_or_else(|| {
                    JoinError::malformed(&at.key(key).index(i), format!("`{key}` entries must be strings"))
                })
            })
            .collect(),
        Some(_) => Err(JoinError::malformed(
            &at.key(key),
            format!("`{key}` must be a string or an array of strings"),
        )),
    }
}

fn non_empty_string(
    object: &Map<String, Value>,
    key: &'static str,
    at: &JsonPointer,
) -> Result<Option<String>, JoinError> {
    match object.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) if s.is_empty() => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(_) => Err(JoinError::malformed(&at.key(key), format!("`{key}` must be a string"))),
    }
}

fn terms_limit(object: &Map<String, Value>, at: &JsonPointer) -> Result<TermsLimit, JoinError> {
    match object.get("maxTermsPerShard") {
        None | Some(Value::Null) => Ok(TermsLimit::Unset),
        Some(Value::Number(n)) => {
            if let Some(raw) = n.as_i64() {
                Ok(TermsLimit::from_raw(raw))
            } else if let Some(raw) = n.as_u64() {
                Ok(TermsLimit::Capped(raw))
            } else {
                Err(JoinError::malformed(
                    &at.key("maxTermsPerShard"),
                    "`maxTermsPerShard` must be an integer",
                ))
            }
        }
        Some(_) => Err(JoinError::malformed(
            &at.key("maxTermsPerShard"),
            "`maxTermsPerShard` must be an integer",
        )),
    }
}
