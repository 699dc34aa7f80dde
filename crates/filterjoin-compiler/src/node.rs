//! Compiled filterjoin nodes.
//!
//! A node restricts the documents of the index it is attached to, keeping
//! those whose `source_path` value appears in the `path` field of documents
//! matched on the target indices:
//!
//! ```json
//! { "filterjoin": { "<source_path>": {
//!     "indices": ["companies"], "path": "id",
//!     "query": { "bool": {
//!         "must": [ {"match_all": {}} ],
//!         "filter": { "bool": { "must": [], "must_not": [] } } } } } } }
//! ```
//!
//! Nodes own their children outright; nothing ever points back up the tree.
//! Both compilers build a node, fill its target query, then hand it to an
//! [`AttachmentPoint`]: either an enclosing node or the output root.

use crate::config::CompilerConfig;
use filterjoin_dsl::{FilterClause, JoinError, JsonPointer, RelationEndpoint, TermsLimit};
use serde_json::{json, Map, Value};

/// Deepest a compiled join may nest, matching serde_json's recursion limit.
/// Output nested any deeper could not be parsed back.
pub const MAX_JOIN_DEPTH: usize = 128;

/// Error for the relation whose join would exceed [`MAX_JOIN_DEPTH`].
pub(crate) fn too_deep(at: &JsonPointer) -> JoinError {
    JoinError::MalformedShape {
        at: at.clone(),
        reason: format!("joins may not nest more than {MAX_JOIN_DEPTH} levels deep"),
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Clause {
    Filter(Value),
    Join(FilterJoinNode),
}

impl Clause {
    fn to_json(&self) -> Value {
        match self {
            Clause::Filter(value) => value.clone(),
            Clause::Join(node) => node.to_json(),
        }
    }
}

/// What runs against the target indices of a join.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TargetQuery {
    /// Scored clauses, next to `match_all` in `query.bool.must`.
    scored: Vec<Value>,
    must: Vec<Clause>,
    /// Created on first negated attachment.
    must_not: Option<Vec<Clause>>,
}

impl TargetQuery {
    pub fn is_empty(&self) -> bool {
        self.scored.is_empty() && self.must.is_empty() && self.must_not.is_none()
    }

    fn branch(&mut self, negate: bool) -> &mut Vec<Clause> {
        if negate {
            self.must_not.get_or_insert_with(Vec::new)
        } else {
            &mut self.must
        }
    }

    fn to_json(&self) -> Value {
        let mut must = Vec::with_capacity(self.scored.len() + 1);
        must.push(json!({ "match_all": {} }));
        must.extend(self.scored.iter().cloned());

        let mut filter = Map::new();
        filter.insert(
            "must".to_string(),
            Value::Array(self.must.iter().map(Clause::to_json).collect()),
        );
        if let Some(must_not) = &self.must_not {
            filter.insert(
                "must_not".to_string(),
                Value::Array(must_not.iter().map(Clause::to_json).collect()),
            );
        }

        json!({
            "bool": {
                "must": must,
                "filter": { "bool": Value::Object(filter) }
            }
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
enum JoinTarget {
    Resolved {
        indices: Vec<String>,
        types: Vec<String>,
        path: String,
        order_by: Option<String>,
        max_terms_per_shard: TermsLimit,
        terms_encoding: Option<String>,
        query: TargetQuery,
    },
    /// The relation named no index; joins against the sentinel and matches nothing.
    Unresolved { sentinel_index: String, path: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct FilterJoinNode {
    source_path: String,
    target: JoinTarget,
}

impl FilterJoinNode {
    pub fn new(source_path: &str, target: &RelationEndpoint, config: &CompilerConfig) -> Self {
        let target = if target.indices.is_empty() {
            tracing::debug!(
                source_path,
                path = %target.path,
                sentinel = %config.sentinel_index,
                "relation has no target index; joining against the sentinel"
            );
            JoinTarget::Unresolved {
                sentinel_index: config.sentinel_index.clone(),
                path: target.path.clone(),
            }
        } else {
            JoinTarget::Resolved {
                indices: target.indices.clone(),
                types: target.types.clone(),
                path: target.path.clone(),
                order_by: target.order_by.clone(),
                max_terms_per_shard: target.max_terms_per_shard,
                terms_encoding: target.terms_encoding.clone(),
                query: TargetQuery::default(),
            }
        };
        tracing::trace!(source_path, "built filterjoin node");
        Self {
            source_path: source_path.to_string(),
            target,
        }
    }

    pub fn source_path(&self) -> &str {
        &self.source_path
    }

    /// True when the target had no index and the node can never match.
    pub fn is_unresolved(&self) -> bool {
        matches!(self.target, JoinTarget::Unresolved { .. })
    }

    pub fn target_query(&self) -> Option<&TargetQuery> {
        match &self.target {
            JoinTarget::Resolved { query, .. } => Some(query),
            JoinTarget::Unresolved { .. } => None,
        }
    }

    fn target_query_mut(&mut self) -> Option<&mut TargetQuery> {
        match &mut self.target {
            JoinTarget::Resolved { query, .. } => Some(query),
            JoinTarget::Unresolved { .. } => None,
        }
    }

    /// Scored clauses go next to `match_all`; plain filters go in
    /// `filter.bool.must`, or `must_not` when negated.
    pub fn attach_filter(&mut self, clause: &FilterClause, negate: bool) {
        let Some(query) = self.target_query_mut() else {
            self.log_dropped("filter");
            return;
        };
        match clause {
            FilterClause::Scored(value) => query.scored.push(value.clone()),
            FilterClause::Filter(value) => query.branch(negate).push(Clause::Filter(value.clone())),
        }
    }

    pub fn attach_filters(&mut self, clauses: &[FilterClause]) {
        for clause in clauses {
            self.attach_filter(clause, false);
        }
    }

    fn log_dropped(&self, what: &str) {
        tracing::debug!(
            source_path = %self.source_path,
            what,
            "dropping attachment on a join that matches nothing"
        );
    }

    pub fn to_json(&self) -> Value {
        let body = match &self.target {
            JoinTarget::Unresolved {
                sentinel_index,
                path,
            } => json!({
                "indices": [sentinel_index],
                "path": path,
                "query": { "bool": { "must_not": [ { "match_all": {} } ] } }
            }),
            JoinTarget::Resolved {
                indices,
                types,
                path,
                order_by,
                max_terms_per_shard,
                terms_encoding,
                query,
            } => {
                let mut body = Map::new();
                body.insert("indices".to_string(), json!(indices));
                if !types.is_empty() {
                    body.insert("types".to_string(), json!(types));
                }
                body.insert("path".to_string(), json!(path));
                if let Some(order_by) = order_by {
                    body.insert("orderBy".to_string(), json!(order_by));
                }
                if let Some(cap) = max_terms_per_shard.cap() {
                    body.insert("maxTermsPerShard".to_string(), json!(cap));
                }
                if let Some(encoding) = terms_encoding {
                    body.insert("termsEncoding".to_string(), json!(encoding));
                }
                body.insert("query".to_string(), query.to_json());
                Value::Object(body)
            }
        };

        let mut join = Map::new();
        join.insert(self.source_path.clone(), body);
        json!({ "filterjoin": Value::Object(join) })
    }
}

/// Somewhere a compiled join can be attached.
pub trait AttachmentPoint {
    fn attach_join(&mut self, node: FilterJoinNode, negate: bool);
}

impl AttachmentPoint for FilterJoinNode {
    fn attach_join(&mut self, node: FilterJoinNode, negate: bool) {
        match self.target_query_mut() {
            Some(query) => query.branch(negate).push(Clause::Join(node)),
            None => self.log_dropped("nested join"),
        }
    }
}

/// The top of a compiled tree: a flat clause array with no enclosing join.
///
/// It accepts joins but has nowhere to put filters, which is why filters on
/// the root of a join set are an error rather than something this type
/// supports.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RootClauses {
    clauses: Vec<(FilterJoinNode, bool)>,
}

impl RootClauses {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.clauses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    /// Renders the array. A negated join is wrapped in `bool.must_not` so the
    /// result stays valid inside a `must` context.
    pub fn into_values(self) -> Vec<Value> {
        self.clauses
            .into_iter()
            .map(|(node, negate)| {
                if negate {
                    json!({ "bool": { "must_not": [node.to_json()] } })
                } else {
                    node.to_json()
                }
            })
            .collect()
    }
}

impl AttachmentPoint for RootClauses {
    fn attach_join(&mut self, node: FilterJoinNode, negate: bool) {
        self.clauses.push((node, negate));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn endpoint(value: Value) -> RelationEndpoint {
        RelationEndpoint::from_value(&value, &JsonPointer::root()).unwrap()
    }

    fn config() -> CompilerConfig {
        CompilerConfig::default()
    }

    #[test]
    fn test_minimal_node() {
        let node = FilterJoinNode::new("company", &endpoint(json!({"indices": ["i2"], "path": "id"})), &config());
        assert_eq!(
            node.to_json(),
            json!({
                "filterjoin": {
                    "company": {
                        "indices": ["i2"],
                        "path": "id",
                        "query": {
                            "bool": {
                                "must": [{"match_all": {}}],
                                "filter": {"bool": {"must": []}}
                            }
                        }
                    }
                }
            })
        );
    }

    #[test]
    fn test_optional_fields() {
        let node = FilterJoinNode::new(
            "a",
            &endpoint(json!({
                "indices": ["i2"],
                "types": "t",
                "path": "b",
                "orderBy": "doc_score",
                "maxTermsPerShard": 0,
                "termsEncoding": "bloom"
            })),
            &config(),
        );
        let body = &node.to_json()["filterjoin"]["a"];
        assert_eq!(body["types"], json!(["t"]));
        assert_eq!(body["orderBy"], json!("doc_score"));
        assert_eq!(body["maxTermsPerShard"], json!(0));
        assert_eq!(body["termsEncoding"], json!("bloom"));

        let node = FilterJoinNode::new(
            "a",
            &endpoint(json!({"indices": ["i2"], "types": [], "path": "b", "maxTermsPerShard": -1})),
            &config(),
        );
        let body = node.to_json()["filterjoin"]["a"].clone();
        let body = body.as_object().unwrap();
        assert!(!body.contains_key("types"));
        assert!(!body.contains_key("maxTermsPerShard"));
        assert!(!body.contains_key("orderBy"));
    }

    #[test]
    fn test_filter_routing() {
        let mut node = FilterJoinNode::new("a", &endpoint(json!({"indices": ["i2"], "path": "b"})), &config());
        node.attach_filter(&FilterClause::new(json!({"query": {"match": {"t": "x"}}})), false);
        node.attach_filter(&FilterClause::new(json!({"term": {"lang": "en"}})), false);
        node.attach_filter(&FilterClause::new(json!({"term": {"lang": "fr"}})), true);

        let query = &node.to_json()["filterjoin"]["a"]["query"]["bool"];
        assert_eq!(
            query["must"],
            json!([{"match_all": {}}, {"query": {"match": {"t": "x"}}}])
        );
        assert_eq!(query["filter"]["bool"]["must"], json!([{"term": {"lang": "en"}}]));
        assert_eq!(query["filter"]["bool"]["must_not"], json!([{"term": {"lang": "fr"}}]));
    }

    #[test]
    fn test_nested_join_negation() {
        let mut parent = FilterJoinNode::new("a", &endpoint(json!({"indices": ["i2"], "path": "b"})), &config());
        let child = FilterJoinNode::new("c", &endpoint(json!({"indices": ["i3"], "path": "d"})), &config());
        parent.attach_join(child.clone(), true);

        let filter = &parent.to_json()["filterjoin"]["a"]["query"]["bool"]["filter"]["bool"];
        assert_eq!(filter["must"], json!([]));
        assert_eq!(filter["must_not"], json!([child.to_json()]));
    }

    #[test]
    fn test_unresolved_target() {
        let mut node = FilterJoinNode::new("a", &endpoint(json!({"indices": [], "path": "b", "types": ["t"]})), &config());
        node.attach_filter(&FilterClause::new(json!({"term": {"x": 1}})), false);
        assert!(node.is_unresolved());
        assert_eq!(
            node.to_json(),
            json!({
                "filterjoin": {
                    "a": {
                        "indices": [".filterjoin"],
                        "path": "b",
                        "query": {"bool": {"must_not": [{"match_all": {}}]}}
                    }
                }
            })
        );
    }

    #[test]
    fn test_root_wraps_negated_joins() {
        let node = FilterJoinNode::new("a", &endpoint(json!({"indices": ["i2"], "path": "b"})), &config());
        let mut root = RootClauses::new();
        root.attach_join(node.clone(), false);
        root.attach_join(node.clone(), true);
        assert_eq!(root.len(), 2);
        assert_eq!(
            root.into_values(),
            vec![node.to_json(), json!({"bool": {"must_not": [node.to_json()]}})]
        );
    }
}
