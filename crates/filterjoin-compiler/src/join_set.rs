//! Join-set compilation: relation graph → nested filterjoin tree.
//!
//! The graph is walked depth-first from the focus index over a simple graph,
//! with a visited set of index names:
//!
//! - entering an index attaches its `queries` to the join that reached it,
//!   then expands every relation touching it, in declaration order;
//! - an edge whose far side is already visited is dropped, so cycles are cut
//!   at the first revisit and relations that are not reachable from the focus
//!   never appear in the output. This is silent: a join set may carry several
//!   disjoint subgraphs and only the one around the focus is compiled;
//! - parallel edges (several relations between the same two indices) each
//!   become their own sibling join. Only the first one walks on; the others
//!   carry the shared far index's own filters and nothing nested, so the
//!   output grows linearly with the relations;
//! - no join nests deeper than [`MAX_JOIN_DEPTH`].
//!
//! The focus itself has no enclosing join, so filters declared for it are
//! rejected.

use crate::config::CompilerConfig;
use crate::node::{too_deep, AttachmentPoint, FilterJoinNode, RootClauses, MAX_JOIN_DEPTH};
use filterjoin_dsl::{JoinError, JoinSetSpec};
use serde_json::Value;
use std::collections::BTreeSet;

pub fn compile(spec: &JoinSetSpec, config: &CompilerConfig) -> Result<Vec<Value>, JoinError> {
    spec.validate()?;

    if spec.queries.contains_key(&spec.focus) {
        return Err(JoinError::IllegalRootFilters {
            index: spec.focus.clone(),
        });
    }

    let mut walk = Walk {
        spec,
        config,
        visited: BTreeSet::new(),
    };
    walk.visited.insert(spec.focus.as_str());

    let mut root = RootClauses::new();
    walk.expand(&spec.focus, &mut root, 1)?;

    tracing::debug!(
        focus = %spec.focus,
        relations = spec.relations.len(),
        visited = walk.visited.len(),
        joins = root.len(),
        "compiled join set"
    );
    Ok(root.into_values())
}

struct Walk<'a> {
    spec: &'a JoinSetSpec,
    config: &'a CompilerConfig,
    visited: BTreeSet<&'a str>,
}

impl<'a> Walk<'a> {
    /// Walks into `index` through `node`, whose children sit at `depth`.
    fn enter(&mut self, index: &'a str, node: &mut FilterJoinNode, depth: usize) -> Result<(), JoinError> {
        if !self.visited.insert(index) {
            return Ok(());
        }
        let spec = self.spec;
        node.attach_filters(spec.queries_for(index));
        self.expand(index, node, depth)
    }

    /// Attaches a join for every relation leaving `index`; the joins sit at
    /// `depth`, counting the root level as 1.
    fn expand<A: AttachmentPoint>(&mut self, index: &'a str, at: &mut A, depth: usize) -> Result<(), JoinError> {
        let spec = self.spec;
        // Neighbours this index walked into.
        let mut walked: BTreeSet<&'a str> = BTreeSet::new();

        for edge in &spec.relations {
            let Some((near, far)) = edge.oriented_from(index) else {
                continue;
            };
            let other = far.index();
            if let Some(other) = other {
                if !walked.contains(other) && self.visited.contains(other) {
                    tracing::trace!(
                        from = index,
                        to = other,
                        at = %edge.origin,
                        "skipping relation to an index already joined"
                    );
                    continue;
                }
            }
            if depth > MAX_JOIN_DEPTH {
                return Err(too_deep(&edge.origin));
            }

            let mut node = FilterJoinNode::new(&near.path, far, self.config);
            match other {
                Some(other) if walked.contains(other) => {
                    node.attach_filters(spec.queries_for(other));
                }
                Some(other) => {
                    walked.insert(other);
                    self.enter(other, &mut node, depth + 1)?;
                }
                None => {}
            }

            at.attach_join(node, edge.negate);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use filterjoin_dsl::{FilterClause, JsonPointer, RelationEdge, RelationEndpoint};
    use serde_json::json;

    fn edge(a: (&str, &str), b: (&str, &str)) -> RelationEdge {
        RelationEdge::new(RelationEndpoint::new(a.0, a.1), RelationEndpoint::new(b.0, b.1))
    }

    fn compile_default(spec: &JoinSetSpec) -> Result<Vec<Value>, JoinError> {
        compile(spec, &CompilerConfig::default())
    }

    fn inner_must(node: &Value, source_path: &str) -> Value {
        node["filterjoin"][source_path]["query"]["bool"]["filter"]["bool"]["must"].clone()
    }

    #[test]
    fn test_single_relation() {
        let spec = JoinSetSpec::new("i1", vec![edge(("i1", "company"), ("i2", "id"))])
            .with_queries("i2", vec![FilterClause::new(json!({"term": {"country": "fr"}}))]);
        let out = compile_default(&spec).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0]["filterjoin"]["company"]["indices"], json!(["i2"]));
        assert_eq!(out[0]["filterjoin"]["company"]["path"], json!("id"));
        assert_eq!(inner_must(&out[0], "company"), json!([{"term": {"country": "fr"}}]));
    }

    #[test]
    fn test_edge_direction_follows_focus() {
        // Declared far-side first; the walk still starts from the focus side.
        let spec = JoinSetSpec::new("i1", vec![edge(("i2", "id"), ("i1", "company"))]);
        let out = compile_default(&spec).unwrap();
        assert_eq!(out[0]["filterjoin"]["company"]["indices"], json!(["i2"]));
    }

    #[test]
    fn test_chain_nests() {
        let spec = JoinSetSpec::new(
            "i1",
            vec![edge(("i2", "b"), ("i3", "c")), edge(("i1", "a"), ("i2", "a2"))],
        );
        let out = compile_default(&spec).unwrap();
        assert_eq!(out.len(), 1);
        let nested = inner_must(&out[0], "a");
        assert_eq!(nested[0]["filterjoin"]["b"]["indices"], json!(["i3"]));
    }

    #[test]
    fn test_disconnected_component_dropped() {
        let spec = JoinSetSpec::new(
            "i1",
            vec![edge(("i1", "a"), ("i2", "b")), edge(("i3", "c"), ("i4", "d"))],
        );
        let out = compile_default(&spec).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(inner_must(&out[0], "a"), json!([]));
    }

    #[test]
    fn test_cycle_is_cut() {
        let spec = JoinSetSpec::new(
            "i1",
            vec![
                edge(("i1", "a"), ("i2", "a")),
                edge(("i2", "b"), ("i3", "b")),
                edge(("i3", "c"), ("i1", "c")),
            ],
        );
        let out = compile_default(&spec).unwrap();
        assert_eq!(out.len(), 1);
        let level2 = inner_must(&out[0], "a");
        assert_eq!(level2.as_array().unwrap().len(), 1);
        assert_eq!(inner_must(&level2[0], "b"), json!([]));
    }

    #[test]
    fn test_parallel_edges_fan_out() {
        let spec = JoinSetSpec::new(
            "i1",
            vec![edge(("i1", "a"), ("i2", "a")), edge(("i1", "b"), ("i2", "b"))],
        )
        .with_queries("i2", vec![FilterClause::new(json!({"term": {"x": 1}}))]);
        let out = compile_default(&spec).unwrap();
        assert_eq!(out.len(), 2);
        assert_eq!(inner_must(&out[0], "a"), json!([{"term": {"x": 1}}]));
        assert_eq!(inner_must(&out[1], "b"), json!([{"term": {"x": 1}}]));
    }

    #[test]
    fn test_parallel_sibling_skips_subtree() {
        let spec = JoinSetSpec::new(
            "i1",
            vec![
                edge(("i1", "a"), ("i2", "id")),
                edge(("i1", "b"), ("i2", "id")),
                edge(("i2", "c"), ("i3", "id")),
            ],
        )
        .with_queries("i2", vec![FilterClause::new(json!({"term": {"x": 1}}))]);
        let out = compile_default(&spec).unwrap();
        assert_eq!(out.len(), 2);

        let first = inner_must(&out[0], "a");
        assert_eq!(first[0], json!({"term": {"x": 1}}));
        assert_eq!(first[1]["filterjoin"]["c"]["indices"], json!(["i3"]));
        assert_eq!(inner_must(&out[1], "b"), json!([{"term": {"x": 1}}]));
    }

    #[test]
    fn test_depth_limit() {
        let chain = |len: usize| {
            let edges = (0..len)
                .map(|i| edge((format!("i{i}").as_str(), "fk"), (format!("i{}", i + 1).as_str(), "id")))
                .collect();
            JoinSetSpec::new("i0", edges)
        };
        assert!(compile_default(&chain(MAX_JOIN_DEPTH)).is_ok());
        assert!(matches!(
            compile_default(&chain(MAX_JOIN_DEPTH + 1)),
            Err(JoinError::MalformedShape { .. })
        ));
    }

    #[test]
    fn test_root_filters_rejected() {
        let spec = JoinSetSpec::new("i1", vec![edge(("i1", "a"), ("i2", "b"))])
            .with_queries("i1", vec![FilterClause::new(json!({"term": {"x": 1}}))]);
        assert_eq!(
            compile_default(&spec).unwrap_err(),
            JoinError::IllegalRootFilters {
                index: "i1".to_string()
            }
        );
    }

    #[test]
    fn test_loop_rejected() {
        let mut spec = JoinSetSpec::new("i1", vec![edge(("i1", "a"), ("i1", "b"))]);
        spec.relations[0].origin = JsonPointer::root().key("relations").index(0);
        assert!(matches!(compile_default(&spec), Err(JoinError::Loop { .. })));
    }

    #[test]
    fn test_negated_edge_at_root() {
        let spec = JoinSetSpec::new("i1", vec![edge(("i1", "a"), ("i2", "b")).negated()]);
        let out = compile_default(&spec).unwrap();
        assert!(out[0]["bool"]["must_not"][0]["filterjoin"]["a"].is_object());
    }
}
