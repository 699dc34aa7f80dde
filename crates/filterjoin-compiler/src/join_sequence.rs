//! Join-sequence compilation: explicit relation chain → nested filterjoin tree.
//!
//! For a chain `[s0, s1, ..., sn]` the last step `sn` is applied to the
//! document being searched, so its join is the outermost clause of the output;
//! `sn-1` filters the index `sn` joins against and nests inside it, and so on
//! back to the head `s0`, which ends up innermost. A head group contributes
//! one innermost join per branch, all siblings under the join of `s1`.
//!
//! The tree is assembled from the head outward so that every node already
//! owns its finished children when it is attached to its parent. A chain
//! that would nest deeper than [`MAX_JOIN_DEPTH`] is rejected at the first
//! step past the limit.

use crate::config::CompilerConfig;
use crate::node::{too_deep, AttachmentPoint, FilterJoinNode, RootClauses, MAX_JOIN_DEPTH};
use filterjoin_dsl::{JoinError, JoinSequenceSpec, JoinSequenceStep, RelationStep};
use serde_json::Value;

pub fn compile(spec: &JoinSequenceSpec, config: &CompilerConfig) -> Result<Vec<Value>, JoinError> {
    spec.verify()?;

    let mut root = RootClauses::new();
    let (outermost, depth) = compile_chain(spec, config)?;
    for (node, negate) in outermost {
        root.attach_join(node, negate);
    }

    tracing::debug!(
        at = %spec.origin,
        steps = spec.steps.len(),
        depth,
        joins = root.len(),
        "compiled join sequence"
    );
    Ok(root.into_values())
}

/// Compiles `spec` and returns its outermost joins with their negation flags,
/// ready to be attached wherever the chain hangs, along with how deep the
/// compiled joins nest.
fn compile_chain(
    spec: &JoinSequenceSpec,
    config: &CompilerConfig,
) -> Result<(Vec<(FilterJoinNode, bool)>, usize), JoinError> {
    let Some((head, rest)) = spec.steps.split_first() else {
        return Ok((Vec::new(), 0));
    };

    let (mut inner, mut depth) = match head {
        JoinSequenceStep::Group(group) => {
            let mut branches = Vec::new();
            let mut deepest = 0;
            for branch in &group.branches {
                let (nodes, depth) = compile_chain(branch, config)?;
                branches.extend(nodes);
                deepest = deepest.max(depth);
            }
            (branches, deepest)
        }
        JoinSequenceStep::Relation(step) => {
            if !rest.is_empty() {
                warn_ignored_queries(step);
            }
            (vec![(step_node(step, config), step.negate)], 1)
        }
    };

    for (i, step) in rest.iter().enumerate() {
        let step = match step {
            JoinSequenceStep::Relation(step) => step,
            // Already rejected by `verify`.
            JoinSequenceStep::Group(group) => {
                return Err(JoinError::MalformedShape {
                    at: group.origin.clone(),
                    reason: "a group may only appear as the first step of a sequence".to_string(),
                })
            }
        };
        depth += 1;
        if depth > MAX_JOIN_DEPTH {
            return Err(too_deep(&step.origin));
        }
        if i + 1 < rest.len() {
            warn_ignored_queries(step);
        }

        let mut node = step_node(step, config);
        for (child, negate) in inner {
            node.attach_join(child, negate);
        }
        inner = vec![(node, step.negate)];
    }

    Ok((inner, depth))
}

/// Joins the filtered side of `step` against its joined side, carrying the
/// joined side's filters.
fn step_node(step: &RelationStep, config: &CompilerConfig) -> FilterJoinNode {
    let joined = step.joined();
    let mut node = FilterJoinNode::new(&step.filtered().path, joined, config);
    node.attach_filters(&joined.queries);
    node
}

/// The filtered side of an inner step is the index the next step joins
/// against, whose filters that step already carries.
fn warn_ignored_queries(step: &RelationStep) {
    if !step.filtered().queries.is_empty() {
        tracing::warn!(
            at = %step.origin,
            "ignoring `queries` on the filtered side of an inner join step"
        );
    }
}
