//! Chain-shaped join specifications (`join_sequence`).
//!
//! A sequence is an ordered list of steps. Each relation step joins
//! `relation[1]` (the side being filtered) against `relation[0]` (the index
//! whose values are collected). The last step sits directly on the document
//! being searched; every earlier step filters the index targeted by the step
//! after it. The first step may instead be a group of alternative branches,
//! all hanging off the step that follows it.
//!
//! ```json
//! { "join_sequence": [
//!     { "group": [ [ {"relation": [...]} ], [ {"relation": [...]} ] ] },
//!     { "relation": [ {"indices": ["companies"], "path": "id"}, {"indices": ["articles"], "path": "company"} ],
//!       "negate": true }
//! ] }
//! ```

use crate::endpoint::RelationEndpoint;
use crate::error::JoinError;
use crate::join_set::{parse_negate, parse_pair};
use crate::pointer::JsonPointer;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationStep {
    /// `[joined, filtered]`, exactly as written in the request.
    pub relation: [RelationEndpoint; 2],
    #[serde(default)]
    pub negate: bool,
    #[serde(default)]
    pub origin: JsonPointer,
}

impl RelationStep {
    pub fn new(joined: RelationEndpoint, filtered: RelationEndpoint) -> Self {
        Self {
            relation: [joined, filtered],
            negate: false,
            origin: JsonPointer::root(),
        }
    }

    pub fn negated(mut self) -> Self {
        self.negate = true;
        self
    }

    /// `relation[0]`: the index whose join values are collected.
    pub fn joined(&self) -> &RelationEndpoint {
        &self.relation[0]
    }

    /// `relation[1]`: the side whose documents get filtered.
    pub fn filtered(&self) -> &RelationEndpoint {
        &self.relation[1]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupStep {
    pub branches: Vec<JoinSequenceSpec>,
    #[serde(default)]
    pub origin: JsonPointer,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JoinSequenceStep {
    Relation(RelationStep),
    Group(GroupStep),
}

impl JoinSequenceStep {
    fn origin(&self) -> &JsonPointer {
        match self {
            JoinSequenceStep::Relation(step) => &step.origin,
            JoinSequenceStep::Group(group) => &group.origin,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JoinSequenceSpec {
    pub steps: Vec<JoinSequenceStep>,
    #[serde(default)]
    pub origin: JsonPointer,
}

impl JoinSequenceSpec {
    pub fn new(steps: Vec<JoinSequenceStep>) -> Self {
        Self {
            steps,
            origin: JsonPointer::root(),
        }
    }

    /// Parses the value found under a `join_sequence` key and verifies it.
    pub fn from_value(value: &Value, at: &JsonPointer) -> Result<Self, JoinError> {
        let spec = Self::parse_shape(value, at)?;
        spec.verify()?;
        Ok(spec)
    }

    /// Shape-only parse: arrays, pairs, endpoint fields. Positional rules are
    /// left to [`JoinSequenceSpec::verify`].
    fn parse_shape(value: &Value, at: &JsonPointer) -> Result<Self, JoinError> {
        let items = value
            .as_array()
            .ok_or_else(|| JoinError::malformed(at, "`join_sequence` must be an array"))?;

        let steps = items
            .iter()
            .enumerate()
            .map(|(i, item)| parse_step(item, &at.index(i)))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            steps,
            origin: at.clone(),
        })
    }

    /// Checks the positional invariants, recursing into group branches.
    ///
    /// Verifying an already-verified sequence always succeeds.
    pub fn verify(&self) -> Result<(), JoinError> {
        let Some(last) = self.steps.last() else {
            return Err(JoinError::malformed(
                &self.origin,
                "a join sequence must contain at least one step",
            ));
        };

        for (i, step) in self.steps.iter().enumerate() {
            let JoinSequenceStep::Group(group) = step else {
                continue;
            };
            if i != 0 {
                return Err(JoinError::malformed(
                    &group.origin,
                    "a group may only appear as the first step of a sequence",
                ));
            }
            if self.steps.len() < 2 {
                return Err(JoinError::malformed(
                    &group.origin,
                    "a group must be followed by the relation it attaches to",
                ));
            }
            if group.branches.is_empty() {
                return Err(JoinError::malformed(
                    &group.origin,
                    "a group must contain at least one branch",
                ));
            }
            for branch in &group.branches {
                branch.verify()?;
            }
        }

        match last {
            JoinSequenceStep::Relation(step) if !step.filtered().queries.is_empty() => {
                Err(JoinError::DuplicateRootQueries {
                    at: step.origin.key("relation").index(1),
                })
            }
            JoinSequenceStep::Relation(_) => Ok(()),
            // A lone group is already rejected above.
            JoinSequenceStep::Group(_) => Err(JoinError::malformed(
                last.origin(),
                "a join sequence must end with a relation",
            )),
        }
    }
}

fn parse_step(value: &Value, at: &JsonPointer) -> Result<JoinSequenceStep, JoinError> {
    let object = value
        .as_object()
        .ok_or_else(|| JoinError::malformed(at, "a sequence step must be an object"))?;

    if let Some(group) = object.get("group") {
        let group_at = at.key("group");
        let branches = group
            .as_array()
            .ok_or_else(|| JoinError::malformed(&group_at, "`group` must be an array of sequences"))?
            .iter()
            .enumerate()
            .map(|(i, branch)| JoinSequenceSpec::parse_shape(branch, &group_at.index(i)))
            .collect::<Result<Vec<_>, _>>()?;
        return Ok(JoinSequenceStep::Group(GroupStep {
            branches,
            origin: at.clone(),
        }));
    }

    let relation = object
        .get("relation")
        .ok_or_else(|| JoinError::missing("relation", at))?;
    Ok(JoinSequenceStep::Relation(RelationStep {
        relation: parse_pair(relation, &at.key("relation"))?,
        negate: parse_negate(object.get("negate"), at)?,
        origin: at.clone(),
    }))
}
