//! Finding join specifications in a query document and splicing compiled
//! clauses back in their place.
//!
//! A specification is an object whose only key is a join label:
//!
//! ```json
//! { "query": { "bool": { "filter": [ { "join_set": { ... } }, { "term": { ... } } ] } } }
//! ```
//!
//! The enclosing object is replaced by the compiled clause array. Inside an
//! array the clauses are spliced in place of the object, so the example above
//! becomes `"filter": [ {"filterjoin": ...}, {"term": ...} ]`; as an object
//! member (or the whole document) the object simply becomes the array.

use filterjoin_dsl::{JoinError, JoinLabel, JsonPointer, Segment};
use serde_json::Value;

/// One join specification found in a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Located {
    pub label: JoinLabel,
    /// The object holding the label.
    pub at: JsonPointer,
}

impl Located {
    /// Pointer to the specification itself (the value under the label).
    pub fn spec_pointer(&self) -> JsonPointer {
        self.at.key(self.label.as_str())
    }
}

/// Every occurrence of `labels` in `document`, in pre-order.
///
/// Specifications nested inside another specification are reported too,
/// after their host.
pub fn locate(document: &Value, labels: &[JoinLabel]) -> Result<Vec<Located>, JoinError> {
    let mut found = Vec::new();
    visit(document, &JsonPointer::root(), labels, &mut found)?;
    Ok(found)
}

fn visit(
    value: &Value,
    at: &JsonPointer,
    labels: &[JoinLabel],
    found: &mut Vec<Located>,
) -> Result<(), JoinError> {
    match value {
        Value::Object(object) => {
            for label in labels {
                if !object.contains_key(label.as_str()) {
                    continue;
                }
                if object.len() != 1 {
                    return Err(JoinError::SpliceConflict {
                        label: label.to_string(),
                        at: at.clone(),
                    });
                }
                found.push(Located {
                    label: *label,
                    at: at.clone(),
                });
            }
            for (key, child) in object {
                visit(child, &at.key(key.as_str()), labels, found)?;
            }
        }
        Value::Array(items) => {
            for (i, child) in items.iter().enumerate() {
                visit(child, &at.index(i), labels, found)?;
            }
        }
        _ => {}
    }
    Ok(())
}

/// Replaces the specification at `located` with `clauses`.
pub fn splice(document: &mut Value, located: &Located, clauses: Vec<Value>) -> Result<(), JoinError> {
    let conflict = || JoinError::SpliceConflict {
        label: located.label.to_string(),
        at: located.at.clone(),
    };

    match located.at.resolve(document) {
        Some(Value::Object(object))
            if object.len() == 1 && object.contains_key(located.label.as_str()) => {}
        Some(_) => return Err(conflict()),
        None => {
            return Err(JoinError::MalformedShape {
                at: located.at.clone(),
                reason: format!("no `{}` object at this location", located.label),
            })
        }
    }

    match located.at.split_last() {
        None => *document = Value::Array(clauses),
        Some((parent, Segment::Index(index))) => match parent.resolve_mut(document) {
            Some(Value::Array(items)) => {
                let index = *index;
                items.splice(index..=index, clauses);
            }
            _ => return Err(conflict()),
        },
        Some((parent, Segment::Key(key))) => match parent.resolve_mut(document) {
            Some(Value::Object(object)) => {
                object.insert(key.clone(), Value::Array(clauses));
            }
            _ => return Err(conflict()),
        },
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_locate_in_preorder() {
        let doc = json!({
            "query": {"bool": {"must": [
                {"join_sequence": []},
                {"nested": {"join_set": {"focus": "i1"}}}
            ]}}
        });
        let found = locate(&doc, &JoinLabel::ALL).unwrap();
        assert_eq!(
            found,
            vec![
                Located {
                    label: JoinLabel::JoinSequence,
                    at: JsonPointer::root().key("query").key("bool").key("must").index(0),
                },
                Located {
                    label: JoinLabel::JoinSet,
                    at: JsonPointer::root()
                        .key("query")
                        .key("bool")
                        .key("must")
                        .index(1)
                        .key("nested"),
                },
            ]
        );
        assert_eq!(found[1].spec_pointer().to_string(), "/query/bool/must/1/nested/join_set");
    }

    #[test]
    fn test_locate_rejects_siblings() {
        let doc = json!({"filter": {"join_set": {}, "boost": 2}});
        let err = locate(&doc, &[JoinLabel::JoinSet]).unwrap_err();
        assert_eq!(
            err,
            JoinError::SpliceConflict {
                label: "join_set".to_string(),
                at: JsonPointer::root().key("filter"),
            }
        );
    }

    #[test]
    fn test_splice_into_array_flattens() {
        let mut doc = json!({"must": [{"term": 1}, {"join_set": {}}, {"term": 2}]});
        let located = Located {
            label: JoinLabel::JoinSet,
            at: JsonPointer::root().key("must").index(1),
        };
        splice(&mut doc, &located, vec![json!({"a": 1}), json!({"b": 2})]).unwrap();
        assert_eq!(doc, json!({"must": [{"term": 1}, {"a": 1}, {"b": 2}, {"term": 2}]}));
    }

    #[test]
    fn test_splice_member_and_root() {
        let mut doc = json!({"filter": {"join_sequence": []}});
        let located = Located {
            label: JoinLabel::JoinSequence,
            at: JsonPointer::root().key("filter"),
        };
        splice(&mut doc, &located, vec![json!({"a": 1})]).unwrap();
        assert_eq!(doc, json!({"filter": [{"a": 1}]}));

        let mut doc = json!({"join_set": {}});
        let located = Located {
            label: JoinLabel::JoinSet,
            at: JsonPointer::root(),
        };
        splice(&mut doc, &located, vec![]).unwrap();
        assert_eq!(doc, json!([]));
    }

    #[test]
    fn test_splice_checks_target() {
        let mut doc = json!({"filter": {"join_set": {}, "x": 1}});
        let located = Located {
            label: JoinLabel::JoinSet,
            at: JsonPointer::root().key("filter"),
        };
        assert!(matches!(
            splice(&mut doc, &located, vec![]),
            Err(JoinError::SpliceConflict { .. })
        ));

        let located = Located {
            label: JoinLabel::JoinSet,
            at: JsonPointer::root().key("missing"),
        };
        assert!(matches!(
            splice(&mut doc, &located, vec![]),
            Err(JoinError::MalformedShape { .. })
        ));
    }
}
