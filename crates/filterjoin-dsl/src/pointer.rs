//! JSON pointers (RFC 6901) into a query document.
//!
//! Every validation error carries the pointer of the object it is about, so
//! the enclosing request pipeline can tell the client exactly which part of
//! its document was rejected. The document root renders as `/`.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Segment {
    Key(String),
    Index(usize),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct JsonPointer {
    segments: Vec<Segment>,
}

impl JsonPointer {
    pub fn root() -> Self {
        Self::default()
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn depth(&self) -> usize {
        self.segments.len()
    }

    /// Pointer to the member `key` of the object at `self`.
    pub fn key(&self, key: impl Into<String>) -> Self {
        let mut next = self.clone();
        next.segments.push(Segment::Key(key.into()));
        next
    }

    /// Pointer to element `index` of the array at `self`.
    pub fn index(&self, index: usize) -> Self {
        let mut next = self.clone();
        next.segments.push(Segment::Index(index));
        next
    }

    /// Splits off the last segment; `None` for the root.
    pub fn split_last(&self) -> Option<(JsonPointer, &Segment)> {
        let (last, rest) = self.segments.split_last()?;
        Some((
            JsonPointer {
                segments: rest.to_vec(),
            },
            last,
        ))
    }

    pub fn resolve<'a>(&self, document: &'a Value) -> Option<&'a Value> {
        self.segments
            .iter()
            .try_fold(document, |value, segment| match (segment, value) {
                (Segment::Key(key), Value::Object(map)) => map.get(key),
                (Segment::Index(index), Value::Array(items)) => items.get(*index),
                _ => None,
            })
    }

    pub fn resolve_mut<'a>(&self, document: &'a mut Value) -> Option<&'a mut Value> {
        let mut value = document;
        for segment in &self.segments {
            value = match (segment, value) {
                (Segment::Key(key), Value::Object(map)) => map.get_mut(key)?,
                (Segment::Index(index), Value::Array(items)) => items.get_mut(*index)?,
                _ => return None,
            };
        }
        Some(value)
    }
}

impl fmt::Display for JsonPointer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.segments.is_empty() {
            return f.write_str("/");
        }
        for segment in &self.segments {
            match segment {
                Segment::Key(key) => write!(f, "/{}", key.replace('~', "~0").replace('/', "~1"))?,
                Segment::Index(index) => write!(f, "/{index}")?,
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_display_escapes_keys() {
        let pointer = JsonPointer::root().key("query").key("a/b~c").index(3);
        assert_eq!(pointer.to_string(), "/query/a~1b~0c/3");
        assert_eq!(JsonPointer::root().to_string(), "/");
    }

    #[test]
    fn test_resolve_and_split() {
        let doc = json!({"query": {"bool": {"must": [{"term": 1}, {"join_set": {}}]}}});
        let pointer = JsonPointer::root()
            .key("query")
            .key("bool")
            .key("must")
            .index(1);
        assert_eq!(pointer.resolve(&doc), Some(&json!({"join_set": {}})));

        let (parent, last) = pointer.split_last().unwrap();
        assert_eq!(last, &Segment::Index(1));
        assert!(parent.resolve(&doc).unwrap().is_array());
        assert!(JsonPointer::root().split_last().is_none());
    }

    #[test]
    fn test_resolve_mut_type_mismatch() {
        let mut doc = json!({"a": [1, 2]});
        assert!(JsonPointer::root().key("a").key("b").resolve_mut(&mut doc).is_none());
        *JsonPointer::root().key("a").index(0).resolve_mut(&mut doc).unwrap() = json!(9);
        assert_eq!(doc, json!({"a": [9, 2]}));
    }
}
