use std::fmt;

use docgraph_types::{Document, DocumentId, Value, ID_KEY};

/// A conjunction of `key == value` predicates.
///
/// Predicates keep insertion order; adding a key twice replaces the
/// earlier expectation. Numbers match across widths (see
/// [`Value::matches`]) and a `Null` expectation also matches a document
/// that lacks the key.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Filter {
    predicates: Vec<(String, Value)>,
}

impl Filter {
    /// An empty filter. Matches every document.
    pub fn new() -> Self {
        Self::default()
    }

    /// A filter selecting one document by identity.
    pub fn by_id(id: DocumentId) -> Self {
        Self::new().eq(ID_KEY, id)
    }

    /// Builder-style [`push`](Self::push).
    pub fn eq(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.push(key, value);
        self
    }

    /// Require `key` to equal `value`.
    pub fn push(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        let key = key.into();
        let value = value.into();
        match self.predicates.iter_mut().find(|(k, _)| *k == key) {
            Some((_, slot)) => *slot = value,
            None => self.predicates.push((key, value)),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.predicates.is_empty()
    }

    pub fn len(&self) -> usize {
        self.predicates.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.predicates.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Whether `document` satisfies every predicate.
    pub fn matches(&self, document: &Document) -> bool {
        self.predicates
            .iter()
            .all(|(key, expected)| match document.get(key) {
                Some(actual) => actual.matches(expected),
                None => expected.is_null(),
            })
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.predicates.is_empty() {
            return write!(f, "{{}}");
        }
        for (i, (k, v)) in self.predicates.iter().enumerate() {
            if i > 0 {
                write!(f, " && ")?;
            }
            write!(f, "{k} == {v}")?;
        }
        Ok(())
    }
}
