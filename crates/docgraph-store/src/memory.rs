use std::collections::HashMap;
use std::sync::RwLock;

use docgraph_types::{Document, DocumentId, Value};
use tracing::debug;

use crate::error::{StoreError, StoreResult};
use crate::filter::Filter;
use crate::traits::{DocumentCursor, DocumentStore};

/// In-memory, HashMap-based document store.
///
/// Intended for tests and embedding. Each collection is an insertion
/// ordered `Vec` behind one `RwLock`. Documents are cloned on read/write.
pub struct InMemoryDocumentStore {
    collections: RwLock<HashMap<String, Vec<Document>>>,
}

impl InMemoryDocumentStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self {
            collections: RwLock::new(HashMap::new()),
        }
    }

    /// Number of documents across all collections.
    pub fn len(&self) -> usize {
        self.collections
            .read()
            .expect("lock poisoned")
            .values()
            .map(Vec::len)
            .sum()
    }

    /// Returns `true` if no collection holds a document.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Sorted names of all collections that were ever written.
    pub fn collection_names(&self) -> Vec<String> {
        let map = self.collections.read().expect("lock poisoned");
        let mut names: Vec<String> = map.keys().cloned().collect();
        names.sort();
        names
    }

    /// Drop a whole collection. Returns `true` if it existed.
    pub fn drop_collection(&self, collection: &str) -> bool {
        self.collections
            .write()
            .expect("lock poisoned")
            .remove(collection)
            .is_some()
    }

    /// Remove all collections.
    pub fn clear(&self) {
        self.collections.write().expect("lock poisoned").clear();
    }
}

impl Default for InMemoryDocumentStore {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentStore for InMemoryDocumentStore {
    fn insert_one(&self, collection: &str, mut document: Document) -> StoreResult<DocumentId> {
        let mut map = self.collections.write().expect("lock poisoned");
        let docs = map.entry(collection.to_string()).or_default();
        let id = match document.id() {
            Some(id) => {
                if docs.iter().any(|d| d.id() == Some(id)) {
                    return Err(StoreError::DuplicateId {
                        collection: collection.to_string(),
                        id,
                    });
                }
                id
            }
            None => DocumentId::new(),
        };
        document.set_id(id);
        docs.push(document);
        debug!(collection, id = %id, "document inserted");
        Ok(id)
    }

    fn find_one_and_replace(
        &self,
        collection: &str,
        filter: &Filter,
        mut document: Document,
    ) -> StoreResult<Option<Document>> {
        let mut map = self.collections.write().expect("lock poisoned");
        let Some(docs) = map.get_mut(collection) else {
            return Ok(None);
        };
        let Some(slot) = docs.iter_mut().find(|d| filter.matches(d)) else {
            return Ok(None);
        };
        let id = slot.id().ok_or_else(|| StoreError::MissingId {
            collection: collection.to_string(),
        })?;
        document.set_id(id);
        let previous = std::mem::replace(slot, document);
        debug!(collection, id = %id, "document replaced");
        Ok(Some(previous))
    }

    fn find_one(&self, collection: &str, filter: &Filter) -> StoreResult<Option<Document>> {
        let map = self.collections.read().expect("lock poisoned");
        Ok(map
            .get(collection)
            .and_then(|docs| docs.iter().find(|d| filter.matches(d)))
            .cloned())
    }

    fn find_all(&self, collection: &str) -> StoreResult<DocumentCursor> {
        let map = self.collections.read().expect("lock poisoned");
        let docs = map.get(collection).cloned().unwrap_or_default();
        Ok(Box::new(docs.into_iter()))
    }

    fn update_field(
        &self,
        collection: &str,
        id: &DocumentId,
        key: &str,
        value: Value,
    ) -> StoreResult<bool> {
        let mut map = self.collections.write().expect("lock poisoned");
        let target = map
            .get_mut(collection)
            .and_then(|docs| docs.iter_mut().find(|d| d.id() == Some(*id)));
        match target {
            Some(doc) => {
                doc.insert(key, value);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn count(&self, collection: &str) -> StoreResult<u64> {
        let map = self.collections.read().expect("lock poisoned");
        Ok(map.get(collection).map_or(0, |docs| docs.len() as u64))
    }

    fn delete_one(&self, collection: &str, id: &DocumentId) -> StoreResult<bool> {
        let mut map = self.collections.write().expect("lock poisoned");
        let Some(docs) = map.get_mut(collection) else {
            return Ok(false);
        };
        let before = docs.len();
        docs.retain(|d| d.id() != Some(*id));
        Ok(docs.len() != before)
    }
}

impl std::fmt::Debug for InMemoryDocumentStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let count = self.len();
        f.debug_struct("InMemoryDocumentStore")
            .field("document_count", &count)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn person(name: &str, age: i32) -> Document {
        Document::new().with("name", name).with("age", age)
    }

    // -----------------------------------------------------------------------
    // Insert / find
    // -----------------------------------------------------------------------

    #[test]
    fn insert_assigns_identity() {
        let store = InMemoryDocumentStore::new();
        let id = store.insert_one("people", person("ada", 36)).unwrap();

        let read_back = store.find_by_id("people", &id).unwrap().expect("should exist");
        assert_eq!(read_back.id(), Some(id));
        assert_eq!(read_back.get_str("name"), Some("ada"));
        assert_eq!(read_back.keys().next(), Some("_id"));
    }

    #[test]
    fn insert_keeps_supplied_identity() {
        let store = InMemoryDocumentStore::new();
        let id = DocumentId::new();
        let mut doc = person("ada", 36);
        doc.set_id(id);
        assert_eq!(store.insert_one("people", doc.clone()).unwrap(), id);
        assert!(matches!(
            store.insert_one("people", doc),
            Err(StoreError::DuplicateId { .. })
        ));
    }

    #[test]
    fn find_one_returns_first_match_in_insertion_order() {
        let store = InMemoryDocumentStore::new();
        let first = store.insert_one("people", person("ada", 36)).unwrap();
        store.insert_one("people", person("ada", 40)).unwrap();

        let found = store
            .find_one("people", &Filter::new().eq("name", "ada"))
            .unwrap()
            .unwrap();
        assert_eq!(found.id(), Some(first));
    }

    #[test]
    fn find_in_missing_collection_is_empty() {
        let store = InMemoryDocumentStore::new();
        assert!(store.find_one("nope", &Filter::new()).unwrap().is_none());
        assert_eq!(store.find_all("nope").unwrap().count(), 0);
        assert_eq!(store.count("nope").unwrap(), 0);
    }

    // -----------------------------------------------------------------------
    // Replace / update
    // -----------------------------------------------------------------------

    #[test]
    fn replace_keeps_identity_and_returns_previous() {
        let store = InMemoryDocumentStore::new();
        let id = store.insert_one("people", person("ada", 36)).unwrap();

        let previous = store
            .find_one_and_replace(
                "people",
                &Filter::new().eq("name", "ada"),
                person("ada", 37),
            )
            .unwrap()
            .expect("should match");
        assert_eq!(previous.get_i32("age"), Some(36));

        let now = store.find_by_id("people", &id).unwrap().unwrap();
        assert_eq!(now.get_i32("age"), Some(37));
        assert_eq!(store.count("people").unwrap(), 1);
    }

    #[test]
    fn replace_without_match_writes_nothing() {
        let store = InMemoryDocumentStore::new();
        store.insert_one("people", person("ada", 36)).unwrap();
        let result = store
            .find_one_and_replace(
                "people",
                &Filter::new().eq("name", "grace"),
                person("grace", 1),
            )
            .unwrap();
        assert!(result.is_none());
        assert_eq!(store.count("people").unwrap(), 1);
    }

    #[test]
    fn update_field_targets_one_key() {
        let store = InMemoryDocumentStore::new();
        let id = store.insert_one("people", person("ada", 36)).unwrap();
        assert!(store.update_field("people", &id, "age", Value::Int32(50)).unwrap());
        assert!(store.update_field("people", &id, "extra", Value::Bool(true)).unwrap());

        let doc = store.find_by_id("people", &id).unwrap().unwrap();
        assert_eq!(doc.get_i32("age"), Some(50));
        assert_eq!(doc.keys().collect::<Vec<_>>(), vec!["_id", "name", "age", "extra"]);

        let missing = DocumentId::new();
        assert!(!store.update_field("people", &missing, "age", Value::Null).unwrap());
    }

    // -----------------------------------------------------------------------
    // Count / delete / helpers
    // -----------------------------------------------------------------------

    #[test]
    fn counts_and_delete() {
        let store = InMemoryDocumentStore::new();
        let a = store.insert_one("people", person("a", 1)).unwrap();
        store.insert_one("people", person("b", 2)).unwrap();
        store.insert_one("pets", Document::new().with("name", "rex")).unwrap();

        assert_eq!(store.count("people").unwrap(), 2);
        assert_eq!(store.estimated_count("people").unwrap(), 2);
        assert_eq!(store.len(), 3);

        assert!(store.delete_one("people", &a).unwrap());
        assert!(!store.delete_one("people", &a).unwrap());
        assert_eq!(store.count("people").unwrap(), 1);
    }

    #[test]
    fn find_all_is_a_snapshot_in_order() {
        let store = InMemoryDocumentStore::new();
        for i in 0..5 {
            store.insert_one("n", Document::new().with("i", i)).unwrap();
        }
        let cursor = store.find_all("n").unwrap();
        store.insert_one("n", Document::new().with("i", 99)).unwrap();

        let seen: Vec<i32> = cursor.filter_map(|d| d.get_i32("i")).collect();
        assert_eq!(seen, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn collection_helpers() {
        let store = InMemoryDocumentStore::default();
        assert!(store.is_empty());
        store.insert_one("b", Document::new()).unwrap();
        store.insert_one("a", Document::new()).unwrap();
        assert_eq!(store.collection_names(), vec!["a", "b"]);

        assert!(store.drop_collection("a"));
        assert!(!store.drop_collection("a"));
        store.clear();
        assert!(store.is_empty());
    }

    #[test]
    fn concurrent_reads_are_safe() {
        use std::sync::Arc;
        use std::thread;

        let store = Arc::new(InMemoryDocumentStore::new());
        let id = store.insert_one("people", person("shared", 1)).unwrap();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = Arc::clone(&store);
                thread::spawn(move || {
                    let doc = store.find_by_id("people", &id).unwrap();
                    assert_eq!(doc.and_then(|d| d.id()), Some(id));
                })
            })
            .collect();

        for h in handles {
            h.join().expect("thread should not panic");
        }
    }

    #[test]
    fn debug_format() {
        let store = InMemoryDocumentStore::new();
        store.insert_one("x", Document::new()).unwrap();
        let debug = format!("{store:?}");
        assert!(debug.contains("InMemoryDocumentStore"));
        assert!(debug.contains("document_count"));
    }
}
