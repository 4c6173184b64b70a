use docgraph_types::{Document, DocumentId, Value};

use crate::error::StoreResult;
use crate::filter::Filter;

/// Iterator over the documents of a collection, in collection order.
pub type DocumentCursor = Box<dyn Iterator<Item = Document>>;

/// Schema-less document store.
///
/// All implementations must satisfy these invariants:
/// - A document belongs to exactly one named collection.
/// - `insert_one` assigns a fresh identity unless the document already
///   carries one, and fails on a duplicate identity.
/// - `find_one_and_replace` keeps the matched document's identity.
/// - Collection order is stable: `find_all` and `find_one` see documents
///   in insertion order.
///
/// Note that `find_one_and_replace` followed by a fallback `insert_one` is
/// two round trips. Callers that upsert this way can race with each other
/// and insert duplicates; the trait offers no compare-and-swap.
pub trait DocumentStore: Send + Sync {
    /// Insert `document` into `collection` and return its identity.
    fn insert_one(&self, collection: &str, document: Document) -> StoreResult<DocumentId>;

    /// Replace the first document matching `filter`.
    ///
    /// Returns the document as it was before the replace, or `Ok(None)`
    /// when nothing matched (in which case nothing is written).
    fn find_one_and_replace(
        &self,
        collection: &str,
        filter: &Filter,
        document: Document,
    ) -> StoreResult<Option<Document>>;

    /// The first document matching `filter`, if any.
    fn find_one(&self, collection: &str, filter: &Filter) -> StoreResult<Option<Document>>;

    /// Fetch a document by identity.
    fn find_by_id(&self, collection: &str, id: &DocumentId) -> StoreResult<Option<Document>> {
        self.find_one(collection, &Filter::by_id(*id))
    }

    /// Every document in `collection`. A missing collection is empty.
    fn find_all(&self, collection: &str) -> StoreResult<DocumentCursor>;

    /// Set one key on the document with identity `id`.
    ///
    /// Returns `true` if the document exists.
    fn update_field(
        &self,
        collection: &str,
        id: &DocumentId,
        key: &str,
        value: Value,
    ) -> StoreResult<bool>;

    /// Exact number of documents in `collection`.
    fn count(&self, collection: &str) -> StoreResult<u64>;

    /// Approximate number of documents in `collection`.
    ///
    /// Default implementation is exact. Backends with collection metadata
    /// may answer from it instead.
    fn estimated_count(&self, collection: &str) -> StoreResult<u64> {
        self.count(collection)
    }

    /// Delete a document by identity. Returns `true` if it existed.
    fn delete_one(&self, collection: &str, id: &DocumentId) -> StoreResult<bool>;
}
