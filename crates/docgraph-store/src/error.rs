use docgraph_types::DocumentId;

/// Errors from document store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// An insert carried an identity that already exists in the collection.
    #[error("duplicate document id {id} in collection {collection}")]
    DuplicateId { collection: String, id: DocumentId },

    /// A document that must carry an identity did not.
    #[error("document in collection {collection} has no _id")]
    MissingId { collection: String },

    /// The backend rejected or failed the operation.
    #[error("backend error: {0}")]
    Backend(String),
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
