//! Document store collaborator for docgraph.
//!
//! The mapping engine never talks to a database directly. It consumes the
//! narrow [`DocumentStore`] capability: insert a document, find one by
//! equality [`Filter`], atomically replace a matched document, update one
//! key, iterate and count a collection.
//!
//! # Storage Backends
//!
//! - [`InMemoryDocumentStore`] -- `HashMap`-based store for tests and embedding
//!
//! # Design Rules
//!
//! 1. The store assigns a [`DocumentId`](docgraph_types::DocumentId) at first
//!    insert; the identity never changes afterwards.
//! 2. A replace keeps the identity of the document it replaces.
//! 3. Collections are created implicitly on first insert.
//! 4. The store never interprets document contents beyond filter matching.
//! 5. Backend failures are propagated as [`StoreError`], never swallowed.

pub mod error;
pub mod filter;
pub mod memory;
pub mod traits;

pub use error::{StoreError, StoreResult};
pub use filter::Filter;
pub use memory::InMemoryDocumentStore;
pub use traits::{DocumentCursor, DocumentStore};
