//! High-level docgraph API.
//!
//! [`Docgraph`] bundles a [`DocumentStore`], a [`SchemaRegistry`] and a
//! [`DocumentMapper`] into one session: store object graphs, decode them
//! back, locate instances by their identity attributes, and open
//! [`CollectionView`]s over a type's collection. This is the main entry
//! point for applications embedding docgraph.

pub mod error;
pub mod session;

pub use error::{SdkError, SdkResult};
pub use session::{Docgraph, DocgraphBuilder};

// Re-export key types
pub use docgraph_engine::{
    AccessFailure, AccessPhase, Diagnostics, DocumentMapper, EncodeError, MapperConfig, MapperError,
    MapperResult, MapperResultExt,
};
pub use docgraph_schema::{
    shared, AccessError, AsObjectRef, Attr, AttributeKind, EnumType, FieldType, FieldValue, ObjectRef,
    Persistable, ScalarKind, SchemaError, SchemaRegistry, Shared, TypeSchema,
};
pub use docgraph_store::{DocumentStore, Filter, InMemoryDocumentStore, StoreError};
pub use docgraph_types::{Document, DocumentId, Value};
pub use docgraph_view::{Backing, CollectionView, Scope, ViewError, ViewResult};
