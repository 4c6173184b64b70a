//! Foundation types for docgraph.
//!
//! Every other docgraph crate depends on `docgraph-types`. The types here
//! describe what a schema-less document store holds; they know nothing of
//! application objects or schemas.
//!
//! # Key Types
//!
//! - [`DocumentId`]: store-generated 12-byte document identity
//! - [`Value`]: scalar, identity, array, or nested document value
//! - [`Document`]: insertion-ordered key/value mapping

pub mod document;
pub mod error;
pub mod id;
pub mod value;

pub use document::Document;
pub use error::TypeError;
pub use id::{DocumentId, DOCUMENT_ID_LEN, ID_KEY};
pub use value::Value;
