//! # docgraph-engine
//!
//! Maps cyclic, polymorphic object graphs onto a schema-less
//! [`DocumentStore`](docgraph_store::DocumentStore).
//!
//! - **Predicates**: the identity-relevant scalar attributes of an
//!   instance, used to find "its" stored document.
//! - **Encoder**: stores an instance and everything it references, upserting
//!   by predicates. References back into the current path are written as a
//!   null placeholder and patched once the traversal is done.
//! - **Decoder**: rebuilds instances from documents, resolving the type tag,
//!   sharing one instance per identity, and patching cyclic references
//!   after the traversal.
//!
//! [`DocumentMapper`] is the entry point.

pub mod config;
pub mod diagnostics;
pub mod error;
pub mod mapper;

mod decoder;
mod encoder;
mod predicate;

pub use config::MapperConfig;
pub use diagnostics::{AccessFailure, AccessPhase, Diagnostics};
pub use error::{EncodeError, MapperError, MapperResult, MapperResultExt};
pub use mapper::DocumentMapper;
