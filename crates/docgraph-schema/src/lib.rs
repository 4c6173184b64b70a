//! # docgraph-schema
//!
//! Describes which Rust types persist, where, and how.
//!
//! A type implements [`Persistable`] and returns a [`TypeSchema`] that
//! lists its attributes through [`Attr`] builders. The built
//! [`TypeDescriptor`] answers every question the mapper asks:
//!
//! - is the type persistable, and in which collection
//! - which attributes are stored, under which keys
//! - which attributes identify a stored document
//! - whether stored documents carry a polymorphic type tag
//!
//! Inheritance is expressed by embedding: a subtype holds its parent as a
//! field and calls [`TypeSchema::extends`] with the two lenses. Inherited
//! attributes follow the parent's persistence rules.
//!
//! Live instances are shared as [`Shared<T>`] and erased to
//! [`ObjectRef`], which compares by reference identity so cyclic graphs
//! can be walked.

pub mod attribute;
pub mod error;
pub mod field;
pub mod object;
pub mod registry;
pub mod schema;
pub mod value;

pub use attribute::{Attr, AttributeDescriptor, Getter, Setter};
pub use error::{AccessError, SchemaError, SchemaResult};
pub use field::{EnumType, FieldType};
pub use object::{shared, AsObjectRef, ObjectRef, Shared};
pub use registry::SchemaRegistry;
pub use schema::{Constructor, PersistenceMode, Persistable, TypeDescriptor, TypeSchema};
pub use value::{AttributeKind, FieldValue, ScalarKind};
