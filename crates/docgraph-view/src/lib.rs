//! # docgraph-view
//!
//! [`CollectionView`] is a list over the instances of one persistable
//! type. It has two independent settings:
//!
//! - **backing**: *eager* views hold decoded instances; *lazy* views hold
//!   document identities and decode on every access.
//! - **scope**: a view starts empty, or as the whole collection. A lazy
//!   whole-collection view keeps a blacklist of excluded identities
//!   instead of materialising the collection.
//!
//! Views change membership only. Adding never stores an instance and
//! clearing never deletes a document.

pub mod error;
pub mod view;

pub use error::{ViewError, ViewResult};
pub use view::{Backing, CollectionView, Scope};
