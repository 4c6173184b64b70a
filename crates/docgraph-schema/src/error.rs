//! Error types for schema resolution and attribute access.

use thiserror::Error;

/// Errors raised while registering or resolving types.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SchemaError {
    /// No type is registered under this name.
    #[error("unknown type: {0}")]
    UnknownType(String),

    /// A different Rust type already claimed this name.
    #[error("type name {name} is already registered by a different type")]
    DuplicateType { name: String },
}

/// Convenience alias for schema operations.
pub type SchemaResult<T> = Result<T, SchemaError>;

/// Failure to read or assign one attribute of one instance.
///
/// Never fatal to a store or decode call: the attribute is skipped and
/// the failure is reported as a diagnostic.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AccessError {
    /// The instance is mutably borrowed elsewhere.
    #[error("instance of {type_name} is already borrowed")]
    Borrowed { type_name: &'static str },

    /// The accessor was handed an instance of another type.
    #[error("accessor expects an instance of {expected}")]
    OwnerMismatch { expected: &'static str },

    /// The value cannot be converted into the attribute's Rust type.
    #[error("cannot assign a {found} value to a {expected} attribute")]
    Incompatible { expected: String, found: &'static str },

    /// A custom accessor reported failure.
    #[error("{0}")]
    Failed(String),
}
