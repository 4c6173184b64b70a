use docgraph_store::StoreError;
use docgraph_types::DocumentId;
use thiserror::Error;

/// A value whose shape does not fit the attribute's declared kind.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("no mapping from a {found} value to a {expected} attribute")]
pub struct EncodeError {
    pub expected: String,
    pub found: &'static str,
}

/// Errors from storing and decoding object graphs.
///
/// `NotPersistable` and `NotFound` mean "legitimately absent": the object
/// is not stored yet, or cannot be. Every other variant is a configuration
/// or backend failure that aborts the call. Use [`MapperError::is_absent`]
/// or [`MapperResultExt::optional`] to branch on the difference.
#[derive(Debug, Error)]
pub enum MapperError {
    #[error("type {type_name} is not persistable")]
    NotPersistable { type_name: String },

    #[error("no matching document in collection {collection}")]
    NotFound {
        collection: String,
        id: Option<DocumentId>,
    },

    #[error("type {0} has no default constructor")]
    NoDefaultConstructor(String),

    #[error("type tag names an unknown type: {0}")]
    UnknownType(String),

    #[error("failed to store {type_name}.{attribute}")]
    StoreFailure {
        type_name: String,
        attribute: String,
        #[source]
        cause: EncodeError,
    },

    #[error("expected an instance of {expected}, decoded {found}")]
    UnexpectedType {
        expected: &'static str,
        found: &'static str,
    },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("store error: {0}")]
    Backend(#[from] StoreError),
}

impl MapperError {
    /// Whether this error only reports absence.
    pub fn is_absent(&self) -> bool {
        matches!(self, Self::NotPersistable { .. } | Self::NotFound { .. })
    }
}

pub type MapperResult<T> = Result<T, MapperError>;

/// Turns absence into `Ok(None)`.
pub trait MapperResultExt<T> {
    fn optional(self) -> MapperResult<Option<T>>;
}

impl<T> MapperResultExt<T> for MapperResult<T> {
    fn optional(self) -> MapperResult<Option<T>> {
        match self {
            Ok(v) => Ok(Some(v)),
            Err(e) if e.is_absent() => Ok(None),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn absence_class() {
        assert!(MapperError::NotPersistable { type_name: "X".into() }.is_absent());
        assert!(MapperError::NotFound { collection: "c".into(), id: None }.is_absent());
        assert!(!MapperError::UnknownType("X".into()).is_absent());
        assert!(!MapperError::NoDefaultConstructor("X".into()).is_absent());
    }

    #[test]
    fn optional_keeps_fatal_errors() {
        let absent: MapperResult<i32> = Err(MapperError::NotFound { collection: "c".into(), id: None });
        assert!(absent.optional().unwrap().is_none());

        let present: MapperResult<i32> = Ok(3);
        assert_eq!(present.optional().unwrap(), Some(3));

        let fatal: MapperResult<i32> = Err(MapperError::UnknownType("Ghost".into()));
        assert!(matches!(fatal.optional(), Err(MapperError::UnknownType(_))));
    }

    #[test]
    fn store_failure_wraps_cause() {
        let err = MapperError::StoreFailure {
            type_name: "Person".into(),
            attribute: "age".into(),
            cause: EncodeError { expected: "int32".into(), found: "sequence" },
        };
        assert_eq!(err.to_string(), "failed to store Person.age");
        let source = err.source().expect("has a cause");
        assert_eq!(source.to_string(), "no mapping from a sequence value to a int32 attribute");
    }
}
