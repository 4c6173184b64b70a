use docgraph_engine::MapperError;
use docgraph_schema::SchemaError;
use docgraph_store::StoreError;
use docgraph_view::ViewError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SdkError {
    #[error(transparent)]
    Mapper(#[from] MapperError),

    #[error(transparent)]
    View(#[from] ViewError),

    #[error("schema error: {0}")]
    Schema(#[from] SchemaError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

impl SdkError {
    /// Whether this error only reports that something is not stored.
    pub fn is_absent(&self) -> bool {
        match self {
            Self::Mapper(e) | Self::View(ViewError::Mapper(e)) => e.is_absent(),
            Self::View(ViewError::NotStored { .. }) => true,
            _ => false,
        }
    }
}

pub type SdkResult<T> = Result<T, SdkError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absence_survives_wrapping() {
        let absent = MapperError::NotFound {
            collection: "books".into(),
            id: None,
        };
        assert!(SdkError::from(ViewError::from(absent)).is_absent());
        assert!(SdkError::from(ViewError::NotStored { type_name: "Book" }).is_absent());
        assert!(!SdkError::from(MapperError::UnknownType("Ghost".into())).is_absent());
        assert!(!SdkError::from(SchemaError::UnknownType("Ghost".into())).is_absent());
    }
}
