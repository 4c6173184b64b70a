use docgraph_engine::MapperError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ViewError {
    #[error(transparent)]
    Mapper(#[from] MapperError),

    #[error("index {index} out of bounds for view of length {len}")]
    IndexOutOfBounds { index: usize, len: usize },

    /// A lazy view can only hold instances it can locate in the store.
    #[error("{type_name} instance has no stored document")]
    NotStored { type_name: &'static str },
}

pub type ViewResult<T> = Result<T, ViewError>;
