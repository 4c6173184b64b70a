use thiserror::Error;

/// Errors produced while parsing or rendering foundation types.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    /// A document identity was not valid hex.
    #[error("invalid hex in document id: {0}")]
    InvalidHex(String),

    /// A document identity had the wrong number of bytes.
    #[error("invalid document id length: expected {expected} bytes, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    /// A document could not be rendered as JSON.
    #[error("json rendering failed: {0}")]
    Json(String),
}
