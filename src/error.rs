use thiserror::Error;

/// Everything that can go wrong while serving a single connection.
///
/// None of these leave the worker that hit them.
#[derive(Debug, Error)]
pub enum Error {
    #[error("no request line before the connection closed")]
    MalformedRequest,

    #[error("unsupported method: {0}")]
    UnsupportedMethod(String),

    #[error("file not found: {0}")]
    FileNotFound(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
