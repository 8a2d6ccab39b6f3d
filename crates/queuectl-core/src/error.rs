use thiserror::Error;

/// Error taxonomy shared by every queuectl repository implementation.
///
/// Library crates return this type; the CLI binary flattens it into
/// `anyhow::Error` at the process boundary.
#[derive(Debug, Error)]
pub enum Error {
    #[error("job with id '{0}' already exists")]
    DuplicateId(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid input: {0}")]
    Validation(String),

    #[error("store error: {0}")]
    Store(String),
}

pub type Result<T> = std::result::Result<T, Error>;
