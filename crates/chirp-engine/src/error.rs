use chirp_store::StoreError;
use thiserror::Error;

/// Errors produced by engine operations.
#[derive(Error, Debug)]
pub enum EngineError {
    /// The addressed user, tweet or comment does not exist.
    #[error("{0} not found")]
    NotFound(&'static str),

    /// The request was well-formed but not acceptable.
    #[error("{0}")]
    Validation(String),

    /// The actor may not perform this operation on the target.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// The storage layer failed.
    #[error("Storage error: {0}")]
    Store(#[source] StoreError),
}

pub type Result<T> = std::result::Result<T, EngineError>;

impl From<StoreError> for EngineError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound => EngineError::NotFound("record"),
            StoreError::Conflict(msg) => EngineError::Validation(msg),
            other => EngineError::Store(other),
        }
    }
}

/// Map a store `NotFound` to a `NotFound` naming `what`.
pub(crate) fn missing(what: &'static str) -> impl FnOnce(StoreError) -> EngineError {
    move |e| match e {
        StoreError::NotFound => EngineError::NotFound(what),
        other => other.into(),
    }
}
