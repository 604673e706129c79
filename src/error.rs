use thiserror::Error;

/// Faults the ingest/reshape pipeline can report. Validation and per-item
/// storage failures are itemized in the caller's report; nothing here is
/// allowed to take down the hosting process.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum PipelineError {
    #[error("batch payload must be a JSON array")]
    MalformedBatch,

    #[error("item must be a JSON object")]
    MalformedItem,

    #[error("missing required field `{0}`")]
    MissingField(String),

    #[error("document store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("store rejected document: {0}")]
    StoreRejected(String),
}

impl From<crate::store::StoreError> for PipelineError {
    fn from(err: crate::store::StoreError) -> Self {
        match err {
            crate::store::StoreError::Unavailable(msg) => PipelineError::StoreUnavailable(msg),
            crate::store::StoreError::Rejected(msg) => PipelineError::StoreRejected(msg),
        }
    }
}
