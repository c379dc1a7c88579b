//! Error taxonomy shared across the ingestion and retrieval pipeline.
//!
//! Ingestion errors are fatal to the document being processed (its status
//! becomes `error`); embedding errors are recoverable and leave the affected
//! chunks keyword-searchable without a vector.

use thiserror::Error;

/// Fatal ingestion failures. Any of these moves the document to the
/// `error` status with no partial chunk set left behind.
#[derive(Debug, Error)]
pub enum IngestError {
    /// The declared content type is not in the supported set.
    #[error("unsupported content type: {0}")]
    UnsupportedFormat(String),

    /// The payload could not be decoded as the declared format. The
    /// underlying decode error is preserved in `detail` for diagnostics;
    /// end users only ever see "processing failed".
    #[error("malformed {format} payload: {detail}")]
    Malformed { format: String, detail: String },

    /// The document referenced by an ingestion trigger does not exist.
    #[error("document not found: {0}")]
    DocumentNotFound(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

impl IngestError {
    pub fn malformed(format: &str, detail: impl std::fmt::Display) -> Self {
        Self::Malformed {
            format: format.to_string(),
            detail: detail.to_string(),
        }
    }
}

/// Recoverable embedding-batch failures. The orchestrator logs these and
/// moves on; the document still completes.
#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error("embedding backend is disabled")]
    Disabled,

    #[error("embedding request failed: {0}")]
    Request(String),

    #[error("invalid embedding response: {0}")]
    BadResponse(String),

    #[error("embedding batch failed after {attempts} attempts: {detail}")]
    Exhausted { attempts: u32, detail: String },
}
