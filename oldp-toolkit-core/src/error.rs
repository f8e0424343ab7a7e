use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Fatal errors of a conversion run.
#[derive(Debug, Error)]
pub enum ConvertError {
    #[error("malformed input at line {line}: {reason}")]
    MalformedInput { line: usize, reason: String },
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("authentication error: {0}")]
    Authentication(String),
    #[error("schema inference failed: {0}")]
    SchemaInference(String),
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("upload failed: {0}")]
    Upload(String),
}

impl ConvertError {
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        ConvertError::Io {
            path: path.into(),
            source,
        }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        ConvertError::Configuration(msg.into())
    }
}

/// A non-fatal enrichment failure. The record keeps its raw markup as text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnrichmentWarning {
    pub field: String,
    pub reason: String,
    /// 0-based position of the record in the input, when known.
    pub record: Option<usize>,
}

impl std::fmt::Display for EnrichmentWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(index) = self.record {
            write!(f, "record {index}: ")?;
        }
        write!(f, "could not render field '{}': {}", self.field, self.reason)
    }
}
