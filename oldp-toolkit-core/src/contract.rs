//! # contract: the seams between the pipeline and its collaborators
//!
//! The conversion pipeline orchestrates three capabilities it does not implement itself:
//! - [`MarkupRenderer`]: markup (HTML) to plain text
//! - [`ReferenceExtractor`]: legal reference markers from plain text
//! - [`HubUploader`]: repository and file operations against a remote dataset hub
//!
//! Default renderer and extractor implementations live in [`crate::enrich`] and
//! [`crate::refs`]. The hub client lives in the CLI crate; tests use the mockall
//! generated `MockHubUploader` (exported with the `test-export-mocks` feature).

use async_trait::async_trait;
use mockall::automock;
use serde::Serialize;
use thiserror::Error;

/// One JSON object from the dump.
pub type Record = serde_json::Map<String, serde_json::Value>;

/// Error returned by a [`MarkupRenderer`].
pub type RenderError = Box<dyn std::error::Error + Send + Sync>;

/// Renders markup into plain text that keeps paragraph and list structure.
pub trait MarkupRenderer: Send + Sync {
    fn render(&self, markup: &str) -> Result<String, RenderError>;
}

/// A single legal reference inside a marker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "ref_type", rename_all = "lowercase")]
pub enum Reference {
    /// Statute reference, e.g. `§ 823 BGB`.
    Law { book: String, section: String },
    /// Court decision reference by file number, e.g. `VI ZR 123/12`.
    Case {
        court: Option<String>,
        file_number: String,
    },
}

/// A span of text that contains one or more references.
///
/// `start` and `end` are character offsets into the scanned text, `line` is 1-based.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReferenceMarker {
    pub start: usize,
    pub end: usize,
    pub line: usize,
    pub text: String,
    pub references: Vec<Reference>,
}

/// Extracts reference markers from plain text.
pub trait ReferenceExtractor: Send + Sync {
    fn extract(&self, text: &str) -> Vec<ReferenceMarker>;
}

#[derive(Debug, Error)]
pub enum HubError {
    /// Missing, invalid or insufficient credential.
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    #[error("request failed: {0}")]
    Request(String),
}

/// A file to be committed to a hub repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HubFile {
    /// Path inside the repository, e.g. `default/train-00000-of-00001.parquet`.
    pub path: String,
    pub content: Vec<u8>,
}

/// Operations against a remote dataset hub.
///
/// Implementors own transport and credentials. All methods address dataset
/// repositories by id (`namespace/name` or `name`).
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait HubUploader: Send + Sync {
    /// Resolve the account behind the configured credential.
    async fn whoami(&self) -> Result<String, HubError>;

    /// Create the dataset repository. Succeeds if it already exists.
    async fn create_repo(&self, repo_id: &str, private: bool) -> Result<(), HubError>;

    /// Download a text file from the main branch. `None` if it does not exist.
    async fn fetch_file(&self, repo_id: &str, path: &str) -> Result<Option<String>, HubError>;

    /// Commit all files in a single commit on the main branch.
    async fn commit(
        &self,
        repo_id: &str,
        summary: &str,
        files: Vec<HubFile>,
    ) -> Result<(), HubError>;
}
