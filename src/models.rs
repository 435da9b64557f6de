//! Core data models used throughout the pipeline.
//!
//! These types represent the documents, chunks, and results that flow
//! between extraction, chunking, embedding, and retrieval.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Which reader produced a [`Document`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
    MarkdownText,
    TextFile,
    DocxText,
    PdfText,
    GithubFile,
    GithubReadme,
}

/// Metadata carried by a document and inherited by each of its chunks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    pub source_file: String,
    pub source_type: SourceType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_document_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_content_hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub num_pages: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parser: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repo_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repo_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_size: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha: Option<String>,
}

impl DocumentMetadata {
    /// Metadata for a local file, keyed by its document id and content hash.
    pub fn local(
        source_file: impl Into<String>,
        source_type: SourceType,
        document_id: &str,
        content_hash: &str,
    ) -> Self {
        Self {
            source_file: source_file.into(),
            source_type,
            parent_document_id: Some(document_id.to_string()),
            parent_content_hash: Some(content_hash.to_string()),
            num_pages: None,
            parser: None,
            repo_name: None,
            repo_url: None,
            file_url: None,
            file_size: None,
            sha: None,
        }
    }

    /// Metadata for a file harvested from a remote repository.
    pub fn repository(
        source_file: impl Into<String>,
        source_type: SourceType,
        repo_name: &str,
        repo_url: &str,
    ) -> Self {
        Self {
            source_file: source_file.into(),
            source_type,
            parent_document_id: None,
            parent_content_hash: None,
            num_pages: None,
            parser: None,
            repo_name: Some(repo_name.to_string()),
            repo_url: Some(repo_url.to_string()),
            file_url: None,
            file_size: None,
            sha: None,
        }
    }
}

/// Normalized text extracted from one source file or repository file.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub text: String,
    pub metadata: DocumentMetadata,
}

/// Per-chunk metadata: the parent document's metadata plus chunk identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    #[serde(flatten)]
    pub document: DocumentMetadata,
    /// Random UUID, stable for the lifetime of the persisted record.
    pub chunk_id: String,
    /// Position of the chunk within its parent document.
    pub chunk_index: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extracted_data: Option<serde_json::Map<String, serde_json::Value>>,
}

/// A tagged chunk as persisted in the metadata array.
///
/// `id` is dense (0..N-1) and reassigned right before embedding so that it
/// lines up with the vector index position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkRecord {
    pub id: usize,
    pub text: String,
    pub metadata: ChunkMetadata,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Success,
    Error,
}

/// Structured outcome of an ingestion run, printed as JSON by the CLI.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunStatus {
    pub status: Status,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub index_path: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata_path: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_dir: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text_length: Option<usize>,
}

impl RunStatus {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            status: Status::Success,
            message: message.into(),
            index_path: None,
            metadata_path: None,
            output_dir: None,
            text_length: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: Status::Error,
            ..Self::success(message)
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == Status::Success
    }
}
