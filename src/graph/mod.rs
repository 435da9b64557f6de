//! Knowledge-graph retrieval.
//!
//! [`KnowledgeGraph`] is the seam between the ingestion/query pipeline and a
//! graph backend. The backend is configured with an injected
//! [`LanguageModel`](crate::llm::LanguageModel) and an [`EmbeddingFunc`];
//! it owns its working directory entirely.
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`store`] | File-backed [`GraphStore`](store::GraphStore) backend |
//! | [`prompts`] | Prompt templates for extraction, keywords, and answers |
//! | [`pipeline`] | Corpus assembly, ingestion, and batch querying |

pub mod pipeline;
pub mod prompts;
pub mod store;

use anyhow::{bail, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

use crate::embedding::Embedder;

/// Retrieval strategy for a graph query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum QueryMode {
    /// Entities matched by low-level keywords, plus their relations.
    Local,
    /// Relations matched by high-level keywords, plus their endpoints.
    Global,
    /// Local and global context combined.
    Hybrid,
    /// Plain chunk retrieval by vector similarity.
    Naive,
}

impl std::fmt::Display for QueryMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            QueryMode::Local => "local",
            QueryMode::Global => "global",
            QueryMode::Hybrid => "hybrid",
            QueryMode::Naive => "naive",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryParam {
    pub mode: QueryMode,
    /// Upper bound on entities, relations, or chunks pulled into context.
    pub top_k: usize,
}

#[derive(Debug, Error)]
pub enum GraphError {
    #[error("storages not initialized")]
    NotInitialized,
    #[error("storage error: {0}")]
    Storage(String),
    #[error("language model error: {0}")]
    Llm(String),
    #[error("embedding error: {0}")]
    Embedding(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// A graph-augmented retrieval backend.
///
/// Call order: `initialize_storages`, then any number of `insert`/`query`
/// calls, then `finalize_storages` to persist.
#[async_trait]
pub trait KnowledgeGraph: Send + Sync {
    async fn initialize_storages(&mut self) -> Result<(), GraphError>;

    /// Ingest one text blob.
    async fn insert(&mut self, text: &str) -> Result<(), GraphError>;

    /// Answer `query` with a single generated string.
    async fn query(&self, query: &str, param: &QueryParam) -> Result<String, GraphError>;

    async fn finalize_storages(&mut self) -> Result<(), GraphError>;
}

/// Input accepted by [`EmbeddingFunc::call`].
#[derive(Debug, Clone, Copy)]
pub enum EmbeddingInput<'a> {
    One(&'a str),
    Many(&'a [String]),
}

impl<'a> From<&'a str> for EmbeddingInput<'a> {
    fn from(text: &'a str) -> Self {
        EmbeddingInput::One(text)
    }
}

impl<'a> From<&'a [String]> for EmbeddingInput<'a> {
    fn from(texts: &'a [String]) -> Self {
        EmbeddingInput::Many(texts)
    }
}

/// Embedding callable handed to a graph backend.
///
/// Accepts a single string or a list and always returns one vector per
/// input string, each of `embedding_dim` floats.
#[derive(Clone)]
pub struct EmbeddingFunc {
    embedder: Arc<dyn Embedder>,
    pub embedding_dim: usize,
    pub max_token_size: usize,
}

impl EmbeddingFunc {
    pub fn new(embedder: Arc<dyn Embedder>, embedding_dim: usize, max_token_size: usize) -> Self {
        Self {
            embedder,
            embedding_dim,
            max_token_size,
        }
    }

    pub async fn call(&self, input: EmbeddingInput<'_>) -> Result<Vec<Vec<f32>>> {
        let texts: Vec<String> = match input {
            EmbeddingInput::One(text) => vec![text.to_string()],
            EmbeddingInput::Many(texts) => texts.to_vec(),
        };
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        // Roughly four characters per token.
        let max_chars = self.max_token_size.saturating_mul(4);
        let texts: Vec<String> = texts
            .into_iter()
            .map(|t| {
                if t.chars().count() > max_chars {
                    t.chars().take(max_chars).collect()
                } else {
                    t
                }
            })
            .collect();

        let vectors = self.embedder.embed(&texts).await?;
        if vectors.len() != texts.len() {
            bail!(
                "embedding backend returned {} vectors for {} inputs",
                vectors.len(),
                texts.len()
            );
        }
        if let Some(bad) = vectors.iter().find(|v| v.len() != self.embedding_dim) {
            bail!(
                "embedding has {} dims, expected {}",
                bad.len(),
                self.embedding_dim
            );
        }
        Ok(vectors)
    }
}
