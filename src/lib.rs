//! # Portfolio RAG
//!
//! Ingestion and retrieval for a personal portfolio assistant.
//!
//! Local documents (PDF, DOCX, Markdown, HTML, text) and GitHub repositories
//! are normalized into documents, split into tagged chunks, and either
//! embedded into a flat vector index or folded into a knowledge graph that
//! answers questions through a hosted language model.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌──────────────┐   ┌──────────────────┐
//! │  Extractors  │──▶│ Chunk + Tag  │──▶│ Embed → FlatIndex │
//! │ PDF/DOCX/MD  │   └──────────────┘   └──────────────────┘
//! │ HTML/TXT     │
//! ├──────────────┤   ┌──────────────┐   ┌──────────────────┐
//! │ GitHub repos │──▶│ Corpus blob  │──▶│  KnowledgeGraph   │
//! └──────────────┘   └──────────────┘   └──────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! prag ingest --source-dir ./data/documents --enable-github --github-user octocat
//! prag search "distributed systems experience"
//! prag graph ingest --source-dir ./data/documents
//! prag graph query --query "Which projects use Rust?" --mode hybrid
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Documents, chunk records, run status |
//! | [`connector_fs`] | Local source discovery |
//! | [`extract`] | Per-format text extraction |
//! | [`ocr`] | PDF text layer with vision-model fallback |
//! | [`github`] | GitHub repository harvester |
//! | [`chunk`] | Recursive character splitting |
//! | [`tagging`] | Keyword-based semantic tags |
//! | [`embedding`] | Embedding provider abstraction |
//! | [`index`] | Exact L2 flat index and metadata persistence |
//! | [`ingest`] | Flat-index ingestion pipeline |
//! | [`search`] | Nearest-neighbour search over a saved index |
//! | [`llm`] | Hosted text generation |
//! | [`graph`] | Knowledge-graph ingestion and querying |

pub mod chunk;
pub mod config;
pub mod connector_fs;
pub mod embedding;
pub mod extract;
pub mod github;
pub mod graph;
mod http;
pub mod index;
pub mod ingest;
pub mod llm;
pub mod models;
pub mod ocr;
pub mod search;
pub mod tagging;
