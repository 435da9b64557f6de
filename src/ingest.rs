//! Flat-index ingestion pipeline.
//!
//! Sequence for one run:
//!
//! 1. Build the embedding model (failure ends the run).
//! 2. Discover and extract local documents.
//! 3. Optionally harvest GitHub repositories.
//! 4. Split every document, tag each chunk, and number the chunks.
//! 5. Embed all chunk texts in one batch call.
//! 6. Write the flat index and the metadata array, replacing any previous run.
//!
//! Every outcome is reported as a [`RunStatus`]; nothing escapes as an error.

use std::path::PathBuf;

use tracing::{error, info, warn};

use crate::chunk::TextSplitter;
use crate::config::Config;
use crate::connector_fs::{discover_files, LocalFile};
use crate::embedding::{create_provider, Embedder};
use crate::extract::{Capabilities, Extractor};
use crate::github::GithubClient;
use crate::index::save_index;
use crate::models::{ChunkMetadata, ChunkRecord, Document, RunStatus};
use crate::ocr::PdfParser;
use crate::tagging::add_semantic_tags;

/// Which GitHub repositories to harvest, if any.
#[derive(Debug, Clone, Default)]
pub struct GithubOptions {
    pub enabled: bool,
    /// Explicit `owner/repo` names.
    pub repos: Vec<String>,
    /// Account whose public repositories are added to `repos`.
    pub user: Option<String>,
    pub token: Option<String>,
}

#[derive(Debug, Clone)]
pub struct IngestOptions {
    pub source_dir: PathBuf,
    pub output_dir: PathBuf,
    pub github: GithubOptions,
}

/// Documents extracted from one local file.
#[derive(Debug, Clone)]
pub struct LocalDocuments {
    pub file: LocalFile,
    pub documents: Vec<Document>,
}

/// Documents harvested from one repository.
#[derive(Debug, Clone)]
pub struct RepoDocuments {
    pub repo: String,
    pub documents: Vec<Document>,
}

/// Build the configured embedder, then run [`run_ingestion`].
pub async fn ingest(config: &Config, options: &IngestOptions) -> RunStatus {
    let embedder = match create_provider(&config.embedding).await {
        Ok(embedder) => {
            info!(model = %embedder.model_name(), "initialized embedding model");
            embedder
        }
        Err(e) => {
            error!(error = %e, "error initializing embedding model");
            return RunStatus::error(format!("Model initialization failed: {}", e));
        }
    };
    run_ingestion(config, options, embedder.as_ref()).await
}

pub async fn run_ingestion(
    config: &Config,
    options: &IngestOptions,
    embedder: &dyn Embedder,
) -> RunStatus {
    info!(
        source = %options.source_dir.display(),
        output = %options.output_dir.display(),
        "starting portfolio ingestion"
    );

    let extractor = match build_extractor(config) {
        Ok(extractor) => extractor,
        Err(e) => {
            error!(error = %e, "could not build extractor");
            return RunStatus::error(format!("Extractor initialization failed: {}", e));
        }
    };
    let splitter = TextSplitter::new(config.chunking.chunk_size, config.chunking.chunk_overlap);

    let mut records = Vec::new();
    for local in load_local_documents(&extractor, &options.source_dir).await {
        let added = append_chunks(&splitter, &local.documents, &mut records);
        info!(document = %local.file.document_id, chunks = added, "extracted chunks");
    }

    if options.github.enabled {
        for harvested in harvest_github(config, &options.github).await {
            let added = append_chunks(&splitter, &harvested.documents, &mut records);
            info!(repo = %harvested.repo, chunks = added, "added repository chunks");
        }
    } else {
        info!("GitHub ingestion disabled (use --enable-github to enable)");
    }

    if records.is_empty() {
        warn!("no data was processed; no index will be created");
        return RunStatus::error("No documents found to process");
    }

    for (i, record) in records.iter_mut().enumerate() {
        record.id = i;
    }

    info!(chunks = records.len(), model = %embedder.model_name(), "generating embeddings");
    let texts: Vec<String> = records.iter().map(|r| r.text.clone()).collect();
    let embeddings = match embedder.embed(&texts).await {
        Ok(embeddings) => embeddings,
        Err(e) => {
            error!(error = %e, "embedding failed");
            return RunStatus::error(format!("Embedding generation failed: {}", e));
        }
    };

    match save_index(&options.output_dir, &records, &embeddings) {
        Ok(Some(saved)) => {
            info!("ingestion finished successfully");
            RunStatus {
                index_path: Some(saved.index_path),
                metadata_path: Some(saved.metadata_path),
                ..RunStatus::success(format!("Processed {} chunks", records.len()))
            }
        }
        Ok(None) => RunStatus::error("No documents found to process"),
        Err(e) => {
            error!(error = %e, "could not save index");
            RunStatus::error("Failed to save index or metadata")
        }
    }
}

pub fn build_extractor(config: &Config) -> anyhow::Result<Extractor> {
    let pdf = PdfParser::from_config(&config.ocr)?;
    Ok(Extractor::new(Capabilities::from_config(&config.extract), pdf))
}

/// Extract every supported file under `source_dir`, in path order.
/// Files that yield nothing are omitted.
pub async fn load_local_documents(
    extractor: &Extractor,
    source_dir: &std::path::Path,
) -> Vec<LocalDocuments> {
    let files = match discover_files(source_dir) {
        Ok(files) => files,
        Err(e) => {
            error!(dir = %source_dir.display(), error = %e, "could not scan source directory");
            return Vec::new();
        }
    };
    info!(files = files.len(), "starting document processing");

    let mut out = Vec::new();
    for file in files {
        let documents = extractor
            .extract_file(&file.path, &file.document_id, &file.content_hash)
            .await;
        if !documents.is_empty() {
            out.push(LocalDocuments { file, documents });
        }
    }
    out
}

/// Explicit repositories first, then the user's public repositories, with
/// duplicates dropped.
pub async fn resolve_repos(client: &GithubClient, options: &GithubOptions) -> Vec<String> {
    let mut repos = options.repos.clone();
    if let Some(user) = &options.user {
        match client.list_user_repos(user).await {
            Ok(user_repos) => repos.extend(user_repos),
            Err(e) => error!(user = %user, error = %e, "error fetching user repositories"),
        }
    }
    let mut seen = std::collections::HashSet::new();
    repos.retain(|r| seen.insert(r.clone()));
    repos
}

/// Harvest every resolved repository. A repository that fails as a whole is
/// logged and skipped.
pub async fn harvest_github(config: &Config, options: &GithubOptions) -> Vec<RepoDocuments> {
    let client = match GithubClient::new(&config.github, options.token.clone()) {
        Ok(client) => client,
        Err(e) => {
            error!(error = %e, "could not build GitHub client");
            return Vec::new();
        }
    };

    let mut out = Vec::new();
    for repo in resolve_repos(&client, options).await {
        match client.harvest_repo(&repo).await {
            Ok(documents) if !documents.is_empty() => out.push(RepoDocuments { repo, documents }),
            Ok(_) => warn!(repo = %repo, "repository produced no documents"),
            Err(e) => error!(repo = %repo, error = %e, "error accessing repository"),
        }
    }
    out
}

/// Split, tag, and append. Returns the number of chunks added.
fn append_chunks(
    splitter: &TextSplitter,
    documents: &[Document],
    records: &mut Vec<ChunkRecord>,
) -> usize {
    let chunks = splitter.split_documents(documents);
    let added = chunks.len();
    for chunk in chunks {
        let (text, extracted) = add_semantic_tags(&chunk.text);
        let metadata = ChunkMetadata {
            extracted_data: (!extracted.is_empty()).then_some(extracted),
            ..chunk.metadata
        };
        records.push(ChunkRecord {
            id: records.len(),
            text,
            metadata,
        });
    }
    added
}
