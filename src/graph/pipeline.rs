//! Knowledge-graph ingestion and querying.
//!
//! Ingestion flattens every local and GitHub document into one text blob
//! with per-source headers and hands it to the graph backend in a single
//! `insert` call. Querying runs one or more questions sequentially; a failed
//! question becomes an error entry in the results instead of aborting the
//! batch.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use serde::Serialize;
use tracing::{error, info, warn};

use super::store::GraphStore;
use super::{EmbeddingFunc, KnowledgeGraph, QueryMode, QueryParam};
use crate::config::{Config, EmbeddingConfig};
use crate::embedding::GeminiProvider;
use crate::ingest::{build_extractor, harvest_github, load_local_documents, GithubOptions};
use crate::llm::{GeminiLlm, LanguageModel};
use crate::models::RunStatus;

/// Blobs shorter than this (after trimming) are not worth a graph.
pub const MIN_CORPUS_CHARS: usize = 100;

#[derive(Debug, Clone)]
pub struct GraphIngestOptions {
    pub source_dir: PathBuf,
    /// Graph working directory.
    pub output_dir: PathBuf,
    pub github: GithubOptions,
}

#[derive(Debug, Clone)]
pub struct GraphQueryOptions {
    pub working_dir: PathBuf,
    pub query: Option<String>,
    /// One question per line; blank lines are ignored.
    pub queries_file: Option<PathBuf>,
    pub param: QueryParam,
    pub output_file: Option<PathBuf>,
}

/// Result of one question.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum QueryResult {
    Success {
        query: String,
        mode: QueryMode,
        result: String,
        top_k: usize,
    },
    Error {
        query: String,
        mode: QueryMode,
        error: String,
    },
}

impl QueryResult {
    pub fn is_success(&self) -> bool {
        matches!(self, QueryResult::Success { .. })
    }
}

/// What a query run produced: one result, a list, or a run-level failure.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum QueryOutcome {
    Single(QueryResult),
    Batch(Vec<QueryResult>),
    Failed(RunStatus),
}

impl QueryOutcome {
    /// False only when the run itself failed; individual query errors in a
    /// batch still count as a completed run.
    pub fn is_success(&self) -> bool {
        match self {
            QueryOutcome::Single(r) => r.is_success(),
            QueryOutcome::Batch(_) => true,
            QueryOutcome::Failed(_) => false,
        }
    }
}

/// Concatenate every local and GitHub document into one blob.
pub async fn collect_corpus(
    config: &Config,
    source_dir: &Path,
    github: &GithubOptions,
) -> Result<String> {
    let extractor = build_extractor(config)?;
    let mut parts = Vec::new();

    for local in load_local_documents(&extractor, source_dir).await {
        for doc in &local.documents {
            parts.push(format!(
                "\n\n--- Source: {} ---\n{}",
                local.file.relative, doc.text
            ));
        }
        info!(file = %local.file.relative, "added local document");
    }

    if github.enabled {
        for harvested in harvest_github(config, github).await {
            for doc in &harvested.documents {
                parts.push(format!(
                    "\n\n--- GitHub: {} - {} ---\n{}",
                    harvested.repo, doc.metadata.source_file, doc.text
                ));
            }
            info!(
                repo = %harvested.repo,
                documents = harvested.documents.len(),
                "added repository documents"
            );
        }
    }

    Ok(parts.join("\n\n"))
}

/// Gemini embedding settings derived from the `[llm]` section.
pub fn graph_embedding_config(config: &Config) -> EmbeddingConfig {
    EmbeddingConfig {
        provider: "gemini".to_string(),
        model: Some(config.llm.embedding_model.clone()),
        dims: Some(config.llm.embedding_dims),
        max_retries: config.llm.max_retries,
        timeout_secs: config.llm.timeout_secs,
        url: Some(config.llm.base_url.clone()),
        ..config.embedding.clone()
    }
}

/// Build the Gemini-backed store for `working_dir`.
pub fn build_store(config: &Config, working_dir: &Path) -> Result<GraphStore> {
    let llm = GeminiLlm::new(&config.llm)?;
    let api_key = std::env::var(&config.llm.api_key_env).unwrap_or_default();
    let embedder = GeminiProvider::with_key(&graph_embedding_config(config), api_key)?;
    let embedding = EmbeddingFunc::new(
        Arc::new(embedder),
        config.llm.embedding_dims,
        config.graph.max_token_size,
    );
    let llm: Arc<dyn LanguageModel> = Arc::new(llm);
    Ok(GraphStore::new(working_dir, llm, embedding, &config.graph))
}

/// Build the Gemini-backed store, then run [`run_graph_ingestion`].
pub async fn ingest_graph(config: &Config, options: &GraphIngestOptions) -> RunStatus {
    let mut store = match build_store(config, &options.output_dir) {
        Ok(store) => store,
        Err(e) => {
            error!(error = %e, "could not configure knowledge graph");
            return RunStatus::error(e.to_string());
        }
    };
    run_graph_ingestion(config, options, &mut store).await
}

pub async fn run_graph_ingestion(
    config: &Config,
    options: &GraphIngestOptions,
    graph: &mut dyn KnowledgeGraph,
) -> RunStatus {
    info!(
        source = %options.source_dir.display(),
        output = %options.output_dir.display(),
        "starting knowledge graph ingestion"
    );

    if let Err(e) = std::fs::create_dir_all(&options.output_dir) {
        error!(dir = %options.output_dir.display(), error = %e, "could not create working directory");
        return RunStatus::error(format!("Knowledge graph initialization failed: {}", e));
    }
    if let Err(e) = graph.initialize_storages().await {
        error!(error = %e, "could not initialize graph storages");
        return RunStatus::error(format!("Knowledge graph initialization failed: {}", e));
    }

    let corpus = match collect_corpus(config, &options.source_dir, &options.github).await {
        Ok(corpus) => corpus,
        Err(e) => {
            error!(error = %e, "could not collect documents");
            finalize_quietly(graph).await;
            return RunStatus::error(format!("Document collection failed: {}", e));
        }
    };

    if corpus.trim().chars().count() < MIN_CORPUS_CHARS {
        warn!("no substantial text collected; nothing inserted");
        finalize_quietly(graph).await;
        return RunStatus::error("No documents found to process");
    }

    let text_length = corpus.chars().count();
    info!(chars = text_length, "inserting corpus into knowledge graph");
    if let Err(e) = graph.insert(&corpus).await {
        error!(error = %e, "knowledge graph insertion failed");
        finalize_quietly(graph).await;
        return RunStatus::error(format!("Knowledge graph insertion failed: {}", e));
    }

    if let Err(e) = graph.finalize_storages().await {
        error!(error = %e, "could not finalize graph storages");
        return RunStatus::error(format!("Finalization failed: {}", e));
    }

    info!("knowledge graph ingestion finished");
    RunStatus {
        output_dir: Some(options.output_dir.clone()),
        text_length: Some(text_length),
        ..RunStatus::success("Processed documents into knowledge graph")
    }
}

/// Open the store in `working_dir` and answer the requested questions.
/// Results are exported to `output_file` when one is given.
pub async fn query_graph(config: &Config, options: &GraphQueryOptions) -> QueryOutcome {
    if !options.working_dir.is_dir() {
        error!(dir = %options.working_dir.display(), "working directory not found; run graph ingestion first");
        return QueryOutcome::Failed(RunStatus::error("Failed to initialize knowledge graph"));
    }
    let mut store = match build_store(config, &options.working_dir) {
        Ok(store) => store,
        Err(e) => {
            error!(error = %e, "could not configure knowledge graph");
            return QueryOutcome::Failed(RunStatus::error("Failed to initialize knowledge graph"));
        }
    };
    if let Err(e) = store.initialize_storages().await {
        error!(error = %e, "could not load graph storages");
        return QueryOutcome::Failed(RunStatus::error("Failed to initialize knowledge graph"));
    }
    run_queries(&mut store, options).await
}

/// Answer the questions in `options` against an initialized graph.
pub async fn run_queries(
    graph: &mut dyn KnowledgeGraph,
    options: &GraphQueryOptions,
) -> QueryOutcome {
    let queries = match read_queries(options) {
        Ok(queries) => queries,
        Err(e) => {
            error!(error = %e, "could not read queries");
            finalize_quietly(graph).await;
            return QueryOutcome::Failed(RunStatus::error(e.to_string()));
        }
    };
    if queries.is_empty() {
        error!("no query provided; use --query or --queries-file");
        finalize_quietly(graph).await;
        return QueryOutcome::Failed(RunStatus::error("No query provided"));
    }

    let mut results = Vec::with_capacity(queries.len());
    for query in &queries {
        results.push(run_query(&*graph, query, &options.param).await);
    }
    let outcome = if results.len() == 1 {
        QueryOutcome::Single(results.remove(0))
    } else {
        QueryOutcome::Batch(results)
    };

    if let Some(path) = &options.output_file {
        match export_results(&outcome, path) {
            Ok(()) => info!(path = %path.display(), "results exported"),
            Err(e) => error!(path = %path.display(), error = %e, "error exporting results"),
        }
    }

    finalize_quietly(graph).await;
    outcome
}

async fn run_query(graph: &dyn KnowledgeGraph, query: &str, param: &QueryParam) -> QueryResult {
    info!(mode = %param.mode, query = %query, "querying knowledge graph");
    match graph.query(query, param).await {
        Ok(result) => {
            info!(chars = result.chars().count(), "query completed");
            QueryResult::Success {
                query: query.to_string(),
                mode: param.mode,
                result,
                top_k: param.top_k,
            }
        }
        Err(e) => {
            error!(error = %e, "query failed");
            QueryResult::Error {
                query: query.to_string(),
                mode: param.mode,
                error: e.to_string(),
            }
        }
    }
}

/// `--query` wins over `--queries-file`.
fn read_queries(options: &GraphQueryOptions) -> Result<Vec<String>> {
    if let Some(query) = options.query.as_deref().filter(|q| !q.trim().is_empty()) {
        return Ok(vec![query.to_string()]);
    }
    let Some(path) = &options.queries_file else {
        return Ok(Vec::new());
    };
    let content = std::fs::read_to_string(path).map_err(|e| {
        anyhow::anyhow!("Failed to read queries file {}: {}", path.display(), e)
    })?;
    Ok(content
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect())
}

/// Write `outcome` as 2-space-indented JSON, creating parent directories.
pub fn export_results(outcome: &QueryOutcome, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(outcome)?;
    std::fs::write(path, json)?;
    Ok(())
}

async fn finalize_quietly(graph: &mut dyn KnowledgeGraph) {
    if let Err(e) = graph.finalize_storages().await {
        warn!(error = %e, "could not finalize graph storages");
    }
}

/// Print the human-readable results block.
pub fn print_report(outcome: &QueryOutcome) {
    let rule = "=".repeat(80);
    println!("\n{}", rule);
    println!("QUERY RESULTS");
    println!("{}", rule);
    match outcome {
        QueryOutcome::Batch(results) => {
            for (i, result) in results.iter().enumerate() {
                print!("\n[Query {}] ", i + 1);
                print_result(result);
            }
        }
        QueryOutcome::Single(result) => {
            print!("\nQuery: ");
            print_result(result);
        }
        QueryOutcome::Failed(status) => {
            println!("\nQuery: N/A");
            println!("Status: error");
            println!("Error: {}\n", status.message);
        }
    }
    println!("{}", rule);
}

fn print_result(result: &QueryResult) {
    match result {
        QueryResult::Success { query, result, .. } => {
            println!("{}", query);
            println!("Status: success");
            println!("\n{}\n", result);
        }
        QueryResult::Error { query, error, .. } => {
            println!("{}", query);
            println!("Status: error");
            println!("Error: {}\n", error);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::GraphError;
    use async_trait::async_trait;

    /// Records inserts and echoes queries; a query containing "fail" errors.
    #[derive(Default)]
    struct RecordingGraph {
        initialized: bool,
        finalized: usize,
        inserted: Vec<String>,
    }

    #[async_trait]
    impl KnowledgeGraph for RecordingGraph {
        async fn initialize_storages(&mut self) -> Result<(), GraphError> {
            self.initialized = true;
            Ok(())
        }
        async fn insert(&mut self, text: &str) -> Result<(), GraphError> {
            self.inserted.push(text.to_string());
            Ok(())
        }
        async fn query(&self, query: &str, param: &QueryParam) -> Result<String, GraphError> {
            if query.contains("fail") {
                return Err(GraphError::Llm("boom".to_string()));
            }
            Ok(format!("{}:{}", param.mode, query))
        }
        async fn finalize_storages(&mut self) -> Result<(), GraphError> {
            self.finalized += 1;
            Ok(())
        }
    }

    fn query_options(dir: &Path) -> GraphQueryOptions {
        GraphQueryOptions {
            working_dir: dir.to_path_buf(),
            query: None,
            queries_file: None,
            param: QueryParam {
                mode: QueryMode::Hybrid,
                top_k: 10,
            },
            output_file: None,
        }
    }

    #[tokio::test]
    async fn short_corpus_is_not_inserted() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("docs");
        std::fs::create_dir_all(&source).unwrap();
        std::fs::write(source.join("note.txt"), "A short note that is long enough to extract.").unwrap();

        let options = GraphIngestOptions {
            source_dir: source,
            output_dir: dir.path().join("graph"),
            github: GithubOptions::default(),
        };
        let mut graph = RecordingGraph::default();
        let status = run_graph_ingestion(&Config::default(), &options, &mut graph).await;

        assert!(!status.is_success());
        assert_eq!(status.message, "No documents found to process");
        assert!(graph.inserted.is_empty());
        assert_eq!(graph.finalized, 1);
    }

    #[tokio::test]
    async fn corpus_carries_source_headers() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("docs");
        std::fs::create_dir_all(source.join("projects")).unwrap();
        let body = "Designed and shipped a distributed cache in Rust. ".repeat(4);
        std::fs::write(source.join("projects").join("cache.txt"), &body).unwrap();
        std::fs::write(source.join("about.txt"), &body).unwrap();

        let options = GraphIngestOptions {
            source_dir: source,
            output_dir: dir.path().join("graph"),
            github: GithubOptions::default(),
        };
        let mut graph = RecordingGraph::default();
        let status = run_graph_ingestion(&Config::default(), &options, &mut graph).await;

        assert!(status.is_success(), "{:?}", status);
        assert_eq!(status.message, "Processed documents into knowledge graph");
        assert!(graph.initialized);
        assert_eq!(graph.finalized, 1);
        assert_eq!(graph.inserted.len(), 1);
        let blob = &graph.inserted[0];
        assert!(blob.starts_with("\n\n--- Source: about.txt ---\n"));
        assert!(blob.contains("\n\n\n\n--- Source: projects/cache.txt ---\n"));
        assert_eq!(status.text_length, Some(blob.chars().count()));
        assert_eq!(status.output_dir, Some(options.output_dir.clone()));
        assert!(options.output_dir.is_dir());
    }

    #[tokio::test]
    async fn no_query_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut graph = RecordingGraph::default();
        let outcome = run_queries(&mut graph, &query_options(dir.path())).await;
        match outcome {
            QueryOutcome::Failed(status) => assert_eq!(status.message, "No query provided"),
            other => panic!("unexpected outcome: {:?}", other),
        }
        assert_eq!(graph.finalized, 1);
    }

    #[tokio::test]
    async fn batch_captures_per_query_failures_and_exports() {
        let dir = tempfile::tempdir().unwrap();
        let queries = dir.path().join("queries.txt");
        std::fs::write(&queries, "What languages?\n\n  please fail  \nWhich projects?\n").unwrap();
        let output = dir.path().join("out").join("results.json");

        let options = GraphQueryOptions {
            queries_file: Some(queries),
            output_file: Some(output.clone()),
            ..query_options(dir.path())
        };
        let mut graph = RecordingGraph::default();
        let outcome = run_queries(&mut graph, &options).await;

        let QueryOutcome::Batch(results) = &outcome else {
            panic!("expected batch, got {:?}", outcome);
        };
        assert_eq!(results.len(), 3);
        assert!(results[0].is_success());
        assert!(!results[1].is_success());
        assert!(results[2].is_success());

        let written: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&output).unwrap()).unwrap();
        assert_eq!(written[0]["status"], "success");
        assert_eq!(written[0]["result"], "hybrid:What languages?");
        assert_eq!(written[0]["top_k"], 10);
        assert_eq!(written[1]["status"], "error");
        assert_eq!(written[1]["query"], "please fail");
        assert_eq!(written[1]["error"], "language model error: boom");
    }

    #[tokio::test]
    async fn single_query_wins_over_file() {
        let dir = tempfile::tempdir().unwrap();
        let options = GraphQueryOptions {
            query: Some("Who is this?".to_string()),
            queries_file: Some(dir.path().join("missing.txt")),
            param: QueryParam {
                mode: QueryMode::Naive,
                top_k: 3,
            },
            ..query_options(dir.path())
        };
        let mut graph = RecordingGraph::default();
        let outcome = run_queries(&mut graph, &options).await;
        assert_eq!(
            serde_json::to_value(&outcome).unwrap(),
            serde_json::json!({
                "status": "success",
                "query": "Who is this?",
                "mode": "naive",
                "result": "naive:Who is this?",
                "top_k": 3
            })
        );
    }

    #[tokio::test]
    async fn missing_working_dir_fails_before_any_backend_call() {
        let dir = tempfile::tempdir().unwrap();
        let options = GraphQueryOptions {
            query: Some("q".to_string()),
            ..query_options(&dir.path().join("absent"))
        };
        let outcome = query_graph(&Config::default(), &options).await;
        assert!(!outcome.is_success());
        assert_eq!(
            serde_json::to_value(&outcome).unwrap()["message"],
            "Failed to initialize knowledge graph"
        );
    }

    #[test]
    fn embedding_settings_follow_llm_section() {
        let cfg = graph_embedding_config(&Config::default());
        assert_eq!(cfg.provider, "gemini");
        assert_eq!(cfg.model.as_deref(), Some("models/text-embedding-004"));
        assert_eq!(cfg.dims, Some(768));
    }
}
