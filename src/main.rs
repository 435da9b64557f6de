//! # Portfolio RAG CLI (`prag`)
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `prag ingest` | Build the flat vector index from local files and GitHub |
//! | `prag search "<query>"` | Nearest-neighbour search over the flat index |
//! | `prag graph ingest` | Fold every document into the knowledge graph |
//! | `prag graph query` | Ask the knowledge graph one or more questions |
//! | `prag github repos <user>` | List a user's public repositories |
//!
//! Ingestion commands print their run status as JSON on stdout and exit
//! non-zero when the status is `error`. Logs go to stderr (`RUST_LOG`).

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;

use portfolio_rag::config::{self, Config};
use portfolio_rag::embedding::create_provider;
use portfolio_rag::github::GithubClient;
use portfolio_rag::graph::pipeline::{
    ingest_graph, print_report, query_graph, GraphIngestOptions, GraphQueryOptions,
};
use portfolio_rag::graph::{QueryMode, QueryParam};
use portfolio_rag::ingest::{ingest, GithubOptions, IngestOptions};
use portfolio_rag::models::RunStatus;
use portfolio_rag::search::{print_hits, search_index};

/// Portfolio RAG: document ingestion and retrieval for a portfolio assistant.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. A missing file means defaults.
#[derive(Parser)]
#[command(
    name = "prag",
    about = "Portfolio RAG: ingest documents and repositories into a vector index or knowledge graph",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/prag.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract, chunk, tag, and embed documents into a flat vector index.
    ///
    /// Writes `portfolio_index.bin` and `portfolio_metadata.json` to the
    /// output directory, replacing any previous run.
    Ingest {
        #[command(flatten)]
        sources: SourceArgs,

        /// Directory for the index and metadata files.
        #[arg(long, default_value = "./data/index")]
        output_dir: PathBuf,

        /// Embedding model name [default: sentence-transformers/all-MiniLM-L6-v2].
        #[arg(long)]
        embedding_model: Option<String>,
    },

    /// Search the flat vector index.
    Search {
        /// The search query string.
        query: String,

        /// Directory holding the index and metadata files.
        #[arg(long, default_value = "./data/index")]
        index_dir: PathBuf,

        /// Maximum number of results to return.
        #[arg(long, default_value_t = 5)]
        top_k: usize,

        /// Embedding model; must match the one used for ingestion.
        #[arg(long)]
        embedding_model: Option<String>,

        /// Print hits as JSON instead of the numbered listing.
        #[arg(long)]
        json: bool,
    },

    /// Knowledge-graph ingestion and querying (requires GOOGLE_API_KEY).
    Graph {
        #[command(subcommand)]
        action: GraphAction,
    },

    /// GitHub helpers.
    Github {
        #[command(subcommand)]
        action: GithubAction,
    },
}

#[derive(Subcommand)]
enum GraphAction {
    /// Concatenate every document and insert it into the knowledge graph.
    Ingest {
        #[command(flatten)]
        sources: SourceArgs,

        /// Graph working directory.
        #[arg(long, default_value = "./data/graph_storage")]
        output_dir: PathBuf,

        #[command(flatten)]
        models: GraphModelArgs,
    },

    /// Query the knowledge graph and export the results as JSON.
    Query {
        /// Graph working directory.
        #[arg(long, default_value = "./data/graph_storage")]
        working_dir: PathBuf,

        /// A single question.
        #[arg(long)]
        query: Option<String>,

        /// File with one question per line.
        #[arg(long)]
        queries_file: Option<PathBuf>,

        #[arg(long, value_enum, default_value_t = QueryMode::Hybrid)]
        mode: QueryMode,

        /// Entities, relations, or chunks pulled into context [default: graph.top_k].
        #[arg(long)]
        top_k: Option<usize>,

        /// Where to write the results JSON.
        #[arg(long, default_value = "./data/graph_results.json")]
        output_file: PathBuf,

        #[command(flatten)]
        models: GraphModelArgs,
    },
}

#[derive(Subcommand)]
enum GithubAction {
    /// List a user's public repositories as `owner/repo`.
    Repos {
        user: String,

        #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true)]
        github_token: Option<String>,
    },
}

/// Where documents come from.
#[derive(Args)]
struct SourceArgs {
    /// Directory of local documents.
    #[arg(long, default_value = "./data/documents")]
    source_dir: PathBuf,

    /// Also harvest GitHub repositories.
    #[arg(long)]
    enable_github: bool,

    /// Repositories as `owner/repo`.
    #[arg(long, num_args = 1..)]
    github_repos: Vec<String>,

    /// Harvest every public repository of this user.
    #[arg(long)]
    github_user: Option<String>,

    #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true)]
    github_token: Option<String>,
}

impl SourceArgs {
    fn github(&self) -> GithubOptions {
        GithubOptions {
            enabled: self.enable_github,
            repos: self.github_repos.clone(),
            user: self.github_user.clone(),
            token: self.github_token.clone(),
        }
    }
}

#[derive(Args)]
struct GraphModelArgs {
    /// Gemini model for text generation [default: gemini-2.0-flash-exp].
    #[arg(long)]
    llm_model: Option<String>,

    /// Gemini model for embeddings [default: models/text-embedding-004].
    #[arg(long)]
    embedding_model: Option<String>,
}

impl GraphModelArgs {
    fn apply(&self, cfg: &mut Config) {
        if let Some(model) = &self.llm_model {
            cfg.llm.model = model.clone();
        }
        if let Some(model) = &self.embedding_model {
            cfg.llm.embedding_model = model.clone();
        }
    }
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

impl Commands {
    /// Ingestion commands always answer with a status document on stdout.
    fn reports_status(&self) -> bool {
        matches!(
            self,
            Commands::Ingest { .. }
                | Commands::Graph {
                    action: GraphAction::Ingest { .. }
                }
        )
    }
}

fn print_status(status: &RunStatus) -> anyhow::Result<ExitCode> {
    println!("{}", serde_json::to_string_pretty(status)?);
    Ok(if status.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

#[tokio::main]
async fn main() -> ExitCode {
    let _ = dotenvy::dotenv();
    init_tracing();
    let cli = Cli::parse();

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    let mut cfg = match config::load_or_default(&cli.config) {
        Ok(cfg) => cfg,
        Err(e) if cli.command.reports_status() => {
            return print_status(&RunStatus::error(format!("Configuration error: {:#}", e)));
        }
        Err(e) => return Err(e),
    };

    match cli.command {
        Commands::Ingest {
            sources,
            output_dir,
            embedding_model,
        } => {
            if let Some(model) = embedding_model {
                cfg.embedding.model = Some(model);
            }
            let options = IngestOptions {
                source_dir: sources.source_dir.clone(),
                output_dir,
                github: sources.github(),
            };
            let status = ingest(&cfg, &options).await;
            print_status(&status)
        }
        Commands::Search {
            query,
            index_dir,
            top_k,
            embedding_model,
            json,
        } => {
            if let Some(model) = embedding_model {
                cfg.embedding.model = Some(model);
            }
            let embedder = create_provider(&cfg.embedding).await?;
            let hits = search_index(&index_dir, embedder.as_ref(), &query, top_k).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&hits)?);
            } else {
                print_hits(&hits);
            }
            Ok(ExitCode::SUCCESS)
        }
        Commands::Graph { action } => match action {
            GraphAction::Ingest {
                sources,
                output_dir,
                models,
            } => {
                models.apply(&mut cfg);
                let options = GraphIngestOptions {
                    source_dir: sources.source_dir.clone(),
                    output_dir,
                    github: sources.github(),
                };
                let status = ingest_graph(&cfg, &options).await;
                print_status(&status)
            }
            GraphAction::Query {
                working_dir,
                query,
                queries_file,
                mode,
                top_k,
                output_file,
                models,
            } => {
                models.apply(&mut cfg);
                let options = GraphQueryOptions {
                    working_dir,
                    query,
                    queries_file,
                    param: QueryParam {
                        mode,
                        top_k: top_k.unwrap_or(cfg.graph.top_k),
                    },
                    output_file: Some(output_file),
                };
                let outcome = query_graph(&cfg, &options).await;
                print_report(&outcome);
                Ok(if outcome.is_success() {
                    ExitCode::SUCCESS
                } else {
                    ExitCode::FAILURE
                })
            }
        },
        Commands::Github { action } => match action {
            GithubAction::Repos { user, github_token } => {
                let client = GithubClient::new(&cfg.github, github_token)?;
                let repos = client.list_user_repos(&user).await?;
                if repos.is_empty() {
                    println!("No public repositories found for {}.", user);
                }
                for repo in repos {
                    println!("{}", repo);
                }
                Ok(ExitCode::SUCCESS)
            }
        },
    }
}
