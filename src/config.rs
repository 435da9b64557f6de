//! TOML configuration.
//!
//! Every section and field has a default, so a missing config file (or a
//! file that only overrides a handful of values) is valid. CLI flags are
//! applied on top of the loaded values by `main`.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub extract: ExtractConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub github: GithubConfig,
    #[serde(default)]
    pub ocr: OcrConfig,
    #[serde(default)]
    pub graph: GraphConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
        }
    }
}

fn default_chunk_size() -> usize {
    1000
}
fn default_chunk_overlap() -> usize {
    200
}

/// Which document readers are enabled. All are compiled in; turning one off
/// makes the matching extension behave as unsupported.
#[derive(Debug, Deserialize, Clone)]
pub struct ExtractConfig {
    #[serde(default = "default_true")]
    pub markdown_render: bool,
    #[serde(default = "default_true")]
    pub html_strip: bool,
    #[serde(default = "default_true")]
    pub docx: bool,
    #[serde(default = "default_true")]
    pub pdf: bool,
}

impl Default for ExtractConfig {
    fn default() -> Self {
        Self {
            markdown_render: true,
            html_strip: true,
            docx: true,
            pdf: true,
        }
    }
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Base URL for the ollama and gemini providers.
    #[serde(default)]
    pub url: Option<String>,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: None,
            dims: None,
            batch_size: default_batch_size(),
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
            url: None,
        }
    }
}

fn default_provider() -> String {
    "local".to_string()
}
fn default_batch_size() -> usize {
    64
}
fn default_max_retries() -> u32 {
    5
}
fn default_timeout_secs() -> u64 {
    30
}

/// Hosted LLM used by the knowledge-graph pipeline.
#[derive(Debug, Deserialize, Clone)]
pub struct LlmConfig {
    #[serde(default = "default_llm_model")]
    pub model: String,
    #[serde(default = "default_llm_embedding_model")]
    pub embedding_model: String,
    #[serde(default = "default_llm_embedding_dims")]
    pub embedding_dims: usize,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_output_tokens")]
    pub max_output_tokens: u32,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_llm_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_gemini_url")]
    pub base_url: String,
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model: default_llm_model(),
            embedding_model: default_llm_embedding_model(),
            embedding_dims: default_llm_embedding_dims(),
            temperature: default_temperature(),
            max_output_tokens: default_max_output_tokens(),
            max_retries: default_max_retries(),
            timeout_secs: default_llm_timeout_secs(),
            base_url: default_gemini_url(),
            api_key_env: default_api_key_env(),
        }
    }
}

fn default_llm_model() -> String {
    "gemini-2.0-flash-exp".to_string()
}
fn default_llm_embedding_model() -> String {
    "models/text-embedding-004".to_string()
}
fn default_llm_embedding_dims() -> usize {
    768
}
fn default_temperature() -> f32 {
    0.7
}
fn default_max_output_tokens() -> u32 {
    4096
}
fn default_llm_timeout_secs() -> u64 {
    120
}
pub(crate) fn default_gemini_url() -> String {
    "https://generativelanguage.googleapis.com/v1beta".to_string()
}
fn default_api_key_env() -> String {
    "GOOGLE_API_KEY".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct GithubConfig {
    #[serde(default = "default_github_api_url")]
    pub api_url: String,
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,
    #[serde(default = "default_exclude_patterns")]
    pub exclude_patterns: Vec<String>,
    #[serde(default = "default_max_file_bytes")]
    pub max_file_bytes: u64,
    #[serde(default = "default_min_content_chars")]
    pub min_content_chars: usize,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for GithubConfig {
    fn default() -> Self {
        Self {
            api_url: default_github_api_url(),
            extensions: default_extensions(),
            exclude_patterns: default_exclude_patterns(),
            max_file_bytes: default_max_file_bytes(),
            min_content_chars: default_min_content_chars(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_github_api_url() -> String {
    "https://api.github.com".to_string()
}
fn default_extensions() -> Vec<String> {
    [
        ".py", ".js", ".jsx", ".ts", ".tsx", ".md", ".txt", ".java", ".cpp", ".c", ".go", ".rs",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}
fn default_exclude_patterns() -> Vec<String> {
    [
        "node_modules/",
        "venv/",
        ".venv/",
        "__pycache__/",
        "dist/",
        "build/",
        ".git/",
        "vendor/",
        "target/",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}
fn default_max_file_bytes() -> u64 {
    1_000_000
}
fn default_min_content_chars() -> usize {
    10
}

/// Vision-language OCR fallback for scanned PDF pages. Disabled unless a
/// model is named.
#[derive(Debug, Deserialize, Clone)]
pub struct OcrConfig {
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default = "default_ollama_url")]
    pub url: String,
    #[serde(default = "default_target_size")]
    pub target_size: u32,
    #[serde(default = "default_max_output_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_llm_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            model: None,
            url: default_ollama_url(),
            target_size: default_target_size(),
            max_tokens: default_max_output_tokens(),
            timeout_secs: default_llm_timeout_secs(),
        }
    }
}

fn default_ollama_url() -> String {
    "http://localhost:11434".to_string()
}
fn default_target_size() -> u32 {
    896
}

#[derive(Debug, Deserialize, Clone)]
pub struct GraphConfig {
    #[serde(default = "default_graph_chunk_tokens")]
    pub chunk_token_size: usize,
    #[serde(default = "default_graph_overlap_tokens")]
    pub chunk_overlap_token_size: usize,
    #[serde(default = "default_max_token_size")]
    pub max_token_size: usize,
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            chunk_token_size: default_graph_chunk_tokens(),
            chunk_overlap_token_size: default_graph_overlap_tokens(),
            max_token_size: default_max_token_size(),
            top_k: default_top_k(),
        }
    }
}

fn default_graph_chunk_tokens() -> usize {
    1200
}
fn default_graph_overlap_tokens() -> usize {
    100
}
fn default_max_token_size() -> usize {
    8192
}
fn default_top_k() -> usize {
    10
}

impl EmbeddingConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

/// Load the config file at `path`, or the defaults when the file does not
/// exist. A file that exists but fails to parse or validate is an error.
pub fn load_or_default(path: &Path) -> Result<Config> {
    if path.exists() {
        load_config(path)
    } else {
        let config = Config::default();
        validate(&config)?;
        Ok(config)
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

pub fn validate(config: &Config) -> Result<()> {
    if config.chunking.chunk_size == 0 {
        anyhow::bail!("chunking.chunk_size must be > 0");
    }
    if config.chunking.chunk_overlap >= config.chunking.chunk_size {
        anyhow::bail!("chunking.chunk_overlap must be smaller than chunking.chunk_size");
    }

    if config.embedding.dims == Some(0) {
        anyhow::bail!("embedding.dims must be > 0 when set");
    }
    match config.embedding.provider.as_str() {
        "disabled" | "local" | "openai" | "ollama" | "gemini" => {}
        other => anyhow::bail!(
            "Unknown embedding provider: '{}'. Must be disabled, local, openai, ollama, or gemini.",
            other
        ),
    }

    if config.graph.chunk_overlap_token_size >= config.graph.chunk_token_size {
        anyhow::bail!("graph.chunk_overlap_token_size must be smaller than graph.chunk_token_size");
    }
    if config.graph.top_k == 0 {
        anyhow::bail!("graph.top_k must be >= 1");
    }
    if config.llm.embedding_dims == 0 {
        anyhow::bail!("llm.embedding_dims must be > 0");
    }
    if config.ocr.target_size == 0 {
        anyhow::bail!("ocr.target_size must be > 0");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = Config::default();
        validate(&config).unwrap();
        assert_eq!(config.chunking.chunk_size, 1000);
        assert_eq!(config.chunking.chunk_overlap, 200);
        assert_eq!(config.github.max_file_bytes, 1_000_000);
        assert_eq!(config.ocr.target_size, 896);
        assert!(config.ocr.model.is_none());
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let config: Config = toml::from_str(
            r#"
[chunking]
chunk_size = 500

[github]
exclude_patterns = ["docs/"]
"#,
        )
        .unwrap();
        assert_eq!(config.chunking.chunk_size, 500);
        assert_eq!(config.chunking.chunk_overlap, 200);
        assert_eq!(config.github.exclude_patterns, vec!["docs/".to_string()]);
        assert_eq!(config.github.extensions.len(), 12);
        assert_eq!(config.llm.model, "gemini-2.0-flash-exp");
    }

    #[test]
    fn overlap_must_be_smaller_than_size() {
        let mut config = Config::default();
        config.chunking.chunk_overlap = config.chunking.chunk_size;
        assert!(validate(&config).is_err());
    }

    #[test]
    fn unknown_provider_rejected() {
        let mut config = Config::default();
        config.embedding.provider = "word2vec".to_string();
        let err = validate(&config).unwrap_err();
        assert!(err.to_string().contains("word2vec"));
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let config = load_or_default(Path::new("/definitely/not/here/prag.toml")).unwrap();
        assert_eq!(config.embedding.provider, "local");
    }
}
