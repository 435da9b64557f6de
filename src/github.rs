//! GitHub repository harvester.
//!
//! Reads a repository's files over the REST contents API without cloning.
//! Paths containing any excluded substring are skipped, as are files with
//! an unlisted extension, files over the byte limit, undecodable (binary)
//! files, and near-empty files. A synthetic overview document (repository
//! summary plus README when present) is placed first.
//!
//! Unauthenticated requests are limited to 60 per hour by GitHub. Nothing
//! here throttles or retries around that limit; the transport error is
//! logged like any other per-item failure.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use base64::Engine;
use reqwest::Url;
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::config::GithubConfig;
use crate::models::{Document, DocumentMetadata, SourceType};

const PER_PAGE: usize = 100;

#[derive(Debug, Deserialize)]
struct RepoInfo {
    full_name: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    stargazers_count: u64,
    #[serde(default)]
    language: Option<String>,
    #[serde(default)]
    topics: Vec<String>,
    html_url: String,
}

#[derive(Debug, Clone, Deserialize)]
struct ContentEntry {
    path: String,
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    size: u64,
    #[serde(default)]
    sha: Option<String>,
    #[serde(default)]
    html_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FileContent {
    path: String,
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RepoSummary {
    full_name: String,
}

pub struct GithubClient {
    client: reqwest::Client,
    api_url: Url,
    token: Option<String>,
    config: GithubConfig,
}

impl GithubClient {
    pub fn new(config: &GithubConfig, token: Option<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(concat!("portfolio-rag/", env!("CARGO_PKG_VERSION")))
            .build()?;
        let api_url = Url::parse(config.api_url.trim_end_matches('/'))
            .with_context(|| format!("Invalid GitHub API URL: {}", config.api_url))?;
        if api_url.cannot_be_a_base() {
            bail!("Invalid GitHub API URL: {}", config.api_url);
        }
        let token = token.filter(|t| !t.trim().is_empty());
        if token.is_some() {
            info!("using authenticated GitHub API");
        } else {
            info!("using unauthenticated GitHub API (60 requests/hour limit)");
        }
        Ok(Self {
            client,
            api_url,
            token,
            config: config.clone(),
        })
    }

    /// API URL with each segment appended percent-encoded, so `#`, `?`,
    /// `%` and spaces in repository paths stay part of the path.
    fn endpoint<'s>(&self, segments: impl IntoIterator<Item = &'s str>) -> Url {
        let mut url = self.api_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty()
                .extend(segments.into_iter().filter(|s| !s.is_empty()));
        }
        url
    }

    fn contents_url(&self, repo: &str, path: &str) -> Url {
        self.endpoint(
            ["repos"]
                .into_iter()
                .chain(repo.split('/'))
                .chain(["contents"])
                .chain(path.split('/')),
        )
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: Url) -> Result<T> {
        let path = url.path().to_string();
        let mut request = self
            .client
            .get(url.clone())
            .header("Accept", "application/vnd.github+json");
        if let Some(token) = &self.token {
            request = request.header("Authorization", format!("Bearer {}", token));
        }
        let response = request
            .send()
            .await
            .with_context(|| format!("GitHub request failed: {}", url))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!("GitHub API error {} for {}: {}", status, path, body);
        }
        response
            .json()
            .await
            .with_context(|| format!("Invalid GitHub response for {}", path))
    }

    /// All public repositories of `user` as `owner/repo`, across every page.
    pub async fn list_user_repos(&self, user: &str) -> Result<Vec<String>> {
        info!(user, "fetching repositories");
        let mut names = Vec::new();
        let mut page = 1;
        loop {
            let batch: Vec<RepoSummary> = self
                .get_json({
                    let mut url = self.endpoint(["users", user, "repos"]);
                    url.query_pairs_mut()
                        .append_pair("type", "public")
                        .append_pair("per_page", &PER_PAGE.to_string())
                        .append_pair("page", &page.to_string());
                    url
                })
                .await?;
            let done = batch.len() < PER_PAGE;
            for repo in batch {
                debug!(repo = %repo.full_name, "found repository");
                names.push(repo.full_name);
            }
            if done {
                break;
            }
            page += 1;
        }
        info!(user, count = names.len(), "found public repositories");
        Ok(names)
    }

    /// Harvest one `owner/repo`. Per-file and per-directory failures are
    /// logged and skipped; failing to read the repository itself is an error.
    pub async fn harvest_repo(&self, repo: &str) -> Result<Vec<Document>> {
        validate_repo_name(repo)?;
        info!(repo, "fetching repository");

        let info: RepoInfo = self
            .get_json(self.endpoint(["repos"].into_iter().chain(repo.split('/'))))
            .await?;
        let root = self.list_dir(repo, "").await?;

        let mut documents = Vec::new();
        self.collect_files(repo, &info.html_url, root, &mut documents)
            .await;
        info!(repo, files = documents.len(), "processed repository files");

        documents.insert(0, self.overview_document(repo, &info).await);
        Ok(documents)
    }

    async fn list_dir(&self, repo: &str, path: &str) -> Result<Vec<ContentEntry>> {
        self.get_json(self.contents_url(repo, path)).await
    }

    /// Depth-first walk. Results go into `acc` in listing order.
    fn collect_files<'a>(
        &'a self,
        repo: &'a str,
        repo_url: &'a str,
        entries: Vec<ContentEntry>,
        acc: &'a mut Vec<Document>,
    ) -> Pin<Box<dyn Future<Output = ()> + Send + 'a>> {
        Box::pin(async move {
            for entry in entries {
                let is_dir = entry.kind == "dir";
                if is_excluded(&entry.path, is_dir, &self.config.exclude_patterns) {
                    debug!(path = %entry.path, "skipping excluded path");
                    continue;
                }

                if is_dir {
                    match self.list_dir(repo, &entry.path).await {
                        Ok(children) => self.collect_files(repo, repo_url, children, acc).await,
                        Err(e) => warn!(path = %entry.path, error = %e, "error accessing directory"),
                    }
                    continue;
                }
                if entry.kind != "file"
                    || !has_allowed_extension(&entry.path, &self.config.extensions)
                {
                    continue;
                }
                if entry.size > self.config.max_file_bytes {
                    warn!(path = %entry.path, size = entry.size, "skipping large file");
                    continue;
                }

                match self.fetch_file(repo, &entry.path).await {
                    Ok(Some(text)) => {
                        if text.len() as u64 > self.config.max_file_bytes {
                            warn!(path = %entry.path, "skipping large file");
                            continue;
                        }
                        if non_whitespace_chars(&text) < self.config.min_content_chars {
                            continue;
                        }
                        let mut metadata = DocumentMetadata::repository(
                            entry.path.as_str(),
                            SourceType::GithubFile,
                            repo,
                            repo_url,
                        );
                        metadata.file_url = entry.html_url.clone();
                        metadata.file_size = Some(entry.size);
                        metadata.sha = entry.sha.clone();
                        info!(path = %entry.path, bytes = entry.size, "processed file");
                        acc.push(Document { text, metadata });
                    }
                    Ok(None) => warn!(path = %entry.path, "skipping binary file"),
                    Err(e) => warn!(path = %entry.path, error = %e, "error processing file"),
                }
            }
        })
    }

    /// Decoded UTF-8 content, or `None` when the file is not valid UTF-8.
    async fn fetch_file(&self, repo: &str, path: &str) -> Result<Option<String>> {
        let file: FileContent = self.get_json(self.contents_url(repo, path)).await?;
        let bytes = decode_content(file.content.as_deref().unwrap_or_default())?;
        Ok(String::from_utf8(bytes).ok())
    }

    async fn readme(&self, repo: &str) -> Result<(String, String)> {
        let file: FileContent = self
            .get_json(
                self.endpoint(
                    ["repos"]
                        .into_iter()
                        .chain(repo.split('/'))
                        .chain(["readme"]),
                ),
            )
            .await?;
        let bytes = decode_content(file.content.as_deref().unwrap_or_default())?;
        let text = String::from_utf8(bytes).map_err(|_| anyhow!("README is not UTF-8"))?;
        Ok((file.path, text))
    }

    async fn overview_document(&self, repo: &str, info: &RepoInfo) -> Document {
        let summary = format_overview(info);
        let (source_file, text) = match self.readme(repo).await {
            Ok((path, readme)) => {
                info!(repo, "added README");
                (path, format!("{}\n\n{}", summary, readme))
            }
            Err(e) => {
                warn!(repo, error = %e, "could not fetch README");
                ("README".to_string(), summary)
            }
        };
        Document {
            text,
            metadata: DocumentMetadata::repository(
                source_file,
                SourceType::GithubReadme,
                repo,
                &info.html_url,
            ),
        }
    }
}

fn format_overview(info: &RepoInfo) -> String {
    let topics = if info.topics.is_empty() {
        "None".to_string()
    } else {
        info.topics.join(", ")
    };
    format!(
        "Repository: {}\nDescription: {}\nStars: {}\nLanguage: {}\nTopics: {}\nURL: {}",
        info.full_name,
        info.description.as_deref().unwrap_or("No description"),
        info.stargazers_count,
        info.language.as_deref().unwrap_or("Multiple"),
        topics,
        info.html_url,
    )
}

/// Base64 payload from the contents API; GitHub wraps it at 60 columns.
fn decode_content(content: &str) -> Result<Vec<u8>> {
    let compact: String = content.chars().filter(|c| !c.is_whitespace()).collect();
    base64::engine::general_purpose::STANDARD
        .decode(compact)
        .map_err(|e| anyhow!("invalid base64 content: {}", e))
}

fn validate_repo_name(repo: &str) -> Result<()> {
    match repo.split_once('/') {
        Some((owner, name)) if !owner.is_empty() && !name.is_empty() && !name.contains('/') => {
            Ok(())
        }
        _ => bail!("Invalid repository '{}': expected owner/repo", repo),
    }
}

/// A path is excluded when it contains any pattern. Directories are also
/// tested with a trailing `/`, so `build/` matches the directory `build`.
pub fn is_excluded(path: &str, is_dir: bool, patterns: &[String]) -> bool {
    let dir_path = if is_dir {
        Some(format!("{}/", path))
    } else {
        None
    };
    patterns.iter().any(|p| {
        path.contains(p.as_str()) || dir_path.as_deref().is_some_and(|d| d.contains(p.as_str()))
    })
}

pub fn has_allowed_extension(path: &str, extensions: &[String]) -> bool {
    extensions.iter().any(|ext| path.ends_with(ext.as_str()))
}

fn non_whitespace_chars(text: &str) -> usize {
    text.chars().filter(|c| !c.is_whitespace()).count()
}
