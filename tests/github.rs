//! Harvester tests against an in-process mock of the GitHub REST API.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use base64::Engine;
use serde_json::{json, Value};

use portfolio_rag::config::{Config, GithubConfig};
use portfolio_rag::github::GithubClient;
use portfolio_rag::ingest::{harvest_github, resolve_repos, GithubOptions};
use portfolio_rag::models::SourceType;

#[derive(Clone, Default)]
struct Mock {
    requests: Arc<Mutex<Vec<String>>>,
}

impl Mock {
    fn record(&self, path: String) {
        self.requests.lock().unwrap().push(path);
    }

    fn requested(&self, needle: &str) -> bool {
        self.requests.lock().unwrap().iter().any(|p| p.contains(needle))
    }
}

fn encode(bytes: &[u8]) -> String {
    let b64 = base64::engine::general_purpose::STANDARD.encode(bytes);
    // The contents API wraps at 60 columns.
    b64.as_bytes()
        .chunks(60)
        .map(|c| String::from_utf8_lossy(c).to_string())
        .collect::<Vec<_>>()
        .join("\n")
}

fn file_entry(path: &str, size: u64) -> Value {
    json!({
        "path": path,
        "type": "file",
        "size": size,
        "sha": format!("sha-{}", path),
        "html_url": format!("https://github.com/octo/site/blob/main/{}", path),
    })
}

fn dir_entry(path: &str) -> Value {
    json!({"path": path, "type": "dir", "size": 0})
}

async fn repo_info(
    State(mock): State<Mock>,
    Path((owner, repo)): Path<(String, String)>,
) -> Response {
    mock.record(format!("/repos/{}/{}", owner, repo));
    if repo == "missing" {
        return StatusCode::NOT_FOUND.into_response();
    }
    let description = if repo == "site" {
        Value::from("Personal website")
    } else {
        Value::Null
    };
    Json(json!({
        "full_name": format!("{}/{}", owner, repo),
        "description": description,
        "stargazers_count": 42,
        "language": "Rust",
        "topics": ["portfolio", "web"],
        "html_url": format!("https://github.com/{}/{}", owner, repo),
    }))
    .into_response()
}

async fn root_listing(
    State(mock): State<Mock>,
    Path((owner, repo)): Path<(String, String)>,
) -> Json<Value> {
    mock.record(format!("/repos/{}/{}/contents", owner, repo));
    if repo == "bare" {
        return Json(json!([file_entry("notes.txt", 60)]));
    }
    if repo == "odd" {
        return Json(json!([dir_entry("docs")]));
    }
    Json(json!([
        file_entry("README.md", 40),
        dir_entry("src"),
        dir_entry("node_modules"),
        file_entry("big.rs", 2_000_000),
        file_entry("logo.png", 100),
        file_entry("tiny.txt", 2),
    ]))
}

async fn contents(
    State(mock): State<Mock>,
    Path((owner, repo, path)): Path<(String, String, String)>,
) -> Response {
    mock.record(format!("/repos/{}/{}/contents/{}", owner, repo, path));
    match path.as_str() {
        "src" => Json(json!([file_entry("src/main.rs", 60), file_entry("src/blob.py", 4)]))
            .into_response(),
        "docs" => Json(json!([
            file_entry("docs/a#b.md", 40),
            file_entry("docs/what?.md", 40),
            file_entry("docs/100%.md", 40),
            file_entry("docs/release notes.md", 40),
        ]))
        .into_response(),
        "docs/a" => file_response(&path, b"Wrong file: fragment was dropped."),
        "docs/a#b.md" => file_response(&path, b"Notes on sharp and flat keys."),
        "docs/what?.md" => file_response(&path, b"Frequently asked questions."),
        "docs/100%.md" => file_response(&path, b"Full coverage report for the parser."),
        "docs/release notes.md" => file_response(&path, b"Release notes for version two."),
        "README.md" => file_response(&path, b"# Site\n\nPersonal website source."),
        "src/main.rs" => file_response(&path, b"fn main() {\n    println!(\"hello portfolio\");\n}\n"),
        "src/blob.py" => file_response(&path, &[0xff, 0xfe, 0x00, 0x81]),
        "tiny.txt" => file_response(&path, b"hi"),
        "notes.txt" => file_response(&path, b"Design notes for a minimal static site generator."),
        _ => StatusCode::NOT_FOUND.into_response(),
    }
}

fn file_response(path: &str, bytes: &[u8]) -> Response {
    Json(json!({"path": path, "content": encode(bytes)})).into_response()
}

async fn readme(
    State(mock): State<Mock>,
    Path((owner, repo)): Path<(String, String)>,
) -> Response {
    mock.record(format!("/repos/{}/{}/readme", owner, repo));
    if repo != "site" {
        return StatusCode::NOT_FOUND.into_response();
    }
    Json(json!({"path": "README.md", "content": encode(b"# Site\n\nPersonal website source.")}))
        .into_response()
}

async fn user_repos(
    State(mock): State<Mock>,
    Path(user): Path<String>,
    Query(params): Query<HashMap<String, String>>,
) -> Json<Value> {
    let page: usize = params.get("page").and_then(|p| p.parse().ok()).unwrap_or(1);
    mock.record(format!("/users/{}/repos?page={}", user, page));
    assert_eq!(params.get("per_page").map(String::as_str), Some("100"));
    assert_eq!(params.get("type").map(String::as_str), Some("public"));

    if user == "small" {
        return Json(json!([{"full_name": "octo/site"}, {"full_name": "octo/bare"}]));
    }
    let names: Vec<Value> = match page {
        1 => (0..100).map(|i| json!({"full_name": format!("{}/repo-{}", user, i)})).collect(),
        2 => (100..103).map(|i| json!({"full_name": format!("{}/repo-{}", user, i)})).collect(),
        _ => Vec::new(),
    };
    Json(Value::Array(names))
}

async fn start_mock() -> (String, Mock) {
    let mock = Mock::default();
    let router = Router::new()
        .route("/repos/{owner}/{repo}", get(repo_info))
        .route("/repos/{owner}/{repo}/contents", get(root_listing))
        .route("/repos/{owner}/{repo}/contents/{*path}", get(contents))
        .route("/repos/{owner}/{repo}/readme", get(readme))
        .route("/users/{user}/repos", get(user_repos))
        .with_state(mock.clone());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    (format!("http://{}", addr), mock)
}

fn github_config(api_url: &str) -> GithubConfig {
    GithubConfig {
        api_url: api_url.to_string(),
        ..GithubConfig::default()
    }
}

#[tokio::test]
async fn harvest_filters_files_and_puts_overview_first() {
    let (url, mock) = start_mock().await;
    let client = GithubClient::new(&github_config(&url), None).unwrap();

    let docs = client.harvest_repo("octo/site").await.unwrap();
    let files: Vec<&str> = docs.iter().map(|d| d.metadata.source_file.as_str()).collect();
    assert_eq!(files, vec!["README.md", "README.md", "src/main.rs"]);

    let overview = &docs[0];
    assert_eq!(overview.metadata.source_type, SourceType::GithubReadme);
    assert!(overview.text.starts_with(
        "Repository: octo/site\nDescription: Personal website\nStars: 42\nLanguage: Rust\nTopics: portfolio, web\nURL: https://github.com/octo/site\n\n# Site"
    ));

    let main = &docs[2];
    assert_eq!(main.metadata.source_type, SourceType::GithubFile);
    assert_eq!(main.metadata.repo_name.as_deref(), Some("octo/site"));
    assert_eq!(main.metadata.repo_url.as_deref(), Some("https://github.com/octo/site"));
    assert_eq!(main.metadata.sha.as_deref(), Some("sha-src/main.rs"));
    assert_eq!(main.metadata.file_size, Some(60));
    assert!(main.text.contains("hello portfolio"));

    assert!(!mock.requested("node_modules"));
    assert!(!mock.requested("big.rs"));
    assert!(!mock.requested("logo.png"));
    assert!(mock.requested("tiny.txt"));
}

#[tokio::test]
async fn missing_readme_still_yields_overview() {
    let (url, _mock) = start_mock().await;
    let client = GithubClient::new(&github_config(&url), None).unwrap();

    let docs = client.harvest_repo("octo/bare").await.unwrap();
    assert_eq!(docs.len(), 2);
    assert_eq!(docs[0].metadata.source_file, "README");
    assert!(docs[0].text.contains("Description: No description"));
    assert!(!docs[0].text.contains("\n\n"));
    assert_eq!(docs[1].metadata.source_file, "notes.txt");
}

#[tokio::test]
async fn unreachable_repository_is_an_error() {
    let (url, _mock) = start_mock().await;
    let client = GithubClient::new(&github_config(&url), None).unwrap();
    assert!(client.harvest_repo("octo/missing").await.is_err());
    assert!(client.harvest_repo("not-a-repo").await.is_err());
}

#[tokio::test]
async fn user_repositories_are_paginated() {
    let (url, mock) = start_mock().await;
    let client = GithubClient::new(&github_config(&url), Some("token".to_string())).unwrap();

    let repos = client.list_user_repos("prolific").await.unwrap();
    assert_eq!(repos.len(), 103);
    assert_eq!(repos[0], "prolific/repo-0");
    assert_eq!(repos[102], "prolific/repo-102");
    assert!(mock.requested("page=2"));
    assert!(!mock.requested("page=3"));
}

#[tokio::test]
async fn explicit_and_user_repositories_are_merged_without_duplicates() {
    let (url, _mock) = start_mock().await;
    let client = GithubClient::new(&github_config(&url), None).unwrap();
    let options = GithubOptions {
        enabled: true,
        repos: vec!["octo/site".to_string()],
        user: Some("small".to_string()),
        token: None,
    };
    assert_eq!(
        resolve_repos(&client, &options).await,
        vec!["octo/site".to_string(), "octo/bare".to_string()]
    );

    let mut config = Config::default();
    config.github = github_config(&url);
    let harvested = harvest_github(&config, &options).await;
    let repos: Vec<&str> = harvested.iter().map(|h| h.repo.as_str()).collect();
    assert_eq!(repos, vec!["octo/site", "octo/bare"]);
    assert_eq!(harvested[0].documents.len(), 3);
}

#[tokio::test]
async fn reserved_characters_in_paths_are_percent_encoded() {
    let (url, mock) = start_mock().await;
    let client = GithubClient::new(&github_config(&url), None).unwrap();

    let docs = client.harvest_repo("octo/odd").await.unwrap();
    let files: Vec<&str> = docs.iter().map(|d| d.metadata.source_file.as_str()).collect();
    assert_eq!(
        files,
        vec![
            "README",
            "docs/a#b.md",
            "docs/what?.md",
            "docs/100%.md",
            "docs/release notes.md"
        ]
    );
    assert_eq!(docs[1].text, "Notes on sharp and flat keys.");
    assert_eq!(docs[2].text, "Frequently asked questions.");
    assert_eq!(docs[3].text, "Full coverage report for the parser.");
    assert_eq!(docs[4].text, "Release notes for version two.");
    assert!(mock.requested("/repos/octo/odd/contents/docs/a#b.md"));
    assert!(!mock.requests.lock().unwrap().iter().any(|p| p.ends_with("/contents/docs/a")));
}
