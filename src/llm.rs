//! Hosted text-generation backend for the knowledge-graph pipeline.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, info};

use crate::config::LlmConfig;
use crate::embedding::normalize_gemini_model;
use crate::http::post_json_with_retry;

const HARM_CATEGORIES: [&str; 4] = [
    "HARM_CATEGORY_HARASSMENT",
    "HARM_CATEGORY_HATE_SPEECH",
    "HARM_CATEGORY_SEXUALLY_EXPLICIT",
    "HARM_CATEGORY_DANGEROUS_CONTENT",
];

/// A text-generation model.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    fn model_name(&self) -> &str;

    /// Generate a completion for `prompt`, optionally steered by a system
    /// instruction.
    async fn complete(&self, prompt: &str, system_prompt: Option<&str>) -> Result<String>;
}

/// Gemini `generateContent` client.
///
/// Every request carries the configured temperature and output-token limit
/// and sets all four harm categories to `BLOCK_NONE`.
pub struct GeminiLlm {
    client: reqwest::Client,
    model: String,
    base_url: String,
    api_key: String,
    temperature: f32,
    max_output_tokens: u32,
    max_retries: u32,
}

impl GeminiLlm {
    /// Read the API key from the environment variable named in `config`.
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let api_key = std::env::var(&config.api_key_env)
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| anyhow!("{} not set", config.api_key_env))?;
        Self::with_key(config, api_key)
    }

    pub fn with_key(config: &LlmConfig, api_key: String) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        let model = normalize_gemini_model(&config.model);
        info!(model = %model, "initialized Gemini LLM");
        Ok(Self {
            client,
            model,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key,
            temperature: config.temperature,
            max_output_tokens: config.max_output_tokens,
            max_retries: config.max_retries,
        })
    }

    fn request_body(&self, prompt: &str, system_prompt: Option<&str>) -> serde_json::Value {
        let safety: Vec<serde_json::Value> = HARM_CATEGORIES
            .iter()
            .map(|category| serde_json::json!({"category": category, "threshold": "BLOCK_NONE"}))
            .collect();
        let mut body = serde_json::json!({
            "contents": [{ "role": "user", "parts": [{ "text": prompt }] }],
            "generationConfig": {
                "temperature": self.temperature,
                "maxOutputTokens": self.max_output_tokens,
            },
            "safetySettings": safety,
        });
        if let Some(system) = system_prompt {
            body["systemInstruction"] = serde_json::json!({ "parts": [{ "text": system }] });
        }
        body
    }
}

#[async_trait]
impl LanguageModel for GeminiLlm {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, prompt: &str, system_prompt: Option<&str>) -> Result<String> {
        let url = format!("{}/{}:generateContent", self.base_url, self.model);
        let body = self.request_body(prompt, system_prompt);
        debug!(model = %self.model, prompt_chars = prompt.len(), "generating");
        let json = post_json_with_retry(
            &self.client,
            &url,
            &[("x-goog-api-key", self.api_key.as_str())],
            &body,
            self.max_retries,
            "Gemini",
        )
        .await?;
        parse_generation(&json)
    }
}

/// Concatenate the text parts of the first candidate.
fn parse_generation(json: &serde_json::Value) -> Result<String> {
    let candidate = json
        .get("candidates")
        .and_then(|c| c.as_array())
        .and_then(|c| c.first())
        .ok_or_else(|| {
            let reason = json
                .pointer("/promptFeedback/blockReason")
                .and_then(|r| r.as_str())
                .unwrap_or("no candidates");
            anyhow!("Gemini returned no answer: {}", reason)
        })?;
    let parts = candidate
        .pointer("/content/parts")
        .and_then(|p| p.as_array())
        .ok_or_else(|| anyhow!("Invalid Gemini response: missing content parts"))?;
    Ok(parts
        .iter()
        .filter_map(|p| p.get("text").and_then(|t| t.as_str()))
        .collect::<String>())
}
