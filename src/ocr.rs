//! PDF text extraction with a vision-model fallback for scanned pages.
//!
//! Each page is first read from its text layer. A page whose text layer is
//! blank is rasterized (its largest embedded image, scaled so the longest
//! side equals the configured target size) and sent to a [`VisionModel`]
//! with a fixed transcription prompt.
//!
//! Output format, one block per page, blocks joined by a blank line:
//!
//! ```text
//! === Page 1 ===
//! <text>
//! ```
//!
//! An OCR failure on a page produces `[No text content]` for that page. A
//! page that cannot be rasterized (no embedded image, undecodable image) is
//! dropped, as is a page whose OCR call succeeds but returns nothing.
//! Without a vision model scanned pages are dropped silently.

use std::io::Cursor;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use base64::Engine;
use tracing::{debug, info, warn};

use crate::config::OcrConfig;
use crate::extract::ExtractError;

/// Instruction sent with every page image.
pub const OCR_PROMPT: &str = "Extract all text from this document image in reading order. Output only the text content, not layout coordinates.";

const NO_TEXT_PLACEHOLDER: &str = "[No text content]";

/// A vision-language model that transcribes one page image.
#[async_trait]
pub trait VisionModel: Send + Sync {
    fn name(&self) -> &str;

    /// Generate text for a PNG-encoded page image.
    async fn generate(&self, png: &[u8], prompt: &str) -> Result<String>;
}

/// Vision model served by Ollama's `/api/generate` endpoint.
///
/// Decoding is greedy: temperature 0 and top-k 1.
pub struct OllamaVision {
    client: reqwest::Client,
    url: String,
    model: String,
    max_tokens: u32,
}

impl OllamaVision {
    pub fn new(url: &str, model: &str, max_tokens: u32, timeout_secs: u64) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;
        Ok(Self {
            client,
            url: url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            max_tokens,
        })
    }
}

#[async_trait]
impl VisionModel for OllamaVision {
    fn name(&self) -> &str {
        &self.model
    }

    async fn generate(&self, png: &[u8], prompt: &str) -> Result<String> {
        let body = serde_json::json!({
            "model": self.model,
            "prompt": prompt,
            "images": [base64::engine::general_purpose::STANDARD.encode(png)],
            "stream": false,
            "options": {
                "num_predict": self.max_tokens,
                "temperature": 0,
                "top_k": 1,
            },
        });

        let response = self
            .client
            .post(format!("{}/api/generate", self.url))
            .json(&body)
            .send()
            .await
            .with_context(|| format!("Vision model unreachable at {}", self.url))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            bail!("Vision model error {}: {}", status, text);
        }

        let json: serde_json::Value = response.json().await?;
        json.get("response")
            .and_then(|r| r.as_str())
            .map(str::to_string)
            .ok_or_else(|| anyhow!("Invalid vision model response: missing response field"))
    }
}

/// Strip the echoed prompt wrapper and special tokens from raw model output.
pub fn clean_generation(raw: &str, prompt: &str) -> String {
    let echoed = format!("<s>{} <Answer/>", prompt);
    raw.replace(&echoed, "")
        .replace("<pad>", "")
        .replace("</s>", "")
        .trim()
        .to_string()
}

/// PDF reader that falls back to OCR for pages without a text layer.
#[derive(Clone)]
pub struct PdfParser {
    vision: Option<Arc<dyn VisionModel>>,
    target_size: u32,
    name: String,
}

impl PdfParser {
    /// Text layer only; scanned pages are dropped.
    pub fn text_only() -> Self {
        Self {
            vision: None,
            target_size: 896,
            name: "pdf-text".to_string(),
        }
    }

    pub fn with_vision(vision: Arc<dyn VisionModel>, target_size: u32) -> Self {
        let name = format!("pdf-text+ocr:{}", vision.name());
        Self {
            vision: Some(vision),
            target_size,
            name,
        }
    }

    /// Build from `[ocr]`. No model configured means text layer only.
    pub fn from_config(config: &OcrConfig) -> Result<Self> {
        match &config.model {
            Some(model) => {
                info!(model = %model, url = %config.url, "OCR fallback enabled");
                let vision = OllamaVision::new(
                    &config.url,
                    model,
                    config.max_tokens,
                    config.timeout_secs,
                )?;
                Ok(Self::with_vision(Arc::new(vision), config.target_size))
            }
            None => {
                info!("no OCR model configured; scanned PDF pages will be skipped");
                Ok(Self::text_only())
            }
        }
    }

    pub fn parser_name(&self) -> &str {
        &self.name
    }

    pub async fn parse_file(&self, path: &Path) -> Result<String, ExtractError> {
        let bytes = tokio::fs::read(path).await?;
        self.parse_bytes(bytes).await
    }

    pub async fn parse_bytes(&self, bytes: Vec<u8>) -> Result<String, ExtractError> {
        let bytes = Arc::new(bytes);

        let layer = {
            let bytes = Arc::clone(&bytes);
            tokio::task::spawn_blocking(move || pdf_extract::extract_text_from_mem_by_pages(&bytes))
                .await
                .map_err(|e| ExtractError::Pdf(format!("text extraction panicked: {}", e)))?
        };

        let page_texts = match layer {
            Ok(pages) => pages,
            Err(e) if self.vision.is_some() => {
                warn!(error = %e, "text layer unreadable; treating every page as scanned");
                let count = count_pages(Arc::clone(&bytes)).await?;
                vec![String::new(); count]
            }
            Err(e) => return Err(ExtractError::Pdf(e.to_string())),
        };

        let scanned: Vec<usize> = page_texts
            .iter()
            .enumerate()
            .filter(|(_, t)| t.trim().is_empty())
            .map(|(i, _)| i)
            .collect();

        let mut ocr_pages = std::collections::HashMap::new();
        if let Some(vision) = &self.vision {
            if !scanned.is_empty() {
                info!(pages = scanned.len(), "running OCR on pages without a text layer");
                let images = rasterize_pages(Arc::clone(&bytes), scanned.clone(), self.target_size).await?;
                for (index, image) in images {
                    let page = index + 1;
                    let png = match image {
                        Ok(png) => png,
                        Err(e) => {
                            warn!(page, error = %e, "could not rasterize page; dropping it");
                            continue;
                        }
                    };
                    let text = match vision.generate(&png, OCR_PROMPT).await {
                        Ok(raw) => Some(clean_generation(&raw, OCR_PROMPT)),
                        Err(e) => {
                            warn!(page, error = %e, "OCR failed");
                            None
                        }
                    };
                    ocr_pages.insert(index, text);
                }
            }
        } else if !scanned.is_empty() {
            debug!(pages = scanned.len(), "skipping pages without a text layer");
        }

        let mut blocks = Vec::new();
        for (index, text) in page_texts.iter().enumerate() {
            let page = index + 1;
            let trimmed = text.trim();
            if !trimmed.is_empty() {
                blocks.push(page_block(page, trimmed));
                continue;
            }
            match ocr_pages.remove(&index) {
                Some(Some(ocr)) if !ocr.is_empty() => blocks.push(page_block(page, &ocr)),
                Some(Some(_)) => debug!(page, "OCR returned no text"),
                Some(None) => blocks.push(page_block(page, NO_TEXT_PLACEHOLDER)),
                None => {}
            }
        }

        Ok(blocks.join("\n\n"))
    }
}

fn page_block(page: usize, text: &str) -> String {
    format!("=== Page {} ===\n{}", page, text)
}

async fn count_pages(bytes: Arc<Vec<u8>>) -> Result<usize, ExtractError> {
    tokio::task::spawn_blocking(move || {
        lopdf::Document::load_mem(&bytes)
            .map(|doc| doc.get_pages().len())
            .map_err(|e| ExtractError::Pdf(e.to_string()))
    })
    .await
    .map_err(|e| ExtractError::Pdf(e.to_string()))?
}

type PageImage = (usize, Result<Vec<u8>>);

/// Render the requested zero-based pages to PNG. The document is parsed
/// once; each page gets its own result.
async fn rasterize_pages(
    bytes: Arc<Vec<u8>>,
    pages: Vec<usize>,
    target_size: u32,
) -> Result<Vec<PageImage>, ExtractError> {
    tokio::task::spawn_blocking(move || {
        let doc = match lopdf::Document::load_mem(&bytes) {
            Ok(doc) => doc,
            Err(e) => {
                let msg = e.to_string();
                return pages
                    .into_iter()
                    .map(|i| (i, Err(anyhow!("PDF structure unreadable: {}", msg))))
                    .collect();
            }
        };
        let page_ids: Vec<lopdf::ObjectId> = doc.get_pages().into_values().collect();
        pages
            .into_iter()
            .map(|index| {
                let result = page_ids
                    .get(index)
                    .ok_or_else(|| anyhow!("page {} out of range", index + 1))
                    .and_then(|id| render_page(&doc, *id, target_size));
                (index, result)
            })
            .collect()
    })
    .await
    .map_err(|e| ExtractError::Pdf(format!("rasterization panicked: {}", e)))
}

fn render_page(doc: &lopdf::Document, page_id: lopdf::ObjectId, target_size: u32) -> Result<Vec<u8>> {
    let images = doc
        .get_page_images(page_id)
        .map_err(|e| anyhow!("could not read page images: {}", e))?;
    let largest = images
        .iter()
        .max_by_key(|img| img.width * img.height)
        .ok_or_else(|| anyhow!("page has neither text nor images"))?;

    let filters = largest.filters.clone().unwrap_or_default();
    let decoded = if filters.iter().any(|f| f == "DCTDecode" || f == "JPXDecode") {
        image::load_from_memory(largest.content)?
    } else if filters.is_empty() {
        raw_pixels_to_image(
            largest.content.to_vec(),
            largest.width as u32,
            largest.height as u32,
            largest.color_space.as_deref(),
        )?
    } else {
        let raw = doc
            .get_object(largest.id)
            .and_then(|obj| obj.as_stream())
            .map_err(|e| anyhow!("image stream missing: {}", e))?
            .decompressed_content()
            .map_err(|e| anyhow!("could not decompress image: {}", e))?;
        raw_pixels_to_image(
            raw,
            largest.width as u32,
            largest.height as u32,
            largest.color_space.as_deref(),
        )?
    };

    encode_scaled_png(&decoded, target_size)
}

fn raw_pixels_to_image(
    raw: Vec<u8>,
    width: u32,
    height: u32,
    color_space: Option<&str>,
) -> Result<image::DynamicImage> {
    let image = match color_space {
        Some("DeviceGray") | Some("CalGray") => image::GrayImage::from_raw(width, height, raw)
            .map(image::DynamicImage::ImageLuma8),
        _ => image::RgbImage::from_raw(width, height, raw).map(image::DynamicImage::ImageRgb8),
    };
    image.ok_or_else(|| anyhow!("unsupported image layout ({}x{})", width, height))
}

/// Resize so the longest side equals `target_size` and encode as PNG.
pub fn encode_scaled_png(image: &image::DynamicImage, target_size: u32) -> Result<Vec<u8>> {
    let resized = image.resize(
        target_size,
        target_size,
        image::imageops::FilterType::Triangle,
    );
    let mut out = Vec::new();
    resized.write_to(&mut Cursor::new(&mut out), image::ImageFormat::Png)?;
    Ok(out)
}
