//! Per-format document readers.
//!
//! An [`Extractor`] turns one local file into zero or more [`Document`]s.
//! Which readers run is decided by an explicit [`Capabilities`] value handed
//! in at construction; a disabled reader behaves exactly like an unsupported
//! extension. Per-file failures are logged and produce no documents, so a
//! bad file never aborts a run.

use std::io::Read;
use std::path::Path;

use thiserror::Error;
use tracing::{error, info, warn};

use crate::config::ExtractConfig;
use crate::models::{Document, DocumentMetadata, SourceType};
use crate::ocr::PdfParser;

/// Texts at or below this many characters (after trimming) are discarded.
pub const MIN_TEXT_CHARS: usize = 40;

/// Maximum decompressed bytes to read from a single ZIP entry (zip-bomb protection).
const MAX_XML_ENTRY_BYTES: u64 = 50 * 1024 * 1024;

/// File extensions the local pipeline looks at.
pub const SUPPORTED_EXTENSIONS: [&str; 5] = ["md", "markdown", "txt", "docx", "pdf"];

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("PDF extraction failed: {0}")]
    Pdf(String),
    #[error("OOXML extraction failed: {0}")]
    Ooxml(String),
}

/// Which optional readers are available.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    /// Render Markdown to HTML before stripping.
    pub markdown_render: bool,
    /// Strip HTML tags down to text nodes.
    pub html_strip: bool,
    pub docx: bool,
    pub pdf: bool,
}

impl Capabilities {
    pub fn all() -> Self {
        Self {
            markdown_render: true,
            html_strip: true,
            docx: true,
            pdf: true,
        }
    }

    pub fn from_config(config: &ExtractConfig) -> Self {
        Self {
            markdown_render: config.markdown_render,
            html_strip: config.html_strip,
            docx: config.docx,
            pdf: config.pdf,
        }
    }
}

impl Default for Capabilities {
    fn default() -> Self {
        Self::all()
    }
}

/// The reader chosen for a file, by extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Markdown,
    Text,
    Docx,
    Pdf,
}

impl FileKind {
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "md" | "markdown" => Some(FileKind::Markdown),
            "txt" => Some(FileKind::Text),
            "docx" => Some(FileKind::Docx),
            "pdf" => Some(FileKind::Pdf),
            _ => None,
        }
    }
}

pub struct Extractor {
    caps: Capabilities,
    pdf: PdfParser,
}

impl Extractor {
    pub fn new(caps: Capabilities, pdf: PdfParser) -> Self {
        if !caps.markdown_render {
            warn!("markdown rendering disabled; .md files will be processed as plain text");
        }
        if !caps.html_strip {
            warn!("HTML stripping disabled; rendered markdown falls back to raw text");
        }
        if !caps.docx {
            warn!("docx reader disabled; .docx files will not be processed");
        }
        if !caps.pdf {
            warn!("pdf reader disabled; .pdf files will not be processed");
        }
        Self { caps, pdf }
    }

    pub fn capabilities(&self) -> Capabilities {
        self.caps
    }

    /// Extract documents from one file. Never fails: errors are logged and
    /// yield an empty list.
    pub async fn extract_file(
        &self,
        path: &Path,
        document_id: &str,
        content_hash: &str,
    ) -> Vec<Document> {
        let Some(kind) = FileKind::from_path(path) else {
            return Vec::new();
        };
        let source_file = path.display().to_string();

        let result = match kind {
            FileKind::Markdown => {
                info!(file = %source_file, "processing markdown file");
                self.extract_markdown(path)
                    .map(|text| (text, SourceType::MarkdownText))
            }
            FileKind::Text => {
                info!(file = %source_file, "processing text file");
                extract_plain_text(path).map(|text| (text, SourceType::TextFile))
            }
            FileKind::Docx => {
                if !self.caps.docx {
                    return Vec::new();
                }
                info!(file = %source_file, "processing word document");
                std::fs::read(path)
                    .map_err(ExtractError::from)
                    .and_then(|bytes| extract_docx(&bytes))
                    .map(|text| (text, SourceType::DocxText))
            }
            FileKind::Pdf => {
                if !self.caps.pdf {
                    return Vec::new();
                }
                info!(file = %source_file, "processing pdf document");
                return self.extract_pdf(path, &source_file, document_id, content_hash).await;
            }
        };

        match result {
            Ok((text, source_type)) => {
                if !keep_text(&text, source_type) {
                    return Vec::new();
                }
                vec![Document {
                    text,
                    metadata: DocumentMetadata::local(
                        source_file,
                        source_type,
                        document_id,
                        content_hash,
                    ),
                }]
            }
            Err(e) => {
                error!(file = %source_file, error = %e, "error processing file");
                Vec::new()
            }
        }
    }

    fn extract_markdown(&self, path: &Path) -> Result<String, ExtractError> {
        let markdown = std::fs::read_to_string(path)?;
        if !self.caps.markdown_render || !self.caps.html_strip {
            return Ok(markdown);
        }
        let html = markdown_to_html(&markdown);
        Ok(html_to_text(&html))
    }

    async fn extract_pdf(
        &self,
        path: &Path,
        source_file: &str,
        document_id: &str,
        content_hash: &str,
    ) -> Vec<Document> {
        let text = match self.pdf.parse_file(path).await {
            Ok(text) => text,
            Err(e) => {
                error!(file = %source_file, error = %e, "error processing pdf");
                return Vec::new();
            }
        };
        if text.trim().chars().count() <= MIN_TEXT_CHARS {
            warn!(file = %source_file, "no text content found in pdf");
            return Vec::new();
        }
        let num_pages = count_page_markers(&text);
        info!(file = %source_file, pages = num_pages, "extracted pdf text");

        let mut metadata =
            DocumentMetadata::local(source_file, SourceType::PdfText, document_id, content_hash);
        metadata.num_pages = Some(num_pages);
        metadata.parser = Some(self.pdf.parser_name().to_string());
        vec![Document { text, metadata }]
    }
}

/// Markdown and plain text need more than [`MIN_TEXT_CHARS`]; Word output
/// only needs to be non-empty.
fn keep_text(text: &str, source_type: SourceType) -> bool {
    match source_type {
        SourceType::DocxText => !text.is_empty(),
        _ => text.trim().chars().count() > MIN_TEXT_CHARS,
    }
}

/// Number of `=== Page ` markers emitted by the PDF parser.
pub fn count_page_markers(text: &str) -> usize {
    text.matches("=== Page ").count()
}

pub fn markdown_to_html(markdown: &str) -> String {
    use pulldown_cmark::{html, Options, Parser};

    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    let parser = Parser::new_ext(markdown, options);
    let mut out = String::with_capacity(markdown.len() * 3 / 2);
    html::push_html(&mut out, parser);
    out
}

/// Text nodes of an HTML fragment, each trimmed, empties dropped, one per line.
pub fn html_to_text(html: &str) -> String {
    let fragment = scraper::Html::parse_fragment(html);
    fragment
        .root_element()
        .text()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Read a file as UTF-8, dropping invalid byte sequences.
pub fn extract_plain_text(path: &Path) -> Result<String, ExtractError> {
    let bytes = std::fs::read(path)?;
    Ok(decode_dropping_invalid(&bytes))
}

fn decode_dropping_invalid(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len());
    for chunk in bytes.utf8_chunks() {
        out.push_str(chunk.valid());
    }
    out
}

/// Non-empty paragraph texts of a .docx, joined by blank lines.
pub fn extract_docx(bytes: &[u8]) -> Result<String, ExtractError> {
    let mut archive = zip::ZipArchive::new(std::io::Cursor::new(bytes))
        .map_err(|e| ExtractError::Ooxml(e.to_string()))?;
    let entry = archive
        .by_name("word/document.xml")
        .map_err(|_| ExtractError::Ooxml("word/document.xml not found".to_string()))?;
    let mut doc_xml = Vec::new();
    entry
        .take(MAX_XML_ENTRY_BYTES)
        .read_to_end(&mut doc_xml)
        .map_err(|e| ExtractError::Ooxml(e.to_string()))?;
    if doc_xml.len() as u64 >= MAX_XML_ENTRY_BYTES {
        return Err(ExtractError::Ooxml(
            "word/document.xml exceeds size limit".to_string(),
        ));
    }
    let paragraphs = extract_paragraphs(&doc_xml)?;
    Ok(paragraphs.join("\n\n"))
}

/// Collect `<w:t>` runs grouped by their enclosing `<w:p>`.
fn extract_paragraphs(xml: &[u8]) -> Result<Vec<String>, ExtractError> {
    use quick_xml::events::Event;

    let mut paragraphs = Vec::new();
    let mut reader = quick_xml::Reader::from_reader(xml);
    let mut buf = Vec::new();
    let mut current = String::new();
    let mut in_text = false;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"p" => current.clear(),
                b"t" => in_text = true,
                _ => {}
            },
            Ok(Event::Empty(e)) => match e.local_name().as_ref() {
                b"tab" => current.push('\t'),
                b"br" => current.push('\n'),
                _ => {}
            },
            Ok(Event::Text(te)) if in_text => {
                current.push_str(te.unescape().unwrap_or_default().as_ref());
            }
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"t" => in_text = false,
                b"p" => {
                    let text = current.trim();
                    if !text.is_empty() {
                        paragraphs.push(text.to_string());
                    }
                    current.clear();
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(ExtractError::Ooxml(e.to_string())),
            _ => {}
        }
        buf.clear();
    }
    Ok(paragraphs)
}
