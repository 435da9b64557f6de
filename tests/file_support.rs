//! Integration tests for multi-format extraction.
//!
//! PDFs are assembled with lopdf: one with a real text layer, one whose only
//! page is an embedded image (the OCR path). Word documents are minimal ZIPs
//! holding `word/document.xml`.

use std::fs;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document as PdfDocument, Object, Stream};
use tempfile::TempDir;

use portfolio_rag::extract::{Capabilities, Extractor};
use portfolio_rag::models::SourceType;
use portfolio_rag::ocr::{PdfParser, VisionModel, OCR_PROMPT};

const PDF_PHRASE: &str = "Senior engineer building search infrastructure at Acme";

/// One-page PDF whose content stream draws `phrase` in Helvetica.
fn text_pdf(phrase: &str) -> Vec<u8> {
    let mut doc = PdfDocument::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });
    let content = Content {
        operations: vec![
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec!["F1".into(), 12.into()]),
            Operation::new("Td", vec![72.into(), 700.into()]),
            Operation::new("Tj", vec![Object::string_literal(phrase)]),
            Operation::new("ET", vec![]),
        ],
    };
    let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "Contents" => content_id,
        "Resources" => dictionary! {
            "Font" => dictionary! { "F1" => font_id },
        },
        "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
    });
    finish_pdf(doc, pages_id, page_id)
}

/// One-page PDF with no text layer: an 8x8 grey image only.
fn scanned_pdf() -> Vec<u8> {
    let mut doc = PdfDocument::with_version("1.5");
    let pages_id = doc.new_object_id();
    let image_id = doc.add_object(Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => 8,
            "Height" => 8,
            "ColorSpace" => "DeviceGray",
            "BitsPerComponent" => 8,
        },
        vec![128u8; 64],
    ));
    let content = Content {
        operations: vec![
            Operation::new("q", vec![]),
            Operation::new(
                "cm",
                vec![400.into(), 0.into(), 0.into(), 400.into(), 100.into(), 200.into()],
            ),
            Operation::new("Do", vec!["Im1".into()]),
            Operation::new("Q", vec![]),
        ],
    };
    let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "Contents" => content_id,
        "Resources" => dictionary! {
            "XObject" => dictionary! { "Im1" => image_id },
        },
        "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
    });
    finish_pdf(doc, pages_id, page_id)
}

/// Two pages: a text page, then a page with no text layer and no images.
fn text_then_blank_pdf(phrase: &str) -> Vec<u8> {
    let mut doc = PdfDocument::load_mem(&text_pdf(phrase)).unwrap();
    let pages_id = doc.catalog().unwrap().get(b"Pages").unwrap().as_reference().unwrap();
    let first_page = *doc.get_pages().values().next().unwrap();
    let blank_content = doc.add_object(Stream::new(dictionary! {}, Vec::new()));
    let blank_page = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "Contents" => blank_content,
        "Resources" => dictionary! {},
        "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
    });
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![first_page.into(), blank_page.into()],
            "Count" => 2,
        }),
    );
    let mut out = Vec::new();
    doc.save_to(&mut out).unwrap();
    out
}

fn finish_pdf(mut doc: PdfDocument, pages_id: lopdf::ObjectId, page_id: lopdf::ObjectId) -> Vec<u8> {
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![page_id.into()],
            "Count" => 1,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    let mut out = Vec::new();
    doc.save_to(&mut out).unwrap();
    out
}

fn minimal_docx_with_text(paragraphs: &[&str]) -> Vec<u8> {
    use std::io::Write;
    let body: String = paragraphs
        .iter()
        .map(|p| format!("<w:p><w:r><w:t>{}</w:t></w:r></w:p>", p))
        .collect();
    let mut buf = Vec::new();
    {
        let mut zip = zip::ZipWriter::new(std::io::Cursor::new(&mut buf));
        zip.start_file("word/document.xml", zip::write::SimpleFileOptions::default())
            .unwrap();
        let xml = format!(
            "<?xml version=\"1.0\"?><w:document xmlns:w=\"http://schemas.openxmlformats.org/wordprocessingml/2006/main\"><w:body>{}</w:body></w:document>",
            body
        );
        zip.write_all(xml.as_bytes()).unwrap();
        zip.finish().unwrap();
    }
    buf
}

/// Returns a fixed transcription and counts calls.
struct FakeVision {
    reply: Result<String, String>,
    calls: AtomicUsize,
}

impl FakeVision {
    fn replying(text: &str) -> Self {
        Self {
            reply: Ok(text.to_string()),
            calls: AtomicUsize::new(0),
        }
    }

    fn failing() -> Self {
        Self {
            reply: Err("model offline".to_string()),
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl VisionModel for FakeVision {
    fn name(&self) -> &str {
        "fake-vlm"
    }

    async fn generate(&self, png: &[u8], prompt: &str) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        assert_eq!(prompt, OCR_PROMPT);
        let image = image::load_from_memory(png)?;
        assert_eq!(image.width().max(image.height()), 64);
        match &self.reply {
            Ok(text) => Ok(text.clone()),
            Err(e) => anyhow::bail!("{}", e),
        }
    }
}

#[tokio::test]
async fn text_layer_pdf_gets_page_markers_and_parser() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("resume.pdf");
    fs::write(&path, text_pdf(PDF_PHRASE)).unwrap();

    let extractor = Extractor::new(Capabilities::all(), PdfParser::text_only());
    let docs = extractor.extract_file(&path, "resume.pdf", "hash").await;
    assert_eq!(docs.len(), 1);
    let doc = &docs[0];
    assert!(doc.text.starts_with("=== Page 1 ===\n"), "{:?}", doc.text);
    assert!(doc.text.contains("search infrastructure"), "{:?}", doc.text);
    assert_eq!(doc.metadata.source_type, SourceType::PdfText);
    assert_eq!(doc.metadata.num_pages, Some(1));
    assert_eq!(doc.metadata.parser.as_deref(), Some("pdf-text"));
    assert_eq!(doc.metadata.parent_document_id.as_deref(), Some("resume.pdf"));
}

#[tokio::test]
async fn scanned_page_is_transcribed() {
    let vision = Arc::new(FakeVision::replying(
        "Staff engineer, Acme Corp. Led the migration of the search stack to Rust.",
    ));
    let parser = PdfParser::with_vision(vision.clone(), 64);
    assert_eq!(parser.parser_name(), "pdf-text+ocr:fake-vlm");

    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("scan.pdf");
    fs::write(&path, scanned_pdf()).unwrap();

    let extractor = Extractor::new(Capabilities::all(), parser);
    let docs = extractor.extract_file(&path, "scan.pdf", "hash").await;
    assert_eq!(vision.calls.load(Ordering::SeqCst), 1);
    assert_eq!(docs.len(), 1);
    assert_eq!(
        docs[0].text,
        "=== Page 1 ===\nStaff engineer, Acme Corp. Led the migration of the search stack to Rust."
    );
    assert_eq!(docs[0].metadata.num_pages, Some(1));
    assert_eq!(docs[0].metadata.parser.as_deref(), Some("pdf-text+ocr:fake-vlm"));
}

#[tokio::test]
async fn failed_ocr_leaves_placeholder() {
    let vision = Arc::new(FakeVision::failing());
    let parser = PdfParser::with_vision(vision.clone(), 64);
    let text = parser.parse_bytes(scanned_pdf()).await.unwrap();
    assert_eq!(text, "=== Page 1 ===\n[No text content]");
    assert_eq!(vision.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn empty_ocr_output_drops_the_page() {
    let parser = PdfParser::with_vision(Arc::new(FakeVision::replying("   ")), 64);
    let text = parser.parse_bytes(scanned_pdf()).await.unwrap();
    assert_eq!(text, "");
}

#[tokio::test]
async fn scanned_pdf_without_vision_yields_nothing() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("scan.pdf");
    fs::write(&path, scanned_pdf()).unwrap();

    let extractor = Extractor::new(Capabilities::all(), PdfParser::text_only());
    assert!(extractor.extract_file(&path, "scan.pdf", "hash").await.is_empty());
}

#[tokio::test]
async fn corrupt_pdf_is_skipped() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("bad.pdf");
    fs::write(&path, b"not a valid pdf").unwrap();

    let extractor = Extractor::new(Capabilities::all(), PdfParser::text_only());
    assert!(extractor.extract_file(&path, "bad.pdf", "hash").await.is_empty());
}

#[tokio::test]
async fn docx_paragraphs_become_one_document() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("cover.docx");
    fs::write(
        &path,
        minimal_docx_with_text(&["office test phrase", "second paragraph"]),
    )
    .unwrap();

    let extractor = Extractor::new(Capabilities::all(), PdfParser::text_only());
    let docs = extractor.extract_file(&path, "cover.docx", "hash").await;
    assert_eq!(docs.len(), 1);
    assert_eq!(docs[0].text, "office test phrase\n\nsecond paragraph");
    assert_eq!(docs[0].metadata.source_type, SourceType::DocxText);
}

#[tokio::test]
async fn disabled_capabilities_skip_formats() {
    let tmp = TempDir::new().unwrap();
    let docx = tmp.path().join("cover.docx");
    fs::write(&docx, minimal_docx_with_text(&["office test phrase"])).unwrap();
    let pdf = tmp.path().join("resume.pdf");
    fs::write(&pdf, text_pdf(PDF_PHRASE)).unwrap();

    let caps = Capabilities {
        docx: false,
        pdf: false,
        ..Capabilities::all()
    };
    let extractor = Extractor::new(caps, PdfParser::text_only());
    assert!(extractor.extract_file(&docx, "cover.docx", "h").await.is_empty());
    assert!(extractor.extract_file(&pdf, "resume.pdf", "h").await.is_empty());
}

#[tokio::test]
async fn page_without_images_is_dropped_without_ocr() {
    let vision = Arc::new(FakeVision::replying("should never be used"));
    let parser = PdfParser::with_vision(vision.clone(), 64);
    let text = parser
        .parse_bytes(text_then_blank_pdf(PDF_PHRASE))
        .await
        .unwrap();
    assert!(text.starts_with("=== Page 1 ===\n"), "{:?}", text);
    assert!(text.contains("search infrastructure"), "{:?}", text);
    assert!(!text.contains("=== Page 2 ==="), "{:?}", text);
    assert!(!text.contains("[No text content]"), "{:?}", text);
    assert_eq!(vision.calls.load(Ordering::SeqCst), 0);
}
