//! Recursive character text splitter.
//!
//! Splits text into overlapping windows that prefer paragraph, then line,
//! then word boundaries before falling back to single characters. Each
//! separator stays attached to the start of the piece that follows it, and
//! every emitted chunk is whitespace-trimmed.
//!
//! Lengths are measured in Unicode scalar values, so multi-byte text gets
//! the same window size as ASCII.

use tracing::warn;
use uuid::Uuid;

use crate::models::{ChunkMetadata, Document};

const DEFAULT_SEPARATORS: [&str; 4] = ["\n\n", "\n", " ", ""];

/// A chunk of a document before tagging and id assignment.
#[derive(Debug, Clone, PartialEq)]
pub struct SplitChunk {
    pub text: String,
    pub metadata: ChunkMetadata,
}

#[derive(Debug, Clone)]
pub struct TextSplitter {
    chunk_size: usize,
    chunk_overlap: usize,
    separators: Vec<String>,
}

impl TextSplitter {
    /// `chunk_overlap` is clamped below `chunk_size`.
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        let chunk_size = chunk_size.max(1);
        Self {
            chunk_size,
            chunk_overlap: chunk_overlap.min(chunk_size - 1),
            separators: DEFAULT_SEPARATORS.iter().map(|s| s.to_string()).collect(),
        }
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Split raw text into trimmed, non-empty windows.
    pub fn split_text(&self, text: &str) -> Vec<String> {
        self.split_recursive(text, &self.separators)
    }

    /// Split each document and give every piece a fresh `chunk_id`.
    pub fn split_documents(&self, documents: &[Document]) -> Vec<SplitChunk> {
        let mut out = Vec::new();
        for doc in documents {
            for (index, text) in self.split_text(&doc.text).into_iter().enumerate() {
                out.push(SplitChunk {
                    text,
                    metadata: ChunkMetadata {
                        document: doc.metadata.clone(),
                        chunk_id: Uuid::new_v4().to_string(),
                        chunk_index: index,
                        extracted_data: None,
                    },
                });
            }
        }
        out
    }

    fn split_recursive(&self, text: &str, separators: &[String]) -> Vec<String> {
        let mut final_chunks = Vec::new();

        // First separator present in the text wins; "" always matches.
        let mut separator = separators.last().cloned().unwrap_or_default();
        let mut remaining: &[String] = &[];
        for (i, sep) in separators.iter().enumerate() {
            if sep.is_empty() {
                separator = String::new();
                break;
            }
            if text.contains(sep.as_str()) {
                separator = sep.clone();
                remaining = &separators[i + 1..];
                break;
            }
        }

        let splits = split_keeping_separator(text, &separator);

        let mut good_splits: Vec<String> = Vec::new();
        for piece in splits {
            if char_len(&piece) < self.chunk_size {
                good_splits.push(piece);
                continue;
            }
            if !good_splits.is_empty() {
                final_chunks.extend(self.merge_splits(&good_splits));
                good_splits.clear();
            }
            if remaining.is_empty() {
                final_chunks.push(piece);
            } else {
                final_chunks.extend(self.split_recursive(&piece, remaining));
            }
        }
        if !good_splits.is_empty() {
            final_chunks.extend(self.merge_splits(&good_splits));
        }

        final_chunks
    }

    /// Greedily pack pieces into windows of at most `chunk_size`, carrying up
    /// to `chunk_overlap` characters of trailing pieces into the next window.
    /// Separators are already attached to the pieces, so they are joined
    /// with nothing in between.
    fn merge_splits(&self, splits: &[String]) -> Vec<String> {
        let mut docs = Vec::new();
        let mut current: std::collections::VecDeque<&str> = std::collections::VecDeque::new();
        let mut total = 0usize;

        for piece in splits {
            let len = char_len(piece);
            if total + len > self.chunk_size {
                if total > self.chunk_size {
                    warn!(
                        size = total,
                        limit = self.chunk_size,
                        "created a chunk longer than the configured size"
                    );
                }
                if !current.is_empty() {
                    if let Some(doc) = join_trimmed(&current) {
                        docs.push(doc);
                    }
                    while total > self.chunk_overlap
                        || (total + len > self.chunk_size && total > 0)
                    {
                        match current.pop_front() {
                            Some(front) => total -= char_len(front),
                            None => break,
                        }
                    }
                }
            }
            current.push_back(piece);
            total += len;
        }

        if let Some(doc) = join_trimmed(&current) {
            docs.push(doc);
        }
        docs
    }
}

impl Default for TextSplitter {
    fn default() -> Self {
        Self::new(1000, 200)
    }
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

fn join_trimmed(parts: &std::collections::VecDeque<&str>) -> Option<String> {
    let joined: String = parts.iter().copied().collect();
    let trimmed = joined.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Split on `separator`, attaching each separator to the start of the piece
/// after it. Empty pieces are dropped. An empty separator splits into
/// individual characters.
fn split_keeping_separator(text: &str, separator: &str) -> Vec<String> {
    if separator.is_empty() {
        return text.chars().map(|c| c.to_string()).collect();
    }

    let mut pieces = Vec::new();
    let mut start = 0;
    let mut search_from = 0;
    while let Some(pos) = text[search_from..].find(separator) {
        let at = search_from + pos;
        if at > start {
            pieces.push(text[start..at].to_string());
        }
        start = at;
        search_from = at + separator.len();
    }
    if start < text.len() {
        pieces.push(text[start..].to_string());
    }
    pieces.retain(|p| !p.is_empty());
    pieces
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DocumentMetadata, SourceType};

    #[test]
    fn small_text_single_chunk() {
        let splitter = TextSplitter::new(1000, 200);
        let chunks = splitter.split_text("Hello, world!");
        assert_eq!(chunks, vec!["Hello, world!".to_string()]);
    }

    #[test]
    fn empty_text_yields_nothing() {
        let splitter = TextSplitter::new(1000, 200);
        assert!(splitter.split_text("").is_empty());
        assert!(splitter.split_text("   \n\n  ").is_empty());
    }

    #[test]
    fn paragraphs_packed_until_limit() {
        let splitter = TextSplitter::new(40, 0);
        let text = "First paragraph here.\n\nSecond paragraph here.\n\nThird one.";
        let chunks = splitter.split_text(text);
        assert_eq!(
            chunks,
            vec![
                "First paragraph here.".to_string(),
                "Second paragraph here.\n\nThird one.".to_string(),
            ]
        );
    }

    #[test]
    fn chunks_respect_size() {
        let text = (0..200)
            .map(|i| format!("word{}", i))
            .collect::<Vec<_>>()
            .join(" ");
        let splitter = TextSplitter::new(100, 20);
        let chunks = splitter.split_text(&text);
        assert!(chunks.len() > 5);
        for c in &chunks {
            assert!(char_len(c) <= 100, "chunk too long: {}", char_len(c));
        }
    }

    #[test]
    fn consecutive_chunks_overlap() {
        let text = (0..100)
            .map(|i| format!("w{:03}", i))
            .collect::<Vec<_>>()
            .join(" ");
        let splitter = TextSplitter::new(50, 15);
        let chunks = splitter.split_text(&text);
        for pair in chunks.windows(2) {
            let last_word = pair[0].split(' ').next_back().unwrap();
            assert!(
                pair[1].contains(last_word),
                "expected '{}' carried into '{}'",
                last_word,
                pair[1]
            );
        }
    }

    #[test]
    fn unbroken_text_falls_back_to_characters() {
        let text = "x".repeat(250);
        let splitter = TextSplitter::new(100, 0);
        let chunks = splitter.split_text(&text);
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].len(), 100);
        assert_eq!(chunks[2].len(), 50);
    }

    #[test]
    fn multibyte_lengths_counted_in_chars() {
        let text = "é".repeat(90);
        let splitter = TextSplitter::new(100, 0);
        assert_eq!(splitter.split_text(&text).len(), 1);
    }

    #[test]
    fn deterministic() {
        let text = "Alpha beta gamma.\n\nDelta epsilon.\nZeta eta theta iota kappa.\n\nLambda";
        let splitter = TextSplitter::new(20, 5);
        assert_eq!(splitter.split_text(text), splitter.split_text(text));
    }

    #[test]
    fn split_documents_assigns_indices_and_ids() {
        let doc = Document {
            text: (0..50)
                .map(|i| format!("Sentence number {}.", i))
                .collect::<Vec<_>>()
                .join(" "),
            metadata: DocumentMetadata::local("notes.txt", SourceType::TextFile, "notes.txt", "h"),
        };
        let splitter = TextSplitter::new(200, 40);
        let chunks = splitter.split_documents(&[doc]);
        assert!(chunks.len() > 1);
        for (i, c) in chunks.iter().enumerate() {
            assert_eq!(c.metadata.chunk_index, i);
            assert_eq!(c.metadata.document.source_file, "notes.txt");
            assert!(Uuid::parse_str(&c.metadata.chunk_id).is_ok());
        }
        let mut ids: Vec<_> = chunks.iter().map(|c| &c.metadata.chunk_id).collect();
        ids.dedup();
        assert_eq!(ids.len(), chunks.len());
    }

    #[test]
    fn separator_kept_with_following_piece() {
        assert_eq!(
            split_keeping_separator("a\n\nb\n\nc", "\n\n"),
            vec!["a".to_string(), "\n\nb".to_string(), "\n\nc".to_string()]
        );
    }
}
