//! Heuristic category tagging for chunks.
//!
//! Each chunk is matched (lower-cased) against four fixed regex sets. Every
//! category that matches is prepended as a bracketed tag, in a fixed order;
//! a chunk matching nothing gets `[OTHER]`.

use regex::RegexSet;
use serde_json::{Map, Value};
use std::sync::LazyLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    Project,
    Experience,
    Skills,
    Education,
    Other,
}

impl Category {
    pub fn tag(&self) -> &'static str {
        match self {
            Category::Project => "[PROJECT]",
            Category::Experience => "[EXPERIENCE]",
            Category::Skills => "[SKILLS]",
            Category::Education => "[EDUCATION]",
            Category::Other => "[OTHER]",
        }
    }
}

static PATTERNS: LazyLock<[(Category, RegexSet); 4]> = LazyLock::new(|| {
    let set = |patterns: &[&str]| RegexSet::new(patterns).expect("static category patterns");
    [
        (
            Category::Project,
            set(&[
                r"(?:project|repository|built|developed|created|implemented)",
                r"(?:github|git|npm|pip)",
                r"(?:technology|stack|framework|library)",
            ]),
        ),
        (
            Category::Experience,
            set(&[
                r"(?:experience|worked|developed|led|managed|team)",
                r"(?:role|position|job|internship|engineer|developer)",
                r"(?:company|organization|startup)",
            ]),
        ),
        (
            Category::Skills,
            set(&[
                r"(?:python|javascript|typescript|react|node|java|c\+\+)",
                r"(?:skill|proficient|experience with|familiar with)",
                r"(?:aws|docker|kubernetes|database|api)",
            ]),
        ),
        (
            Category::Education,
            set(&[
                r"(?:university|college|school|degree|bachelor|master|phd)",
                r"(?:education|studied|graduated|gpa)",
            ]),
        ),
    ]
});

/// Categories matched by `text`, in tag order. Never empty.
pub fn classify(text: &str) -> Vec<Category> {
    let lower = text.to_lowercase();
    let mut categories: Vec<Category> = PATTERNS
        .iter()
        .filter(|(_, set)| set.is_match(&lower))
        .map(|(category, _)| *category)
        .collect();
    if categories.is_empty() {
        categories.push(Category::Other);
    }
    categories
}

/// Prefix `text` with its category tags.
///
/// Returns the enriched text and any structured data pulled out of the
/// chunk. Nothing is extracted today, so the map is always empty and the
/// caller skips attaching it.
pub fn add_semantic_tags(text: &str) -> (String, Map<String, Value>) {
    let tags = classify(text)
        .iter()
        .map(|c| c.tag())
        .collect::<Vec<_>>()
        .join(" ");
    (format!("{} {}", tags, text), Map::new())
}
