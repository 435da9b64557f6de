//! Prompt templates for the file-backed graph store.
//!
//! Placeholders are `{name}` and are filled with [`fill`].

/// Returned when retrieval finds nothing to answer from.
pub const FAIL_RESPONSE: &str = "Sorry, I'm not able to provide an answer to that question.";

pub const ENTITY_EXTRACTION: &str = r#"You are building a knowledge graph from a personal portfolio: resumes, project write-ups, and source code.

Identify every meaningful entity in the text below (people, organizations, projects, technologies, skills, roles, schools, places, events) and every relationship between two of them.

Respond with a single JSON object and nothing else, in exactly this shape:
{
  "entities": [
    {"name": "...", "type": "...", "description": "..."}
  ],
  "relationships": [
    {"source": "...", "target": "...", "description": "...", "keywords": "...", "weight": 1.0}
  ]
}

Rules:
- "name" is the entity's canonical name as written in the text.
- "type" is one of: person, organization, project, technology, skill, role, education, location, event, other.
- Every relationship's "source" and "target" must be names from "entities".
- "keywords" are a few comma-separated high-level themes of the relationship.
- "weight" is the strength of the relationship between 0 and 10.

Text:
{input_text}"#;

pub const KEYWORD_EXTRACTION: &str = r#"Extract search keywords from the user's question.

- "high_level_keywords": broad themes or concepts the question is about.
- "low_level_keywords": specific entities, names, technologies, or details.

Respond with a single JSON object and nothing else:
{"high_level_keywords": ["..."], "low_level_keywords": ["..."]}

Question:
{query}"#;

pub const RAG_RESPONSE: &str = r#"You are a helpful assistant answering questions about a person's portfolio: their projects, experience, skills, and education.

Answer using only the information in the data tables below. If the data does not contain the answer, say so plainly. Do not invent facts.

Reply in {response_type}.

---Data tables---
{context_data}"#;

pub const NAIVE_RAG_RESPONSE: &str = r#"You are a helpful assistant answering questions about a person's portfolio: their projects, experience, skills, and education.

Answer using only the document chunks below. If they do not contain the answer, say so plainly. Do not invent facts.

Reply in {response_type}.

---Document chunks---
{content_data}"#;

pub const DEFAULT_RESPONSE_TYPE: &str = "multiple paragraphs";

/// Replace each `{key}` in `template` with its value.
pub fn fill(template: &str, values: &[(&str, &str)]) -> String {
    let mut out = template.to_string();
    for (key, value) in values {
        out = out.replace(&format!("{{{}}}", key), value);
    }
    out
}
