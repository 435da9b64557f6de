//! File-backed knowledge graph.
//!
//! ## Storage layout
//! ```text
//! {working_dir}/
//! ├── documents.json   # doc id -> length, chunk ids, insertion time
//! ├── chunks.json      # chunk id -> text, doc id, order
//! ├── graph.json       # entities (by upper-cased name) and relations
//! └── vectors.json     # chunk, entity, and relation embeddings
//! ```
//!
//! ## Insert
//! The text is split into token-sized windows; every chunk goes to the
//! language model for entity/relation extraction. Entities merge by
//! upper-cased name, relations by unordered endpoint pair. A chunk whose
//! extraction fails is still stored and embedded, it just adds nothing to
//! the graph. Re-inserting a document with the same content is a no-op.
//!
//! ## Query
//! - `naive`: chunks ranked by cosine similarity to the query
//! - `local`: entities ranked against low-level keywords, expanded to their
//!   relations and source chunks
//! - `global`: relations ranked against high-level keywords, expanded to
//!   their endpoints and source chunks
//! - `hybrid`: local and global context merged
//!
//! Keywords come from the language model and fall back to the raw query.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use super::prompts::{self, fill};
use super::{EmbeddingFunc, EmbeddingInput, GraphError, KnowledgeGraph, QueryMode, QueryParam};
use crate::chunk::TextSplitter;
use crate::config::GraphConfig;
use crate::embedding::cosine_similarity;
use crate::llm::LanguageModel;

const DOCUMENTS_FILE: &str = "documents.json";
const CHUNKS_FILE: &str = "chunks.json";
const GRAPH_FILE: &str = "graph.json";
const VECTORS_FILE: &str = "vectors.json";

/// Characters per token used to size chunk windows.
const CHARS_PER_TOKEN: usize = 4;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentEntry {
    /// Length in characters.
    pub length: usize,
    pub chunk_ids: Vec<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkEntry {
    pub content: String,
    pub doc_id: String,
    pub order: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entity {
    pub name: String,
    pub entity_type: String,
    pub descriptions: Vec<String>,
    pub source_chunks: Vec<String>,
}

impl Entity {
    fn embedding_text(&self) -> String {
        format!("{}\n{}", self.name, self.descriptions.join("\n"))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Relation {
    /// Lexicographically smaller endpoint.
    pub source: String,
    pub target: String,
    pub keywords: Vec<String>,
    pub descriptions: Vec<String>,
    pub weight: f32,
    pub source_chunks: Vec<String>,
}

impl Relation {
    fn key(&self) -> String {
        relation_key(&self.source, &self.target)
    }

    fn embedding_text(&self) -> String {
        format!(
            "{}\t{}\n{}\n{}",
            self.source,
            self.target,
            self.keywords.join(", "),
            self.descriptions.join("\n")
        )
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GraphData {
    pub entities: BTreeMap<String, Entity>,
    pub relations: BTreeMap<String, Relation>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VectorData {
    pub chunks: HashMap<String, Vec<f32>>,
    pub entities: HashMap<String, Vec<f32>>,
    pub relations: HashMap<String, Vec<f32>>,
}

#[derive(Debug, Default)]
struct StoreState {
    documents: BTreeMap<String, DocumentEntry>,
    chunks: BTreeMap<String, ChunkEntry>,
    graph: GraphData,
    vectors: VectorData,
}

/// Shape the extraction prompt asks for.
#[derive(Debug, Default, Deserialize)]
struct Extraction {
    #[serde(default)]
    entities: Vec<ExtractedEntity>,
    #[serde(default)]
    relationships: Vec<ExtractedRelation>,
}

#[derive(Debug, Deserialize)]
struct ExtractedEntity {
    name: String,
    #[serde(default, rename = "type")]
    entity_type: String,
    #[serde(default)]
    description: String,
}

#[derive(Debug, Deserialize)]
struct ExtractedRelation {
    source: String,
    target: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    keywords: String,
    #[serde(default = "default_weight")]
    weight: f32,
}

fn default_weight() -> f32 {
    1.0
}

#[derive(Debug, Default, Deserialize)]
struct Keywords {
    #[serde(default)]
    high_level_keywords: Vec<String>,
    #[serde(default)]
    low_level_keywords: Vec<String>,
}

/// Context gathered for one query, before it is rendered for the model.
#[derive(Debug, Default)]
struct Context {
    entities: Vec<String>,
    relations: Vec<String>,
    chunks: Vec<String>,
}

impl Context {
    fn is_empty(&self) -> bool {
        self.entities.is_empty() && self.relations.is_empty() && self.chunks.is_empty()
    }

    fn merge(&mut self, other: Context) {
        extend_unique(&mut self.entities, other.entities);
        extend_unique(&mut self.relations, other.relations);
        extend_unique(&mut self.chunks, other.chunks);
    }
}

fn extend_unique(into: &mut Vec<String>, items: Vec<String>) {
    for item in items {
        if !into.contains(&item) {
            into.push(item);
        }
    }
}

pub struct GraphStore {
    working_dir: PathBuf,
    llm: Arc<dyn LanguageModel>,
    embedding: EmbeddingFunc,
    splitter: TextSplitter,
    state: Option<StoreState>,
}

impl GraphStore {
    pub fn new(
        working_dir: impl Into<PathBuf>,
        llm: Arc<dyn LanguageModel>,
        embedding: EmbeddingFunc,
        config: &GraphConfig,
    ) -> Self {
        let splitter = TextSplitter::new(
            config.chunk_token_size * CHARS_PER_TOKEN,
            config.chunk_overlap_token_size * CHARS_PER_TOKEN,
        );
        Self {
            working_dir: working_dir.into(),
            llm,
            embedding,
            splitter,
            state: None,
        }
    }

    pub fn working_dir(&self) -> &Path {
        &self.working_dir
    }

    fn state(&self) -> Result<&StoreState, GraphError> {
        self.state.as_ref().ok_or(GraphError::NotInitialized)
    }

    /// Counts of (documents, chunks, entities, relations).
    pub fn stats(&self) -> Result<(usize, usize, usize, usize), GraphError> {
        let s = self.state()?;
        Ok((
            s.documents.len(),
            s.chunks.len(),
            s.graph.entities.len(),
            s.graph.relations.len(),
        ))
    }

    pub fn entity(&self, name: &str) -> Option<&Entity> {
        self.state
            .as_ref()
            .and_then(|s| s.graph.entities.get(&normalize_name(name)))
    }

    pub fn relation(&self, a: &str, b: &str) -> Option<&Relation> {
        self.state.as_ref().and_then(|s| {
            s.graph
                .relations
                .get(&relation_key(&normalize_name(a), &normalize_name(b)))
        })
    }

    async fn extract(&self, chunk: &str) -> Result<Extraction, GraphError> {
        let prompt = fill(prompts::ENTITY_EXTRACTION, &[("input_text", chunk)]);
        let raw = self
            .llm
            .complete(&prompt, None)
            .await
            .map_err(|e| GraphError::Llm(e.to_string()))?;
        parse_json_object(&raw)
            .ok_or_else(|| GraphError::Llm("extraction response was not valid JSON".to_string()))
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, GraphError> {
        self.embedding
            .call(EmbeddingInput::Many(texts))
            .await
            .map_err(|e| GraphError::Embedding(e.to_string()))
    }

    async fn keywords(&self, query: &str) -> (Vec<String>, Vec<String>) {
        let prompt = fill(prompts::KEYWORD_EXTRACTION, &[("query", query)]);
        let parsed = match self.llm.complete(&prompt, None).await {
            Ok(raw) => parse_json_object::<Keywords>(&raw),
            Err(e) => {
                warn!(error = %e, "keyword extraction failed; using the query itself");
                None
            }
        };
        let Keywords {
            mut high_level_keywords,
            mut low_level_keywords,
        } = parsed.unwrap_or_default();
        high_level_keywords.retain(|k| !k.trim().is_empty());
        low_level_keywords.retain(|k| !k.trim().is_empty());
        if high_level_keywords.is_empty() {
            high_level_keywords.push(query.to_string());
        }
        if low_level_keywords.is_empty() {
            low_level_keywords.push(query.to_string());
        }
        debug!(high = ?high_level_keywords, low = ?low_level_keywords, "query keywords");
        (high_level_keywords, low_level_keywords)
    }

    async fn embed_one(&self, text: &str) -> Result<Vec<f32>, GraphError> {
        self.embedding
            .call(EmbeddingInput::One(text))
            .await
            .map_err(|e| GraphError::Embedding(e.to_string()))?
            .into_iter()
            .next()
            .ok_or_else(|| GraphError::Embedding("empty embedding response".to_string()))
    }

    fn naive_context(&self, state: &StoreState, query_vec: &[f32], top_k: usize) -> Context {
        let ids = rank(&state.vectors.chunks, query_vec, top_k);
        Context {
            chunks: chunk_texts(state, ids.iter().map(String::as_str)),
            ..Context::default()
        }
    }

    fn local_context(&self, state: &StoreState, query_vec: &[f32], top_k: usize) -> Context {
        let entity_keys = rank(&state.vectors.entities, query_vec, top_k);
        let entities: Vec<&Entity> = entity_keys
            .iter()
            .filter_map(|k| state.graph.entities.get(k))
            .collect();

        let names: HashSet<&str> = entities.iter().map(|e| e.name.as_str()).collect();
        let mut relations: Vec<&Relation> = state
            .graph
            .relations
            .values()
            .filter(|r| names.contains(r.source.as_str()) || names.contains(r.target.as_str()))
            .collect();
        relations.sort_by(|a, b| b.weight.total_cmp(&a.weight));
        relations.truncate(top_k);

        let chunk_ids = most_referenced(entities.iter().map(|e| &e.source_chunks), top_k);

        Context {
            entities: entities.iter().map(|e| entity_line(e)).collect(),
            relations: relations.iter().map(|r| relation_line(r)).collect(),
            chunks: chunk_texts(state, chunk_ids.iter().map(String::as_str)),
        }
    }

    fn global_context(&self, state: &StoreState, query_vec: &[f32], top_k: usize) -> Context {
        let relation_keys = rank(&state.vectors.relations, query_vec, top_k);
        let relations: Vec<&Relation> = relation_keys
            .iter()
            .filter_map(|k| state.graph.relations.get(k))
            .collect();

        let mut endpoint_names = Vec::new();
        for r in &relations {
            for name in [&r.source, &r.target] {
                if !endpoint_names.contains(name) {
                    endpoint_names.push(name.clone());
                }
            }
        }
        let entities: Vec<&Entity> = endpoint_names
            .iter()
            .filter_map(|n| state.graph.entities.get(n))
            .collect();

        let chunk_ids = most_referenced(relations.iter().map(|r| &r.source_chunks), top_k);

        Context {
            entities: entities.iter().map(|e| entity_line(e)).collect(),
            relations: relations.iter().map(|r| relation_line(r)).collect(),
            chunks: chunk_texts(state, chunk_ids.iter().map(String::as_str)),
        }
    }
}

#[async_trait]
impl KnowledgeGraph for GraphStore {
    async fn initialize_storages(&mut self) -> Result<(), GraphError> {
        std::fs::create_dir_all(&self.working_dir)?;
        let state = StoreState {
            documents: load_json(&self.working_dir.join(DOCUMENTS_FILE))?,
            chunks: load_json(&self.working_dir.join(CHUNKS_FILE))?,
            graph: load_json(&self.working_dir.join(GRAPH_FILE))?,
            vectors: load_json(&self.working_dir.join(VECTORS_FILE))?,
        };
        info!(
            dir = %self.working_dir.display(),
            documents = state.documents.len(),
            chunks = state.chunks.len(),
            entities = state.graph.entities.len(),
            relations = state.graph.relations.len(),
            "graph storages loaded"
        );
        self.state = Some(state);
        Ok(())
    }

    async fn insert(&mut self, text: &str) -> Result<(), GraphError> {
        let doc_id = format!("doc-{}", sha256_hex(text));
        if self.state()?.documents.contains_key(&doc_id) {
            info!(doc = %doc_id, "document already ingested; skipping");
            return Ok(());
        }

        let pieces = self.splitter.split_text(text);
        info!(doc = %doc_id, chunks = pieces.len(), "inserting document");

        let mut new_chunks: Vec<(String, ChunkEntry)> = Vec::new();
        for (order, content) in pieces.into_iter().enumerate() {
            let chunk_id = format!("chunk-{}", sha256_hex(&content));
            if new_chunks.iter().any(|(id, _)| *id == chunk_id) {
                continue;
            }
            new_chunks.push((
                chunk_id,
                ChunkEntry {
                    content,
                    doc_id: doc_id.clone(),
                    order,
                },
            ));
        }

        let mut extractions = Vec::with_capacity(new_chunks.len());
        for (i, (chunk_id, chunk)) in new_chunks.iter().enumerate() {
            match self.extract(&chunk.content).await {
                Ok(extraction) => {
                    debug!(
                        chunk = i + 1,
                        entities = extraction.entities.len(),
                        relations = extraction.relationships.len(),
                        "extracted"
                    );
                    extractions.push((chunk_id.clone(), extraction));
                }
                Err(e) => warn!(chunk = %chunk_id, error = %e, "entity extraction failed; skipping chunk"),
            }
        }

        let chunk_texts: Vec<String> = new_chunks.iter().map(|(_, c)| c.content.clone()).collect();
        let chunk_vectors = self.embed(&chunk_texts).await?;

        let mut graph = self.state()?.graph.clone();
        let mut touched_entities = HashSet::new();
        let mut touched_relations = HashSet::new();
        for (chunk_id, extraction) in extractions {
            merge_extraction(
                &mut graph,
                &chunk_id,
                extraction,
                &mut touched_entities,
                &mut touched_relations,
            );
        }

        let entity_keys: Vec<String> = touched_entities.into_iter().collect();
        let entity_texts: Vec<String> = entity_keys
            .iter()
            .filter_map(|k| graph.entities.get(k))
            .map(Entity::embedding_text)
            .collect();
        let entity_vectors = self.embed(&entity_texts).await?;

        let relation_keys: Vec<String> = touched_relations.into_iter().collect();
        let relation_texts: Vec<String> = relation_keys
            .iter()
            .filter_map(|k| graph.relations.get(k))
            .map(Relation::embedding_text)
            .collect();
        let relation_vectors = self.embed(&relation_texts).await?;

        let state = self.state.as_mut().ok_or(GraphError::NotInitialized)?;
        let chunk_ids: Vec<String> = new_chunks.iter().map(|(id, _)| id.clone()).collect();
        for ((chunk_id, chunk), vector) in new_chunks.into_iter().zip(chunk_vectors) {
            state.vectors.chunks.insert(chunk_id.clone(), vector);
            state.chunks.insert(chunk_id, chunk);
        }
        for (key, vector) in entity_keys.into_iter().zip(entity_vectors) {
            state.vectors.entities.insert(key, vector);
        }
        for (key, vector) in relation_keys.into_iter().zip(relation_vectors) {
            state.vectors.relations.insert(key, vector);
        }
        state.graph = graph;
        state.documents.insert(
            doc_id,
            DocumentEntry {
                length: text.chars().count(),
                chunk_ids,
                created_at: Utc::now(),
            },
        );

        info!(
            entities = state.graph.entities.len(),
            relations = state.graph.relations.len(),
            "knowledge graph updated"
        );
        Ok(())
    }

    async fn query(&self, query: &str, param: &QueryParam) -> Result<String, GraphError> {
        let state = self.state()?;
        let top_k = param.top_k.max(1);

        let context = match param.mode {
            QueryMode::Naive => {
                let query_vec = self.embed_one(query).await?;
                self.naive_context(state, &query_vec, top_k)
            }
            QueryMode::Local | QueryMode::Global | QueryMode::Hybrid => {
                let (high, low) = self.keywords(query).await;
                let mut context = Context::default();
                if matches!(param.mode, QueryMode::Local | QueryMode::Hybrid) {
                    let vec = self.embed_one(&low.join(", ")).await?;
                    context.merge(self.local_context(state, &vec, top_k));
                }
                if matches!(param.mode, QueryMode::Global | QueryMode::Hybrid) {
                    let vec = self.embed_one(&high.join(", ")).await?;
                    context.merge(self.global_context(state, &vec, top_k));
                }
                context
            }
        };

        if context.is_empty() {
            info!(mode = %param.mode, "no context found for query");
            return Ok(prompts::FAIL_RESPONSE.to_string());
        }

        let system = match param.mode {
            QueryMode::Naive => {
                let content = context.chunks.join("\n--New Chunk--\n");
                fill(
                    prompts::NAIVE_RAG_RESPONSE,
                    &[
                        ("content_data", content.as_str()),
                        ("response_type", prompts::DEFAULT_RESPONSE_TYPE),
                    ],
                )
            }
            _ => {
                let data = render_context(&context);
                fill(
                    prompts::RAG_RESPONSE,
                    &[
                        ("context_data", data.as_str()),
                        ("response_type", prompts::DEFAULT_RESPONSE_TYPE),
                    ],
                )
            }
        };

        let answer = self
            .llm
            .complete(query, Some(&system))
            .await
            .map_err(|e| GraphError::Llm(e.to_string()))?;
        let answer = answer.trim();
        if answer.is_empty() {
            return Ok(prompts::FAIL_RESPONSE.to_string());
        }
        Ok(answer.to_string())
    }

    async fn finalize_storages(&mut self) -> Result<(), GraphError> {
        let Some(state) = &self.state else {
            return Ok(());
        };
        std::fs::create_dir_all(&self.working_dir)?;
        save_json(&self.working_dir.join(DOCUMENTS_FILE), &state.documents)?;
        save_json(&self.working_dir.join(CHUNKS_FILE), &state.chunks)?;
        save_json(&self.working_dir.join(GRAPH_FILE), &state.graph)?;
        save_json(&self.working_dir.join(VECTORS_FILE), &state.vectors)?;
        debug!(dir = %self.working_dir.display(), "graph storages written");
        Ok(())
    }
}

fn merge_extraction(
    graph: &mut GraphData,
    chunk_id: &str,
    extraction: Extraction,
    touched_entities: &mut HashSet<String>,
    touched_relations: &mut HashSet<String>,
) {
    for e in extraction.entities {
        let name = normalize_name(&e.name);
        if name.is_empty() {
            continue;
        }
        let entity = graph.entities.entry(name.clone()).or_insert_with(|| Entity {
            name: name.clone(),
            entity_type: String::new(),
            descriptions: Vec::new(),
            source_chunks: Vec::new(),
        });
        if entity.entity_type.is_empty() && !e.entity_type.trim().is_empty() {
            entity.entity_type = e.entity_type.trim().to_uppercase();
        }
        push_unique(&mut entity.descriptions, e.description.trim());
        push_unique(&mut entity.source_chunks, chunk_id);
        touched_entities.insert(name);
    }

    for r in extraction.relationships {
        let a = normalize_name(&r.source);
        let b = normalize_name(&r.target);
        if a.is_empty() || b.is_empty() || a == b {
            continue;
        }
        for name in [&a, &b] {
            let entity = graph.entities.entry(name.clone()).or_insert_with(|| Entity {
                name: name.clone(),
                entity_type: "UNKNOWN".to_string(),
                descriptions: Vec::new(),
                source_chunks: Vec::new(),
            });
            push_unique(&mut entity.source_chunks, chunk_id);
            touched_entities.insert(name.clone());
        }

        let (source, target) = if a <= b { (a, b) } else { (b, a) };
        let key = relation_key(&source, &target);
        let relation = graph.relations.entry(key.clone()).or_insert_with(|| Relation {
            source,
            target,
            keywords: Vec::new(),
            descriptions: Vec::new(),
            weight: 0.0,
            source_chunks: Vec::new(),
        });
        relation.weight += if r.weight.is_finite() { r.weight.max(0.0) } else { 1.0 };
        push_unique(&mut relation.descriptions, r.description.trim());
        for keyword in r.keywords.split(',') {
            push_unique(&mut relation.keywords, keyword.trim());
        }
        push_unique(&mut relation.source_chunks, chunk_id);
        debug_assert_eq!(relation.key(), key);
        touched_relations.insert(key);
    }
}

fn push_unique(into: &mut Vec<String>, value: &str) {
    if !value.is_empty() && !into.iter().any(|v| v == value) {
        into.push(value.to_string());
    }
}

/// Entity names are compared trimmed, quote-stripped, and upper-cased.
pub fn normalize_name(name: &str) -> String {
    name.trim().trim_matches('"').trim().to_uppercase()
}

fn relation_key(a: &str, b: &str) -> String {
    if a <= b {
        format!("{}|{}", a, b)
    } else {
        format!("{}|{}", b, a)
    }
}

/// Keys of the `k` vectors most similar to `query`, best first.
fn rank(vectors: &HashMap<String, Vec<f32>>, query: &[f32], k: usize) -> Vec<String> {
    let mut scored: Vec<(&String, f32)> = vectors
        .iter()
        .map(|(key, v)| (key, cosine_similarity(query, v)))
        .collect();
    scored.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(b.0)));
    scored.into_iter().take(k).map(|(key, _)| key.clone()).collect()
}

/// Chunk ids ordered by how many of the given lists mention them.
fn most_referenced<'a>(lists: impl Iterator<Item = &'a Vec<String>>, k: usize) -> Vec<String> {
    let mut counts: Vec<(String, usize)> = Vec::new();
    for list in lists {
        for id in list {
            match counts.iter_mut().find(|(c, _)| c == id) {
                Some((_, n)) => *n += 1,
                None => counts.push((id.clone(), 1)),
            }
        }
    }
    counts.sort_by(|a, b| b.1.cmp(&a.1));
    counts.into_iter().take(k).map(|(id, _)| id).collect()
}

fn chunk_texts<'a>(state: &StoreState, ids: impl Iterator<Item = &'a str>) -> Vec<String> {
    ids.filter_map(|id| state.chunks.get(id))
        .map(|c| c.content.clone())
        .collect()
}

fn entity_line(e: &Entity) -> String {
    format!(
        "{}\t{}\t{}",
        e.name,
        e.entity_type,
        e.descriptions.join(" ").replace('\n', " ")
    )
}

fn relation_line(r: &Relation) -> String {
    format!(
        "{}\t{}\t{}\t{}\t{:.1}",
        r.source,
        r.target,
        r.keywords.join(", "),
        r.descriptions.join(" ").replace('\n', " "),
        r.weight
    )
}

fn render_context(context: &Context) -> String {
    let mut out = String::new();
    out.push_str("-----Entities-----\nname\ttype\tdescription\n");
    for line in &context.entities {
        out.push_str(line);
        out.push('\n');
    }
    out.push_str("\n-----Relationships-----\nsource\ttarget\tkeywords\tdescription\tweight\n");
    for line in &context.relations {
        out.push_str(line);
        out.push('\n');
    }
    out.push_str("\n-----Sources-----\n");
    for (i, chunk) in context.chunks.iter().enumerate() {
        out.push_str(&format!("[{}]\n{}\n", i + 1, chunk));
    }
    out
}

/// Parse the outermost `{...}` in a model response, tolerating code fences
/// and surrounding prose.
fn parse_json_object<T: DeserializeOwned>(raw: &str) -> Option<T> {
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    if end < start {
        return None;
    }
    serde_json::from_str(&raw[start..=end]).ok()
}

fn sha256_hex(text: &str) -> String {
    format!("{:x}", Sha256::digest(text.as_bytes()))
}

fn load_json<T: DeserializeOwned + Default>(path: &Path) -> Result<T, GraphError> {
    if !path.exists() {
        return Ok(T::default());
    }
    let content = std::fs::read_to_string(path)?;
    serde_json::from_str(&content)
        .map_err(|e| GraphError::Storage(format!("{}: {}", path.display(), e)))
}

fn save_json<T: Serialize>(path: &Path, value: &T) -> Result<(), GraphError> {
    let json = serde_json::to_string_pretty(value)?;
    std::fs::write(path, json)?;
    Ok(())
}
