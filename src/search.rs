//! Nearest-neighbour search over a saved flat index.

use anyhow::{bail, Result};
use serde::Serialize;
use std::path::Path;

use crate::embedding::{embed_query, Embedder};
use crate::index::load_index;
use crate::models::ChunkRecord;

#[derive(Debug, Clone, Serialize)]
pub struct SearchHit {
    /// Squared L2 distance; smaller is closer.
    pub distance: f32,
    pub record: ChunkRecord,
}

/// Embed `query` and return the `top_k` closest chunk records.
pub async fn search_index(
    index_dir: &Path,
    embedder: &dyn Embedder,
    query: &str,
    top_k: usize,
) -> Result<Vec<SearchHit>> {
    if query.trim().is_empty() {
        return Ok(Vec::new());
    }

    let (index, records) = load_index(index_dir)?;
    let vector = embed_query(embedder, query).await?;
    if vector.len() != index.dims() {
        bail!(
            "query embedding has {} dims but the index was built with {}; use the same embedding model as ingestion",
            vector.len(),
            index.dims()
        );
    }

    let hits = index.search(&vector, top_k)?;
    let mut out = Vec::with_capacity(hits.len());
    for hit in hits {
        let Some(record) = records.get(hit.id as usize) else {
            bail!("index id {} has no metadata record", hit.id);
        };
        out.push(SearchHit {
            distance: hit.distance,
            record: record.clone(),
        });
    }
    Ok(out)
}

/// Print hits in the CLI's numbered format.
pub fn print_hits(hits: &[SearchHit]) {
    if hits.is_empty() {
        println!("No results.");
        return;
    }

    for (i, hit) in hits.iter().enumerate() {
        let meta = &hit.record.metadata;
        println!(
            "{}. [{:.4}] {}",
            i + 1,
            hit.distance,
            meta.document.source_file
        );
        if let Some(repo) = &meta.document.repo_name {
            println!("    repo: {}", repo);
        }
        println!("    chunk: {} (#{})", meta.chunk_id, meta.chunk_index);
        let excerpt: String = hit.record.text.chars().take(240).collect();
        println!("    excerpt: \"{}\"", excerpt.replace('\n', " ").trim());
        println!("    id: {}", hit.record.id);
        println!();
    }
}
