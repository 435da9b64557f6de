//! Exact-search flat vector index and its on-disk artifacts.
//!
//! Two files are written side by side in the output directory:
//!
//! | File | Content |
//! |------|---------|
//! | `portfolio_index.bin` | ids and vectors, searched by squared L2 distance |
//! | `portfolio_metadata.json` | JSON array of [`ChunkRecord`]s, 4-space indent |
//!
//! Every save overwrites both files. There is no incremental update path.
//!
//! # Binary layout
//!
//! ```text
//! magic  "PRAGIDX1"         8 bytes
//! dims   u32 LE             4 bytes
//! count  u64 LE             8 bytes
//! ids    count × u64 LE
//! data   count × dims × f32 LE
//! ```

use anyhow::{bail, Context, Result};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::embedding::{blob_to_vec, vec_to_blob};
use crate::models::ChunkRecord;

pub const INDEX_FILE: &str = "portfolio_index.bin";
pub const METADATA_FILE: &str = "portfolio_metadata.json";

const MAGIC: &[u8; 8] = b"PRAGIDX1";
const HEADER_LEN: usize = 8 + 4 + 8;

/// Flat L2 index with caller-assigned integer ids.
#[derive(Debug, Clone, PartialEq)]
pub struct FlatIndex {
    dims: usize,
    ids: Vec<u64>,
    data: Vec<f32>,
}

/// One search hit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    pub id: u64,
    /// Squared Euclidean distance.
    pub distance: f32,
}

impl FlatIndex {
    pub fn new(dims: usize) -> Self {
        Self {
            dims,
            ids: Vec::new(),
            data: Vec::new(),
        }
    }

    pub fn dims(&self) -> usize {
        self.dims
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn add_with_ids(&mut self, vectors: &[Vec<f32>], ids: &[u64]) -> Result<()> {
        if vectors.len() != ids.len() {
            bail!(
                "vector count ({}) does not match id count ({})",
                vectors.len(),
                ids.len()
            );
        }
        for (vector, id) in vectors.iter().zip(ids) {
            if vector.len() != self.dims {
                bail!(
                    "vector for id {} has {} dims, index expects {}",
                    id,
                    vector.len(),
                    self.dims
                );
            }
            self.data.extend_from_slice(vector);
            self.ids.push(*id);
        }
        Ok(())
    }

    /// The `k` nearest vectors, closest first. Ties keep insertion order.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<Neighbor>> {
        if query.len() != self.dims {
            bail!(
                "query has {} dims, index expects {}",
                query.len(),
                self.dims
            );
        }
        let mut hits: Vec<Neighbor> = self
            .ids
            .iter()
            .enumerate()
            .map(|(row, id)| {
                let start = row * self.dims;
                let vector = &self.data[start..start + self.dims];
                Neighbor {
                    id: *id,
                    distance: squared_l2(query, vector),
                }
            })
            .collect();
        hits.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        hits.truncate(k);
        Ok(hits)
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(HEADER_LEN + self.ids.len() * 8 + self.data.len() * 4);
        out.extend_from_slice(MAGIC);
        out.extend_from_slice(&(self.dims as u32).to_le_bytes());
        out.extend_from_slice(&(self.ids.len() as u64).to_le_bytes());
        for id in &self.ids {
            out.extend_from_slice(&id.to_le_bytes());
        }
        out.extend_from_slice(&vec_to_blob(&self.data));
        out
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < HEADER_LEN || &bytes[..8] != MAGIC {
            bail!("not a portfolio index file");
        }
        let dims = u32::from_le_bytes(bytes[8..12].try_into()?) as usize;
        let count = usize::try_from(u64::from_le_bytes(bytes[12..20].try_into()?))
            .map_err(|_| anyhow::anyhow!("corrupt index header"))?;

        let (ids_end, data_end) = match section_ends(count, dims) {
            Some(ends) => ends,
            None => bail!("corrupt index header"),
        };
        if bytes.len() != data_end {
            bail!(
                "index file is {} bytes, expected {} for {} vectors of {} dims",
                bytes.len(),
                data_end,
                count,
                dims
            );
        }

        let ids = bytes[HEADER_LEN..ids_end]
            .chunks_exact(8)
            .map(|c| u64::from_le_bytes([c[0], c[1], c[2], c[3], c[4], c[5], c[6], c[7]]))
            .collect();
        let data = blob_to_vec(&bytes[ids_end..data_end]);

        Ok(Self { dims, ids, data })
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        std::fs::write(path, self.to_bytes())
            .with_context(|| format!("Failed to write index: {}", path.display()))
    }

    pub fn read(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)
            .with_context(|| format!("Failed to read index: {}", path.display()))?;
        Self::from_bytes(&bytes).with_context(|| format!("Corrupt index: {}", path.display()))
    }
}

/// Byte offsets where the id table and the vector data end.
fn section_ends(count: usize, dims: usize) -> Option<(usize, usize)> {
    let ids_end = count.checked_mul(8)?.checked_add(HEADER_LEN)?;
    let data_len = count.checked_mul(dims)?.checked_mul(4)?;
    Some((ids_end, ids_end.checked_add(data_len)?))
}

fn squared_l2(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}

/// Paths of the two artifacts written by [`save_index`].
#[derive(Debug, Clone, PartialEq)]
pub struct SavedIndex {
    pub index_path: PathBuf,
    pub metadata_path: PathBuf,
}

pub fn artifact_paths(dir: &Path) -> SavedIndex {
    SavedIndex {
        index_path: dir.join(INDEX_FILE),
        metadata_path: dir.join(METADATA_FILE),
    }
}

/// Build the index from `records` and their embeddings and write both
/// artifacts. Zero records is a logged no-op returning `None`.
pub fn save_index(
    output_dir: &Path,
    records: &[ChunkRecord],
    embeddings: &[Vec<f32>],
) -> Result<Option<SavedIndex>> {
    if records.is_empty() {
        info!("no chunks to index; nothing written");
        return Ok(None);
    }
    if records.len() != embeddings.len() {
        bail!(
            "{} chunks but {} embeddings",
            records.len(),
            embeddings.len()
        );
    }

    let dims = embeddings[0].len();
    let mut index = FlatIndex::new(dims);
    let ids: Vec<u64> = records.iter().map(|r| r.id as u64).collect();
    index.add_with_ids(embeddings, &ids)?;

    std::fs::create_dir_all(output_dir)
        .with_context(|| format!("Failed to create output dir: {}", output_dir.display()))?;
    let paths = artifact_paths(output_dir);
    index.write(&paths.index_path)?;
    write_metadata(&paths.metadata_path, records)?;

    info!(
        vectors = index.len(),
        dims,
        index = %paths.index_path.display(),
        metadata = %paths.metadata_path.display(),
        "saved flat index"
    );
    Ok(Some(paths))
}

fn write_metadata(path: &Path, records: &[ChunkRecord]) -> Result<()> {
    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
    records.serialize(&mut ser)?;
    std::fs::write(path, buf)
        .with_context(|| format!("Failed to write metadata: {}", path.display()))
}

pub fn read_metadata(path: &Path) -> Result<Vec<ChunkRecord>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read metadata: {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse metadata: {}", path.display()))
}

/// Load both artifacts from `dir` and check they agree.
pub fn load_index(dir: &Path) -> Result<(FlatIndex, Vec<ChunkRecord>)> {
    let paths = artifact_paths(dir);
    let index = FlatIndex::read(&paths.index_path)?;
    let records = read_metadata(&paths.metadata_path)?;
    if index.len() != records.len() {
        bail!(
            "index holds {} vectors but metadata has {} records",
            index.len(),
            records.len()
        );
    }
    Ok((index, records))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ChunkMetadata, DocumentMetadata, SourceType};
    use tempfile::TempDir;

    fn record(id: usize, text: &str) -> ChunkRecord {
        ChunkRecord {
            id,
            text: text.to_string(),
            metadata: ChunkMetadata {
                document: DocumentMetadata::local("a.md", SourceType::MarkdownText, "a.md", "h"),
                chunk_id: format!("uuid-{}", id),
                chunk_index: id,
                extracted_data: None,
            },
        }
    }

    #[test]
    fn nearest_first() {
        let mut index = FlatIndex::new(2);
        index
            .add_with_ids(&[vec![0.0, 0.0], vec![1.0, 1.0], vec![5.0, 5.0]], &[0, 1, 2])
            .unwrap();
        let hits = index.search(&[0.9, 1.2], 2).unwrap();
        assert_eq!(hits.iter().map(|h| h.id).collect::<Vec<_>>(), vec![1, 0]);
        assert!((hits[0].distance - 0.05).abs() < 1e-5);
    }

    #[test]
    fn overflowing_header_is_rejected() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(MAGIC);
        bytes.extend_from_slice(&u32::MAX.to_le_bytes());
        bytes.extend_from_slice(&u64::MAX.to_le_bytes());
        let err = FlatIndex::from_bytes(&bytes).unwrap_err();
        assert!(err.to_string().contains("corrupt index header"), "{}", err);

        let mut bytes = Vec::new();
        bytes.extend_from_slice(MAGIC);
        bytes.extend_from_slice(&4u32.to_le_bytes());
        bytes.extend_from_slice(&(u64::MAX / 8).to_le_bytes());
        assert!(FlatIndex::from_bytes(&bytes).is_err());
    }

    #[test]
    fn dimension_mismatch_rejected() {
        let mut index = FlatIndex::new(3);
        assert!(index.add_with_ids(&[vec![1.0, 2.0]], &[0]).is_err());
        assert!(index.add_with_ids(&[vec![1.0, 2.0, 3.0]], &[0, 1]).is_err());
        assert!(index.search(&[1.0], 1).is_err());
    }

    #[test]
    fn bytes_roundtrip_and_corruption() {
        let mut index = FlatIndex::new(2);
        index.add_with_ids(&[vec![1.5, -2.0], vec![0.25, 8.0]], &[7, 9]).unwrap();
        let bytes = index.to_bytes();
        assert_eq!(FlatIndex::from_bytes(&bytes).unwrap(), index);
        assert!(FlatIndex::from_bytes(&bytes[..bytes.len() - 1]).is_err());
        assert!(FlatIndex::from_bytes(b"garbage").is_err());
    }

    #[test]
    fn empty_save_is_noop() {
        let tmp = TempDir::new().unwrap();
        let out = tmp.path().join("index");
        assert!(save_index(&out, &[], &[]).unwrap().is_none());
        assert!(!out.exists());
    }

    #[test]
    fn save_writes_aligned_artifacts_with_four_space_indent() {
        let tmp = TempDir::new().unwrap();
        let records = vec![record(0, "alpha"), record(1, "beta")];
        let embeddings = vec![vec![1.0, 0.0], vec![0.0, 1.0]];
        let saved = save_index(tmp.path(), &records, &embeddings).unwrap().unwrap();

        let raw = std::fs::read_to_string(&saved.metadata_path).unwrap();
        assert!(raw.starts_with("[\n    {\n        \"id\": 0,"));

        let (index, loaded) = load_index(tmp.path()).unwrap();
        assert_eq!(index.len(), 2);
        assert_eq!(loaded, records);
        assert_eq!(index.search(&[0.0, 1.0], 1).unwrap()[0].id, 1);
    }

    #[test]
    fn save_overwrites_previous_run() {
        let tmp = TempDir::new().unwrap();
        save_index(
            tmp.path(),
            &[record(0, "a"), record(1, "b"), record(2, "c")],
            &[vec![1.0], vec![2.0], vec![3.0]],
        )
        .unwrap();
        save_index(tmp.path(), &[record(0, "z")], &[vec![9.0]]).unwrap();
        let (index, records) = load_index(tmp.path()).unwrap();
        assert_eq!(index.len(), 1);
        assert_eq!(records[0].text, "z");
    }

    #[test]
    fn mismatched_embeddings_rejected() {
        let tmp = TempDir::new().unwrap();
        assert!(save_index(tmp.path(), &[record(0, "a")], &[]).is_err());
    }
}
