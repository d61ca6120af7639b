//! Approximate-nearest-neighbour index over unit-norm vectors, backed by
//! `hnsw_rs` for deterministic retrieval.

use hnsw_rs::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::{BufReader, BufWriter};
use std::path::Path;

#[derive(Debug, thiserror::Error)]
pub enum VectorIndexError {
    #[error("vector dimension mismatch: index is {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
    #[error("vector was empty")]
    EmptyVector,
    #[error("index capacity ({capacity}) exceeded")]
    CapacityExceeded { capacity: usize },
    #[error("failed to read index file: {0}")]
    Io(#[from] std::io::Error),
    #[error("corrupt index file: {0}")]
    Corrupt(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeMetadata {
    pub node_type: String,
    pub text_length: usize,
    pub has_content: bool,
    pub has_summary: bool,
    /// RFC 3339 timestamp, matching the rest of the workspace's lifecycle
    /// fields.
    pub timestamp: String,
}

#[derive(Debug, Clone)]
pub struct SearchResult {
    pub uri: String,
    pub similarity: f64,
    pub metadata: NodeMetadata,
}

#[derive(Debug, Clone, Copy)]
pub struct IndexParams {
    pub dimension: usize,
    pub capacity: usize,
    pub ef_construction: usize,
    pub m: usize,
}

impl IndexParams {
    /// Sane defaults: capacity 100_000, ef_construction 200, m 16.
    pub fn with_dimension(dimension: usize) -> Self {
        Self {
            dimension,
            capacity: 100_000,
            ef_construction: 200,
            m: 16,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct IndexStatistics {
    pub inserted: usize,
    pub dimension: usize,
    pub capacity: usize,
    pub ef_construction: usize,
    pub m: usize,
}

/// `addNode`/`search`/`getStatistics` contract. Single writer during
/// build, many readers after — enforced by the engine's call discipline,
/// not by this type (an `&mut self` insert and
/// `&self` search make misuse a compile error for any caller that tries to
/// search concurrently with a write through the same borrow).
pub struct VectorIndex {
    hnsw: Hnsw<'static, f32, DistCosine>,
    params: IndexParams,
    uris: Vec<String>,
    /// Normalised vectors, kept alongside the `hnsw_rs` structure so
    /// `save()` can serialise them without depending on that crate's own
    /// (version-specific) internal point-retrieval API. `hnsw_rs::insert`
    /// borrows its data for the index's own lifetime, so each inserted
    /// vector is leaked once via `Box::leak` to mint the `'static` slice
    /// `Hnsw<'static, _, _>` requires; `vectors` below is a separate owned
    /// copy used only for serialisation, not the leaked storage itself.
    vectors: Vec<Vec<f32>>,
    metadata: Vec<NodeMetadata>,
    uri_to_id: HashMap<String, usize>,
}

#[derive(Serialize, Deserialize)]
struct PersistedEntry {
    uri: String,
    vector: Vec<f32>,
    metadata: NodeMetadata,
}

#[derive(Serialize, Deserialize)]
struct PersistedIndex {
    format_version: u32,
    dimension: usize,
    capacity: usize,
    ef_construction: usize,
    m: usize,
    entries: Vec<PersistedEntry>,
}

const PERSISTED_FORMAT_VERSION: u32 = 1;

fn normalise(vector: &[f32]) -> Vec<f32> {
    let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm == 0.0 {
        return vector.to_vec();
    }
    vector.iter().map(|x| x / norm).collect()
}

impl VectorIndex {
    pub fn new(params: IndexParams) -> Self {
        let max_layer = 16.min((params.capacity as f32).log2().ceil() as usize).max(1);
        let hnsw = Hnsw::new(
            params.m,
            params.capacity,
            max_layer,
            params.ef_construction,
            DistCosine {},
        );
        Self {
            hnsw,
            params,
            uris: Vec::new(),
            vectors: Vec::new(),
            metadata: Vec::new(),
            uri_to_id: HashMap::new(),
        }
    }

    pub fn dimension(&self) -> usize {
        self.params.dimension
    }

    pub fn len(&self) -> usize {
        self.uris.len()
    }

    pub fn is_empty(&self) -> bool {
        self.uris.is_empty()
    }

    /// Insert a vector of this index's fixed dimension, normalising it to
    /// unit length first.
    pub fn add_node(
        &mut self,
        uri: impl Into<String>,
        vector: &[f32],
        metadata: NodeMetadata,
    ) -> Result<(), VectorIndexError> {
        if vector.is_empty() {
            return Err(VectorIndexError::EmptyVector);
        }
        if vector.len() != self.params.dimension {
            return Err(VectorIndexError::DimensionMismatch {
                expected: self.params.dimension,
                actual: vector.len(),
            });
        }
        if self.uris.len() >= self.params.capacity {
            return Err(VectorIndexError::CapacityExceeded {
                capacity: self.params.capacity,
            });
        }

        let id = self.uris.len();
        let normalised = normalise(vector);
        // `hnsw_rs::Hnsw::insert` borrows its data for as long as the index
        // lives; leaking a boxed copy is the only safe way to hand it a
        // `'static` slice without making `VectorIndex` self-referential.
        let leaked: &'static [f32] = Box::leak(normalised.clone().into_boxed_slice());
        self.hnsw.insert((leaked, id));
        let uri = uri.into();
        self.uri_to_id.insert(uri.clone(), id);
        self.uris.push(uri);
        self.vectors.push(normalised);
        self.metadata.push(metadata);
        Ok(())
    }

    /// Deterministic approximate top-`k` search, filtering out results
    /// below `min_score` when provided.
    pub fn search(&self, query: &[f32], k: usize, min_score: Option<f64>) -> Vec<SearchResult> {
        if self.is_empty() || query.len() != self.params.dimension {
            return Vec::new();
        }
        let normalised = normalise(query);
        let ef_search = self.params.ef_construction.max(k * 2);
        let neighbours = self.hnsw.search(&normalised, k, ef_search);
        neighbours
            .into_iter()
            .filter_map(|n| {
                let similarity = 1.0 - n.distance as f64;
                if min_score.is_some_and(|threshold| similarity < threshold) {
                    return None;
                }
                let uri = self.uris.get(n.d_id)?.clone();
                let metadata = self.metadata.get(n.d_id)?.clone();
                Some(SearchResult {
                    uri,
                    similarity,
                    metadata,
                })
            })
            .collect()
    }

    pub fn contains(&self, uri: &str) -> bool {
        self.uri_to_id.contains_key(uri)
    }

    pub fn uris(&self) -> &[String] {
        &self.uris
    }

    pub fn get_statistics(&self) -> IndexStatistics {
        IndexStatistics {
            inserted: self.uris.len(),
            dimension: self.params.dimension,
            capacity: self.params.capacity,
            ef_construction: self.params.ef_construction,
            m: self.params.m,
        }
    }

    /// Save to a self-describing file: dimension, size, and construction
    /// parameters are embedded in the header alongside the vectors. The
    /// on-disk format here is a workspace-internal JSON
    /// encoding rather than `hnsw_rs`'s own dump format, so the index can
    /// be rebuilt deterministically on load without depending on that
    /// format's stability across versions.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), VectorIndexError> {
        let entries = self
            .uris
            .iter()
            .enumerate()
            .map(|(id, uri)| PersistedEntry {
                uri: uri.clone(),
                vector: self.vectors[id].clone(),
                metadata: self.metadata[id].clone(),
            })
            .collect();
        let persisted = PersistedIndex {
            format_version: PERSISTED_FORMAT_VERSION,
            dimension: self.params.dimension,
            capacity: self.params.capacity,
            ef_construction: self.params.ef_construction,
            m: self.params.m,
            entries,
        };
        let file = std::fs::File::create(path)?;
        serde_json::to_writer(BufWriter::new(file), &persisted)
            .map_err(|e| VectorIndexError::Corrupt(e.to_string()))
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, VectorIndexError> {
        let file = std::fs::File::open(path)?;
        let persisted: PersistedIndex = serde_json::from_reader(BufReader::new(file))
            .map_err(|e| VectorIndexError::Corrupt(e.to_string()))?;
        if persisted.format_version != PERSISTED_FORMAT_VERSION {
            return Err(VectorIndexError::Corrupt(format!(
                "unsupported format version {}",
                persisted.format_version
            )));
        }
        let params = IndexParams {
            dimension: persisted.dimension,
            capacity: persisted.capacity,
            ef_construction: persisted.ef_construction,
            m: persisted.m,
        };
        let mut index = VectorIndex::new(params);
        for entry in persisted.entries {
            index.add_node(entry.uri, &entry.vector, entry.metadata)?;
        }
        Ok(index)
    }
}
