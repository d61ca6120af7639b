//! Dual (vector + symbolic) search layer: combines ANN similarity from
//! `semgraph-vector`'s `VectorIndex` with a label/type filter over
//! `semgraph-dataset`'s `GraphDataset`, then merges the two result sets
//! with a weighted score.

use chrono::{DateTime, Utc};
use semgraph_dataset::{GraphDataset, QuadPattern};
use semgraph_llm::{EmbeddingClient, EmbeddingError};
use semgraph_model::Object;
use semgraph_vector::VectorIndex;
use std::collections::HashMap;

#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    #[error("semantic search requires a vector index, none was built")]
    NoVectorIndex,
    #[error("embedding the query failed: {0}")]
    Embedding(#[from] EmbeddingError),
}

/// Granularity the search layer starts traversal at, resolved in favour of
/// entity granularity by default (see `/DESIGN.md`). Corpus-level
/// aggregation is an explicit opt-in, never silently mixed into the
/// entity-level default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Zoom {
    #[default]
    Entity,
    Corpus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchMode {
    Dual,
    Entities,
    Semantic,
}

#[derive(Debug, Clone)]
pub struct SearchOptions {
    pub mode: SearchMode,
    pub limit: usize,
    pub semantic_threshold: f64,
    pub zoom: Zoom,
    /// Weights for the `dual` merge, default `0.6·semantic + 0.4·symbolic`.
    pub semantic_weight: f64,
    pub symbolic_weight: f64,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            mode: SearchMode::Dual,
            limit: 10,
            semantic_threshold: 0.7,
            zoom: Zoom::default(),
            semantic_weight: 0.6,
            symbolic_weight: 0.4,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ResultOrigin {
    Semantic,
    Symbolic,
    Dual,
}

#[derive(Debug, Clone)]
pub struct SearchResult {
    pub uri: String,
    pub score: f64,
    pub origin: ResultOrigin,
    pub created: Option<DateTime<Utc>>,
}

/// The `dcterms:created` timestamp recorded for `uri`, if any — exposed so
/// callers composing their own search flow (e.g. `semgraph-engine`, which
/// must not hold a vector-index lock across an `await`) can stamp results
/// without reimplementing the lookup.
pub fn node_created(dataset: &GraphDataset, uri: &str) -> Option<DateTime<Utc>> {
    dataset
        .match_pattern(&QuadPattern {
            subject: Some(uri),
            predicate: Some("dcterms:created"),
            ..Default::default()
        })
        .into_iter()
        .find_map(|q| match &q.object {
            Object::Literal { value, .. } => DateTime::parse_from_rfc3339(value)
                .ok()
                .map(|dt| dt.with_timezone(&Utc)),
            Object::Iri(_) => None,
        })
}

fn entity_confidence(dataset: &GraphDataset, uri: &str) -> f64 {
    dataset
        .match_pattern(&QuadPattern {
            subject: Some(uri),
            predicate: Some("sg:confidence"),
            ..Default::default()
        })
        .into_iter()
        .find_map(|q| match &q.object {
            Object::Literal { value, .. } => value.parse::<f64>().ok(),
            Object::Iri(_) => None,
        })
        .unwrap_or(0.0)
}

/// Case-insensitive substring filter over entity labels ("entities"
/// mode), ranked by stored confidence descending.
pub fn search_entities(dataset: &GraphDataset, query: &str, limit: usize) -> Vec<SearchResult> {
    let query_lower = query.to_lowercase();
    let entity_type_quads = dataset.match_pattern(&QuadPattern {
        predicate: Some("rdf:type"),
        object: Some(&Object::iri("Entity")),
        ..Default::default()
    });

    let mut scored: Vec<SearchResult> = entity_type_quads
        .into_iter()
        .map(|q| q.subject.clone())
        .filter(|uri| {
            let labels = dataset.match_pattern(&QuadPattern {
                subject: Some(uri),
                predicate: Some("skos:prefLabel"),
                ..Default::default()
            });
            labels.into_iter().any(|q| match &q.object {
                Object::Literal { value, .. } => value.to_lowercase().contains(&query_lower),
                Object::Iri(_) => false,
            })
        })
        .map(|uri| {
            let score = entity_confidence(dataset, &uri);
            let created = node_created(dataset, &uri);
            SearchResult {
                uri,
                score,
                origin: ResultOrigin::Symbolic,
                created,
            }
        })
        .collect();

    scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    scored.truncate(limit);
    scored
}

/// Embed `query`, query the index, return the top-`limit` results above
/// `threshold` ("semantic" mode).
pub async fn search_semantic(
    dataset: &GraphDataset,
    index: &VectorIndex,
    embedder: &dyn EmbeddingClient,
    query: &str,
    limit: usize,
    threshold: f64,
) -> Result<Vec<SearchResult>, SearchError> {
    let query_text = semgraph_llm::truncate_for_embedding(query);
    let vector = embedder.embed(&query_text).await?;
    let results = index.search(&vector, limit, Some(threshold));
    Ok(results
        .into_iter()
        .map(|r| SearchResult {
            created: node_created(dataset, &r.uri),
            uri: r.uri,
            score: r.similarity,
            origin: ResultOrigin::Semantic,
        })
        .collect())
}

/// Merge semantic and symbolic result sets by the weighted-sum rule (spec
/// §4.7 "dual" mode): each URI's merged score is
/// `semantic_weight * semantic_score + symbolic_weight * symbolic_score`
/// (0 for whichever half the URI is absent from), deduplicated by URI
/// keeping the higher-scoring entry, ties broken by earlier creation
/// timestamp.
pub fn merge_dual(
    semantic: &[SearchResult],
    symbolic: &[SearchResult],
    options: &SearchOptions,
) -> Vec<SearchResult> {
    let mut combined: HashMap<String, (f64, f64, Option<DateTime<Utc>>)> = HashMap::new();

    for result in semantic {
        let entry = combined.entry(result.uri.clone()).or_insert((0.0, 0.0, result.created));
        entry.0 = entry.0.max(result.score);
        if entry.2.is_none() {
            entry.2 = result.created;
        }
    }
    for result in symbolic {
        let entry = combined.entry(result.uri.clone()).or_insert((0.0, 0.0, result.created));
        entry.1 = entry.1.max(result.score);
        if entry.2.is_none() {
            entry.2 = result.created;
        }
    }

    let mut merged: Vec<SearchResult> = combined
        .into_iter()
        .map(|(uri, (semantic_score, symbolic_score, created))| SearchResult {
            uri,
            score: options.semantic_weight * semantic_score + options.symbolic_weight * symbolic_score,
            origin: ResultOrigin::Dual,
            created,
        })
        .collect();

    merged.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| match (a.created, b.created) {
                (Some(a_ts), Some(b_ts)) => a_ts.cmp(&b_ts),
                (Some(_), None) => std::cmp::Ordering::Less,
                (None, Some(_)) => std::cmp::Ordering::Greater,
                (None, None) => std::cmp::Ordering::Equal,
            })
    });
    merged.truncate(options.limit);
    merged
}

/// Run `options.mode` over `dataset` (+ `index`/`embedder` for the
/// semantic half).
pub async fn search(
    dataset: &GraphDataset,
    index: Option<&VectorIndex>,
    embedder: Option<&dyn EmbeddingClient>,
    query: &str,
    options: &SearchOptions,
) -> Result<Vec<SearchResult>, SearchError> {
    match options.mode {
        SearchMode::Entities => Ok(search_entities(dataset, query, options.limit)),
        SearchMode::Semantic => {
            let index = index.ok_or(SearchError::NoVectorIndex)?;
            let embedder = embedder.ok_or(SearchError::NoVectorIndex)?;
            search_semantic(
                dataset,
                index,
                embedder,
                query,
                options.limit,
                options.semantic_threshold,
            )
            .await
        }
        SearchMode::Dual => {
            let symbolic = search_entities(dataset, query, options.limit);
            let semantic = match (index, embedder) {
                (Some(index), Some(embedder)) => {
                    search_semantic(
                        dataset,
                        index,
                        embedder,
                        query,
                        options.limit,
                        options.semantic_threshold,
                    )
                    .await?
                }
                _ => Vec::new(),
            };
            Ok(merge_dual(&semantic, &symbolic, options))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use semgraph_llm::MockEmbeddingClient;
    use semgraph_model::{Entity, RdfElement, Unit};
    use semgraph_vector::{IndexParams, NodeMetadata};

    fn dataset_with_entities() -> GraphDataset {
        let mut dataset = GraphDataset::new();
        let mut hinton = Entity::new("e:hinton", "Geoffrey Hinton", "en", 0.9).unwrap();
        hinton.export_into(&mut dataset);
        let mut lecun = Entity::new("e:lecun", "Yann LeCun", "en", 0.6).unwrap();
        lecun.export_into(&mut dataset);
        dataset
    }

    #[test]
    fn entities_mode_filters_case_insensitively() {
        let dataset = dataset_with_entities();
        let results = search_entities(&dataset, "geoffrey", 10);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].uri, "e:hinton");
    }

    #[test]
    fn entities_mode_ranks_by_confidence() {
        let mut dataset = GraphDataset::new();
        let mut a = Entity::new("e:a", "Alpha Corp", "en", 0.3).unwrap();
        a.export_into(&mut dataset);
        let mut b = Entity::new("e:b", "Alpha Industries", "en", 0.95).unwrap();
        b.export_into(&mut dataset);
        let results = search_entities(&dataset, "alpha", 10);
        assert_eq!(results[0].uri, "e:b");
    }

    #[tokio::test]
    async fn semantic_mode_requires_index() {
        let dataset = GraphDataset::new();
        let options = SearchOptions {
            mode: SearchMode::Semantic,
            ..Default::default()
        };
        let result = search(&dataset, None, None, "query", &options).await;
        assert!(matches!(result, Err(SearchError::NoVectorIndex)));
    }

    #[tokio::test]
    async fn dual_merge_dedups_and_weights() {
        let dataset = dataset_with_entities();
        let unit = Unit::new("u:1", "Geoffrey Hinton invented backpropagation.", "d1", 0).unwrap();
        let mut dataset = dataset;
        unit.export_into(&mut dataset);

        let mut index = VectorIndex::new(IndexParams::with_dimension(3));
        index
            .add_node(
                "e:hinton",
                &[1.0, 0.0, 0.0],
                NodeMetadata {
                    node_type: "Entity".to_string(),
                    text_length: 10,
                    has_content: false,
                    has_summary: false,
                    timestamp: "0".to_string(),
                },
            )
            .unwrap();
        let embedder = MockEmbeddingClient::with_vectors(3, vec![vec![1.0, 0.0, 0.0]]);
        let options = SearchOptions {
            mode: SearchMode::Dual,
            semantic_threshold: 0.0,
            ..Default::default()
        };
        let results = search(&dataset, Some(&index), Some(&embedder), "geoffrey", &options)
            .await
            .unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].uri, "e:hinton");
        assert!(results[0].score > 0.0);
    }
}
