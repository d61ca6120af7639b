//! Embedding enrichment pipeline: node selection, batched embedding, index
//! build, similarity-edge materialisation.
//!
//! Batching follows a skip-and-log-on-failure shape: one bad embedding
//! never aborts the whole batch.

use crate::index::{IndexParams, NodeMetadata, VectorIndex};
use futures::stream::{self, StreamExt};
use semgraph_dataset::{GraphDataset, QuadPattern};
use semgraph_llm::EmbeddingClient;
use semgraph_model::{Object, Relationship, RdfElement};
use semgraph_namespace::NamespaceRegistry;
use sha2::{Digest, Sha256};
use std::collections::HashSet;

/// Default retrievable types — the node kinds eligible for embedding.
pub fn default_retrievable_types() -> Vec<String> {
    vec![
        "Unit".to_string(),
        "Attribute".to_string(),
        "CommunityElement".to_string(),
        "TextElement".to_string(),
    ]
}

#[derive(Debug, Clone)]
pub struct EnrichOptions {
    /// Required up front: dimension is explicit configuration, never
    /// discovered from the first successful embedding, and mismatches are
    /// rejected rather than coerced.
    pub dimension: usize,
    pub retrievable_types: Vec<String>,
    pub batch_size: usize,
    pub top_k: usize,
    pub min_similarity: f64,
    pub link_across_types: bool,
    pub capacity: usize,
    pub ef_construction: usize,
    pub m: usize,
}

impl EnrichOptions {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            retrievable_types: default_retrievable_types(),
            batch_size: 50,
            top_k: 10,
            min_similarity: 0.7,
            link_across_types: true,
            capacity: 100_000,
            ef_construction: 200,
            m: 16,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct EnrichStatistics {
    pub processing_time_ms: u128,
    pub nodes_processed: usize,
    pub embeddings_generated: usize,
    pub failed_embeddings: usize,
    pub vectors_indexed: usize,
    pub similarity_links_created: usize,
    pub average_similarity_score: f64,
}

pub struct EnrichOutput {
    pub vector_index: Option<VectorIndex>,
    pub similarity_links: Vec<Relationship>,
    pub dataset: GraphDataset,
    pub statistics: EnrichStatistics,
}

#[derive(Debug, Clone)]
struct Candidate {
    uri: String,
    node_type: String,
    text: String,
    has_content: bool,
    has_summary: bool,
}

/// Phase 1 — walk the dataset collecting embeddable nodes.
fn select_candidates(dataset: &GraphDataset, retrievable_types: &[String]) -> Vec<Candidate> {
    let mut subjects: HashSet<String> = HashSet::new();
    for ty in retrievable_types {
        let matches = dataset.match_pattern(&QuadPattern {
            predicate: Some("rdf:type"),
            object: Some(&Object::iri(ty.clone())),
            ..Default::default()
        });
        subjects.extend(matches.into_iter().map(|q| q.subject.clone()));
    }

    let mut candidates = Vec::new();
    for subject in subjects {
        let quads = dataset.match_pattern(&QuadPattern {
            subject: Some(&subject),
            ..Default::default()
        });
        let node_type = quads
            .iter()
            .filter(|q| q.predicate == "rdf:type")
            .find_map(|q| match &q.object {
                Object::Iri(uri) if retrievable_types.contains(uri) => Some(uri.clone()),
                _ => None,
            })
            .unwrap_or_else(|| "Unit".to_string());
        let summary = quads
            .iter()
            .find(|q| q.predicate == "skos:definition")
            .and_then(object_text);
        let content = quads
            .iter()
            .find(|q| q.predicate == "sg:content")
            .and_then(object_text);
        let text = summary.clone().or_else(|| content.clone()).unwrap_or_default();
        if text.trim().is_empty() {
            continue;
        }
        // Nodes exported without a subject URI of their own (e.g. a bare
        // literal-keyed triple) get a deterministic one minted from their
        // type and text, per spec.md:96.
        let uri = if subject.trim().is_empty() {
            deterministic_uri(&node_type, &text)
        } else {
            subject
        };
        candidates.push(Candidate {
            uri,
            node_type,
            text,
            has_content: content.is_some(),
            has_summary: summary.is_some(),
        });
    }
    candidates
}

fn object_text(quad: &&semgraph_model::Quad) -> Option<String> {
    match &quad.object {
        Object::Literal { value, .. } => Some(value.clone()),
        Object::Iri(_) => None,
    }
}

/// Mint a deterministic URI for a node with no identity of its own, as
/// `<kind>:<digest(content)>`. Uses a truncated SHA-256 hex digest rather
/// than an MD5 one, serving the same "stable content fingerprint"
/// invariant without adding an otherwise-unused dependency (see
/// `/DESIGN.md`).
pub fn deterministic_uri(kind: &str, content: &str) -> String {
    let digest = Sha256::digest(content.as_bytes());
    let hex: String = digest.iter().take(8).map(|b| format!("{b:02x}")).collect();
    format!("{kind}:{hex}")
}

fn canonical_pair(a: &str, b: &str) -> (String, String) {
    if a <= b {
        (a.to_string(), b.to_string())
    } else {
        (b.to_string(), a.to_string())
    }
}

/// Run the full enrichment pipeline. Returns an empty but well-formed
/// result when zero nodes are selected or zero vectors are indexed.
pub async fn enrich(
    dataset: &GraphDataset,
    embedder: &dyn EmbeddingClient,
    namespace: &NamespaceRegistry,
    options: &EnrichOptions,
) -> EnrichOutput {
    let start = std::time::Instant::now();
    let candidates = select_candidates(dataset, &options.retrievable_types);
    let mut stats = EnrichStatistics {
        nodes_processed: candidates.len(),
        ..Default::default()
    };

    if candidates.is_empty() {
        stats.processing_time_ms = start.elapsed().as_millis();
        return EnrichOutput {
            vector_index: None,
            similarity_links: Vec::new(),
            dataset: GraphDataset::new(),
            statistics: stats,
        };
    }

    // Phase 2 — batched embedding with per-batch parallelism.
    let mut embeddings: Vec<(Candidate, Vec<f32>)> = Vec::new();
    for batch in candidates.chunks(options.batch_size) {
        let results: Vec<_> = stream::iter(batch.iter())
            .map(|candidate| async move {
                let text = semgraph_llm::truncate_for_embedding(&candidate.text);
                let vector = embedder.embed(&text).await;
                (candidate.clone(), vector)
            })
            .buffer_unordered(options.batch_size)
            .collect()
            .await;

        for (candidate, result) in results {
            match result {
                Ok(vector) if !vector.is_empty() && vector.len() == options.dimension => {
                    embeddings.push((candidate, vector));
                }
                Ok(vector) if vector.is_empty() => {
                    tracing::warn!(uri = %candidate.uri, "embedding call returned empty vector, skipped");
                    stats.failed_embeddings += 1;
                }
                Ok(vector) => {
                    tracing::warn!(
                        uri = %candidate.uri,
                        expected = options.dimension,
                        actual = vector.len(),
                        "embedding dimension mismatch, skipped"
                    );
                    stats.failed_embeddings += 1;
                }
                Err(error) => {
                    tracing::warn!(uri = %candidate.uri, %error, "embedding call failed, skipped");
                    stats.failed_embeddings += 1;
                }
            }
        }
    }
    stats.embeddings_generated = embeddings.len();

    let mut metadata_dataset = GraphDataset::new();
    for (candidate, _) in &embeddings {
        metadata_dataset.add_quad(semgraph_model::Quad {
            subject: candidate.uri.clone(),
            predicate: "sg:hasEmbedding".to_string(),
            object: Object::typed("true", "xsd:boolean"),
            graph: None,
        });
        metadata_dataset.add_quad(semgraph_model::Quad {
            subject: candidate.uri.clone(),
            predicate: "sg:embeddingDimensions".to_string(),
            object: Object::typed(options.dimension.to_string(), "xsd:integer"),
            graph: None,
        });
        metadata_dataset.add_quad(semgraph_model::Quad {
            subject: candidate.uri.clone(),
            predicate: "sg:embeddingNodeType".to_string(),
            object: Object::plain(candidate.node_type.clone()),
            graph: None,
        });
    }

    if embeddings.is_empty() {
        stats.processing_time_ms = start.elapsed().as_millis();
        return EnrichOutput {
            vector_index: None,
            similarity_links: Vec::new(),
            dataset: metadata_dataset,
            statistics: stats,
        };
    }

    // Phase 3 — index build.
    let params = IndexParams {
        dimension: options.dimension,
        capacity: options.capacity,
        ef_construction: options.ef_construction,
        m: options.m,
    };
    let mut index = VectorIndex::new(params);
    for (candidate, vector) in &embeddings {
        let metadata = NodeMetadata {
            node_type: candidate.node_type.clone(),
            text_length: candidate.text.chars().count(),
            has_content: candidate.has_content,
            has_summary: candidate.has_summary,
            timestamp: chrono_now_rfc3339(),
        };
        if let Err(error) = index.add_node(candidate.uri.clone(), vector, metadata) {
            tracing::warn!(uri = %candidate.uri, %error, "vector index insert failed, skipped");
            stats.failed_embeddings += 1;
        }
    }
    stats.vectors_indexed = index.len();

    // Phase 4 — similarity edges, canonical-single: each unordered pair
    // gets at most one edge regardless of traversal order.
    let mut similarity_links = Vec::new();
    let mut seen_pairs: HashSet<(String, String)> = HashSet::new();
    let mut score_sum = 0.0;
    let node_types: std::collections::HashMap<&str, &str> = embeddings
        .iter()
        .map(|(c, _)| (c.uri.as_str(), c.node_type.as_str()))
        .collect();
    let top_k = options.top_k.min(embeddings.len().saturating_sub(1)).max(0);

    if top_k > 0 {
        for (candidate, vector) in &embeddings {
            let results = index.search(vector, top_k + 1, Some(options.min_similarity));
            for result in results {
                if result.uri == candidate.uri {
                    continue;
                }
                if !options.link_across_types {
                    if node_types.get(result.uri.as_str()) != node_types.get(candidate.uri.as_str()) {
                        continue;
                    }
                }
                let pair = canonical_pair(&candidate.uri, &result.uri);
                if !seen_pairs.insert(pair) {
                    continue;
                }
                let uri = namespace.mint("Relationship");
                if let Ok(mut relationship) = Relationship::new(
                    uri,
                    candidate.uri.clone(),
                    result.uri.clone(),
                    "similar_to",
                    result.similarity,
                ) {
                    relationship.set_bidirectional(true);
                    relationship.core_mut().derived_from("vector similarity");
                    score_sum += result.similarity;
                    similarity_links.push(relationship);
                }
            }
        }
    }

    let mut output_dataset = metadata_dataset;
    for relationship in &similarity_links {
        relationship.export_into(&mut output_dataset);
    }

    stats.similarity_links_created = similarity_links.len();
    stats.average_similarity_score = if similarity_links.is_empty() {
        0.0
    } else {
        score_sum / similarity_links.len() as f64
    };
    stats.processing_time_ms = start.elapsed().as_millis();

    EnrichOutput {
        vector_index: Some(index),
        similarity_links,
        dataset: output_dataset,
        statistics: stats,
    }
}

fn chrono_now_rfc3339() -> String {
    // Kept local to avoid a chrono dependency in this crate purely for a
    // timestamp string; callers that need a typed timestamp already have
    // one on the node's `ElementCore`.
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| format!("{}", d.as_secs()))
        .unwrap_or_else(|_| "0".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use semgraph_llm::MockEmbeddingClient;
    use semgraph_model::{TripleSink, Unit};

    fn dataset_with_units(contents: &[&str]) -> GraphDataset {
        let mut dataset = GraphDataset::new();
        for (i, content) in contents.iter().enumerate() {
            let unit = Unit::new(format!("u:{i}"), content.to_string(), "d", 0).unwrap();
            unit.export_into(&mut dataset);
        }
        dataset
    }

    #[test]
    fn candidate_with_no_subject_uri_gets_a_deterministic_one() {
        let mut dataset = GraphDataset::new();
        dataset.add_quad(semgraph_model::Quad {
            subject: String::new(),
            predicate: "rdf:type".to_string(),
            object: Object::iri("Unit"),
            graph: None,
        });
        dataset.add_quad(semgraph_model::Quad {
            subject: String::new(),
            predicate: "sg:content".to_string(),
            object: Object::plain("anonymous content with no subject URI"),
            graph: None,
        });

        let candidates = select_candidates(&dataset, &default_retrievable_types());
        assert_eq!(candidates.len(), 1);
        let expected = deterministic_uri("Unit", "anonymous content with no subject URI");
        assert_eq!(candidates[0].uri, expected);
        assert!(candidates[0].uri.starts_with("Unit:"));
    }

    #[tokio::test]
    async fn zero_candidates_yields_empty_result() {
        let dataset = GraphDataset::new();
        let embedder = MockEmbeddingClient::new(4);
        let namespace = NamespaceRegistry::new();
        let options = EnrichOptions::new(4);
        let output = enrich(&dataset, &embedder, &namespace, &options).await;
        assert!(output.vector_index.is_none());
        assert!(output.similarity_links.is_empty());
    }

    #[tokio::test]
    async fn orthogonal_vectors_produce_no_similarity_edges() {
        let dataset = dataset_with_units(&[
            "Geoffrey Hinton invented backpropagation techniques.",
            "Yann LeCun developed convolutional network architectures.",
            "Yoshua Bengio studied deep generative modelling methods.",
            "Andrew Ng popularised online machine learning courses.",
            "Fei-Fei Li built the ImageNet visual recognition dataset.",
        ]);
        let embedder = MockEmbeddingClient::with_vectors(
            3,
            vec![
                vec![1.0, 0.0, 0.0],
                vec![0.0, 1.0, 0.0],
                vec![0.0, 0.0, 1.0],
                vec![1.0, 0.0, 0.0],
                vec![0.0, 1.0, 0.0],
            ],
        );
        let namespace = NamespaceRegistry::new();
        let mut options = EnrichOptions::new(3);
        options.min_similarity = 0.99;
        let output = enrich(&dataset, &embedder, &namespace, &options).await;
        assert_eq!(output.vector_index.unwrap().len(), 5);
        assert!(output.similarity_links.is_empty());
    }

    #[tokio::test]
    async fn identical_vectors_produce_canonical_similarity_edges() {
        let dataset = dataset_with_units(&[
            "Shared identical content across the first three units.",
            "Shared identical content across the first three units.",
            "Shared identical content across the first three units.",
            "A completely unrelated unit about gardening techniques.",
            "Another unrelated unit about woodworking fundamentals.",
        ]);
        let shared = vec![1.0_f32, 0.0, 0.0];
        let embedder = MockEmbeddingClient::with_vectors(
            3,
            vec![
                shared.clone(),
                shared.clone(),
                shared,
                vec![0.0, 1.0, 0.0],
                vec![0.0, 0.0, 1.0],
            ],
        );
        let namespace = NamespaceRegistry::new();
        let options = EnrichOptions::new(3);
        let output = enrich(&dataset, &embedder, &namespace, &options).await;
        assert_eq!(output.similarity_links.len(), 3);
        for link in &output.similarity_links {
            assert!((link.weight() - 1.0).abs() < 1e-6);
        }
    }
}
