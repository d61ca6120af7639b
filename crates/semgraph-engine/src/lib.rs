//! Operation dispatcher: a single `execute(operation, params)` entry point
//! that validates size limits, mints a request id, times the call, records
//! metrics, and dispatches to the model/decompose/hyde/vector/search
//! collaborators.
//!
//! One public async entry point wraps a handful of internal phases, with
//! its own stats/error type, generalised from a single sync loop to the
//! engine's full operation surface.

mod community;
mod error;
mod metrics;

pub use community::{CommunityDetector, PageRankProvider};
pub use error::OperationError;
pub use metrics::{MetricsRegistry, OperationMetric};

use chrono::Utc;
use parking_lot::RwLock;
use semgraph_dataset::{GraphDataset, QuadPattern};
use semgraph_decompose::{Chunk, DecomposeOptions};
use semgraph_hyde::HydeOptions;
use semgraph_llm::{EmbeddingClient, LlmClient};
use semgraph_model::{Object, RdfElement};
use semgraph_namespace::NamespaceRegistry;
use semgraph_search::{SearchMode, SearchOptions};
use semgraph_vector::EnrichOptions;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Size limits and default timeout.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub max_text_length: usize,
    pub max_batch_size: usize,
    pub default_timeout: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_text_length: 50_000,
            max_batch_size: 10,
            default_timeout: Duration::from_secs(5 * 60),
        }
    }
}

/// Parameters for each named operation in the engine's operation surface.
#[derive(Debug, Clone)]
pub enum OperationParams {
    Decompose {
        text: Option<String>,
        chunks: Option<Vec<Chunk>>,
        options: DecomposeOptions,
    },
    Enrich {
        options: EnrichOptions,
    },
    HydeGenerate {
        queries: Vec<String>,
        options: HydeOptions,
    },
    HydeQuery {
        filters: HashMap<String, String>,
        limit: usize,
    },
    Search {
        query: String,
        search_type: Option<String>,
        limit: usize,
        threshold: f64,
    },
    Pipeline {
        text: Option<String>,
        chunks: Option<Vec<Chunk>>,
        options: DecomposeOptions,
        enrich_options: EnrichOptions,
    },
    Stats,
    Entities {
        limit: usize,
        offset: usize,
        entity_type: Option<String>,
        name: Option<String>,
    },
    Communities {
        limit: Option<usize>,
    },
    Export {
        format: ExportFormat,
        limit: Option<usize>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Turtle,
    NTriples,
    JsonLd,
    Json,
}

impl OperationParams {
    /// The name metrics and the `{success,...}` envelope are keyed by,
    /// as `operation.<name>.duration/.count/.errors`.
    pub fn name(&self) -> &'static str {
        match self {
            OperationParams::Decompose { .. } => "decompose",
            OperationParams::Enrich { .. } => "enrich",
            OperationParams::HydeGenerate { .. } => "hyde-generate",
            OperationParams::HydeQuery { .. } => "hyde-query",
            OperationParams::Search { .. } => "search",
            OperationParams::Pipeline { .. } => "pipeline",
            OperationParams::Stats => "stats",
            OperationParams::Entities { .. } => "entities",
            OperationParams::Communities { .. } => "communities",
            OperationParams::Export { .. } => "export",
        }
    }
}

/// `{success, requestId, processingTimeMs, ...}` envelope.
#[derive(Debug, Clone)]
pub struct OperationResult {
    pub success: bool,
    pub request_id: String,
    pub processing_time_ms: u128,
    pub data: Option<Value>,
    pub error: Option<String>,
    pub message: Option<String>,
}

fn now_rfc3339() -> String {
    Utc::now().to_rfc3339()
}

/// Owns the dataset, an optional vector index, and the collaborators.
/// One instance per process: a single logical engine instance.
pub struct Engine {
    dataset: RwLock<GraphDataset>,
    vector_index: RwLock<Option<semgraph_vector::VectorIndex>>,
    namespace: NamespaceRegistry,
    llm: Option<Arc<dyn LlmClient>>,
    embedder: Option<Arc<dyn EmbeddingClient>>,
    community_detector: Option<Arc<dyn CommunityDetector>>,
    pagerank: Option<Arc<dyn PageRankProvider>>,
    metrics: MetricsRegistry,
    config: EngineConfig,
}

#[derive(Default)]
pub struct EngineBuilder {
    namespace: Option<NamespaceRegistry>,
    llm: Option<Arc<dyn LlmClient>>,
    embedder: Option<Arc<dyn EmbeddingClient>>,
    community_detector: Option<Arc<dyn CommunityDetector>>,
    pagerank: Option<Arc<dyn PageRankProvider>>,
    config: EngineConfig,
}

impl EngineBuilder {
    pub fn new() -> Self {
        Self {
            config: EngineConfig::default(),
            ..Default::default()
        }
    }

    pub fn namespace(mut self, namespace: NamespaceRegistry) -> Self {
        self.namespace = Some(namespace);
        self
    }

    pub fn llm(mut self, llm: Arc<dyn LlmClient>) -> Self {
        self.llm = Some(llm);
        self
    }

    pub fn embedder(mut self, embedder: Arc<dyn EmbeddingClient>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    pub fn community_detector(mut self, detector: Arc<dyn CommunityDetector>) -> Self {
        self.community_detector = Some(detector);
        self
    }

    pub fn pagerank(mut self, provider: Arc<dyn PageRankProvider>) -> Self {
        self.pagerank = Some(provider);
        self
    }

    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> Engine {
        Engine {
            dataset: RwLock::new(GraphDataset::new()),
            vector_index: RwLock::new(None),
            namespace: self.namespace.unwrap_or_default(),
            llm: self.llm,
            embedder: self.embedder,
            community_detector: self.community_detector,
            pagerank: self.pagerank,
            metrics: MetricsRegistry::new(),
            config: self.config,
        }
    }
}

impl Engine {
    pub fn builder() -> EngineBuilder {
        EngineBuilder::new()
    }

    pub fn metrics(&self) -> &MetricsRegistry {
        &self.metrics
    }

    /// A read-only snapshot of the dataset. The dataset itself is never
    /// exposed mutably outside `execute` — every mutation goes through an
    /// operation so metrics/timestamps stay consistent.
    pub fn dataset_snapshot(&self) -> GraphDataset {
        self.dataset.read().clone()
    }

    fn resolve_chunks(
        &self,
        text: &Option<String>,
        chunks: &Option<Vec<Chunk>>,
    ) -> Result<Vec<Chunk>, OperationError> {
        if let Some(chunks) = chunks {
            if chunks.len() > self.config.max_batch_size {
                return Err(OperationError::Validation(format!(
                    "chunks.length ({}) exceeds maxBatchSize ({})",
                    chunks.len(),
                    self.config.max_batch_size
                )));
            }
            for chunk in chunks {
                self.validate_text_length(&chunk.content)?;
            }
            return Ok(chunks.clone());
        }
        if let Some(text) = text {
            self.validate_text_length(text)?;
            return Ok(vec![Chunk {
                content: text.clone(),
                source: "input".to_string(),
            }]);
        }
        Err(OperationError::Validation(
            "either text or chunks is required".to_string(),
        ))
    }

    fn validate_text_length(&self, text: &str) -> Result<(), OperationError> {
        if text.chars().count() > self.config.max_text_length {
            return Err(OperationError::Validation(format!(
                "text.length exceeds maxTextLength ({})",
                self.config.max_text_length
            )));
        }
        Ok(())
    }

    fn require_llm(&self) -> Result<&Arc<dyn LlmClient>, OperationError> {
        self.llm
            .as_ref()
            .ok_or_else(|| OperationError::Validation("an LLM handler is required".to_string()))
    }

    fn require_embedder(&self) -> Result<&Arc<dyn EmbeddingClient>, OperationError> {
        self.embedder
            .as_ref()
            .ok_or_else(|| OperationError::Validation("an embedding handler is required".to_string()))
    }

    /// Dispatch `operation`. Validates size limits, generates a
    /// request id, times the call, records `operation.<name>.*` metrics,
    /// and wraps the outcome in the `{success, requestId, processingTimeMs,
    /// ...}` envelope.
    pub async fn execute(&self, operation: OperationParams) -> OperationResult {
        let request_id = uuid::Uuid::new_v4().to_string();
        let name = operation.name();
        let start = Instant::now();

        let outcome = tokio::time::timeout(self.config.default_timeout, self.dispatch(operation)).await;

        let processing_time_ms = start.elapsed().as_millis();
        match outcome {
            Ok(Ok(data)) => {
                self.metrics.record(name, processing_time_ms, true);
                tracing::info!(operation = name, %request_id, processing_time_ms, "operation succeeded");
                OperationResult {
                    success: true,
                    request_id,
                    processing_time_ms,
                    data: Some(data),
                    error: None,
                    message: None,
                }
            }
            Ok(Err(error)) => {
                self.metrics.record(name, processing_time_ms, false);
                tracing::warn!(operation = name, %request_id, %error, "operation failed");
                OperationResult {
                    success: false,
                    request_id,
                    processing_time_ms,
                    data: None,
                    error: Some(error.kind().to_string()),
                    message: Some(error.to_string()),
                }
            }
            Err(_) => {
                self.metrics.record(name, processing_time_ms, false);
                let error = OperationError::Timeout(self.config.default_timeout);
                tracing::warn!(operation = name, %request_id, "operation timed out");
                OperationResult {
                    success: false,
                    request_id,
                    processing_time_ms,
                    data: None,
                    error: Some(error.kind().to_string()),
                    message: Some(error.to_string()),
                }
            }
        }
    }

    async fn dispatch(&self, operation: OperationParams) -> Result<Value, OperationError> {
        match operation {
            OperationParams::Decompose { text, chunks, options } => {
                self.op_decompose(&text, &chunks, &options).await
            }
            OperationParams::Enrich { options } => self.op_enrich(&options).await,
            OperationParams::HydeGenerate { queries, options } => {
                self.op_hyde_generate(&queries, &options).await
            }
            OperationParams::HydeQuery { filters, limit } => self.op_hyde_query(&filters, limit),
            OperationParams::Search {
                query,
                search_type,
                limit,
                threshold,
            } => self.op_search(&query, search_type.as_deref(), limit, threshold).await,
            OperationParams::Pipeline {
                text,
                chunks,
                options,
                enrich_options,
            } => self.op_pipeline(&text, &chunks, &options, &enrich_options).await,
            OperationParams::Stats => self.op_stats(),
            OperationParams::Entities {
                limit,
                offset,
                entity_type,
                name,
            } => self.op_entities(limit, offset, entity_type.as_deref(), name.as_deref()),
            OperationParams::Communities { limit } => self.op_communities(limit),
            OperationParams::Export { format, limit } => self.op_export(format, limit),
        }
    }

    async fn op_decompose(
        &self,
        text: &Option<String>,
        chunks: &Option<Vec<Chunk>>,
        options: &DecomposeOptions,
    ) -> Result<Value, OperationError> {
        let chunks = self.resolve_chunks(text, chunks)?;
        let llm = self.require_llm()?.clone();
        let output = semgraph_decompose::decompose(&chunks, llm.as_ref(), &self.namespace, options).await;

        let units: Vec<Value> = output.units.iter().map(|u| json!({"uri": u.uri(), "content": u.content()})).collect();
        let entities: Vec<Value> = output
            .entities
            .iter()
            .map(|e| json!({"uri": e.uri(), "label": e.preferred_label(), "confidence": e.confidence()}))
            .collect();
        let relationships: Vec<Value> = output
            .relationships
            .iter()
            .map(|r| json!({"uri": r.uri(), "source": r.source_uri(), "target": r.target_uri(), "type": r.rel_type()}))
            .collect();
        let stats = &output.statistics;

        self.dataset.write().merge(output.dataset);

        Ok(json!({
            "units": units,
            "entities": entities,
            "relationships": relationships,
            "statistics": {
                "totalChunks": stats.total_chunks,
                "totalUnits": stats.total_units,
                "totalEntities": stats.total_entities,
                "totalRelationships": stats.total_relationships,
                "unitExtractionFallbacks": stats.unit_extraction_fallbacks,
                "entityExtractionFallbacks": stats.entity_extraction_fallbacks,
                "summaryFallbacks": stats.summary_fallbacks,
                "entityMerges": stats.entity_merges,
            },
        }))
    }

    async fn op_enrich(&self, options: &EnrichOptions) -> Result<Value, OperationError> {
        let embedder = self.require_embedder()?.clone();
        let dataset = self.dataset.read().clone();
        let output = semgraph_vector::enrich(&dataset, embedder.as_ref(), &self.namespace, options).await;

        let stats = output.statistics.clone();
        let similarity_links: Vec<Value> = output
            .similarity_links
            .iter()
            .map(|r| json!({"uri": r.uri(), "source": r.source_uri(), "target": r.target_uri(), "weight": r.weight()}))
            .collect();
        let index_present = output.vector_index.is_some();

        {
            let mut dataset = self.dataset.write();
            dataset.merge(output.dataset);
            for link in &output.similarity_links {
                link.export_into(&mut *dataset);
            }
        }
        if let Some(index) = output.vector_index {
            *self.vector_index.write() = Some(index);
        }

        Ok(json!({
            "vectorIndexBuilt": index_present,
            "similarityLinks": similarity_links,
            "statistics": {
                "processingTimeMs": stats.processing_time_ms,
                "nodesProcessed": stats.nodes_processed,
                "embeddingsGenerated": stats.embeddings_generated,
                "failedEmbeddings": stats.failed_embeddings,
                "vectorsIndexed": stats.vectors_indexed,
                "similarityLinksCreated": stats.similarity_links_created,
                "averageSimilarityScore": stats.average_similarity_score,
            },
        }))
    }

    async fn op_hyde_generate(&self, queries: &[String], options: &HydeOptions) -> Result<Value, OperationError> {
        let llm = self.require_llm()?.clone();
        let mut all_hypotheses = Vec::new();
        let mut merged = GraphDataset::new();
        for query in queries {
            self.validate_text_length(query)?;
            let query_uri = self.namespace.mint("Unit");
            let query_unit = semgraph_model::Unit::new(query_uri.clone(), query.clone(), "query", 0)
                .map_err(|e| OperationError::Internal(e.to_string()))?;
            query_unit.export_into(&mut merged);

            let output = semgraph_hyde::generate(query, &query_uri, llm.as_ref(), &self.namespace, options).await;
            for hypothesis in &output.hypotheses {
                all_hypotheses.push(json!({
                    "uri": hypothesis.uri(),
                    "content": hypothesis.content(),
                    "query": query,
                }));
            }
            merged.merge(output.dataset);
        }
        self.dataset.write().merge(merged);
        Ok(json!({ "hypotheses": all_hypotheses }))
    }

    fn op_hyde_query(&self, filters: &HashMap<String, String>, limit: usize) -> Result<Value, OperationError> {
        let dataset = self.dataset.read();
        let mut nodes = semgraph_hyde::query_hypothetical(&dataset, filters);
        nodes.truncate(limit.max(1));
        let payload: Vec<Value> = nodes
            .into_iter()
            .map(|n| json!({ "uri": n.uri, "propertyCount": n.properties.len() }))
            .collect();
        Ok(json!({ "nodes": payload }))
    }

    async fn op_search(
        &self,
        query: &str,
        search_type: Option<&str>,
        limit: usize,
        threshold: f64,
    ) -> Result<Value, OperationError> {
        self.validate_text_length(query)?;
        let mode = match search_type {
            Some("entities") => SearchMode::Entities,
            Some("semantic") => SearchMode::Semantic,
            _ => SearchMode::Dual,
        };
        let dataset = self.dataset.read().clone();

        let symbolic = if mode != SearchMode::Semantic {
            semgraph_search::search_entities(&dataset, query, limit)
        } else {
            Vec::new()
        };

        let semantic = if mode != SearchMode::Entities {
            let embedder = self.require_embedder()?.clone();
            let query_text = semgraph_llm::truncate_for_embedding(query);
            // Embed before taking the index lock: the await never holds a
            // lock across the embedding call.
            let vector = embedder
                .embed(&query_text)
                .await
                .map_err(semgraph_search::SearchError::from)?;
            let index_guard = self.vector_index.read();
            let index = index_guard.as_ref().ok_or(semgraph_search::SearchError::NoVectorIndex)?;
            let raw = index.search(&vector, limit, Some(threshold));
            raw.into_iter()
                .map(|r| semgraph_search::SearchResult {
                    created: semgraph_search::node_created(&dataset, &r.uri),
                    uri: r.uri,
                    score: r.similarity,
                    origin: semgraph_search::ResultOrigin::Semantic,
                })
                .collect()
        } else {
            Vec::new()
        };

        let results = match mode {
            SearchMode::Entities => symbolic,
            SearchMode::Semantic => semantic,
            SearchMode::Dual => {
                let options = SearchOptions {
                    mode,
                    limit,
                    semantic_threshold: threshold,
                    ..Default::default()
                };
                semgraph_search::merge_dual(&semantic, &symbolic, &options)
            }
        };

        let payload: Vec<Value> = results
            .iter()
            .map(|r| json!({"uri": r.uri, "score": r.score, "origin": format!("{:?}", r.origin)}))
            .collect();
        Ok(json!({ "results": payload }))
    }

    async fn op_pipeline(
        &self,
        text: &Option<String>,
        chunks: &Option<Vec<Chunk>>,
        options: &DecomposeOptions,
        enrich_options: &EnrichOptions,
    ) -> Result<Value, OperationError> {
        // The "pipeline" operation composes decompose -> enrich -> communities -> stats.
        let decompose_result = self.op_decompose(text, chunks, options).await?;
        let enrich_result = self.op_enrich(enrich_options).await?;
        let communities_result = self.op_communities(None).unwrap_or_else(|_| json!({"communities": []}));
        let stats_result = self.op_stats()?;
        Ok(json!({
            "decompose": decompose_result,
            "enrich": enrich_result,
            "communities": communities_result,
            "stats": stats_result,
        }))
    }

    fn op_stats(&self) -> Result<Value, OperationError> {
        let dataset = self.dataset.read();
        let index_stats = self.vector_index.read().as_ref().map(|index| {
            let stats = index.get_statistics();
            json!({
                "inserted": stats.inserted,
                "dimension": stats.dimension,
                "capacity": stats.capacity,
                "efConstruction": stats.ef_construction,
                "m": stats.m,
            })
        });
        let metrics: HashMap<String, Value> = self
            .metrics
            .snapshot()
            .into_iter()
            .map(|(name, metric)| {
                (
                    name,
                    json!({
                        "count": metric.count,
                        "errors": metric.errors,
                        "averageDurationMs": metric.average_duration_ms(),
                    }),
                )
            })
            .collect();
        Ok(json!({
            "quadCount": dataset.len(),
            "vectorIndex": index_stats,
            "operations": metrics,
        }))
    }

    fn op_entities(
        &self,
        limit: usize,
        offset: usize,
        entity_type: Option<&str>,
        name: Option<&str>,
    ) -> Result<Value, OperationError> {
        let dataset = self.dataset.read();
        let type_filter = entity_type.unwrap_or("Entity");
        let mut uris: Vec<String> = dataset
            .match_pattern(&QuadPattern {
                predicate: Some("rdf:type"),
                object: Some(&Object::iri(type_filter)),
                ..Default::default()
            })
            .into_iter()
            .map(|q| q.subject.clone())
            .collect();
        uris.sort();

        if let Some(name) = name {
            let name_lower = name.to_lowercase();
            uris.retain(|uri| {
                dataset
                    .match_pattern(&QuadPattern {
                        subject: Some(uri),
                        predicate: Some("skos:prefLabel"),
                        ..Default::default()
                    })
                    .into_iter()
                    .any(|q| match &q.object {
                        Object::Literal { value, .. } => value.to_lowercase().contains(&name_lower),
                        Object::Iri(_) => false,
                    })
            });
        }

        let page: Vec<Value> = uris
            .into_iter()
            .skip(offset)
            .take(limit)
            .map(|uri| json!({ "uri": uri }))
            .collect();
        Ok(json!({ "entities": page }))
    }

    fn op_communities(&self, limit: Option<usize>) -> Result<Value, OperationError> {
        let detector = self
            .community_detector
            .as_ref()
            .ok_or_else(|| OperationError::Validation("no community detector configured".to_string()))?;
        let elements = {
            let dataset = self.dataset.read();
            detector.detect(&dataset, limit)
        };

        let payload: Vec<Value> = elements
            .iter()
            .map(|c| json!({ "uri": c.uri(), "summary": c.summary() }))
            .collect();

        if let Some(provider) = &self.pagerank {
            let scores = {
                let dataset = self.dataset.read();
                provider.rank(&dataset)
            };
            let mut dataset = self.dataset.write();
            for (uri, score) in scores {
                dataset.add_quad(semgraph_model::Quad {
                    subject: uri,
                    predicate: "sg:pagerank".to_string(),
                    object: Object::typed(score.to_string(), "xsd:double"),
                    graph: None,
                });
            }
        }

        {
            let mut dataset = self.dataset.write();
            for element in elements {
                element.export_into(&mut *dataset);
            }
        }

        Ok(json!({ "communities": payload }))
    }

    fn op_export(&self, format: ExportFormat, limit: Option<usize>) -> Result<Value, OperationError> {
        let dataset = self.dataset.read();
        let body = match format {
            ExportFormat::Turtle => dataset.export_turtle(&self.namespace),
            ExportFormat::NTriples => dataset.export_ntriples(),
            ExportFormat::JsonLd => dataset.export_jsonld().to_string(),
            ExportFormat::Json => dataset.export_json().to_string(),
        };
        let body = if let Some(limit) = limit {
            body.lines().take(limit).collect::<Vec<_>>().join("\n")
        } else {
            body
        };
        Ok(json!({ "format": format!("{format:?}"), "data": body, "exportedAt": now_rfc3339() }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use semgraph_llm::{MockEmbeddingClient, MockLlmClient};

    fn test_engine() -> Engine {
        Engine::builder()
            .namespace(NamespaceRegistry::with_instance_base("http://test.local"))
            .llm(Arc::new(MockLlmClient::new()))
            .embedder(Arc::new(MockEmbeddingClient::new(4)))
            .build()
    }

    #[tokio::test]
    async fn decompose_rejects_oversized_text() {
        let engine = Engine::builder()
            .namespace(NamespaceRegistry::new())
            .llm(Arc::new(MockLlmClient::new()))
            .config(EngineConfig {
                max_text_length: 5,
                ..Default::default()
            })
            .build();

        let result = engine
            .execute(OperationParams::Decompose {
                text: Some("far too long for the limit".to_string()),
                chunks: None,
                options: DecomposeOptions::default(),
            })
            .await;

        assert!(!result.success);
        assert_eq!(result.error.as_deref(), Some("ValidationError"));
    }

    #[tokio::test]
    async fn decompose_without_llm_is_validation_error() {
        let engine = Engine::builder().namespace(NamespaceRegistry::new()).build();
        let result = engine
            .execute(OperationParams::Decompose {
                text: Some("Geoffrey Hinton works on deep learning.".to_string()),
                chunks: None,
                options: DecomposeOptions::default(),
            })
            .await;
        assert!(!result.success);
        assert_eq!(result.error.as_deref(), Some("ValidationError"));
    }

    #[tokio::test]
    async fn decompose_populates_dataset_and_stats() {
        let engine = test_engine();
        let result = engine
            .execute(OperationParams::Decompose {
                text: Some("Geoffrey Hinton invented backpropagation. Yann LeCun built LeNet.".to_string()),
                chunks: None,
                options: DecomposeOptions::default(),
            })
            .await;
        assert!(result.success);
        assert!(result.request_id.len() > 0);
        let data = result.data.unwrap();
        assert!(data["units"].as_array().unwrap().len() > 0);
        assert_eq!(engine.dataset_snapshot().is_empty(), false);
    }

    #[tokio::test]
    async fn stats_reports_quad_count_and_metrics() {
        let engine = test_engine();
        engine
            .execute(OperationParams::Decompose {
                text: Some("A short chunk about Alpha Corp.".to_string()),
                chunks: None,
                options: DecomposeOptions::default(),
            })
            .await;
        let result = engine.execute(OperationParams::Stats).await;
        assert!(result.success);
        let data = result.data.unwrap();
        assert!(data["quadCount"].as_u64().unwrap() > 0);
        assert!(data["operations"]["decompose"]["count"].as_u64().unwrap() >= 1);
    }

    #[tokio::test]
    async fn search_without_embedder_or_index_falls_back_to_entities_mode() {
        let engine = test_engine();
        engine
            .execute(OperationParams::Decompose {
                text: Some("Geoffrey Hinton invented backpropagation.".to_string()),
                chunks: None,
                options: DecomposeOptions::default(),
            })
            .await;
        let result = engine
            .execute(OperationParams::Search {
                query: "Geoffrey".to_string(),
                search_type: Some("entities".to_string()),
                limit: 10,
                threshold: 0.7,
            })
            .await;
        assert!(result.success);
    }

    #[tokio::test]
    async fn communities_without_detector_is_validation_error() {
        let engine = test_engine();
        let result = engine.execute(OperationParams::Communities { limit: None }).await;
        assert!(!result.success);
        assert_eq!(result.error.as_deref(), Some("ValidationError"));
    }

    #[tokio::test]
    async fn export_ntriples_roundtrips_through_dataset() {
        let engine = test_engine();
        engine
            .execute(OperationParams::Decompose {
                text: Some("Alpha Corp builds things.".to_string()),
                chunks: None,
                options: DecomposeOptions::default(),
            })
            .await;
        let result = engine
            .execute(OperationParams::Export {
                format: ExportFormat::NTriples,
                limit: None,
            })
            .await;
        assert!(result.success);
        let data = result.data.unwrap();
        assert!(data["data"].as_str().unwrap().contains("Alpha Corp") || !data["data"].as_str().unwrap().is_empty());
    }
}
