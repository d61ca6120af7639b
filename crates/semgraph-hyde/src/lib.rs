//! Hypothetical-document generation: a single hypothesis-unit generator
//! built on a confidence-bearing evidence vocabulary.

mod confidence;

use semgraph_dataset::{GraphDataset, QuadPattern};
use semgraph_llm::{GenerateOptions, LlmClient};
use semgraph_model::{Object, RdfElement, Relationship, Unit};
use semgraph_namespace::NamespaceRegistry;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};

pub use confidence::{base_confidence, confidence_with_jitter};

const PROMPT_TEMPLATES: &[&str] = &[
    "Write a detailed, hypothetical passage that would directly answer: {query}",
    "Imagine a well-sourced document excerpt answering the question: {query}",
    "Draft a plausible encyclopedia-style answer to: {query}",
];

#[derive(Debug, Clone)]
pub struct HydeOptions {
    pub hypotheses_per_query: usize,
    pub re_extract_entities: bool,
    pub base_temperature: f32,
}

impl Default for HydeOptions {
    fn default() -> Self {
        Self {
            hypotheses_per_query: 3,
            re_extract_entities: false,
            base_temperature: 0.7,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct HydeStats {
    pub hypotheses_requested: usize,
    pub hypotheses_generated: usize,
    pub hypotheses_skipped: usize,
}

pub struct HydeOutput {
    pub hypotheses: Vec<Unit>,
    pub relationships: Vec<Relationship>,
    pub dataset: GraphDataset,
    pub statistics: HydeStats,
}

fn seed_for(query: &str, index: usize) -> u64 {
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    query.hash(&mut hasher);
    index.hash(&mut hasher);
    hasher.finish()
}

/// Generate `options.hypotheses_per_query` hypotheses for `query`.
/// `query_uri` anchors the `hypothetical-answer` relationships; the
/// caller mints/owns it (typically the URI of the `Unit` representing the
/// original query, if one exists in the dataset).
pub async fn generate(
    query: &str,
    query_uri: &str,
    llm: &dyn LlmClient,
    namespace: &NamespaceRegistry,
    options: &HydeOptions,
) -> HydeOutput {
    let mut stats = HydeStats {
        hypotheses_requested: options.hypotheses_per_query,
        ..Default::default()
    };
    let mut hypotheses = Vec::new();
    let mut relationships = Vec::new();

    for index in 0..options.hypotheses_per_query {
        let template = PROMPT_TEMPLATES[index % PROMPT_TEMPLATES.len()];
        let prompt = template.replace("{query}", query);
        let temperature = options.base_temperature + index as f32 * 0.1;
        let generate_options = GenerateOptions {
            temperature: Some(temperature),
            ..Default::default()
        };

        let content = match llm.generate(&prompt, None, &generate_options).await {
            Ok(text) if !text.trim().is_empty() => text,
            _ => {
                tracing::warn!(%index, "hyde hypothesis generation failed, skipping sibling");
                stats.hypotheses_skipped += 1;
                continue;
            }
        };

        let uri = namespace.mint("Unit");
        let mut hypothesis = match Unit::new(uri, content.clone(), "hyde", 0) {
            Ok(unit) => unit,
            Err(_) => {
                stats.hypotheses_skipped += 1;
                continue;
            }
        };
        hypothesis.core_mut().set_sub_type("hypothesis");
        let confidence = confidence_with_jitter(&content, query, seed_for(query, index));
        hypothesis.core_mut().mark_maybe(confidence);

        let link_uri = namespace.mint("Relationship");
        if let Ok(mut link) = Relationship::new(
            link_uri,
            query_uri.to_string(),
            hypothesis.uri().to_string(),
            "hypothetical-answer",
            confidence,
        ) {
            link.core_mut().mark_maybe(confidence);
            relationships.push(link);
        }

        if options.re_extract_entities {
            relationships.extend(
                re_extract_entities(&hypothesis, confidence, llm, namespace).await,
            );
        }

        hypotheses.push(hypothesis);
        stats.hypotheses_generated += 1;
    }

    let mut dataset = GraphDataset::new();
    for hypothesis in &hypotheses {
        hypothesis.export_into(&mut dataset);
    }
    for relationship in &relationships {
        relationship.export_into(&mut dataset);
    }

    HydeOutput {
        hypotheses,
        relationships,
        dataset,
        statistics: stats,
    }
}

/// Second LLM call with a terse list-prompt; entity confidence is scaled
/// to 0.8× the parent hypothesis's confidence. Entities
/// themselves are represented here only as `mentions` relationships back
/// to freshly minted entity-shaped URIs — callers that need full `Entity`
/// nodes should route the hypothesis content back through
/// `semgraph-decompose` instead; this keeps `semgraph-hyde` from taking a
/// dependency on the decomposer for a narrow, already-specified slice.
async fn re_extract_entities(
    hypothesis: &Unit,
    parent_confidence: f64,
    llm: &dyn LlmClient,
    namespace: &NamespaceRegistry,
) -> Vec<Relationship> {
    let prompt = format!("List the key named entities in: {}", hypothesis.content());
    let response = match llm.generate(&prompt, None, &GenerateOptions::default()).await {
        Ok(text) => text,
        Err(_) => return Vec::new(),
    };
    response
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .filter_map(|name| {
            let entity_uri = namespace.mint("Entity");
            let link_uri = namespace.mint("Relationship");
            let mut link = Relationship::new(
                link_uri,
                hypothesis.uri().to_string(),
                entity_uri,
                "mentions",
                (parent_confidence * 0.8).clamp(0.0, 1.0),
            )
            .ok()?;
            link.core_mut().mark_maybe(parent_confidence * 0.8);
            link.set_description(name.to_string());
            Some(link)
        })
        .collect()
}

/// A node carrying `maybe=true`, with its full property map, for
/// query-time surfacing of uncertain content.
#[derive(Debug, Clone)]
pub struct HypotheticalNode {
    pub uri: String,
    pub properties: HashMap<String, Vec<Object>>,
}

/// Scan `dataset` for subjects carrying `sg:maybe = true`, filtered by
/// equality over `filters` (predicate -> expected plain-literal value).
/// `queryHypothetical(dataset, {"sg:maybe": "false"})` is empty by
/// construction since every returned subject has `maybe=true`.
pub fn query_hypothetical(
    dataset: &GraphDataset,
    filters: &HashMap<String, String>,
) -> Vec<HypotheticalNode> {
    let maybe_true = Object::typed("true", "xsd:boolean");
    let marked = dataset.match_pattern(&QuadPattern {
        predicate: Some("sg:maybe"),
        object: Some(&maybe_true),
        ..Default::default()
    });

    let mut subjects: Vec<&str> = marked.iter().map(|q| q.subject.as_str()).collect();
    subjects.sort_unstable();
    subjects.dedup();

    subjects
        .into_iter()
        .filter_map(|subject| {
            let quads = dataset.match_pattern(&QuadPattern {
                subject: Some(subject),
                ..Default::default()
            });
            let mut properties: HashMap<String, Vec<Object>> = HashMap::new();
            for quad in &quads {
                properties
                    .entry(quad.predicate.clone())
                    .or_default()
                    .push(quad.object.clone());
            }
            for (predicate, expected) in filters {
                let matches = properties.get(predicate).is_some_and(|values| {
                    values.iter().any(|v| match v {
                        Object::Literal { value, .. } => value == expected,
                        Object::Iri(uri) => uri == expected,
                    })
                });
                if !matches {
                    return None;
                }
            }
            Some(HypotheticalNode {
                uri: subject.to_string(),
                properties,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use semgraph_llm::MockLlmClient;

    #[tokio::test]
    async fn seeded_scenario_two_hypotheses_tagged_maybe() {
        let namespace = NamespaceRegistry::new();
        let llm = MockLlmClient::with_responses(vec![
            "Backpropagation computes gradients of the loss with respect to each weight \
             by propagating error signals backward through the network layers, enabling \
             efficient training of deep architectures via the chain rule of calculus."
                .to_string(),
            "The backpropagation algorithm, introduced to popular use in the 1980s, relies \
             on reverse-mode automatic differentiation to update network weights, and it \
             remains the foundation of modern deep learning optimisation."
                .to_string(),
        ]);
        let options = HydeOptions {
            hypotheses_per_query: 2,
            ..Default::default()
        };
        let output = generate(
            "What is backpropagation?",
            "query:1",
            &llm,
            &namespace,
            &options,
        )
        .await;

        assert_eq!(output.hypotheses.len(), 2);
        for hypothesis in &output.hypotheses {
            assert!(hypothesis.core().is_maybe());
            let confidence = hypothesis.core().hypothesis_confidence().unwrap();
            assert!((0.1..=0.95).contains(&confidence));
        }
        let confidences: Vec<f64> = output
            .hypotheses
            .iter()
            .map(|h| h.core().hypothesis_confidence().unwrap())
            .collect();
        assert!(
            confidences[0] != confidences[1],
            "distinct hypothesis content plus per-index jitter should avoid an exact tie"
        );

        let answers: Vec<&Relationship> = output
            .relationships
            .iter()
            .filter(|r| r.rel_type() == "hypothetical-answer")
            .collect();
        assert_eq!(answers.len(), 2);
    }

    #[test]
    fn query_hypothetical_excludes_unmarked() {
        let dataset = GraphDataset::new();
        let mut filters = HashMap::new();
        filters.insert("sg:maybe".to_string(), "false".to_string());
        let results = query_hypothetical(&dataset, &filters);
        assert!(results.is_empty());
    }
}
