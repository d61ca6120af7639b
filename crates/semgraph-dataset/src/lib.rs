//! In-memory quad store, the dataset's primary export target.
//!
//! A `RoaringBitmap` per indexed key acts as a reverse index over a dense
//! id space, here indexing quads by subject and predicate instead of
//! entities by type. The N-Triples grammar is a line-oriented parser
//! matching one statement per line.

use roaring::RoaringBitmap;
use semgraph_model::{Object, Quad, TripleSink};
use semgraph_namespace::NamespaceRegistry;
use std::collections::HashMap;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum DatasetError {
    #[error("malformed N-Triples line {line}: {reason}")]
    MalformedLine { line: usize, reason: String },
}

/// A pattern to match against the store; `None` in any position means
/// "match anything there", so any subset of positions can be constrained.
#[derive(Debug, Default, Clone)]
pub struct QuadPattern<'a> {
    pub subject: Option<&'a str>,
    pub predicate: Option<&'a str>,
    pub object: Option<&'a Object>,
    /// `Some(None)` matches quads with no graph; `Some(Some(g))` matches a
    /// specific graph; `None` matches any graph.
    pub graph: Option<Option<&'a str>>,
}

/// The dataset the engine hands off to the caller for persistence; the
/// engine itself does not own persistent storage.
#[derive(Debug, Default, Clone)]
pub struct GraphDataset {
    quads: Vec<Quad>,
    subject_index: HashMap<String, RoaringBitmap>,
    predicate_index: HashMap<String, RoaringBitmap>,
    graph_index: HashMap<String, RoaringBitmap>,
}

impl GraphDataset {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.quads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.quads.is_empty()
    }

    pub fn quads(&self) -> &[Quad] {
        &self.quads
    }

    fn index_quad(&mut self, id: u32, quad: &Quad) {
        self.subject_index
            .entry(quad.subject.clone())
            .or_default()
            .insert(id);
        self.predicate_index
            .entry(quad.predicate.clone())
            .or_default()
            .insert(id);
        if let Some(graph) = &quad.graph {
            self.graph_index.entry(graph.clone()).or_default().insert(id);
        }
    }

    /// Merge another dataset's quads into this one, typically at the
    /// barrier between pipeline phases. Exact duplicate quads are kept
    /// as-is — deduplication is the caller's concern except where a
    /// specific invariant (similarity-edge canonicalisation) requires it.
    pub fn merge(&mut self, other: GraphDataset) {
        for quad in other.quads {
            self.add_quad(quad);
        }
    }

    /// Return every quad matching `pattern`.
    pub fn match_pattern(&self, pattern: &QuadPattern) -> Vec<&Quad> {
        let mut candidates: Option<RoaringBitmap> = None;

        if let Some(subject) = pattern.subject {
            let ids = self.subject_index.get(subject).cloned().unwrap_or_default();
            candidates = Some(match candidates {
                Some(existing) => existing & ids,
                None => ids,
            });
        }
        if let Some(predicate) = pattern.predicate {
            let ids = self
                .predicate_index
                .get(predicate)
                .cloned()
                .unwrap_or_default();
            candidates = Some(match candidates {
                Some(existing) => existing & ids,
                None => ids,
            });
        }
        if let Some(Some(graph)) = pattern.graph {
            let ids = self.graph_index.get(graph).cloned().unwrap_or_default();
            candidates = Some(match candidates {
                Some(existing) => existing & ids,
                None => ids,
            });
        }

        let indices: Box<dyn Iterator<Item = u32>> = match candidates {
            Some(bitmap) => Box::new(bitmap.into_iter()),
            None => Box::new(0..self.quads.len() as u32),
        };

        indices
            .filter_map(|id| self.quads.get(id as usize))
            .filter(|quad| {
                pattern.object.map_or(true, |o| &quad.object == o)
                    && match pattern.graph {
                        Some(None) => quad.graph.is_none(),
                        _ => true,
                    }
            })
            .collect()
    }

    /// Serialise every quad as an N-Triples line (the graph component, if
    /// present, is not representable in N-Triples and is dropped — callers
    /// needing named graphs should use `export_jsonld`/`export_json`).
    pub fn export_ntriples(&self) -> String {
        let mut out = String::new();
        for quad in &self.quads {
            out.push_str(&format!(
                "<{}> <{}> {} .\n",
                escape_iri(&quad.subject),
                escape_iri(&quad.predicate),
                format_object_ntriples(&quad.object)
            ));
        }
        out
    }

    /// Parse an N-Triples document: one statement per non-blank,
    /// non-comment line, subject/predicate always IRIs.
    pub fn import_ntriples(text: &str) -> Result<GraphDataset, DatasetError> {
        let mut dataset = GraphDataset::new();
        for (line_no, raw_line) in text.lines().enumerate() {
            let line = raw_line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let body = line.strip_suffix('.').ok_or_else(|| DatasetError::MalformedLine {
                line: line_no + 1,
                reason: "missing trailing '.'".to_string(),
            })?;
            let body = body.trim();
            let (subject, rest) = take_iri(body).ok_or_else(|| DatasetError::MalformedLine {
                line: line_no + 1,
                reason: "expected <subject>".to_string(),
            })?;
            let rest = rest.trim_start();
            let (predicate, rest) = take_iri(rest).ok_or_else(|| DatasetError::MalformedLine {
                line: line_no + 1,
                reason: "expected <predicate>".to_string(),
            })?;
            let rest = rest.trim_start();
            let object = parse_object(rest).ok_or_else(|| DatasetError::MalformedLine {
                line: line_no + 1,
                reason: "expected object".to_string(),
            })?;
            dataset.add_quad(Quad {
                subject: subject.to_string(),
                predicate: predicate.to_string(),
                object,
                graph: None,
            });
        }
        Ok(dataset)
    }

    /// Turtle export using the registry's prefix compression.
    pub fn export_turtle(&self, registry: &NamespaceRegistry) -> String {
        let mut out = String::new();
        for quad in &self.quads {
            out.push_str(&format!(
                "{} {} {} .\n",
                compress_turtle_term(registry, &quad.subject),
                compress_turtle_term(registry, &quad.predicate),
                format_object_turtle(registry, &quad.object)
            ));
        }
        out
    }

    pub fn export_jsonld(&self) -> serde_json::Value {
        let graph: Vec<serde_json::Value> = self
            .quads
            .iter()
            .map(|q| {
                serde_json::json!({
                    "@id": q.subject,
                    q.predicate.clone(): object_to_json(&q.object),
                    "@graph": q.graph,
                })
            })
            .collect();
        serde_json::json!({ "@graph": graph })
    }

    pub fn export_json(&self) -> serde_json::Value {
        let quads: Vec<serde_json::Value> = self
            .quads
            .iter()
            .map(|q| {
                serde_json::json!({
                    "subject": q.subject,
                    "predicate": q.predicate,
                    "object": object_to_json(&q.object),
                    "graph": q.graph,
                })
            })
            .collect();
        serde_json::json!({ "quads": quads })
    }
}

impl TripleSink for GraphDataset {
    fn add_quad(&mut self, quad: Quad) {
        let id = self.quads.len() as u32;
        self.index_quad(id, &quad);
        self.quads.push(quad);
    }
}

fn escape_iri(iri: &str) -> String {
    iri.replace('>', "%3E")
}

fn escape_literal(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
        .replace('\r', "\\r")
}

fn unescape_literal(value: &str) -> String {
    value
        .replace("\\n", "\n")
        .replace("\\r", "\r")
        .replace("\\\"", "\"")
        .replace("\\\\", "\\")
}

fn format_object_ntriples(object: &Object) -> String {
    match object {
        Object::Iri(uri) => format!("<{}>", escape_iri(uri)),
        Object::Literal {
            value,
            language: Some(lang),
            ..
        } => format!("\"{}\"@{}", escape_literal(value), lang),
        Object::Literal {
            value,
            datatype: Some(datatype),
            ..
        } => format!("\"{}\"^^<{}>", escape_literal(value), datatype),
        Object::Literal { value, .. } => format!("\"{}\"", escape_literal(value)),
    }
}

fn format_object_turtle(registry: &NamespaceRegistry, object: &Object) -> String {
    match object {
        Object::Iri(uri) => compress_turtle_term(registry, uri),
        Object::Literal {
            value,
            language: Some(lang),
            ..
        } => format!("\"{}\"@{}", escape_literal(value), lang),
        Object::Literal {
            value,
            datatype: Some(datatype),
            ..
        } => format!("\"{}\"^^{}", escape_literal(value), compress_turtle_term(registry, datatype)),
        Object::Literal { value, .. } => format!("\"{}\"", escape_literal(value)),
    }
}

fn compress_turtle_term(registry: &NamespaceRegistry, term: &str) -> String {
    if term.contains(':') && !term.starts_with("http") {
        // already a prefixed name (e.g. "xsd:double" used internally)
        return term.to_string();
    }
    let compressed = registry.compress(term);
    if compressed == term {
        format!("<{term}>")
    } else {
        compressed
    }
}

fn object_to_json(object: &Object) -> serde_json::Value {
    match object {
        Object::Iri(uri) => serde_json::json!({ "type": "uri", "value": uri }),
        Object::Literal {
            value,
            language,
            datatype,
        } => serde_json::json!({
            "type": "literal",
            "value": value,
            "language": language,
            "datatype": datatype,
        }),
    }
}

/// Consume a leading `<...>` IRI term, returning the IRI body and the rest
/// of the line.
fn take_iri(input: &str) -> Option<(&str, &str)> {
    let input = input.strip_prefix('<')?;
    let end = input.find('>')?;
    Some((&input[..end], &input[end + 1..]))
}

fn parse_object(input: &str) -> Option<Object> {
    let input = input.trim();
    if let Some(rest) = input.strip_prefix('<') {
        let end = rest.find('>')?;
        return Some(Object::iri(&rest[..end]));
    }
    if let Some(rest) = input.strip_prefix('"') {
        let mut end = None;
        let bytes = rest.as_bytes();
        let mut i = 0;
        while i < bytes.len() {
            if bytes[i] == b'\\' {
                i += 2;
                continue;
            }
            if bytes[i] == b'"' {
                end = Some(i);
                break;
            }
            i += 1;
        }
        let end = end?;
        let value = unescape_literal(&rest[..end]);
        let tail = &rest[end + 1..];
        if let Some(lang) = tail.strip_prefix('@') {
            return Some(Object::lang(value, lang.trim()));
        }
        if let Some(dt) = tail.strip_prefix("^^<") {
            let dt_end = dt.find('>')?;
            return Some(Object::typed(value, &dt[..dt_end]));
        }
        return Some(Object::plain(value));
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_quad() -> Quad {
        Quad {
            subject: "https://semgraph.local/instance/Unit/0-abc".to_string(),
            predicate: "rdf:type".to_string(),
            object: Object::iri("Unit"),
            graph: None,
        }
    }

    #[test]
    fn match_pattern_by_subject() {
        let mut dataset = GraphDataset::new();
        dataset.add_quad(sample_quad());
        dataset.add_quad(Quad {
            subject: "other".to_string(),
            predicate: "rdf:type".to_string(),
            object: Object::iri("Entity"),
            graph: None,
        });
        let results = dataset.match_pattern(&QuadPattern {
            subject: Some("other"),
            ..Default::default()
        });
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].subject, "other");
    }

    #[test]
    fn ntriples_round_trip() {
        let mut dataset = GraphDataset::new();
        dataset.add_quad(sample_quad());
        dataset.add_quad(Quad {
            subject: "https://semgraph.local/instance/Unit/0-abc".to_string(),
            predicate: "sg:content".to_string(),
            object: Object::plain("Geoffrey Hinton invented backpropagation."),
            graph: None,
        });
        let serialised = dataset.export_ntriples();
        let reparsed = GraphDataset::import_ntriples(&serialised).unwrap();
        assert_eq!(reparsed.len(), dataset.len());
        for quad in dataset.quads() {
            assert!(reparsed.quads().contains(quad));
        }
    }

    #[test]
    fn merge_combines_quads() {
        let mut a = GraphDataset::new();
        a.add_quad(sample_quad());
        let mut b = GraphDataset::new();
        b.add_quad(Quad {
            subject: "other".to_string(),
            predicate: "rdf:type".to_string(),
            object: Object::iri("Entity"),
            graph: None,
        });
        a.merge(b);
        assert_eq!(a.len(), 2);
    }

    #[test]
    fn turtle_export_compresses_known_prefixes() {
        let registry = NamespaceRegistry::new();
        let mut dataset = GraphDataset::new();
        dataset.add_quad(Quad {
            subject: "https://semgraph.local/ontology#Entity".to_string(),
            predicate: "rdf:type".to_string(),
            object: Object::iri("http://www.w3.org/2000/01/rdf-schema#Class"),
            graph: None,
        });
        let turtle = dataset.export_turtle(&registry);
        assert!(turtle.contains("sg:Entity"));
        assert!(turtle.contains("rdfs:Class"));
    }
}
