//! Shared substrate for every graph node: identity, typed triples, labels,
//! content, provenance, lifecycle timestamps.
//!
//! Every typed node wraps an IRI plus optional label/comment and a handful
//! of specialised fields; that shape is factored out here into
//! `ElementCore`, reused by every typed node in this crate.

use chrono::{DateTime, Utc};
use semgraph_namespace::NamespaceRegistry;
use std::collections::HashMap;

/// An RDF object position: either a reference to another resource or a
/// literal value, optionally language- or datatype-tagged.
#[derive(Debug, Clone, PartialEq)]
pub enum Object {
    Iri(String),
    Literal {
        value: String,
        language: Option<String>,
        datatype: Option<String>,
    },
}

impl Object {
    pub fn iri(uri: impl Into<String>) -> Self {
        Object::Iri(uri.into())
    }

    pub fn plain(value: impl Into<String>) -> Self {
        Object::Literal {
            value: value.into(),
            language: None,
            datatype: None,
        }
    }

    pub fn lang(value: impl Into<String>, language: impl Into<String>) -> Self {
        Object::Literal {
            value: value.into(),
            language: Some(language.into()),
            datatype: None,
        }
    }

    pub fn typed(value: impl Into<String>, datatype: impl Into<String>) -> Self {
        Object::Literal {
            value: value.into(),
            language: None,
            datatype: Some(datatype.into()),
        }
    }
}

/// One RDF statement, with an optional named graph.
#[derive(Debug, Clone, PartialEq)]
pub struct Quad {
    pub subject: String,
    pub predicate: String,
    pub object: Object,
    pub graph: Option<String>,
}

/// Anything an element's triples can be exported into. Implemented by
/// `semgraph-dataset::GraphDataset`; kept here as a trait (rather than a
/// direct dependency on the dataset crate) so this crate has no edge back
/// to its consumer.
pub trait TripleSink {
    fn add_quad(&mut self, quad: Quad);
}

impl TripleSink for Vec<Quad> {
    fn add_quad(&mut self, quad: Quad) {
        self.push(quad);
    }
}

/// The fields and behaviour every graph node shares.
#[derive(Debug, Clone)]
pub struct ElementCore {
    uri: String,
    types: Vec<String>,
    created: DateTime<Utc>,
    modified: DateTime<Utc>,
    preferred_labels: HashMap<String, String>,
    alt_labels: Vec<String>,
    content: Option<String>,
    sub_type: Option<String>,
    entry_point: bool,
    pagerank: Option<f64>,
    similarity: Option<f64>,
    maybe: bool,
    hypothesis_confidence: Option<f64>,
    /// Triples beyond the structural ones every typed node emits on its
    /// own (connectsTo edges, derivedFrom provenance, arbitrary additions).
    extra_triples: Vec<(String, Object)>,
}

impl ElementCore {
    /// `rdf_type` is the node's specialised type, e.g. `"Entity"`. Every
    /// node carries exactly one stable URI and the base `Element` type
    /// plus at least one specialised type.
    pub fn new(uri: impl Into<String>, rdf_type: impl Into<String>, entry_point: bool) -> Self {
        let now = Utc::now();
        Self {
            uri: uri.into(),
            types: vec!["Element".to_string(), rdf_type.into()],
            created: now,
            modified: now,
            preferred_labels: HashMap::new(),
            alt_labels: Vec::new(),
            content: None,
            sub_type: None,
            entry_point,
            pagerank: None,
            similarity: None,
            maybe: false,
            hypothesis_confidence: None,
            extra_triples: Vec::new(),
        }
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    pub fn types(&self) -> &[String] {
        &self.types
    }

    pub fn created(&self) -> DateTime<Utc> {
        self.created
    }

    pub fn modified(&self) -> DateTime<Utc> {
        self.modified
    }

    /// Refresh `modified` to now. Called exactly once per public mutation
    /// entry point — callers must not call this from within another method
    /// that already calls it, to avoid a recursive refresh.
    fn touch(&mut self) {
        self.modified = Utc::now();
    }

    pub fn content(&self) -> Option<&str> {
        self.content.as_deref()
    }

    pub fn set_content(&mut self, content: impl Into<String>) {
        self.content = Some(content.into());
        self.touch();
    }

    pub fn preferred_label(&self, language: &str) -> Option<&str> {
        self.preferred_labels.get(language).map(String::as_str)
    }

    pub fn set_preferred_label(&mut self, language: impl Into<String>, label: impl Into<String>) {
        self.preferred_labels.insert(language.into(), label.into());
        self.touch();
    }

    pub fn alt_labels(&self) -> &[String] {
        &self.alt_labels
    }

    pub fn add_alt_label(&mut self, label: impl Into<String>) {
        self.alt_labels.push(label.into());
        self.touch();
    }

    pub fn is_entry_point(&self) -> bool {
        self.entry_point
    }

    pub fn set_entry_point(&mut self, entry_point: bool) {
        self.entry_point = entry_point;
        self.touch();
    }

    pub fn sub_type(&self) -> Option<&str> {
        self.sub_type.as_deref()
    }

    pub fn set_sub_type(&mut self, sub_type: impl Into<String>) {
        self.sub_type = Some(sub_type.into());
        self.touch();
    }

    pub fn pagerank(&self) -> Option<f64> {
        self.pagerank
    }

    pub fn set_pagerank(&mut self, score: f64) {
        self.pagerank = Some(score.clamp(0.0, 1.0));
        self.touch();
    }

    pub fn similarity(&self) -> Option<f64> {
        self.similarity
    }

    pub fn set_similarity(&mut self, score: f64) {
        self.similarity = Some(score.clamp(0.0, 1.0));
        self.touch();
    }

    pub fn is_maybe(&self) -> bool {
        self.maybe
    }

    pub fn hypothesis_confidence(&self) -> Option<f64> {
        self.hypothesis_confidence
    }

    /// Mark this node uncertain. Monotone: once set, only `promote` clears
    /// it — never a later call to this method downgrading confidence, and
    /// never a reindex.
    pub fn mark_maybe(&mut self, confidence: f64) {
        self.maybe = true;
        self.hypothesis_confidence = Some(confidence.clamp(0.1, 0.95));
        self.touch();
    }

    /// Explicit promotion out of uncertain status; may only be unmarked
    /// this way, never implicitly.
    pub fn promote(&mut self) {
        self.maybe = false;
        self.touch();
    }

    /// Append a `connectsTo` edge, and when a weight is supplied, mint a
    /// reified weighted-connection node carrying the weight.
    /// Returns the reified node's URI when one was minted.
    pub fn connect_to(
        &mut self,
        registry: &NamespaceRegistry,
        other_uri: &str,
        weight: Option<f64>,
    ) -> Option<String> {
        self.extra_triples
            .push(("connectsTo".to_string(), Object::iri(other_uri)));
        let reified = weight.map(|w| {
            let node_uri = registry.mint("Connection");
            self.extra_triples.push((
                "hasConnection".to_string(),
                Object::iri(node_uri.clone()),
            ));
            self.extra_triples.push((
                format!("{node_uri}#weight"),
                Object::typed(format!("{:.6}", w.clamp(0.0, 1.0)), "xsd:double"),
            ));
            node_uri
        });
        self.touch();
        reified
    }

    pub fn derived_from(&mut self, source_uri: &str) {
        self.extra_triples
            .push(("wasDerivedFrom".to_string(), Object::iri(source_uri)));
        self.touch();
    }

    pub fn add_triple(&mut self, predicate: impl Into<String>, object: Object) {
        self.extra_triples.push((predicate.into(), object));
        self.touch();
    }

    pub fn remove_triple(&mut self, predicate: &str, object: &Object) {
        self.extra_triples
            .retain(|(p, o)| !(p == predicate && o == object));
        self.touch();
    }

    /// Export this node's structural triples (type, labels, content,
    /// lifecycle, flags) plus any accumulated `extra_triples` into `sink`.
    /// Typed wrappers call this and then add their own specialised fields.
    pub fn export_into(&self, sink: &mut dyn TripleSink) {
        for ty in &self.types {
            sink.add_quad(Quad {
                subject: self.uri.clone(),
                predicate: "rdf:type".to_string(),
                object: Object::iri(ty.clone()),
                graph: None,
            });
        }
        for (language, label) in &self.preferred_labels {
            sink.add_quad(Quad {
                subject: self.uri.clone(),
                predicate: "skos:prefLabel".to_string(),
                object: Object::lang(label.clone(), language.clone()),
                graph: None,
            });
        }
        for label in &self.alt_labels {
            sink.add_quad(Quad {
                subject: self.uri.clone(),
                predicate: "skos:altLabel".to_string(),
                object: Object::plain(label.clone()),
                graph: None,
            });
        }
        if let Some(content) = &self.content {
            sink.add_quad(Quad {
                subject: self.uri.clone(),
                predicate: "sg:content".to_string(),
                object: Object::plain(content.clone()),
                graph: None,
            });
        }
        if let Some(sub_type) = &self.sub_type {
            sink.add_quad(Quad {
                subject: self.uri.clone(),
                predicate: "sg:subType".to_string(),
                object: Object::plain(sub_type.clone()),
                graph: None,
            });
        }
        sink.add_quad(Quad {
            subject: self.uri.clone(),
            predicate: "sg:isEntryPoint".to_string(),
            object: Object::typed(self.entry_point.to_string(), "xsd:boolean"),
            graph: None,
        });
        sink.add_quad(Quad {
            subject: self.uri.clone(),
            predicate: "dcterms:created".to_string(),
            object: Object::typed(self.created.to_rfc3339(), "xsd:dateTime"),
            graph: None,
        });
        sink.add_quad(Quad {
            subject: self.uri.clone(),
            predicate: "dcterms:modified".to_string(),
            object: Object::typed(self.modified.to_rfc3339(), "xsd:dateTime"),
            graph: None,
        });
        if let Some(score) = self.pagerank {
            sink.add_quad(Quad {
                subject: self.uri.clone(),
                predicate: "sg:pagerank".to_string(),
                object: Object::typed(score.to_string(), "xsd:double"),
                graph: None,
            });
        }
        if let Some(score) = self.similarity {
            sink.add_quad(Quad {
                subject: self.uri.clone(),
                predicate: "sg:similarity".to_string(),
                object: Object::typed(score.to_string(), "xsd:double"),
                graph: None,
            });
        }
        if self.maybe {
            sink.add_quad(Quad {
                subject: self.uri.clone(),
                predicate: "sg:maybe".to_string(),
                object: Object::typed("true", "xsd:boolean"),
                graph: None,
            });
            if let Some(confidence) = self.hypothesis_confidence {
                sink.add_quad(Quad {
                    subject: self.uri.clone(),
                    predicate: "sg:confidence".to_string(),
                    object: Object::typed(format!("{confidence:.6}"), "xsd:double"),
                    graph: None,
                });
            }
        }
        for (predicate, object) in &self.extra_triples {
            sink.add_quad(Quad {
                subject: self.uri.clone(),
                predicate: predicate.clone(),
                object: object.clone(),
                graph: None,
            });
        }
    }

    /// Copy every field except identity and creation timestamp, which are
    /// reset for the clone.
    pub fn clone_with_new_uri(&self, new_uri: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            uri: new_uri.into(),
            types: self.types.clone(),
            created: now,
            modified: now,
            preferred_labels: self.preferred_labels.clone(),
            alt_labels: self.alt_labels.clone(),
            content: self.content.clone(),
            sub_type: self.sub_type.clone(),
            entry_point: self.entry_point,
            pagerank: self.pagerank,
            similarity: self.similarity,
            maybe: self.maybe,
            hypothesis_confidence: self.hypothesis_confidence,
            extra_triples: self.extra_triples.clone(),
        }
    }
}

/// Behaviour every typed node model exposes by delegating to its embedded
/// `ElementCore`.
pub trait RdfElement {
    fn core(&self) -> &ElementCore;
    fn core_mut(&mut self) -> &mut ElementCore;

    fn uri(&self) -> &str {
        self.core().uri()
    }

    fn types(&self) -> &[String] {
        self.core().types()
    }

    fn is_entry_point(&self) -> bool {
        self.core().is_entry_point()
    }

    fn export_into(&self, sink: &mut dyn TripleSink);
}
