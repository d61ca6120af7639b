use crate::core::{ElementCore, Object, Quad, RdfElement, TripleSink};
use std::collections::HashSet;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RelationshipError {
    #[error("relationship source and target must differ, both were {0}")]
    SelfLoop(String),
    #[error("weight must be in [0,1], got {0}")]
    WeightOutOfRange(String),
}

/// A first-class node connecting two entity URIs (spec §3, class
/// `Relationship`). Invariant: `source != target`.
#[derive(Debug, Clone)]
pub struct Relationship {
    core: ElementCore,
    source_uri: String,
    target_uri: String,
    rel_type: String,
    description: Option<String>,
    weight: f64,
    evidence: HashSet<String>,
    bidirectional: bool,
}

impl Relationship {
    pub fn new(
        uri: impl Into<String>,
        source_uri: impl Into<String>,
        target_uri: impl Into<String>,
        rel_type: impl Into<String>,
        weight: f64,
    ) -> Result<Self, RelationshipError> {
        let source_uri = source_uri.into();
        let target_uri = target_uri.into();
        if source_uri == target_uri {
            return Err(RelationshipError::SelfLoop(source_uri));
        }
        if !(0.0..=1.0).contains(&weight) {
            return Err(RelationshipError::WeightOutOfRange(weight.to_string()));
        }
        Ok(Self {
            core: ElementCore::new(uri, "Relationship", false),
            source_uri,
            target_uri,
            rel_type: rel_type.into(),
            description: None,
            weight,
            evidence: HashSet::new(),
            bidirectional: false,
        })
    }

    pub fn source_uri(&self) -> &str {
        &self.source_uri
    }

    pub fn target_uri(&self) -> &str {
        &self.target_uri
    }

    pub fn rel_type(&self) -> &str {
        &self.rel_type
    }

    pub fn weight(&self) -> f64 {
        self.weight
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn set_description(&mut self, description: impl Into<String>) {
        self.description = Some(description.into());
    }

    pub fn is_bidirectional(&self) -> bool {
        self.bidirectional
    }

    pub fn set_bidirectional(&mut self, bidirectional: bool) {
        self.bidirectional = bidirectional;
    }

    pub fn evidence(&self) -> &HashSet<String> {
        &self.evidence
    }

    pub fn add_evidence(&mut self, unit_uri: impl Into<String>) {
        self.evidence.insert(unit_uri.into());
    }
}

impl RdfElement for Relationship {
    fn core(&self) -> &ElementCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut ElementCore {
        &mut self.core
    }

    fn export_into(&self, sink: &mut dyn TripleSink) {
        self.core.export_into(sink);
        let uri = self.uri().to_string();
        sink.add_quad(Quad {
            subject: uri.clone(),
            predicate: "sg:source".to_string(),
            object: Object::iri(self.source_uri.clone()),
            graph: None,
        });
        sink.add_quad(Quad {
            subject: uri.clone(),
            predicate: "sg:target".to_string(),
            object: Object::iri(self.target_uri.clone()),
            graph: None,
        });
        sink.add_quad(Quad {
            subject: uri.clone(),
            predicate: "sg:relationshipType".to_string(),
            object: Object::plain(self.rel_type.clone()),
            graph: None,
        });
        sink.add_quad(Quad {
            subject: uri.clone(),
            predicate: "sg:weight".to_string(),
            object: Object::typed(format!("{:.6}", self.weight), "xsd:double"),
            graph: None,
        });
        sink.add_quad(Quad {
            subject: uri.clone(),
            predicate: "sg:bidirectional".to_string(),
            object: Object::typed(self.bidirectional.to_string(), "xsd:boolean"),
            graph: None,
        });
        if let Some(description) = &self.description {
            sink.add_quad(Quad {
                subject: uri.clone(),
                predicate: "dcterms:description".to_string(),
                object: Object::plain(description.clone()),
                graph: None,
            });
        }
        for evidence_uri in &self.evidence {
            sink.add_quad(Quad {
                subject: uri.clone(),
                predicate: "sg:evidence".to_string(),
                object: Object::iri(evidence_uri.clone()),
                graph: None,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_self_loop() {
        assert_eq!(
            Relationship::new("r:1", "e:1", "e:1", "influenced", 0.7).unwrap_err(),
            RelationshipError::SelfLoop("e:1".to_string())
        );
    }

    #[test]
    fn accepts_valid_relationship() {
        let rel = Relationship::new("r:1", "e:1", "e:2", "influenced", 0.7).unwrap();
        assert_eq!(rel.weight(), 0.7);
        assert!(!rel.is_bidirectional());
    }

    #[test]
    fn rejects_out_of_range_weight() {
        assert!(Relationship::new("r:1", "e:1", "e:2", "influenced", 1.2).is_err());
    }
}
