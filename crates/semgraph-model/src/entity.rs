use crate::core::{ElementCore, Object, Quad, RdfElement, TripleSink};
use std::collections::HashSet;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum EntityError {
    #[error("preferred label must not be empty")]
    EmptyLabel,
    #[error("confidence must be in [0,1], got {0}")]
    ConfidenceOutOfRange(String),
}

/// A named real-world referent extracted from one or more units (spec §3,
/// class `Entity`). `isEntryPoint=true` by default.
#[derive(Debug, Clone)]
pub struct Entity {
    core: ElementCore,
    language: String,
    confidence: f64,
    frequency: u64,
    sources: HashSet<String>,
}

impl Entity {
    pub fn new(
        uri: impl Into<String>,
        preferred_label: impl Into<String>,
        language: impl Into<String>,
        confidence: f64,
    ) -> Result<Self, EntityError> {
        let label = preferred_label.into();
        if label.trim().is_empty() {
            return Err(EntityError::EmptyLabel);
        }
        if !(0.0..=1.0).contains(&confidence) {
            return Err(EntityError::ConfidenceOutOfRange(confidence.to_string()));
        }
        let mut core = ElementCore::new(uri, "Entity", true);
        let language = language.into();
        core.set_preferred_label(language.clone(), label);
        Ok(Self {
            core,
            language,
            confidence,
            frequency: 1,
            sources: HashSet::new(),
        })
    }

    pub fn preferred_label(&self) -> &str {
        self.core.preferred_label(&self.language).unwrap_or_default()
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    pub fn confidence(&self) -> f64 {
        self.confidence
    }

    pub fn frequency(&self) -> u64 {
        self.frequency
    }

    pub fn sources(&self) -> &HashSet<String> {
        &self.sources
    }

    /// Increment frequency and union the source set on a subsequent mention
    /// (spec §3: entity lifecycle on repeat mentions).
    pub fn record_mention(&mut self, source: impl Into<String>) {
        self.frequency += 1;
        self.sources.insert(source.into());
    }

    pub fn add_source(&mut self, source: impl Into<String>) {
        self.sources.insert(source.into());
    }
}

impl RdfElement for Entity {
    fn core(&self) -> &ElementCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut ElementCore {
        &mut self.core
    }

    fn export_into(&self, sink: &mut dyn TripleSink) {
        self.core.export_into(sink);
        sink.add_quad(Quad {
            subject: self.uri().to_string(),
            predicate: "sg:confidence".to_string(),
            object: Object::typed(format!("{:.6}", self.confidence), "xsd:double"),
            graph: None,
        });
        sink.add_quad(Quad {
            subject: self.uri().to_string(),
            predicate: "sg:frequency".to_string(),
            object: Object::typed(self.frequency.to_string(), "xsd:integer"),
            graph: None,
        });
        for source in &self.sources {
            sink.add_quad(Quad {
                subject: self.uri().to_string(),
                predicate: "sg:source".to_string(),
                object: Object::plain(source.clone()),
                graph: None,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entry_point_defaults_true() {
        let entity = Entity::new("e:1", "Geoffrey Hinton", "en", 0.9).unwrap();
        assert!(entity.is_entry_point());
        assert_eq!(entity.frequency(), 1);
    }

    #[test]
    fn repeat_mention_increments_and_unions() {
        let mut entity = Entity::new("e:1", "Geoffrey Hinton", "en", 0.9).unwrap();
        entity.add_source("d1");
        entity.record_mention("d2");
        assert_eq!(entity.frequency(), 2);
        assert_eq!(entity.sources().len(), 2);
    }

    #[test]
    fn rejects_empty_label() {
        assert_eq!(
            Entity::new("e:1", "   ", "en", 0.9).unwrap_err(),
            EntityError::EmptyLabel
        );
    }
}
