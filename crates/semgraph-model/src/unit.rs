use crate::core::{ElementCore, Object, Quad, RdfElement, TripleSink};
use serde::{Deserialize, Serialize};

/// Minimum content length for a `Unit` to be considered valid (spec §3).
pub const MIN_UNIT_CONTENT_LENGTH: usize = 10;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum UnitError {
    #[error("unit content must be at least {MIN_UNIT_CONTENT_LENGTH} characters, got {0}")]
    ContentTooShort(usize),
    #[error("relevance must be in [0,1], got {0}")]
    RelevanceOutOfRange(f64),
}

/// An entity mentioned within a unit, with the relevance of that mention
/// (spec §3 "set of mentioned entities each with a relevance in [0,1]").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityMention {
    pub entity_uri: String,
    pub relevance: f64,
}

/// A coherent sentence-to-paragraph-sized statement extracted from a
/// source (spec §3, class `Unit`).
#[derive(Debug, Clone)]
pub struct Unit {
    core: ElementCore,
    summary: Option<String>,
    source: String,
    position: usize,
    length: usize,
    language: String,
    embedding: Option<Vec<f32>>,
    mentions: Vec<EntityMention>,
}

impl Unit {
    /// `content` must be at least [`MIN_UNIT_CONTENT_LENGTH`] characters.
    /// `isEntryPoint=false` by default (spec §3).
    pub fn new(
        uri: impl Into<String>,
        content: impl Into<String>,
        source: impl Into<String>,
        position: usize,
    ) -> Result<Self, UnitError> {
        let content = content.into();
        if content.chars().count() < MIN_UNIT_CONTENT_LENGTH {
            return Err(UnitError::ContentTooShort(content.chars().count()));
        }
        let mut core = ElementCore::new(uri, "Unit", false);
        let length = content.chars().count();
        core.set_content(content);
        Ok(Self {
            core,
            summary: None,
            source: source.into(),
            position,
            length,
            language: "en".to_string(),
            embedding: None,
            mentions: Vec::new(),
        })
    }

    pub fn content(&self) -> &str {
        self.core.content().unwrap_or_default()
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn length(&self) -> usize {
        self.length
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    pub fn set_language(&mut self, language: impl Into<String>) {
        self.language = language.into();
    }

    pub fn summary(&self) -> Option<&str> {
        self.summary.as_deref()
    }

    /// Stored as a SKOS-style definition (spec §3).
    pub fn set_summary(&mut self, summary: impl Into<String>) {
        self.summary = Some(summary.into());
    }

    pub fn embedding(&self) -> Option<&[f32]> {
        self.embedding.as_deref()
    }

    pub fn set_embedding(&mut self, vector: Vec<f32>) {
        self.embedding = Some(vector);
    }

    pub fn mentions(&self) -> &[EntityMention] {
        &self.mentions
    }

    pub fn add_mention(
        &mut self,
        entity_uri: impl Into<String>,
        relevance: f64,
    ) -> Result<(), UnitError> {
        if !(0.0..=1.0).contains(&relevance) {
            return Err(UnitError::RelevanceOutOfRange(relevance));
        }
        self.mentions.push(EntityMention {
            entity_uri: entity_uri.into(),
            relevance,
        });
        Ok(())
    }
}

impl RdfElement for Unit {
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
            predicate: "sg:source".to_string(),
            object: Object::plain(self.source.clone()),
            graph: None,
        });
        sink.add_quad(Quad {
            subject: self.uri().to_string(),
            predicate: "sg:position".to_string(),
            object: Object::typed(self.position.to_string(), "xsd:integer"),
            graph: None,
        });
        sink.add_quad(Quad {
            subject: self.uri().to_string(),
            predicate: "sg:length".to_string(),
            object: Object::typed(self.length.to_string(), "xsd:integer"),
            graph: None,
        });
        sink.add_quad(Quad {
            subject: self.uri().to_string(),
            predicate: "sg:language".to_string(),
            object: Object::plain(self.language.clone()),
            graph: None,
        });
        if let Some(summary) = &self.summary {
            sink.add_quad(Quad {
                subject: self.uri().to_string(),
                predicate: "skos:definition".to_string(),
                object: Object::plain(summary.clone()),
                graph: None,
            });
        }
        if self.embedding.is_some() {
            sink.add_quad(Quad {
                subject: self.uri().to_string(),
                predicate: "sg:hasEmbedding".to_string(),
                object: Object::typed("true", "xsd:boolean"),
                graph: None,
            });
        }
        for mention in &self.mentions {
            sink.add_quad(Quad {
                subject: self.uri().to_string(),
                predicate: "sg:mentions".to_string(),
                object: Object::iri(mention.entity_uri.clone()),
                graph: None,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_short_content() {
        let err = Unit::new("u:1", "short", "d1", 0).unwrap_err();
        assert_eq!(err, UnitError::ContentTooShort(5));
    }

    #[test]
    fn accepts_valid_content() {
        let unit = Unit::new("u:1", "Geoffrey Hinton invented backpropagation.", "d1", 0).unwrap();
        assert_eq!(unit.source(), "d1");
        assert!(!unit.is_entry_point());
    }

    #[test]
    fn rejects_out_of_range_relevance() {
        let mut unit = Unit::new("u:1", "Geoffrey Hinton invented backpropagation.", "d1", 0).unwrap();
        assert!(unit.add_mention("e:1", 1.5).is_err());
        assert!(unit.add_mention("e:1", 0.9).is_ok());
    }
}
