use crate::core::{ElementCore, Object, Quad, RdfElement, TripleSink};

/// An entity-scoped summary node produced by augmentation (spec §3, class
/// `Attribute`). The owning entity carries a `hasAttribute` back-reference
/// (added by the caller when attaching this attribute, see `semgraph-model`
/// consumers; this node only records the forward `owningEntity` link).
#[derive(Debug, Clone)]
pub struct Attribute {
    core: ElementCore,
    entity_uri: String,
    category: String,
}

impl Attribute {
    pub fn new(
        uri: impl Into<String>,
        entity_uri: impl Into<String>,
        category: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        let mut core = ElementCore::new(uri, "Attribute", false);
        core.set_content(content);
        Self {
            core,
            entity_uri: entity_uri.into(),
            category: category.into(),
        }
    }

    pub fn entity_uri(&self) -> &str {
        &self.entity_uri
    }

    pub fn category(&self) -> &str {
        &self.category
    }
}

impl RdfElement for Attribute {
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
            predicate: "sg:owningEntity".to_string(),
            object: Object::iri(self.entity_uri.clone()),
            graph: None,
        });
        sink.add_quad(Quad {
            subject: uri,
            predicate: "sg:category".to_string(),
            object: Object::plain(self.category.clone()),
            graph: None,
        });
        sink.add_quad(Quad {
            subject: self.entity_uri.clone(),
            predicate: "sg:hasAttribute".to_string(),
            object: Object::iri(self.uri().to_string()),
            graph: None,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exports_back_reference() {
        use crate::core::Quad;
        let attr = Attribute::new("a:1", "e:1", "biography", "Turing award laureate");
        let mut quads: Vec<Quad> = Vec::new();
        attr.export_into(&mut quads);
        assert!(quads
            .iter()
            .any(|q| q.subject == "e:1" && q.predicate == "sg:hasAttribute"));
    }
}
