use crate::core::{ElementCore, Object, Quad, RdfElement, TripleSink};
use std::collections::HashSet;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CommunityError {
    #[error("cohesion must be in [0,1], got {0}")]
    CohesionOutOfRange(String),
}

/// An aggregate summary over a detected cluster of entities/units (spec
/// §3, class `CommunityElement`).
#[derive(Debug, Clone)]
pub struct CommunityElement {
    core: ElementCore,
    members: HashSet<String>,
    cohesion: f64,
    summary: String,
}

impl CommunityElement {
    pub fn new(
        uri: impl Into<String>,
        members: impl IntoIterator<Item = String>,
        cohesion: f64,
        summary: impl Into<String>,
    ) -> Result<Self, CommunityError> {
        if !(0.0..=1.0).contains(&cohesion) {
            return Err(CommunityError::CohesionOutOfRange(cohesion.to_string()));
        }
        let mut core = ElementCore::new(uri, "CommunityElement", true);
        let summary = summary.into();
        core.set_content(summary.clone());
        Ok(Self {
            core,
            members: members.into_iter().collect(),
            cohesion,
            summary,
        })
    }

    pub fn members(&self) -> &HashSet<String> {
        &self.members
    }

    pub fn cohesion(&self) -> f64 {
        self.cohesion
    }

    pub fn summary(&self) -> &str {
        &self.summary
    }
}

impl RdfElement for CommunityElement {
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
            predicate: "sg:cohesion".to_string(),
            object: Object::typed(format!("{:.6}", self.cohesion), "xsd:double"),
            graph: None,
        });
        for member in &self.members {
            sink.add_quad(Quad {
                subject: uri.clone(),
                predicate: "sg:hasMember".to_string(),
                object: Object::iri(member.clone()),
                graph: None,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_out_of_range_cohesion() {
        assert!(CommunityElement::new("c:1", vec!["e:1".to_string()], 1.5, "cluster").is_err());
    }

    #[test]
    fn entry_point_defaults_true() {
        let community =
            CommunityElement::new("c:1", vec!["e:1".to_string(), "e:2".to_string()], 0.8, "cluster")
                .unwrap();
        assert!(community.is_entry_point());
        assert_eq!(community.members().len(), 2);
    }
}
