//! RDF element base and typed node models.
//!
//! `ElementCore` (in `core`) carries the fields and behaviour every node
//! shares; `Unit`, `Entity`, `Relationship`, `Attribute`, and
//! `CommunityElement` each wrap one and add their own ontology-specific
//! invariants on top.

mod attribute;
mod community;
mod core;
mod entity;
mod relationship;
mod unit;

pub use attribute::Attribute;
pub use community::{CommunityElement, CommunityError};
pub use core::{ElementCore, Object, Quad, RdfElement, TripleSink};
pub use entity::{Entity, EntityError};
pub use relationship::{Relationship, RelationshipError};
pub use unit::{EntityMention, Unit, UnitError, MIN_UNIT_CONTENT_LENGTH};
