//! Embedding enrichment pipeline and approximate-nearest-neighbour vector
//! index (spec §4.5-§4.6, C7/C8).

mod enrich;
mod index;

pub use enrich::{
    default_retrievable_types, deterministic_uri, enrich, EnrichOptions, EnrichOutput,
    EnrichStatistics,
};
pub use index::{IndexParams, IndexStatistics, NodeMetadata, SearchResult, VectorIndex, VectorIndexError};
