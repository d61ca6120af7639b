//! Plug-in interfaces for the two graph-analytic collaborators the spec
//! names but leaves unimplemented (spec §1: "community-detection and
//! personalised-page-rank algorithms are acknowledged as graph-analytic
//! plug-ins; their interface is specified but their internal algorithms
//! are not").

use semgraph_dataset::GraphDataset;
use semgraph_model::CommunityElement;

/// A pluggable community-detection algorithm over the dataset's
/// entity/unit graph. The engine calls this for the `communities`
/// operation and wraps whatever it returns into dataset triples via
/// `CommunityElement::export_into`; it does not implement clustering
/// itself.
pub trait CommunityDetector: Send + Sync {
    fn detect(&self, dataset: &GraphDataset, limit: Option<usize>) -> Vec<CommunityElement>;
}

/// A pluggable personalised-page-rank algorithm. The engine calls this to
/// populate each node's `ElementCore::pagerank` score; it does not
/// implement the ranking algorithm itself.
pub trait PageRankProvider: Send + Sync {
    /// Returns `(uri, score)` pairs; scores are expected in `[0,1]` (the
    /// caller clamps via `ElementCore::set_pagerank`, which clamps
    /// unconditionally, so a non-conforming provider cannot violate the
    /// dataset invariant).
    fn rank(&self, dataset: &GraphDataset) -> Vec<(String, f64)>;
}
