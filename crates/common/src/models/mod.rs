//! Data model
//!
//! Identifiers, paper records, seed sets and citation edges

mod identifier;
mod paper;
mod seed;

pub use identifier::{IdKind, PaperId, ARXIV_PREFIX, OPENALEX_PREFIX, S2_PREFIX};
pub use paper::{ExternalIds, PaperMetadata, PaperRecord, RecordOrigin};
pub use seed::SeedSet;

use serde::{Deserialize, Serialize};

/// Edge in the citation graph
///
/// Directed: `citing` cites `cited`. Edges are plain identifier pairs, so
/// a cyclic citation graph needs no shared ownership.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CitationEdge {
    /// Citing paper ID
    pub citing: PaperId,

    /// Cited paper ID
    pub cited: PaperId,
}

impl CitationEdge {
    /// Create an edge, rejecting self-citations
    pub fn new(citing: PaperId, cited: PaperId) -> Option<Self> {
        (citing != cited).then_some(Self { citing, cited })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_self_citation_is_rejected() {
        let a = PaperId::parse("10.1000/a").unwrap();
        let b = PaperId::parse("10.1000/b").unwrap();
        assert!(CitationEdge::new(a.clone(), a.clone()).is_none());
        let edge = CitationEdge::new(a.clone(), b.clone()).unwrap();
        assert_eq!(edge.citing, a);
        assert_eq!(edge.cited, b);
    }
}
