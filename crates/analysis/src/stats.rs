//! Summary statistics over a restricted aggregation

use crate::aggregate::{AnalysisReport, RestrictedCounts};
use citeset_common::errors::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Headline numbers and count distributions for one analysis
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummaryStats {
    pub seed_count: usize,
    pub resolved_seeds: usize,
    pub missing_seeds: usize,
    pub edge_count: usize,

    /// Distinct papers cited by at least one seed
    pub cited_candidates: usize,
    /// Distinct papers citing at least one seed
    pub citing_candidates: usize,

    pub k_cited: usize,
    pub k_citing: usize,
    pub cited_selected: usize,
    pub citing_selected: usize,

    /// `c_in` value -> number of papers with that count
    pub in_count_distribution: BTreeMap<usize, usize>,
    /// `c_out` value -> number of papers with that count
    pub out_count_distribution: BTreeMap<usize, usize>,
}

impl SummaryStats {
    pub fn from_counts(counts: &RestrictedCounts, report: &AnalysisReport) -> Self {
        let in_count_distribution = distribution(counts.in_counts().map(|(_, c)| c));
        let out_count_distribution = distribution(counts.out_counts().map(|(_, c)| c));

        Self {
            seed_count: counts.seeds().len(),
            resolved_seeds: report.diagnostics.resolved.len(),
            missing_seeds: report.diagnostics.missing.len(),
            edge_count: report.edges.len(),
            cited_candidates: in_count_distribution.values().sum(),
            citing_candidates: out_count_distribution.values().sum(),
            k_cited: report.params.k_cited,
            k_citing: report.params.k_citing,
            cited_selected: report.cited.len(),
            citing_selected: report.citing.len(),
            in_count_distribution,
            out_count_distribution,
        }
    }

    /// Highest `c_in` observed, 0 when nothing is cited
    pub fn max_in_count(&self) -> usize {
        self.in_count_distribution.keys().next_back().copied().unwrap_or(0)
    }

    /// Highest `c_out` observed, 0 when nothing cites into the seeds
    pub fn max_out_count(&self) -> usize {
        self.out_count_distribution.keys().next_back().copied().unwrap_or(0)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

fn distribution(counts: impl Iterator<Item = usize>) -> BTreeMap<usize, usize> {
    let mut dist = BTreeMap::new();
    for count in counts {
        *dist.entry(count).or_insert(0) += 1;
    }
    dist
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::AggregationParams;
    use citeset_common::models::{PaperId, PaperMetadata, PaperRecord, SeedSet};
    use citeset_common::CitationStore;

    fn id(raw: &str) -> PaperId {
        PaperId::parse(raw).unwrap()
    }

    #[test]
    fn test_summary_stats() {
        let store: CitationStore = [
            PaperRecord::new(id("s:a"), PaperMetadata::default())
                .with_references([id("s:x"), id("s:b")])
                .with_cited_by([id("s:q")]),
            PaperRecord::new(id("s:b"), PaperMetadata::default())
                .with_references([id("s:x")])
                .with_cited_by([id("s:q")]),
        ]
        .into_iter()
        .collect();
        let seeds: SeedSet = [id("s:a"), id("s:b"), id("s:c")].into_iter().collect();

        let counts = RestrictedCounts::compute(&seeds, &store);
        let report = counts.select(&AggregationParams::new(2, 2));
        let stats = SummaryStats::from_counts(&counts, &report);

        assert_eq!(stats.seed_count, 3);
        assert_eq!(stats.resolved_seeds, 2);
        assert_eq!(stats.missing_seeds, 1);
        // a->x, a->b, b->x, q->a, q->b
        assert_eq!(stats.edge_count, 5);
        assert_eq!(stats.cited_candidates, 2);
        // q and a
        assert_eq!(stats.citing_candidates, 2);
        assert_eq!(stats.cited_selected, 1);
        assert_eq!(stats.citing_selected, 1);
        assert_eq!(stats.in_count_distribution, BTreeMap::from([(1, 1), (2, 1)]));
        assert_eq!(stats.out_count_distribution, BTreeMap::from([(1, 1), (2, 1)]));
        assert_eq!(stats.max_in_count(), 2);

        let json = stats.to_json().unwrap();
        assert!(json.contains("\"edge_count\": 5"));
    }

    #[test]
    fn test_empty_distribution() {
        let counts = RestrictedCounts::compute(&SeedSet::new(), &CitationStore::new());
        let report = counts.select(&AggregationParams::default());
        let stats = SummaryStats::from_counts(&counts, &report);
        assert_eq!(stats.max_in_count(), 0);
        assert_eq!(stats.max_out_count(), 0);
    }
}
