//! Restricted citation aggregation
//!
//! Counts are taken over the citation graph restricted to the seed set S:
//! the edges are every `(p, r)` with `r` in the references of a seed `p`,
//! and every `(q, p)` with `q` among the works citing a seed `p`.
//!
//! - `c_in(r)`: number of distinct seeds citing `r`
//! - `c_out(q)`: number of distinct seeds cited by `q`
//!
//! Edge construction happens once in [`RestrictedCounts::compute`];
//! thresholds are applied afterwards by [`RestrictedCounts::select`], so
//! re-thresholding never touches the store again.

use citeset_common::config::AnalysisConfig;
use citeset_common::metrics::record_aggregation;
use citeset_common::models::{CitationEdge, PaperId, PaperMetadata, SeedSet};
use citeset_common::CitationStore;
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info, warn};

/// Thresholds for the two lists
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregationParams {
    /// Minimum `c_in` for a paper to be listed as frequently cited
    pub k_cited: usize,

    /// Minimum `c_out` for a paper to be listed as frequently citing
    pub k_citing: usize,

    /// Leave seed papers out of both lists
    #[serde(default)]
    pub exclude_seeds: bool,
}

impl Default for AggregationParams {
    fn default() -> Self {
        Self {
            k_cited: citeset_common::DEFAULT_K_CITED,
            k_citing: citeset_common::DEFAULT_K_CITING,
            exclude_seeds: false,
        }
    }
}

impl From<&AnalysisConfig> for AggregationParams {
    fn from(config: &AnalysisConfig) -> Self {
        Self {
            k_cited: config.k_cited,
            k_citing: config.k_citing,
            exclude_seeds: config.exclude_seeds,
        }
    }
}

impl AggregationParams {
    pub fn new(k_cited: usize, k_citing: usize) -> Self {
        Self {
            k_cited,
            k_citing,
            exclude_seeds: false,
        }
    }

    /// Effective `k_cited`; 0 admits the same entries as 1
    pub fn min_cited(&self) -> usize {
        self.k_cited.max(1)
    }

    /// Effective `k_citing`; 0 admits the same entries as 1
    pub fn min_citing(&self) -> usize {
        self.k_citing.max(1)
    }
}

/// One paper in a result list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregateEntry {
    pub id: PaperId,

    /// Metadata from the store, or the empty placeholder
    pub metadata: PaperMetadata,

    /// Number of distinct seeds responsible for this entry
    pub count: usize,

    /// The seeds responsible for the count
    pub contributing: BTreeSet<PaperId>,

    /// Whether the paper is itself a seed
    pub is_seed: bool,
}

/// Which seeds had usable records
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeedDiagnostics {
    /// Seeds with a fetched record
    pub resolved: Vec<PaperId>,

    /// Seeds with no record, or only a reference stub
    pub missing: Vec<PaperId>,
}

impl SeedDiagnostics {
    pub fn total(&self) -> usize {
        self.resolved.len() + self.missing.len()
    }
}

/// Thresholded result of a restricted aggregation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub params: AggregationParams,
    pub seed_fingerprint: String,

    /// R: papers cited by at least `k_cited` seeds
    pub cited: Vec<AggregateEntry>,

    /// Q: papers citing at least `k_citing` seeds
    pub citing: Vec<AggregateEntry>,

    /// The restricted edge set, sorted
    pub edges: Vec<CitationEdge>,

    pub diagnostics: SeedDiagnostics,
}

/// Counts over the restricted citation graph, before thresholding
#[derive(Debug, Clone)]
pub struct RestrictedCounts {
    seeds: SeedSet,
    seed_fingerprint: String,
    edges: BTreeSet<CitationEdge>,
    /// r -> seeds citing r
    contributing_in: BTreeMap<PaperId, BTreeSet<PaperId>>,
    /// q -> seeds cited by q
    contributing_out: BTreeMap<PaperId, BTreeSet<PaperId>>,
    metadata: BTreeMap<PaperId, PaperMetadata>,
    diagnostics: SeedDiagnostics,
}

impl RestrictedCounts {
    /// Build the restricted edge set and both count maps
    ///
    /// Only fetched records contribute edges. A seed without one is listed
    /// in the diagnostics and otherwise ignored.
    pub fn compute(seeds: &SeedSet, store: &CitationStore) -> Self {
        let mut edges = BTreeSet::new();
        let mut diagnostics = SeedDiagnostics::default();

        for seed in seeds {
            let record = match store.lookup(seed) {
                Some(record) if record.is_fetched() => record,
                _ => {
                    diagnostics.missing.push(seed.clone());
                    continue;
                }
            };
            diagnostics.resolved.push(seed.clone());

            let outgoing = record
                .references
                .iter()
                .filter_map(|r| CitationEdge::new(seed.clone(), r.clone()));
            let incoming = record
                .cited_by
                .iter()
                .filter_map(|q| CitationEdge::new(q.clone(), seed.clone()));
            edges.extend(outgoing.chain(incoming));
        }

        let mut contributing_in: BTreeMap<PaperId, BTreeSet<PaperId>> = BTreeMap::new();
        let mut contributing_out: BTreeMap<PaperId, BTreeSet<PaperId>> = BTreeMap::new();

        // An edge between two seeds counts in both directions
        for edge in &edges {
            if seeds.contains(&edge.citing) {
                contributing_in
                    .entry(edge.cited.clone())
                    .or_default()
                    .insert(edge.citing.clone());
            }
            if seeds.contains(&edge.cited) {
                contributing_out
                    .entry(edge.citing.clone())
                    .or_default()
                    .insert(edge.cited.clone());
            }
        }

        let metadata = contributing_in
            .keys()
            .chain(contributing_out.keys())
            .map(|id| {
                let metadata = store
                    .lookup(id)
                    .map(|r| r.metadata.clone())
                    .unwrap_or_default();
                (id.clone(), metadata)
            })
            .collect();

        if !diagnostics.missing.is_empty() {
            warn!(
                missing = diagnostics.missing.len(),
                resolved = diagnostics.resolved.len(),
                "Some seeds have no fetched record and contribute no edges"
            );
        }
        debug!(
            edges = edges.len(),
            cited_candidates = contributing_in.len(),
            citing_candidates = contributing_out.len(),
            "Restricted graph built"
        );
        record_aggregation(edges.len());

        Self {
            seeds: seeds.clone(),
            seed_fingerprint: seeds.fingerprint(),
            edges,
            contributing_in,
            contributing_out,
            metadata,
            diagnostics,
        }
    }

    /// Apply thresholds and produce both ordered lists
    pub fn select(&self, params: &AggregationParams) -> AnalysisReport {
        let cited = self.entries(&self.contributing_in, params.min_cited(), params.exclude_seeds);
        let citing = self.entries(&self.contributing_out, params.min_citing(), params.exclude_seeds);

        info!(
            k_cited = params.k_cited,
            k_citing = params.k_citing,
            cited = cited.len(),
            citing = citing.len(),
            "Aggregation complete"
        );

        AnalysisReport {
            params: *params,
            seed_fingerprint: self.seed_fingerprint.clone(),
            cited,
            citing,
            edges: self.edges.iter().cloned().collect(),
            diagnostics: self.diagnostics.clone(),
        }
    }

    fn entries(
        &self,
        counts: &BTreeMap<PaperId, BTreeSet<PaperId>>,
        min_count: usize,
        exclude_seeds: bool,
    ) -> Vec<AggregateEntry> {
        let mut entries: Vec<AggregateEntry> = counts
            .iter()
            .filter(|(_, contributing)| contributing.len() >= min_count)
            .filter(|(id, _)| !(exclude_seeds && self.seeds.contains(id)))
            .map(|(id, contributing)| AggregateEntry {
                id: id.clone(),
                metadata: self.metadata.get(id).cloned().unwrap_or_default(),
                count: contributing.len(),
                contributing: contributing.clone(),
                is_seed: self.seeds.contains(id),
            })
            .collect();

        // BTreeMap iteration already yields ids ascending; the sort is stable
        entries.sort_by_key(|e| Reverse(e.count));
        entries
    }

    pub fn seeds(&self) -> &SeedSet {
        &self.seeds
    }

    pub fn edges(&self) -> &BTreeSet<CitationEdge> {
        &self.edges
    }

    /// `c_in` of every paper cited by at least one seed
    pub fn in_counts(&self) -> impl Iterator<Item = (&PaperId, usize)> {
        self.contributing_in.iter().map(|(id, s)| (id, s.len()))
    }

    /// `c_out` of every paper citing at least one seed
    pub fn out_counts(&self) -> impl Iterator<Item = (&PaperId, usize)> {
        self.contributing_out.iter().map(|(id, s)| (id, s.len()))
    }

    pub fn diagnostics(&self) -> &SeedDiagnostics {
        &self.diagnostics
    }
}

/// Compute and threshold in one step
pub fn aggregate(seeds: &SeedSet, store: &CitationStore, params: &AggregationParams) -> AnalysisReport {
    RestrictedCounts::compute(seeds, store).select(params)
}
