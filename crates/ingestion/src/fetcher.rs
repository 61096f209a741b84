//! Seed fetching
//!
//! The fetcher asks every configured source about a seed, merges what
//! they report and turns it into one fetched record plus metadata-only
//! stubs for the papers in its lists.

use crate::merge::{merge_works, MergedWork};
use crate::source::{create_sources, CitationSource, SourcePaper};
use chrono::Utc;
use citeset_common::config::FetchConfig;
use citeset_common::errors::{AppError, Result};
use citeset_common::metrics::FetchMetrics;
use citeset_common::models::{PaperId, PaperRecord, SeedSet};
use citeset_common::{CitationStore, Dataset, FetchFailure, QueryInfo};
use futures::stream::{self, StreamExt};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// A seed's record together with the stubs learned from its lists
#[derive(Debug, Clone)]
pub struct FetchedPaper {
    pub record: PaperRecord,
    pub stubs: Vec<PaperRecord>,
}

/// Result of fetching a whole seed set
#[derive(Debug, Clone, Default)]
pub struct FetchOutcome {
    pub store: CitationStore,
    pub failures: BTreeMap<PaperId, FetchFailure>,
}

impl FetchOutcome {
    /// Number of seeds with a fetched record
    pub fn resolved(&self) -> usize {
        self.store.fetched().count()
    }

    /// Package the outcome as a dataset
    pub fn into_dataset(self, seeds: SeedSet, mut query_info: QueryInfo) -> Dataset {
        query_info.seed_count = seeds.len();
        query_info.seed_fingerprint = seeds.fingerprint();
        Dataset {
            query_info,
            seeds,
            failures: self.failures,
            papers: self.store,
        }
    }
}

/// Fetches seeds from a list of sources
pub struct Fetcher {
    sources: Vec<Arc<dyn CitationSource>>,
    concurrency: usize,
}

impl Fetcher {
    pub fn new(sources: Vec<Arc<dyn CitationSource>>, concurrency: usize) -> Self {
        Self {
            sources,
            concurrency: concurrency.max(1),
        }
    }

    /// Build a fetcher over the configured sources
    pub fn from_config(config: &FetchConfig) -> Result<Self> {
        Ok(Self::new(create_sources(config)?, config.concurrency))
    }

    pub fn source_names(&self) -> Vec<String> {
        self.sources.iter().map(|s| s.name().to_string()).collect()
    }

    /// Fetch one paper from every source and merge the answers
    ///
    /// Succeeds if at least one source resolved the paper. When none did,
    /// a transient failure takes precedence over "not found" so that the
    /// caller can tell an outage from a bad identifier.
    #[instrument(skip(self, id), fields(id = %id))]
    pub async fn fetch_one(&self, id: &PaperId) -> Result<FetchedPaper> {
        let mut answers: Vec<(&str, SourcePaper)> = Vec::new();
        let mut errors: Vec<AppError> = Vec::new();

        for source in &self.sources {
            let metrics = FetchMetrics::start(source.name());
            match source.fetch(id).await {
                Ok(paper) => {
                    metrics.finish("success");
                    debug!(
                        source = source.name(),
                        references = paper.references.len(),
                        cited_by = paper.cited_by.len(),
                        "Source answered"
                    );
                    answers.push((source.name(), paper));
                }
                Err(e) => {
                    metrics.finish(outcome_label(&e));
                    debug!(source = source.name(), error = %e, "Source failed");
                    errors.push(e);
                }
            }
        }

        if answers.is_empty() {
            return Err(pick_error(id, errors));
        }
        for e in &errors {
            warn!(error = %e, "Partial fetch: one source failed");
        }

        Ok(build_paper(id, &answers))
    }

    /// Fetch every seed, `concurrency` at a time
    ///
    /// Results are applied in seed order, so the outcome does not depend on
    /// which request finishes first. Fetched records always win over stubs.
    pub async fn fetch_all(&self, seeds: &SeedSet) -> FetchOutcome {
        let total = seeds.len();
        info!(seeds = total, sources = ?self.source_names(), "Fetching seed papers");

        let results: Vec<(PaperId, Result<FetchedPaper>)> = stream::iter(seeds.iter().cloned())
            .map(move |id| async move {
                let result = self.fetch_one(&id).await;
                (id, result)
            })
            .buffered(self.concurrency)
            .collect()
            .await;

        let mut outcome = FetchOutcome::default();
        let mut stubs = Vec::new();

        for (i, (id, result)) in results.into_iter().enumerate() {
            match result {
                Ok(fetched) => {
                    info!(
                        "[{}/{}] {}: {} references, {} citing",
                        i + 1,
                        total,
                        id,
                        fetched.record.references.len(),
                        fetched.record.cited_by.len()
                    );
                    outcome.store.insert(fetched.record);
                    stubs.extend(fetched.stubs);
                }
                Err(e) => {
                    warn!("[{}/{}] {}: {}", i + 1, total, id, e);
                    outcome.failures.insert(id, FetchFailure::from_error(&e));
                }
            }
        }

        for stub in stubs {
            outcome.store.insert_stub(stub);
        }

        info!(
            resolved = outcome.resolved(),
            failed = outcome.failures.len(),
            records = outcome.store.len(),
            "Fetch complete"
        );
        outcome
    }
}

fn outcome_label(err: &AppError) -> &'static str {
    match err {
        AppError::IdentifierNotFound { .. } => "not_found",
        e if e.is_transient() => "transient",
        _ => "error",
    }
}

/// Choose the error reported when no source resolved a paper
fn pick_error(id: &PaperId, mut errors: Vec<AppError>) -> AppError {
    if let Some(pos) = errors.iter().position(AppError::is_transient) {
        return errors.swap_remove(pos);
    }
    errors
        .into_iter()
        .find(|e| !matches!(e, AppError::IdentifierNotFound { .. }))
        .unwrap_or_else(|| AppError::IdentifierNotFound { id: id.to_string() })
}

fn build_paper(id: &PaperId, answers: &[(&str, SourcePaper)]) -> FetchedPaper {
    let mut metadata = answers[0].1.work.metadata.clone();
    let mut external_ids = answers[0].1.work.ids.clone();
    for (_, paper) in &answers[1..] {
        metadata.fill_missing(&paper.work.metadata);
        external_ids.fill_missing(&paper.work.ids);
    }

    let references = merge_works(answers.iter().map(|(name, p)| (*name, p.references.as_slice())));
    let cited_by = merge_works(answers.iter().map(|(name, p)| (*name, p.cited_by.as_slice())));

    let mut record = PaperRecord::new(id.clone(), metadata)
        .with_references(references.iter().map(|w| w.id.clone()))
        .with_cited_by(cited_by.iter().map(|w| w.id.clone()));
    record.external_ids = external_ids;
    record.sources = answers.iter().map(|(name, _)| name.to_string()).collect();
    record.fetched_at = Some(Utc::now());

    let stubs = references
        .into_iter()
        .chain(cited_by)
        .filter(|w| &w.id != id)
        .map(stub_record)
        .collect();

    FetchedPaper { record, stubs }
}

fn stub_record(work: MergedWork) -> PaperRecord {
    let mut stub = PaperRecord::stub(work.id, work.metadata, work.ids);
    stub.sources = work.sources;
    stub
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::{MockSource, WorkSummary};
    use citeset_common::models::{ExternalIds, PaperMetadata};
    use citeset_common::FailureKind;

    fn id(raw: &str) -> PaperId {
        PaperId::parse(raw).unwrap()
    }

    fn work(doi: &str, title: &str) -> WorkSummary {
        WorkSummary::new(
            ExternalIds {
                doi: Some(doi.to_string()),
                ..Default::default()
            },
            PaperMetadata {
                title: Some(title.to_string()),
                ..Default::default()
            },
        )
    }

    fn paper(doi: &str, references: &[&str], cited_by: &[&str]) -> SourcePaper {
        SourcePaper {
            work: work(doi, &format!("Paper {doi}")),
            references: references.iter().map(|r| work(r, &format!("Ref {r}"))).collect(),
            cited_by: cited_by.iter().map(|c| work(c, &format!("Citer {c}"))).collect(),
        }
    }

    fn fetcher(sources: Vec<MockSource>) -> Fetcher {
        Fetcher::new(
            sources
                .into_iter()
                .map(|s| Arc::new(s) as Arc<dyn CitationSource>)
                .collect(),
            4,
        )
    }

    #[tokio::test]
    async fn test_fetch_one_merges_sources() {
        let a = MockSource::new("first").with_paper(id("10.1/a"), paper("10.1/a", &["10.1/x"], &["10.1/c"]));
        let mut s2_paper = paper("10.1/a", &["10.1/y"], &[]);
        s2_paper.work.metadata.year = Some(2021);
        let b = MockSource::new("second").with_paper(id("10.1/a"), s2_paper);

        let fetched = fetcher(vec![a, b]).fetch_one(&id("10.1/a")).await.unwrap();
        let record = fetched.record;

        assert!(record.is_fetched());
        assert_eq!(record.metadata.title.as_deref(), Some("Paper 10.1/a"));
        assert_eq!(record.metadata.year, Some(2021));
        assert_eq!(record.references, [id("10.1/x"), id("10.1/y")].into_iter().collect());
        assert_eq!(record.cited_by, [id("10.1/c")].into_iter().collect());
        assert_eq!(record.sources, vec!["first", "second"]);
        assert!(record.fetched_at.is_some());

        let stub_ids: Vec<&str> = fetched.stubs.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(stub_ids, vec!["10.1/x", "10.1/y", "10.1/c"]);
        assert!(fetched.stubs.iter().all(|s| !s.is_fetched()));
    }

    #[tokio::test]
    async fn test_fetch_one_partial_source_failure() {
        let a = MockSource::new("first").failing_transiently(1);
        let b = MockSource::new("second").with_paper(id("10.1/a"), paper("10.1/a", &[], &[]));

        let fetched = fetcher(vec![a, b]).fetch_one(&id("10.1/a")).await.unwrap();
        assert_eq!(fetched.record.sources, vec!["second"]);
    }

    #[tokio::test]
    async fn test_fetch_one_error_precedence() {
        let a = MockSource::new("first");
        let b = MockSource::new("second").failing_transiently(1);
        let err = fetcher(vec![a, b]).fetch_one(&id("10.1/a")).await.unwrap_err();
        assert!(err.is_transient());

        let err = fetcher(vec![MockSource::new("first")])
            .fetch_one(&id("10.1/a"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::IdentifierNotFound { ref id } if id == "10.1/a"));
    }

    #[tokio::test]
    async fn test_fetch_all_builds_store_and_failures() {
        // a cites b (a seed) and x; b is cited by a and z
        let source = MockSource::new("mock")
            .with_paper(id("10.1/a"), paper("10.1/a", &["10.1/b", "10.1/x"], &[]))
            .with_paper(id("10.1/b"), paper("10.1/b", &[], &["10.1/a", "10.1/z"]));

        let seeds: SeedSet = [id("10.1/a"), id("10.1/b"), id("10.1/missing")].into_iter().collect();
        let outcome = fetcher(vec![source]).fetch_all(&seeds).await;

        assert_eq!(outcome.resolved(), 2);
        // Seed b was also seen as a's reference, its fetched record must win
        assert!(outcome.store.get(&id("10.1/b")).unwrap().is_fetched());
        assert!(!outcome.store.get(&id("10.1/x")).unwrap().is_fetched());
        assert!(!outcome.store.get(&id("10.1/z")).unwrap().is_fetched());
        assert_eq!(outcome.store.len(), 4);

        let failure = &outcome.failures[&id("10.1/missing")];
        assert_eq!(failure.kind, FailureKind::NotFound);
    }

    #[tokio::test]
    async fn test_fetch_all_is_deterministic() {
        let build = || {
            MockSource::new("mock")
                .with_paper(id("10.1/a"), paper("10.1/a", &["10.1/x"], &["10.1/y"]))
                .with_paper(id("10.1/b"), paper("10.1/b", &["10.1/x"], &[]))
        };
        let seeds: SeedSet = [id("10.1/a"), id("10.1/b")].into_iter().collect();

        let first = fetcher(vec![build()]).fetch_all(&seeds).await;
        let second = fetcher(vec![build()]).fetch_all(&seeds).await;

        let strip = |store: &CitationStore| -> Vec<(PaperId, usize, usize)> {
            store
                .iter()
                .map(|r| (r.id.clone(), r.references.len(), r.cited_by.len()))
                .collect()
        };
        assert_eq!(strip(&first.store), strip(&second.store));
    }

    #[tokio::test]
    async fn test_outcome_into_dataset() {
        let source = MockSource::new("mock").with_paper(id("10.1/a"), paper("10.1/a", &[], &[]));
        let seeds: SeedSet = [id("10.1/a")].into_iter().collect();
        let outcome = fetcher(vec![source]).fetch_all(&seeds).await;

        let dataset = outcome.into_dataset(seeds.clone(), QueryInfo::default());
        assert_eq!(dataset.query_info.seed_count, 1);
        assert_eq!(dataset.query_info.seed_fingerprint, seeds.fingerprint());
        assert_eq!(dataset.seeds, seeds);
    }
}
