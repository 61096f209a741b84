//! Bibliographic source abstraction
//!
//! A source resolves one paper identifier to its metadata, its reference
//! list and the works citing it. Concrete sources talk to OpenAlex and
//! Semantic Scholar; [`MockSource`] serves canned data for tests.

use crate::openalex::OpenAlexSource;
use crate::semantic_scholar::SemanticScholarSource;
use async_trait::async_trait;
use citeset_common::config::FetchConfig;
use citeset_common::errors::{AppError, Result};
use citeset_common::models::{ExternalIds, PaperId, PaperMetadata};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::info;

/// A work as described by a source: identifiers plus metadata
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkSummary {
    pub ids: ExternalIds,
    pub metadata: PaperMetadata,
}

impl WorkSummary {
    pub fn new(ids: ExternalIds, metadata: PaperMetadata) -> Self {
        Self { ids, metadata }
    }

    /// Canonical identifier for this work, if it carries any usable id
    pub fn paper_id(&self) -> Option<PaperId> {
        PaperId::from_external_ids(&self.ids)
    }
}

/// Everything one source knows about a paper
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourcePaper {
    pub work: WorkSummary,
    /// Works this paper cites
    pub references: Vec<WorkSummary>,
    /// Works citing this paper
    pub cited_by: Vec<WorkSummary>,
}

/// Trait for bibliographic sources
#[async_trait]
pub trait CitationSource: Send + Sync {
    /// Source name, as used in configuration and provenance
    fn name(&self) -> &str;

    /// Resolve a paper with its references and citing works
    async fn fetch(&self, id: &PaperId) -> Result<SourcePaper>;
}

/// Mock source for testing
///
/// Serves registered papers and reports every other identifier as not
/// found. It can be told to fail transiently for its first few calls.
pub struct MockSource {
    name: String,
    papers: HashMap<PaperId, SourcePaper>,
    transient_failures: AtomicUsize,
    calls: AtomicUsize,
}

impl MockSource {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            papers: HashMap::new(),
            transient_failures: AtomicUsize::new(0),
            calls: AtomicUsize::new(0),
        }
    }

    /// Register a paper served under `id`
    pub fn with_paper(mut self, id: PaperId, paper: SourcePaper) -> Self {
        self.papers.insert(id, paper);
        self
    }

    /// Fail the next `count` calls with a transient error
    pub fn failing_transiently(self, count: usize) -> Self {
        self.transient_failures.store(count, Ordering::SeqCst);
        self
    }

    /// Number of fetch calls received so far
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CitationSource for MockSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch(&self, id: &PaperId) -> Result<SourcePaper> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let failing = self
            .transient_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(AppError::TransientFetch {
                source_name: self.name.clone(),
                message: "simulated outage".to_string(),
            });
        }

        self.papers
            .get(id)
            .cloned()
            .ok_or_else(|| AppError::IdentifierNotFound { id: id.to_string() })
    }
}

/// Create the configured sources, in priority order
pub fn create_sources(config: &FetchConfig) -> Result<Vec<Arc<dyn CitationSource>>> {
    if config.sources.is_empty() {
        return Err(AppError::Configuration {
            message: "no citation sources configured".to_string(),
        });
    }

    let mut sources: Vec<Arc<dyn CitationSource>> = Vec::with_capacity(config.sources.len());
    for name in &config.sources {
        match name.to_lowercase().as_str() {
            "openalex" => {
                info!("Using OpenAlex source: {}", config.openalex_base_url);
                sources.push(Arc::new(OpenAlexSource::new(config)?));
            }
            "semantic_scholar" | "semanticscholar" | "s2" => {
                info!("Using Semantic Scholar source: {}", config.s2_base_url);
                sources.push(Arc::new(SemanticScholarSource::new(config)?));
            }
            other => {
                return Err(AppError::Configuration {
                    message: format!("unknown citation source '{}'", other),
                });
            }
        }
    }

    Ok(sources)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(raw: &str) -> PaperId {
        PaperId::parse(raw).unwrap()
    }

    #[tokio::test]
    async fn test_mock_source_serves_registered_papers() {
        let paper = SourcePaper {
            work: WorkSummary::new(
                ExternalIds {
                    doi: Some("10.1000/a".into()),
                    ..Default::default()
                },
                PaperMetadata::default(),
            ),
            ..Default::default()
        };
        let source = MockSource::new("mock").with_paper(id("10.1000/a"), paper.clone());

        let fetched = tokio_test::assert_ok!(source.fetch(&id("10.1000/a")).await);
        assert_eq!(fetched, paper);

        let missing = tokio_test::assert_err!(source.fetch(&id("10.1000/b")).await);
        assert!(matches!(missing, AppError::IdentifierNotFound { .. }));
        assert_eq!(source.calls(), 2);
    }

    #[tokio::test]
    async fn test_mock_source_transient_failures() {
        let source = MockSource::new("mock").failing_transiently(1);

        let err = source.fetch(&id("10.1000/a")).await.unwrap_err();
        assert!(err.is_transient());

        let err = source.fetch(&id("10.1000/a")).await.unwrap_err();
        assert!(!err.is_transient());
    }

    #[test]
    fn test_work_summary_id_prefers_doi() {
        let work = WorkSummary::new(
            ExternalIds {
                doi: Some("https://doi.org/10.1000/ABC".into()),
                openalex: Some("https://openalex.org/W1".into()),
                ..Default::default()
            },
            PaperMetadata::default(),
        );
        assert_eq!(work.paper_id().unwrap().as_str(), "10.1000/abc");
    }

    #[test]
    fn test_create_sources() {
        let config = FetchConfig::default();
        let sources = create_sources(&config).unwrap();
        let names: Vec<&str> = sources.iter().map(|s| s.name()).collect();
        assert_eq!(names, vec!["openalex", "semantic_scholar"]);
    }

    #[test]
    fn test_create_sources_rejects_unknown_names() {
        let config = FetchConfig {
            sources: vec!["crossref".to_string()],
            ..Default::default()
        };
        assert!(matches!(
            create_sources(&config),
            Err(AppError::Configuration { .. })
        ));

        let config = FetchConfig {
            sources: vec![],
            ..Default::default()
        };
        assert!(create_sources(&config).is_err());
    }
}
