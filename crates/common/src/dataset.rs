//! Persisted citation datasets
//!
//! A dataset is the output of one fetch run: the seed set, every record
//! the fetcher stored, and the seeds that could not be resolved. It lets
//! an analysis be rerun with new thresholds without refetching.

use crate::errors::{AppError, ErrorCode, Result};
use crate::models::{PaperId, SeedSet};
use crate::store::CitationStore;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, info};

/// Information about the fetch run that produced a dataset
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_file: Option<String>,

    #[serde(default)]
    pub seed_count: usize,

    #[serde(default)]
    pub seed_fingerprint: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_citing_per_paper: Option<usize>,

    #[serde(default)]
    pub sources: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fetched_at: Option<DateTime<Utc>>,
}

/// Why a seed could not be fetched
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    NotFound,
    Transient,
    Upstream,
    Other,
}

/// A recorded fetch failure for one seed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchFailure {
    pub kind: FailureKind,
    pub message: String,
}

impl FetchFailure {
    pub fn from_error(err: &AppError) -> Self {
        let kind = match err.code() {
            ErrorCode::IdentifierNotFound => FailureKind::NotFound,
            ErrorCode::TransientFetch => FailureKind::Transient,
            ErrorCode::UpstreamError | ErrorCode::HttpClientError => FailureKind::Upstream,
            _ => FailureKind::Other,
        };
        Self {
            kind,
            message: err.to_string(),
        }
    }
}

/// Seed set, fetched records and failures of one fetch run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dataset {
    #[serde(default)]
    pub query_info: QueryInfo,

    pub seeds: SeedSet,

    #[serde(default)]
    pub failures: BTreeMap<PaperId, FetchFailure>,

    pub papers: CitationStore,
}

impl Dataset {
    /// Wrap a bare store; the seeds are its fetched records
    pub fn from_store(papers: CitationStore) -> Self {
        let seeds: SeedSet = papers.fetched().map(|r| r.id.clone()).collect();
        Self {
            query_info: QueryInfo {
                seed_count: seeds.len(),
                seed_fingerprint: seeds.fingerprint(),
                ..Default::default()
            },
            seeds,
            failures: BTreeMap::new(),
            papers,
        }
    }

    /// Parse a dataset, or a bare `{ id: record }` store
    pub fn from_json(json: &str) -> Result<Self> {
        let value: serde_json::Value = serde_json::from_str(json)
            .map_err(|e| AppError::malformed(format!("dataset: {}", e)))?;

        let is_full = value
            .as_object()
            .is_some_and(|obj| obj.contains_key("seeds") && obj.contains_key("papers"));

        if is_full {
            serde_json::from_value(value).map_err(|e| AppError::malformed(format!("dataset: {}", e)))
        } else {
            let store: CitationStore = serde_json::from_value(value)
                .map_err(|e| AppError::malformed(format!("citation store: {}", e)))?;
            Ok(Self::from_store(store))
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Load a dataset file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| AppError::io(path, e))?;
        let dataset = Self::from_json(&json)?;
        info!(
            path = %path.display(),
            seeds = dataset.seeds.len(),
            records = dataset.papers.len(),
            failures = dataset.failures.len(),
            "Loaded citation dataset"
        );
        Ok(dataset)
    }

    /// Write the dataset to a file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        std::fs::write(path, self.to_json()?).map_err(|e| AppError::io(path, e))?;
        debug!(path = %path.display(), "Saved citation dataset");
        Ok(())
    }
}
