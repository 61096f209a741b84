//! Paper records as fetched from bibliographic sources

use super::PaperId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Identifiers a paper is known by in external sources
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalIds {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doi: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arxiv: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub openalex: Option<String>,

    /// Semantic Scholar paper id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub s2: Option<String>,
}

impl ExternalIds {
    pub fn is_empty(&self) -> bool {
        self.doi.is_none() && self.arxiv.is_none() && self.openalex.is_none() && self.s2.is_none()
    }

    /// Fill absent ids from another set, keeping the ones already present
    pub fn fill_missing(&mut self, other: &ExternalIds) {
        fill_option(&mut self.doi, &other.doi);
        fill_option(&mut self.arxiv, &other.arxiv);
        fill_option(&mut self.openalex, &other.openalex);
        fill_option(&mut self.s2, &other.s2);
    }
}

/// Descriptive metadata of a paper
///
/// Every field may be missing; [`PaperMetadata::default`] is the placeholder
/// used for papers that were never resolved.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaperMetadata {
    #[serde(default)]
    pub title: Option<String>,

    /// Author display names, in publication order
    #[serde(default)]
    pub authors: Vec<String>,

    #[serde(default)]
    pub year: Option<i32>,

    #[serde(default)]
    pub venue: Option<String>,
}

impl PaperMetadata {
    pub fn is_empty(&self) -> bool {
        blank(&self.title) && self.authors.is_empty() && self.year.is_none() && blank(&self.venue)
    }

    /// Fill absent or blank fields from another source
    pub fn fill_missing(&mut self, other: &PaperMetadata) {
        if blank(&self.title) && !blank(&other.title) {
            self.title = other.title.clone();
        }
        if self.authors.is_empty() {
            self.authors = other.authors.clone();
        }
        if self.year.is_none() {
            self.year = other.year;
        }
        if blank(&self.venue) && !blank(&other.venue) {
            self.venue = other.venue.clone();
        }
    }

    /// Title shortened to `max_chars`, with an ellipsis when cut
    pub fn short_title(&self, max_chars: usize) -> Option<String> {
        let title = self.title.as_deref().filter(|t| !t.trim().is_empty())?;
        if title.chars().count() <= max_chars {
            return Some(title.to_string());
        }
        let cut: String = title.chars().take(max_chars.saturating_sub(3)).collect();
        Some(format!("{}...", cut.trim_end()))
    }
}

/// How a record entered the store
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordOrigin {
    /// The paper itself was looked up; its citation lists are authoritative
    #[default]
    Fetched,
    /// Learned from another paper's reference or citing list; metadata only
    Reference,
}

/// A fetched paper with its citation lists
///
/// Records are plain values. Refreshing a paper replaces its record
/// wholesale; nothing mutates a record already in the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaperRecord {
    pub id: PaperId,

    #[serde(flatten)]
    pub metadata: PaperMetadata,

    #[serde(default, skip_serializing_if = "ExternalIds::is_empty")]
    pub external_ids: ExternalIds,

    /// Papers this paper cites
    #[serde(default)]
    pub references: BTreeSet<PaperId>,

    /// Papers citing this paper
    #[serde(default)]
    pub cited_by: BTreeSet<PaperId>,

    /// Sources that contributed to this record
    #[serde(default)]
    pub sources: Vec<String>,

    #[serde(default)]
    pub origin: RecordOrigin,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fetched_at: Option<DateTime<Utc>>,
}

impl PaperRecord {
    /// Create a fetched record with no citations yet
    pub fn new(id: PaperId, metadata: PaperMetadata) -> Self {
        Self {
            id,
            metadata,
            external_ids: ExternalIds::default(),
            references: BTreeSet::new(),
            cited_by: BTreeSet::new(),
            sources: Vec::new(),
            origin: RecordOrigin::Fetched,
            fetched_at: None,
        }
    }

    /// Create a metadata-only record for a paper seen in someone else's lists
    pub fn stub(id: PaperId, metadata: PaperMetadata, external_ids: ExternalIds) -> Self {
        Self {
            external_ids,
            origin: RecordOrigin::Reference,
            ..Self::new(id, metadata)
        }
    }

    pub fn with_references(mut self, references: impl IntoIterator<Item = PaperId>) -> Self {
        self.references.extend(references);
        self
    }

    pub fn with_cited_by(mut self, cited_by: impl IntoIterator<Item = PaperId>) -> Self {
        self.cited_by.extend(cited_by);
        self
    }

    pub fn is_fetched(&self) -> bool {
        self.origin == RecordOrigin::Fetched
    }
}

fn blank(value: &Option<String>) -> bool {
    value.as_deref().map_or(true, |v| v.trim().is_empty())
}

fn fill_option(target: &mut Option<String>, source: &Option<String>) {
    if target.is_none() {
        target.clone_from(source);
    }
}
