//! Semantic Scholar source
//!
//! Uses the Graph API: `GET /paper/{id}` where the id is `arXiv:<id>`,
//! `DOI:<doi>` or a bare S2 paper id, then offset-paged `/references` and
//! `/citations` endpoints.

use crate::http::ApiClient;
use crate::source::{CitationSource, SourcePaper, WorkSummary};
use async_trait::async_trait;
use citeset_common::config::FetchConfig;
use citeset_common::errors::{AppError, Result};
use citeset_common::models::{ExternalIds, IdKind, PaperId, PaperMetadata};
use reqwest::header::{HeaderMap, HeaderValue};
use serde::Deserialize;
use tracing::{debug, warn};

pub const SOURCE_NAME: &str = "semantic_scholar";

const PAPER_FIELDS: &str = "paperId,externalIds,title,authors,year,venue";
const PAGE_LIMIT: usize = 100;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct S2Paper {
    paper_id: Option<String>,
    external_ids: Option<S2ExternalIds>,
    title: Option<String>,
    #[serde(default)]
    authors: Vec<S2Author>,
    year: Option<i32>,
    venue: Option<String>,
}

#[derive(Debug, Deserialize)]
struct S2ExternalIds {
    #[serde(rename = "DOI")]
    doi: Option<String>,
    #[serde(rename = "ArXiv")]
    arxiv: Option<String>,
}

#[derive(Debug, Deserialize)]
struct S2Author {
    name: Option<String>,
}

/// One page of `/references` or `/citations`
#[derive(Debug, Deserialize)]
struct S2Page {
    #[serde(default)]
    data: Vec<S2Edge>,
    next: Option<usize>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct S2Edge {
    cited_paper: Option<S2Paper>,
    citing_paper: Option<S2Paper>,
}

impl S2Paper {
    fn summary(&self) -> WorkSummary {
        let (doi, arxiv) = match &self.external_ids {
            Some(ids) => (ids.doi.clone(), ids.arxiv.clone()),
            None => (None, None),
        };

        WorkSummary {
            ids: ExternalIds {
                doi,
                arxiv,
                s2: self.paper_id.clone(),
                ..Default::default()
            },
            metadata: PaperMetadata {
                title: self.title.clone(),
                authors: self.authors.iter().filter_map(|a| a.name.clone()).collect(),
                year: self.year,
                venue: self.venue.clone().filter(|v| !v.is_empty()),
            },
        }
    }
}

/// Which neighbour list to page through
#[derive(Debug, Clone, Copy)]
enum Direction {
    References,
    Citations,
}

impl Direction {
    fn path(self) -> &'static str {
        match self {
            Direction::References => "references",
            Direction::Citations => "citations",
        }
    }

    fn pick(self, edge: S2Edge) -> Option<S2Paper> {
        match self {
            Direction::References => edge.cited_paper,
            Direction::Citations => edge.citing_paper,
        }
    }
}

/// Path segment used to look up a paper, if Semantic Scholar can resolve it
fn lookup_key(id: &PaperId) -> Option<String> {
    match id.kind() {
        IdKind::Arxiv => Some(format!("arXiv:{}", id.value())),
        IdKind::Doi => Some(format!("DOI:{}", id.as_str())),
        IdKind::SemanticScholar => Some(id.value().to_string()),
        IdKind::OpenAlex | IdKind::Other => None,
    }
}

/// Semantic Scholar client
pub struct SemanticScholarSource {
    api: ApiClient,
    base_url: String,
    max_citing: usize,
}

impl SemanticScholarSource {
    pub fn new(config: &FetchConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        if let Some(key) = &config.s2_api_key {
            let value = HeaderValue::from_str(key).map_err(|_| AppError::Configuration {
                message: "s2_api_key is not a valid header value".to_string(),
            })?;
            headers.insert("x-api-key", value);
        }

        Ok(Self {
            api: ApiClient::new(SOURCE_NAME, config, headers)?,
            base_url: config.s2_base_url.trim_end_matches('/').to_string(),
            max_citing: config.max_citing,
        })
    }

    /// Page through one neighbour list, keeping what was fetched on failure
    async fn neighbours(&self, paper_id: &str, direction: Direction) -> Vec<WorkSummary> {
        let url = format!("{}/paper/{}/{}", self.base_url, paper_id, direction.path());
        let mut works = Vec::new();
        let mut offset = 0;

        while works.len() < self.max_citing {
            let limit = PAGE_LIMIT.min(self.max_citing - works.len());
            let query = [
                ("fields", PAPER_FIELDS.to_string()),
                ("offset", offset.to_string()),
                ("limit", limit.to_string()),
            ];
            let page = match self.api.get_json::<S2Page>(&url, &query, paper_id).await {
                Ok(page) => page,
                Err(e) => {
                    warn!(
                        source = SOURCE_NAME,
                        paper = paper_id,
                        list = direction.path(),
                        error = %e,
                        "Page failed, keeping partial list"
                    );
                    break;
                }
            };
            if page.data.is_empty() {
                break;
            }

            let received = page.data.len();
            works.extend(
                page.data
                    .into_iter()
                    .filter_map(|edge| direction.pick(edge))
                    .map(|paper| paper.summary()),
            );

            match page.next {
                Some(next) if next > offset => offset = next,
                _ => break,
            }
            if received < limit {
                break;
            }
        }

        debug!(source = SOURCE_NAME, paper = paper_id, list = direction.path(), count = works.len(), "Fetched");
        works
    }
}

#[async_trait]
impl CitationSource for SemanticScholarSource {
    fn name(&self) -> &str {
        SOURCE_NAME
    }

    async fn fetch(&self, id: &PaperId) -> Result<SourcePaper> {
        let key = lookup_key(id).ok_or_else(|| AppError::IdentifierNotFound { id: id.to_string() })?;
        let url = format!("{}/paper/{}", self.base_url, key);
        let paper: S2Paper = self
            .api
            .get_json(&url, &[("fields", PAPER_FIELDS.to_string())], id.as_str())
            .await?;

        let paper_id = paper.paper_id.clone().unwrap_or(key);
        let references = self.neighbours(&paper_id, Direction::References).await;
        let cited_by = self.neighbours(&paper_id, Direction::Citations).await;

        Ok(SourcePaper {
            work: paper.summary(),
            references,
            cited_by,
        })
    }
}
