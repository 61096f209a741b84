//! OpenAlex source
//!
//! Lookup: `GET /works/{key}`, where the key is a DOI URL or a `W...`
//! work id. arXiv identifiers are looked up through their DataCite DOI.
//! References are resolved in batches of 50 through the `openalex` filter;
//! citing works are paged with a cursor through the `cites` filter.

use crate::http::ApiClient;
use crate::source::{CitationSource, SourcePaper, WorkSummary};
use async_trait::async_trait;
use citeset_common::config::FetchConfig;
use citeset_common::errors::{AppError, Result};
use citeset_common::models::{ExternalIds, IdKind, PaperId, PaperMetadata};
use reqwest::header::HeaderMap;
use serde::Deserialize;
use tracing::{debug, warn};

pub const SOURCE_NAME: &str = "openalex";

/// Works resolved per `openalex` filter request
const REFERENCE_BATCH: usize = 50;
/// Page size for the `cites` filter
const CITING_PAGE: usize = 100;

const WORK_URL_PREFIX: &str = "https://openalex.org/";

#[derive(Debug, Deserialize)]
struct OpenAlexWork {
    id: Option<String>,
    doi: Option<String>,
    title: Option<String>,
    publication_year: Option<i32>,
    #[serde(default)]
    authorships: Vec<Authorship>,
    primary_location: Option<Location>,
    #[serde(default)]
    referenced_works: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct Authorship {
    author: Option<AuthorRef>,
}

#[derive(Debug, Deserialize)]
struct AuthorRef {
    display_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Location {
    source: Option<VenueRef>,
}

#[derive(Debug, Deserialize)]
struct VenueRef {
    display_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WorksPage {
    #[serde(default)]
    results: Vec<OpenAlexWork>,
    #[serde(default)]
    meta: PageMeta,
}

#[derive(Debug, Default, Deserialize)]
struct PageMeta {
    next_cursor: Option<String>,
}

impl OpenAlexWork {
    fn summary(&self) -> WorkSummary {
        let authors = self
            .authorships
            .iter()
            .filter_map(|a| a.author.as_ref()?.display_name.clone())
            .collect();

        let venue = self
            .primary_location
            .as_ref()
            .and_then(|l| l.source.as_ref())
            .and_then(|s| s.display_name.clone());

        WorkSummary {
            ids: ExternalIds {
                doi: self.doi.clone(),
                openalex: self.id.clone(),
                ..Default::default()
            },
            metadata: PaperMetadata {
                title: self.title.clone(),
                authors,
                year: self.publication_year,
                venue,
            },
        }
    }

    /// Short work key (`W123`) used in filters
    fn key(&self) -> Option<String> {
        self.id.as_deref().map(work_key)
    }
}

/// Strip the URL prefix from an OpenAlex work id
fn work_key(id: &str) -> String {
    id.strip_prefix(WORK_URL_PREFIX).unwrap_or(id).to_string()
}

/// Path segment used to look up a paper, if OpenAlex can resolve it
fn lookup_key(id: &PaperId) -> Option<String> {
    match id.kind() {
        IdKind::Doi => Some(format!("https://doi.org/{}", id.as_str())),
        IdKind::Arxiv => Some(format!("https://doi.org/10.48550/arxiv.{}", id.value())),
        IdKind::OpenAlex => Some(id.value().to_uppercase()),
        IdKind::SemanticScholar | IdKind::Other => None,
    }
}

/// OpenAlex client
pub struct OpenAlexSource {
    api: ApiClient,
    base_url: String,
    mailto: Option<String>,
    max_citing: usize,
}

impl OpenAlexSource {
    pub fn new(config: &FetchConfig) -> Result<Self> {
        Ok(Self {
            api: ApiClient::new(SOURCE_NAME, config, HeaderMap::new())?,
            base_url: config.openalex_base_url.trim_end_matches('/').to_string(),
            mailto: config.mailto.clone(),
            max_citing: config.max_citing,
        })
    }

    fn with_mailto(&self, mut query: Vec<(&'static str, String)>) -> Vec<(&'static str, String)> {
        if let Some(mailto) = &self.mailto {
            query.push(("mailto", mailto.clone()));
        }
        query
    }

    async fn work(&self, key: &str, id: &PaperId) -> Result<OpenAlexWork> {
        let url = format!("{}/works/{}", self.base_url, key);
        self.api.get_json(&url, &self.with_mailto(Vec::new()), id.as_str()).await
    }

    /// Resolve referenced work ids to summaries, in batches
    ///
    /// A failed batch is logged and skipped; the rest of the list is kept.
    async fn references(&self, referenced: &[String]) -> Vec<WorkSummary> {
        let url = format!("{}/works", self.base_url);
        let keys: Vec<String> = referenced
            .iter()
            .take(self.max_citing)
            .map(|r| work_key(r))
            .collect();

        let mut works = Vec::with_capacity(keys.len());
        for batch in keys.chunks(REFERENCE_BATCH) {
            let query = self.with_mailto(vec![
                ("filter", format!("openalex:{}", batch.join("|"))),
                ("per-page", REFERENCE_BATCH.to_string()),
            ]);
            match self.api.get_json::<WorksPage>(&url, &query, "references").await {
                Ok(page) => works.extend(page.results.iter().map(OpenAlexWork::summary)),
                Err(e) => warn!(source = SOURCE_NAME, error = %e, "Reference batch failed, skipping"),
            }
        }
        works
    }

    /// Page through works citing `key`, up to `max_citing`
    async fn citing(&self, key: &str) -> Vec<WorkSummary> {
        let url = format!("{}/works", self.base_url);
        let mut works = Vec::new();
        let mut cursor = "*".to_string();

        while works.len() < self.max_citing {
            let query = self.with_mailto(vec![
                ("filter", format!("cites:{}", key)),
                ("per-page", CITING_PAGE.to_string()),
                ("cursor", cursor.clone()),
            ]);
            let page = match self.api.get_json::<WorksPage>(&url, &query, key).await {
                Ok(page) => page,
                Err(e) => {
                    warn!(source = SOURCE_NAME, work = key, error = %e, "Citing page failed, keeping partial list");
                    break;
                }
            };
            if page.results.is_empty() {
                break;
            }

            let room = self.max_citing - works.len();
            works.extend(page.results.iter().take(room).map(OpenAlexWork::summary));

            match page.meta.next_cursor {
                Some(next) => cursor = next,
                None => break,
            }
        }

        debug!(source = SOURCE_NAME, work = key, count = works.len(), "Fetched citing works");
        works
    }
}

#[async_trait]
impl CitationSource for OpenAlexSource {
    fn name(&self) -> &str {
        SOURCE_NAME
    }

    async fn fetch(&self, id: &PaperId) -> Result<SourcePaper> {
        let key = lookup_key(id).ok_or_else(|| AppError::IdentifierNotFound { id: id.to_string() })?;
        let work = self.work(&key, id).await?;

        let references = self.references(&work.referenced_works).await;
        let cited_by = match work.key() {
            Some(key) => self.citing(&key).await,
            None => Vec::new(),
        };

        Ok(SourcePaper {
            work: work.summary(),
            references,
            cited_by,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config(server: &MockServer, max_citing: usize) -> FetchConfig {
        FetchConfig {
            openalex_base_url: server.uri(),
            timeout_secs: 5,
            max_elapsed_secs: 0,
            requests_per_minute: 6000,
            max_citing,
            ..Default::default()
        }
    }

    fn work_json(key: &str) -> Value {
        json!({
            "id": format!("https://openalex.org/{key}"),
            "doi": format!("https://doi.org/10.1000/{}", key.to_lowercase()),
            "title": format!("Work {key}"),
            "publication_year": 2020
        })
    }

    fn page(keys: &[&str], next_cursor: Option<&str>) -> ResponseTemplate {
        let results: Vec<Value> = keys.iter().map(|k| work_json(k)).collect();
        ResponseTemplate::new(200).set_body_json(json!({
            "meta": {"next_cursor": next_cursor},
            "results": results
        }))
    }

    async fn mount_citing_page(server: &MockServer, cursor: &str, response: ResponseTemplate, calls: u64) {
        Mock::given(method("GET"))
            .and(path("/works"))
            .and(query_param("filter", "cites:W1"))
            .and(query_param("cursor", cursor))
            .respond_with(response)
            .expect(calls)
            .mount(server)
            .await;
    }

    fn ids(works: &[WorkSummary]) -> Vec<String> {
        works.iter().map(|w| w.paper_id().unwrap().to_string()).collect()
    }

    const WORK_JSON: &str = r#"{
        "id": "https://openalex.org/W2741809807",
        "doi": "https://doi.org/10.7717/peerj.4375",
        "title": "The state of OA",
        "display_name": "The state of OA",
        "publication_year": 2018,
        "authorships": [
            {"author": {"display_name": "Heather Piwowar"}},
            {"author": {"display_name": "Jason Priem"}},
            {"author": null}
        ],
        "primary_location": {"source": {"display_name": "PeerJ"}},
        "referenced_works": [
            "https://openalex.org/W1",
            "https://openalex.org/W2"
        ]
    }"#;

    #[test]
    fn test_work_summary_parsing() {
        let work: OpenAlexWork = serde_json::from_str(WORK_JSON).unwrap();
        let summary = work.summary();

        assert_eq!(summary.metadata.title.as_deref(), Some("The state of OA"));
        assert_eq!(summary.metadata.authors, vec!["Heather Piwowar", "Jason Priem"]);
        assert_eq!(summary.metadata.year, Some(2018));
        assert_eq!(summary.metadata.venue.as_deref(), Some("PeerJ"));
        assert_eq!(summary.paper_id().unwrap().as_str(), "10.7717/peerj.4375");
        assert_eq!(work.key().as_deref(), Some("W2741809807"));
        assert_eq!(work.referenced_works.len(), 2);
    }

    #[test]
    fn test_sparse_work_parsing() {
        let work: OpenAlexWork =
            serde_json::from_str(r#"{"id": "https://openalex.org/W9", "doi": null, "primary_location": null}"#)
                .unwrap();
        let summary = work.summary();
        assert!(summary.metadata.is_empty());
        assert_eq!(summary.paper_id().unwrap().as_str(), "openalex:w9");
    }

    #[test]
    fn test_page_parsing() {
        let page: WorksPage = serde_json::from_str(&format!(
            r#"{{"meta": {{"count": 1, "next_cursor": "abc"}}, "results": [{}]}}"#,
            WORK_JSON
        ))
        .unwrap();
        assert_eq!(page.results.len(), 1);
        assert_eq!(page.meta.next_cursor.as_deref(), Some("abc"));

        let last: WorksPage = serde_json::from_str(r#"{"meta": {"next_cursor": null}, "results": []}"#).unwrap();
        assert!(last.results.is_empty());
        assert!(last.meta.next_cursor.is_none());
    }

    #[test]
    fn test_lookup_keys() {
        let doi = PaperId::parse("10.7717/peerj.4375").unwrap();
        assert_eq!(lookup_key(&doi).as_deref(), Some("https://doi.org/10.7717/peerj.4375"));

        let arxiv = PaperId::parse("arXiv:2201.05125").unwrap();
        assert_eq!(lookup_key(&arxiv).as_deref(), Some("https://doi.org/10.48550/arxiv.2201.05125"));

        let work = PaperId::parse("https://openalex.org/W2741809807").unwrap();
        assert_eq!(lookup_key(&work).as_deref(), Some("W2741809807"));

        let s2 = PaperId::parse("s2:649def34").unwrap();
        assert!(lookup_key(&s2).is_none());
    }

    #[tokio::test]
    async fn test_unsupported_identifier_is_not_found() {
        let source = OpenAlexSource::new(&FetchConfig::default()).unwrap();
        let err = source.fetch(&PaperId::parse("s2:649def34").unwrap()).await.unwrap_err();
        assert!(matches!(err, AppError::IdentifierNotFound { .. }));
    }

    #[tokio::test]
    async fn test_fetch_resolves_references_and_pages_citing_works() {
        let server = MockServer::start().await;
        let mut seed = work_json("W1");
        seed["referenced_works"] = json!(["https://openalex.org/W10", "https://openalex.org/W11"]);
        Mock::given(method("GET"))
            .and(path("/works/W1"))
            .and(query_param("mailto", "me@example.org"))
            .respond_with(ResponseTemplate::new(200).set_body_json(seed))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/works"))
            .and(query_param("filter", "openalex:W10|W11"))
            .respond_with(page(&["W10", "W11"], None))
            .expect(1)
            .mount(&server)
            .await;
        mount_citing_page(&server, "*", page(&["W20", "W21"], Some("next")), 1).await;
        mount_citing_page(&server, "next", page(&["W22"], None), 1).await;

        let mut config = config(&server, 500);
        config.mailto = Some("me@example.org".into());
        let source = OpenAlexSource::new(&config).unwrap();
        let paper = source.fetch(&PaperId::parse("openalex:W1").unwrap()).await.unwrap();

        assert_eq!(paper.work.paper_id().unwrap().as_str(), "10.1000/w1");
        assert_eq!(ids(&paper.references), vec!["10.1000/w10", "10.1000/w11"]);
        assert_eq!(ids(&paper.cited_by), vec!["10.1000/w20", "10.1000/w21", "10.1000/w22"]);
    }

    #[tokio::test]
    async fn test_citing_stops_at_max_citing() {
        let server = MockServer::start().await;
        mount_citing_page(&server, "*", page(&["W20", "W21", "W22"], Some("next")), 1).await;
        mount_citing_page(&server, "next", page(&["W23"], None), 0).await;

        let source = OpenAlexSource::new(&config(&server, 2)).unwrap();
        let works = source.citing("W1").await;
        assert_eq!(ids(&works), vec!["10.1000/w20", "10.1000/w21"]);
    }

    #[tokio::test]
    async fn test_citing_stops_on_empty_page() {
        let server = MockServer::start().await;
        mount_citing_page(&server, "*", page(&["W20"], Some("p2")), 1).await;
        mount_citing_page(&server, "p2", page(&[], Some("p3")), 1).await;
        mount_citing_page(&server, "p3", page(&["W21"], None), 0).await;

        let source = OpenAlexSource::new(&config(&server, 500)).unwrap();
        assert_eq!(ids(&source.citing("W1").await), vec!["10.1000/w20"]);
    }

    #[tokio::test]
    async fn test_failed_citing_page_keeps_partial_list() {
        let server = MockServer::start().await;
        mount_citing_page(&server, "*", page(&["W20", "W21"], Some("p2")), 1).await;
        mount_citing_page(&server, "p2", ResponseTemplate::new(500), 1).await;

        let source = OpenAlexSource::new(&config(&server, 500)).unwrap();
        assert_eq!(ids(&source.citing("W1").await), vec!["10.1000/w20", "10.1000/w21"]);
    }

    #[tokio::test]
    async fn test_references_are_batched_and_failed_batches_skipped() {
        let server = MockServer::start().await;
        let keys: Vec<String> = (100..160).map(|n| format!("W{n}")).collect();
        let first: Vec<&str> = keys[..REFERENCE_BATCH].iter().map(String::as_str).collect();
        let second: Vec<&str> = keys[REFERENCE_BATCH..].iter().map(String::as_str).collect();

        Mock::given(method("GET"))
            .and(path("/works"))
            .and(query_param("filter", format!("openalex:{}", first.join("|"))))
            .and(query_param("per-page", "50"))
            .respond_with(page(&first[..3], None))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/works"))
            .and(query_param("filter", format!("openalex:{}", second.join("|"))))
            .respond_with(ResponseTemplate::new(500))
            .expect(1)
            .mount(&server)
            .await;

        let referenced: Vec<String> = keys.iter().map(|k| format!("https://openalex.org/{k}")).collect();
        let source = OpenAlexSource::new(&config(&server, 500)).unwrap();
        let works = source.references(&referenced).await;
        assert_eq!(ids(&works), vec!["10.1000/w100", "10.1000/w101", "10.1000/w102"]);
    }

    #[tokio::test]
    async fn test_references_respect_max_citing() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/works"))
            .and(query_param("filter", "openalex:W10|W11"))
            .respond_with(page(&["W10", "W11"], None))
            .expect(1)
            .mount(&server)
            .await;

        let referenced = ["W10", "W11", "W12"].map(|k| format!("https://openalex.org/{k}"));
        let source = OpenAlexSource::new(&config(&server, 2)).unwrap();
        assert_eq!(source.references(&referenced).await.len(), 2);
    }

    #[tokio::test]
    async fn test_unknown_work_is_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/works/W404"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;

        let source = OpenAlexSource::new(&config(&server, 500)).unwrap();
        let err = source.fetch(&PaperId::parse("openalex:W404").unwrap()).await.unwrap_err();
        assert!(matches!(err, AppError::IdentifierNotFound { ref id } if id == "openalex:w404"));
    }
}
