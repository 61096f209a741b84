//! Normalized paper identifiers

use crate::errors::{AppError, Result};
use super::ExternalIds;
use regex_lite::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::OnceLock;

/// URL and scheme prefixes stripped from DOIs
const DOI_PREFIXES: &[&str] = &[
    "https://doi.org/",
    "http://doi.org/",
    "https://dx.doi.org/",
    "http://dx.doi.org/",
    "doi:",
];

const OPENALEX_URL: &str = "https://openalex.org/";

pub const ARXIV_PREFIX: &str = "arxiv:";
pub const OPENALEX_PREFIX: &str = "openalex:";
pub const S2_PREFIX: &str = "s2:";

/// DataCite DOIs minted for arXiv preprints
const ARXIV_DOI_PREFIX: &str = "10.48550/arxiv.";

fn arxiv_version_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"v\d+$").expect("arXiv version pattern is valid"))
}

/// Drop a trailing `vN` so every version of a preprint shares one id
fn strip_arxiv_version(id: &str) -> &str {
    match arxiv_version_pattern().find(id) {
        Some(m) if m.start() > 0 => &id[..m.start()],
        _ => id,
    }
}

/// Which identifier scheme a [`PaperId`] belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdKind {
    Doi,
    Arxiv,
    OpenAlex,
    SemanticScholar,
    Other,
}

/// Normalized paper identifier
///
/// DOIs are stored bare and lowercased (`10.1000/xyz`); other schemes keep
/// a short prefix (`arxiv:`, `openalex:`, `s2:`). arXiv DOIs
/// (`10.48550/arXiv.<id>`) and versioned arXiv ids (`arXiv:<id>v3`) both
/// become `arxiv:<id>`. Normalization happens on construction and on
/// deserialization, so two spellings of the same paper compare equal.
/// Other aliases across schemes (a journal DOI for a preprint) are not
/// resolved.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PaperId(String);

impl PaperId {
    /// Parse and normalize a raw identifier
    pub fn parse(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(AppError::malformed("empty paper identifier"));
        }
        if trimmed.chars().any(char::is_whitespace) {
            return Err(AppError::malformed(format!(
                "identifier contains whitespace: {trimmed:?}"
            )));
        }

        let lower = trimmed.to_lowercase();
        let mut body = lower.as_str();
        for prefix in DOI_PREFIXES {
            if let Some(rest) = body.strip_prefix(prefix) {
                body = rest;
                break;
            }
        }

        let normalized = if let Some(work) = body.strip_prefix(OPENALEX_URL) {
            format!("{OPENALEX_PREFIX}{work}")
        } else if let Some(arxiv) = body
            .strip_prefix(ARXIV_DOI_PREFIX)
            .or_else(|| body.strip_prefix(ARXIV_PREFIX))
        {
            format!("{ARXIV_PREFIX}{}", strip_arxiv_version(arxiv))
        } else {
            body.to_string()
        };

        let bare_prefix = [ARXIV_PREFIX, OPENALEX_PREFIX, S2_PREFIX]
            .iter()
            .any(|prefix| normalized == *prefix);
        if normalized.is_empty() || bare_prefix {
            return Err(AppError::malformed(format!(
                "identifier has no value: {trimmed:?}"
            )));
        }

        Ok(Self(normalized))
    }

    /// Build the preferred identifier from a set of external ids
    ///
    /// Preference order: DOI, arXiv, OpenAlex, Semantic Scholar.
    pub fn from_external_ids(ids: &ExternalIds) -> Option<Self> {
        let candidates = [
            ids.doi.clone(),
            ids.arxiv.as_ref().map(|a| format!("{ARXIV_PREFIX}{a}")),
            ids.openalex.as_ref().map(|o| {
                if o.contains(':') {
                    o.clone()
                } else {
                    format!("{OPENALEX_PREFIX}{o}")
                }
            }),
            ids.s2.as_ref().map(|s| format!("{S2_PREFIX}{s}")),
        ];

        candidates
            .into_iter()
            .flatten()
            .find_map(|raw| PaperId::parse(&raw).ok())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Identifier scheme
    pub fn kind(&self) -> IdKind {
        if self.0.starts_with("10.") {
            IdKind::Doi
        } else if self.0.starts_with(ARXIV_PREFIX) {
            IdKind::Arxiv
        } else if self.0.starts_with(OPENALEX_PREFIX) {
            IdKind::OpenAlex
        } else if self.0.starts_with(S2_PREFIX) {
            IdKind::SemanticScholar
        } else {
            IdKind::Other
        }
    }

    pub fn is_doi(&self) -> bool {
        self.kind() == IdKind::Doi
    }

    /// The bare DOI, if this identifier is one
    pub fn doi(&self) -> Option<&str> {
        self.is_doi().then_some(self.0.as_str())
    }

    /// The unversioned arXiv id
    pub fn arxiv_id(&self) -> Option<&str> {
        self.0.strip_prefix(ARXIV_PREFIX)
    }

    /// The value without its scheme prefix
    pub fn value(&self) -> &str {
        match self.kind() {
            IdKind::Arxiv => &self.0[ARXIV_PREFIX.len()..],
            IdKind::OpenAlex => &self.0[OPENALEX_PREFIX.len()..],
            IdKind::SemanticScholar => &self.0[S2_PREFIX.len()..],
            IdKind::Doi | IdKind::Other => &self.0,
        }
    }
}

impl fmt::Display for PaperId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for PaperId {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for PaperId {
    type Error = AppError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<PaperId> for String {
    fn from(id: PaperId) -> Self {
        id.0
    }
}

impl AsRef<str> for PaperId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_doi_prefixes_are_stripped() {
        let expected = PaperId::parse("10.1145/3292500.3330701").unwrap();
        for raw in [
            "https://doi.org/10.1145/3292500.3330701",
            "http://dx.doi.org/10.1145/3292500.3330701",
            "DOI:10.1145/3292500.3330701",
            "  10.1145/3292500.3330701\t",
        ] {
            assert_eq!(PaperId::parse(raw).unwrap(), expected, "{raw}");
        }
        assert!(expected.is_doi());
    }

    #[test]
    fn test_doi_is_case_insensitive() {
        let a = PaperId::parse("10.1038/Nature14539").unwrap();
        let b = PaperId::parse("10.1038/NATURE14539").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.as_str(), "10.1038/nature14539");
    }

    #[test]
    fn test_arxiv_spellings_share_one_id() {
        let expected = PaperId::parse("arXiv:2201.05125").unwrap();
        assert_eq!(expected.as_str(), "arxiv:2201.05125");
        for raw in [
            "10.48550/arXiv.2201.05125",
            "https://doi.org/10.48550/ARXIV.2201.05125",
            "10.48550/arxiv.2201.05125v2",
            "arxiv:2201.05125v5",
        ] {
            assert_eq!(PaperId::parse(raw).unwrap(), expected, "{raw}");
        }
        assert_eq!(expected.kind(), IdKind::Arxiv);
        assert!(!expected.is_doi());
    }

    #[test]
    fn test_old_style_arxiv_ids_keep_their_archive() {
        let id = PaperId::parse("arXiv:hep-th/9901001v3").unwrap();
        assert_eq!(id.as_str(), "arxiv:hep-th/9901001");
        assert_eq!(id.arxiv_id(), Some("hep-th/9901001"));
    }

    #[test]
    fn test_from_external_ids_arxiv_doi() {
        let ids = ExternalIds {
            doi: Some("10.48550/arXiv.1706.03762".into()),
            arxiv: Some("1706.03762v7".into()),
            ..Default::default()
        };
        assert_eq!(PaperId::from_external_ids(&ids).unwrap().as_str(), "arxiv:1706.03762");
    }

    #[test]
    fn test_arxiv_id_extraction() {
        let doi = PaperId::parse("10.48550/arXiv.2201.05125").unwrap();
        assert_eq!(doi.arxiv_id(), Some("2201.05125"));

        let prefixed = PaperId::parse("arXiv:1706.03762").unwrap();
        assert_eq!(prefixed.kind(), IdKind::Arxiv);
        assert_eq!(prefixed.arxiv_id(), Some("1706.03762"));

        let plain = PaperId::parse("10.1038/nature14539").unwrap();
        assert_eq!(plain.arxiv_id(), None);
    }

    #[test]
    fn test_openalex_url_is_prefixed() {
        let id = PaperId::parse("https://openalex.org/W2741809807").unwrap();
        assert_eq!(id.as_str(), "openalex:w2741809807");
        assert_eq!(id.kind(), IdKind::OpenAlex);
        assert_eq!(id.value(), "w2741809807");
    }

    #[test]
    fn test_rejects_empty_and_whitespace() {
        assert!(PaperId::parse("   ").is_err());
        assert!(PaperId::parse("doi:").is_err());
        assert!(PaperId::parse("10.48550/arxiv.").is_err());
        assert!(PaperId::parse("10.1000/a b").is_err());
    }

    #[test]
    fn test_from_external_ids_preference() {
        let ids = ExternalIds {
            doi: Some("10.1000/ABC".into()),
            arxiv: Some("2101.00001".into()),
            openalex: Some("https://openalex.org/W1".into()),
            s2: Some("abc123".into()),
        };
        assert_eq!(PaperId::from_external_ids(&ids).unwrap().as_str(), "10.1000/abc");

        let ids = ExternalIds {
            openalex: Some("W42".into()),
            s2: Some("abc123".into()),
            ..Default::default()
        };
        assert_eq!(PaperId::from_external_ids(&ids).unwrap().as_str(), "openalex:w42");

        assert!(PaperId::from_external_ids(&ExternalIds::default()).is_none());
    }

    #[test]
    fn test_deserialize_normalizes() {
        let id: PaperId = serde_json::from_str("\"https://doi.org/10.1000/XYZ\"").unwrap();
        assert_eq!(id.as_str(), "10.1000/xyz");
        assert!(serde_json::from_str::<PaperId>("\"\"").is_err());
    }
}
