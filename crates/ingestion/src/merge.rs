//! Merging of work lists reported by several sources

use crate::source::WorkSummary;
use citeset_common::models::{ExternalIds, PaperId, PaperMetadata};
use std::collections::BTreeMap;
use tracing::trace;

/// A work seen by one or more sources
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergedWork {
    pub id: PaperId,
    pub ids: ExternalIds,
    pub metadata: PaperMetadata,
    /// Sources that reported this work, in the order they were merged
    pub sources: Vec<String>,
}

/// Union work lists from several sources, keyed by canonical identifier
///
/// The first source to report a work provides its metadata; later sources
/// only fill fields that are still missing. Works without any usable
/// identifier are dropped. The result is ordered by identifier.
pub fn merge_works<'a, I>(lists: I) -> Vec<MergedWork>
where
    I: IntoIterator<Item = (&'a str, &'a [WorkSummary])>,
{
    let mut merged: BTreeMap<PaperId, MergedWork> = BTreeMap::new();

    for (source, works) in lists {
        for work in works {
            let Some(id) = work.paper_id() else {
                trace!(source = source, "Dropping work without identifiers");
                continue;
            };

            merged
                .entry(id.clone())
                .and_modify(|existing| {
                    existing.ids.fill_missing(&work.ids);
                    existing.metadata.fill_missing(&work.metadata);
                    if !existing.sources.iter().any(|s| s == source) {
                        existing.sources.push(source.to_string());
                    }
                })
                .or_insert_with(|| MergedWork {
                    id,
                    ids: work.ids.clone(),
                    metadata: work.metadata.clone(),
                    sources: vec![source.to_string()],
                });
        }
    }

    merged.into_values().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn work(doi: Option<&str>, s2: Option<&str>, title: Option<&str>, year: Option<i32>) -> WorkSummary {
        WorkSummary::new(
            ExternalIds {
                doi: doi.map(String::from),
                s2: s2.map(String::from),
                ..Default::default()
            },
            PaperMetadata {
                title: title.map(String::from),
                year,
                ..Default::default()
            },
        )
    }

    #[test]
    fn test_merge_unions_and_fills_missing_fields() {
        let openalex = vec![
            work(Some("10.1000/b"), None, Some("Paper B"), None),
            work(Some("10.1000/a"), None, None, Some(2020)),
        ];
        let s2 = vec![
            work(Some("10.1000/A"), Some("s2a"), Some("Paper A"), Some(2019)),
            work(None, Some("s2c"), Some("Paper C"), None),
        ];

        let merged = merge_works([("openalex", openalex.as_slice()), ("semantic_scholar", s2.as_slice())]);
        let ids: Vec<&str> = merged.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["10.1000/a", "10.1000/b", "s2:s2c"]);

        let a = &merged[0];
        assert_eq!(a.metadata.title.as_deref(), Some("Paper A"));
        // First source wins for fields it already had
        assert_eq!(a.metadata.year, Some(2020));
        assert_eq!(a.ids.s2.as_deref(), Some("s2a"));
        assert_eq!(a.sources, vec!["openalex", "semantic_scholar"]);

        assert_eq!(merged[1].sources, vec!["openalex"]);
    }

    #[test]
    fn test_merge_drops_unidentified_and_duplicates() {
        let list = vec![
            work(None, None, Some("No ids"), None),
            work(Some("10.1000/a"), None, None, None),
            work(Some("10.1000/a"), None, Some("Again"), None),
        ];
        let merged = merge_works([("openalex", list.as_slice())]);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].metadata.title.as_deref(), Some("Again"));
        assert_eq!(merged[0].sources, vec!["openalex"]);
    }

    #[test]
    fn test_merge_joins_arxiv_doi_and_arxiv_id() {
        let openalex = vec![work(Some("https://doi.org/10.48550/arXiv.2201.05125"), None, Some("Preprint"), None)];
        let s2 = vec![WorkSummary::new(
            ExternalIds {
                arxiv: Some("2201.05125".into()),
                s2: Some("abc".into()),
                ..Default::default()
            },
            PaperMetadata {
                year: Some(2022),
                ..Default::default()
            },
        )];

        let merged = merge_works([("openalex", openalex.as_slice()), ("semantic_scholar", s2.as_slice())]);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].id.as_str(), "arxiv:2201.05125");
        assert_eq!(merged[0].metadata.year, Some(2022));
        assert_eq!(merged[0].sources, vec!["openalex", "semantic_scholar"]);
    }
}
