//! Seed sets: the papers an analysis is restricted to

use super::PaperId;
use crate::errors::{AppError, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;
use std::path::Path;
use tracing::debug;

/// The fixed collection of papers under analysis
///
/// Unique and order-irrelevant; iteration is always in identifier order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SeedSet(BTreeSet<PaperId>);

impl SeedSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a seed list: one identifier per line
    ///
    /// Blank lines and lines starting with `#` are skipped. Duplicates
    /// (after normalization) collapse into one seed.
    pub fn parse(text: &str) -> Result<Self> {
        let mut seeds = Self::new();

        for (index, line) in text.lines().enumerate() {
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }

            let id = PaperId::parse(trimmed).map_err(|e| {
                AppError::malformed(format!("seed list line {}: {}", index + 1, e))
            })?;

            if !seeds.insert(id.clone()) {
                debug!(line = index + 1, id = %id, "Duplicate seed ignored");
            }
        }

        Ok(seeds)
    }

    /// Read and parse a seed list file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| AppError::io(path, e))?;
        Self::parse(&text)
    }

    /// Insert a seed; returns false if it was already present
    pub fn insert(&mut self, id: PaperId) -> bool {
        self.0.insert(id)
    }

    pub fn contains(&self, id: &PaperId) -> bool {
        self.0.contains(id)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PaperId> {
        self.0.iter()
    }

    /// Short stable digest of the seed set, for tagging results
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        for id in &self.0 {
            hasher.update(id.as_str().as_bytes());
            hasher.update(b"\n");
        }
        let hash = hex::encode(hasher.finalize());
        hash[..16].to_string()
    }
}

impl FromIterator<PaperId> for SeedSet {
    fn from_iter<I: IntoIterator<Item = PaperId>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a SeedSet {
    type Item = &'a PaperId;
    type IntoIter = std::collections::btree_set::Iter<'a, PaperId>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorCode;

    #[test]
    fn test_parse_skips_comments_and_duplicates() {
        let text = "\
# seed papers
10.1000/A

https://doi.org/10.1000/a
arXiv:1706.03762
";
        let seeds = SeedSet::parse(text).unwrap();
        assert_eq!(seeds.len(), 2);
        assert!(seeds.contains(&PaperId::parse("10.1000/a").unwrap()));
        assert!(seeds.contains(&PaperId::parse("arxiv:1706.03762").unwrap()));
    }

    #[test]
    fn test_parse_reports_line_number() {
        let err = SeedSet::parse("10.1000/a\n10.1000/b c\n").unwrap_err();
        assert_eq!(err.code(), ErrorCode::MalformedInput);
        assert!(err.to_string().contains("line 2"), "{err}");
    }

    #[test]
    fn test_fingerprint_ignores_order_and_spelling() {
        let a = SeedSet::parse("10.1000/a\n10.1000/b\n").unwrap();
        let b = SeedSet::parse("doi:10.1000/B\n10.1000/A\n").unwrap();
        assert_eq!(a.fingerprint(), b.fingerprint());
        assert_eq!(a.fingerprint().len(), 16);

        let c = SeedSet::parse("10.1000/a\n").unwrap();
        assert_ne!(a.fingerprint(), c.fingerprint());
    }
}
