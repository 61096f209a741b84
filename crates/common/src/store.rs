//! In-memory citation store
//!
//! Holds fetched paper records keyed by identifier. The store does no
//! network work; it is filled by the fetcher or bulk-loaded from JSON and
//! then handed read-only to the aggregator.

use crate::errors::{AppError, Result};
use crate::models::{PaperId, PaperRecord};
use serde::de::{self, Deserializer, MapAccess, Visitor};
use serde::{Deserialize, Serialize, Serializer};
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use tracing::debug;

/// Mapping from identifier to fetched record
///
/// Serializes as a plain `{ id: record }` JSON object.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CitationStore {
    records: BTreeMap<PaperId, PaperRecord>,
}

impl CitationStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a record, failing if the identifier is unknown
    pub fn get(&self, id: &PaperId) -> Result<&PaperRecord> {
        self.records.get(id).ok_or_else(|| AppError::IdentifierNotFound {
            id: id.to_string(),
        })
    }

    /// Get a record if present
    pub fn lookup(&self, id: &PaperId) -> Option<&PaperRecord> {
        self.records.get(id)
    }

    pub fn contains(&self, id: &PaperId) -> bool {
        self.records.contains_key(id)
    }

    /// Insert a record, replacing any previous record for the same id
    pub fn insert(&mut self, record: PaperRecord) -> Option<PaperRecord> {
        self.records.insert(record.id.clone(), record)
    }

    /// Insert a metadata-only record learned from another paper's lists
    ///
    /// Never overrides a fetched record. When a stub already exists, only
    /// its missing fields are filled. Returns true if the store changed.
    pub fn insert_stub(&mut self, stub: PaperRecord) -> bool {
        match self.records.get(&stub.id) {
            None => {
                self.records.insert(stub.id.clone(), stub);
                true
            }
            Some(existing) if existing.is_fetched() => false,
            Some(existing) => {
                let mut merged = existing.clone();
                merged.metadata.fill_missing(&stub.metadata);
                merged.external_ids.fill_missing(&stub.external_ids);
                for source in stub.sources {
                    if !merged.sources.contains(&source) {
                        merged.sources.push(source);
                    }
                }
                let changed = &merged != existing;
                self.records.insert(merged.id.clone(), merged);
                changed
            }
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Records in identifier order
    pub fn iter(&self) -> impl Iterator<Item = &PaperRecord> {
        self.records.values()
    }

    /// Records that were looked up directly rather than learned as stubs
    pub fn fetched(&self) -> impl Iterator<Item = &PaperRecord> {
        self.records.values().filter(|r| r.is_fetched())
    }

    /// Build a store from `(key, record)` pairs, checking key consistency
    ///
    /// Every key must equal its record's id, and no two keys may normalize
    /// to the same identifier.
    pub fn from_records<I>(entries: I) -> Result<Self>
    where
        I: IntoIterator<Item = (PaperId, PaperRecord)>,
    {
        let mut records = BTreeMap::new();
        for (key, record) in entries {
            if key != record.id {
                return Err(AppError::malformed(format!(
                    "record stored under {} has id {}",
                    key, record.id
                )));
            }
            match records.entry(key) {
                Entry::Occupied(existing) => {
                    return Err(AppError::malformed(format!(
                        "duplicate record for {} after identifier normalization",
                        existing.key()
                    )));
                }
                Entry::Vacant(slot) => {
                    slot.insert(record);
                }
            }
        }
        Ok(Self { records })
    }

    /// Bulk load from a JSON object of `{ id: record }`
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| AppError::malformed(format!("citation store: {}", e)))
    }

    /// Bulk dump to a JSON object of `{ id: record }`
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Load a store file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| AppError::io(path, e))?;
        let store = Self::from_json(&json)?;
        debug!(path = %path.display(), records = store.len(), "Loaded citation store");
        Ok(store)
    }

    /// Write the store to a file
    pub fn dump(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        std::fs::write(path, self.to_json()?).map_err(|e| AppError::io(path, e))?;
        debug!(path = %path.display(), records = self.len(), "Dumped citation store");
        Ok(())
    }
}

impl Serialize for CitationStore {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.records.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for CitationStore {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        deserializer.deserialize_map(StoreVisitor)
    }
}

/// Collects raw entries so keys that collide after normalization are seen
struct StoreVisitor;

impl<'de> Visitor<'de> for StoreVisitor {
    type Value = CitationStore;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a map from paper identifier to record")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> std::result::Result<Self::Value, A::Error> {
        let mut entries = Vec::with_capacity(map.size_hint().unwrap_or(0));
        while let Some(entry) = map.next_entry::<PaperId, PaperRecord>()? {
            entries.push(entry);
        }
        CitationStore::from_records(entries).map_err(de::Error::custom)
    }
}

impl FromIterator<PaperRecord> for CitationStore {
    fn from_iter<I: IntoIterator<Item = PaperRecord>>(iter: I) -> Self {
        let mut store = Self::new();
        for record in iter {
            store.insert(record);
        }
        store
    }
}
