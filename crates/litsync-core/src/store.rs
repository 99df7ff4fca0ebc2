use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{CoreError, Result};

/// A normalized publication record as the datastore holds it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublicationRecord {
    pub id: Uuid,
    pub pmid: String,
    pub doi: Option<String>,
    pub title: String,
    /// Journal name exactly as the search API returned it.
    pub journal_raw: String,
    /// Canonical journal name after normalization.
    pub journal: String,
    pub abstract_text: Option<String>,
    pub publication_date: Option<String>,
    pub authors: Vec<String>,
    pub citation_count: Option<u64>,
    /// Which citation source the stored count came from.
    pub citation_source: Option<String>,
    pub approved: bool,
    pub imported_at: DateTime<Utc>,
}

/// Boundary to the relational datastore. Lookups by primary key, PMID, and
/// DOI are all this pipeline needs; schema layout belongs to the collaborator.
pub trait PublicationStore: Send + Sync {
    fn find_by_pmid(&self, pmid: &str) -> Result<Option<PublicationRecord>>;
    fn find_by_doi(&self, doi: &str) -> Result<Option<PublicationRecord>>;
    fn insert(&self, record: PublicationRecord) -> Result<()>;
    fn update_citations(&self, id: Uuid, count: u64, source: &str) -> Result<()>;
    /// Publications that carry a DOI, as (id, doi) pairs for citation refresh.
    fn citation_targets(&self) -> Result<Vec<(Uuid, String)>>;
    fn count(&self) -> Result<usize>;
}

/// In-memory store used by tests and dry-run tooling.
#[derive(Default)]
pub struct MemoryStore {
    records: Mutex<HashMap<Uuid, PublicationRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: Uuid) -> Option<PublicationRecord> {
        self.records
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(&id)
            .cloned()
    }

    fn with_records<T>(&self, f: impl FnOnce(&mut HashMap<Uuid, PublicationRecord>) -> T) -> T {
        let mut guard = self
            .records
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        f(&mut guard)
    }
}

impl PublicationStore for MemoryStore {
    fn find_by_pmid(&self, pmid: &str) -> Result<Option<PublicationRecord>> {
        Ok(self.with_records(|records| {
            records.values().find(|r| r.pmid == pmid).cloned()
        }))
    }

    fn find_by_doi(&self, doi: &str) -> Result<Option<PublicationRecord>> {
        Ok(self.with_records(|records| {
            records
                .values()
                .find(|r| r.doi.as_deref().is_some_and(|d| d.eq_ignore_ascii_case(doi)))
                .cloned()
        }))
    }

    fn insert(&self, record: PublicationRecord) -> Result<()> {
        self.with_records(|records| {
            if records.values().any(|r| r.pmid == record.pmid) {
                return Err(CoreError::DuplicatePublication(record.pmid.clone()));
            }
            records.insert(record.id, record);
            Ok(())
        })
    }

    fn update_citations(&self, id: Uuid, count: u64, source: &str) -> Result<()> {
        self.with_records(|records| {
            let record = records
                .get_mut(&id)
                .ok_or_else(|| CoreError::PublicationNotFound(id.to_string()))?;
            record.citation_count = Some(count);
            record.citation_source = Some(source.to_string());
            Ok(())
        })
    }

    fn citation_targets(&self) -> Result<Vec<(Uuid, String)>> {
        Ok(self.with_records(|records| {
            records
                .values()
                .filter_map(|r| r.doi.clone().map(|doi| (r.id, doi)))
                .collect()
        }))
    }

    fn count(&self) -> Result<usize> {
        Ok(self.with_records(|records| records.len()))
    }
}
