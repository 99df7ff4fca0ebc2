use std::sync::Arc;

use chrono::{Duration as ChronoDuration, NaiveDate, Utc};
use tracing::{info, warn};
use uuid::Uuid;

use litsync_core::{
    PublicationRecord, PublicationStore, SyncConfig, SyncKind, SyncTracker,
};

use crate::error::Result;
use crate::journal;
use crate::sources::{PubMedRecord, PubMedSource};
use crate::sync::RunOutcome;

/// Drives one full or incremental publication import against the search API.
///
/// The loop is cooperative: the cancel flag is re-checked between every unit
/// of work, so cancellation latency is bounded by one page or one record,
/// never by total run length.
pub struct ImportRunner {
    tracker: Arc<SyncTracker>,
    store: Arc<dyn PublicationStore>,
    pubmed: PubMedSource,
    config: SyncConfig,
}

impl ImportRunner {
    pub fn new(
        tracker: Arc<SyncTracker>,
        store: Arc<dyn PublicationStore>,
        pubmed: PubMedSource,
        config: SyncConfig,
    ) -> Self {
        Self {
            tracker,
            store,
            pubmed,
            config,
        }
    }

    /// Execute one run. Rejects with `SyncAlreadyRunning` while another run
    /// is active; any failure inside the loop lands in the tracker's `error`
    /// state with its message retained for operators.
    pub async fn run(&self, kind: SyncKind, dry_run: bool) -> Result<()> {
        self.tracker.start(kind, dry_run)?;

        let outcome = match self.execute(kind, dry_run).await {
            Ok(outcome) => outcome,
            Err(err) => {
                warn!(%err, "import run failed");
                self.tracker.error(err.to_string());
                self.tracker.spawn_revert();
                return Err(err);
            }
        };

        match outcome {
            RunOutcome::Completed => self.tracker.complete()?,
            RunOutcome::Cancelled => self.tracker.cancelled()?,
        }
        self.tracker.spawn_revert();
        Ok(())
    }

    async fn execute(&self, kind: SyncKind, dry_run: bool) -> Result<RunOutcome> {
        let min_date = self.incremental_floor(kind);
        let mut retstart = 0u64;
        let mut processed = 0u64;
        let mut imported = 0u64;
        let mut skipped = 0u64;
        let mut approved = 0u64;
        let mut pending = 0u64;

        loop {
            if self.tracker.is_cancel_requested() {
                return Ok(RunOutcome::Cancelled);
            }

            self.tracker
                .update_phase(format!("Fetching records from {retstart}..."));
            let page = self
                .pubmed
                .search_page(
                    &self.config.search_term,
                    min_date,
                    retstart,
                    self.config.page_size,
                )
                .await?;
            if page.ids.is_empty() {
                break;
            }
            self.tracker.update_progress(processed, page.count);

            let records = self.pubmed.fetch_summaries(&page.ids).await?;
            let fetched = page.ids.len() as u64;

            for record in records {
                if self.tracker.is_cancel_requested() {
                    return Ok(RunOutcome::Cancelled);
                }
                processed += 1;

                if self.already_stored(&record)? {
                    skipped += 1;
                } else {
                    let publication = self.build_record(&record).await;
                    if publication.approved {
                        approved += 1;
                    } else {
                        pending += 1;
                    }
                    if !dry_run {
                        self.store.insert(publication)?;
                    }
                    imported += 1;
                }

                self.tracker.update_progress(processed, page.count);
                self.tracker.update_stats(imported, skipped, approved, pending);
            }

            retstart += fetched;
            if retstart >= page.count {
                break;
            }
        }

        info!(processed, imported, skipped, dry_run, "import run finished");
        self.tracker.update_phase("Finalizing...");
        Ok(RunOutcome::Completed)
    }

    /// Incremental runs re-scan a small window before the last success
    /// watermark so records indexed late are not missed.
    fn incremental_floor(&self, kind: SyncKind) -> Option<NaiveDate> {
        if kind != SyncKind::Incremental {
            return None;
        }
        let watermark = self.tracker.last_success_time()?;
        let floor = watermark - ChronoDuration::days(self.config.incremental_overlap_days);
        Some(floor.date_naive())
    }

    fn already_stored(&self, record: &PubMedRecord) -> Result<bool> {
        if self.store.find_by_pmid(&record.pmid)?.is_some() {
            return Ok(true);
        }
        if let Some(doi) = record.doi.as_deref() {
            if self.store.find_by_doi(doi)?.is_some() {
                return Ok(true);
            }
        }
        Ok(false)
    }

    async fn build_record(&self, record: &PubMedRecord) -> PublicationRecord {
        // The abstract is best-effort: a failed EFetch degrades to no
        // abstract, it does not abort the run.
        let abstract_text = match self.pubmed.fetch_abstract(&record.pmid).await {
            Ok(text) => text,
            Err(err) => {
                warn!(pmid = record.pmid, %err, "abstract fetch failed");
                None
            }
        };

        let recognized = journal::is_recognized(&record.journal);
        PublicationRecord {
            id: Uuid::new_v4(),
            pmid: record.pmid.clone(),
            doi: record.doi.clone(),
            title: record.title.clone(),
            journal_raw: record.journal.clone(),
            journal: journal::normalize(&record.journal),
            abstract_text,
            publication_date: record.pub_date.clone(),
            authors: record.authors.clone(),
            citation_count: None,
            citation_source: None,
            // Records from curated journals with a DOI go straight through;
            // everything else waits for manual review.
            approved: recognized && record.doi.is_some(),
            imported_at: Utc::now(),
        }
    }
}
