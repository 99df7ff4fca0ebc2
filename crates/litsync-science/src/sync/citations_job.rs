use std::sync::Arc;
use std::time::Duration;

use tokio::time::sleep;
use tracing::{info, warn};

use litsync_core::{PublicationStore, SyncKind, SyncTracker};

use crate::citations;
use crate::error::Result;
use crate::sources::CitationSource;
use crate::sync::RunOutcome;

/// Citation refresh as its own tracked job, related to but independent of
/// the publication import. Walks every stored DOI, reconciles the sources'
/// counts, and persists the selected value with its provenance.
pub struct CitationRefreshRunner {
    tracker: Arc<SyncTracker>,
    store: Arc<dyn PublicationStore>,
    sources: Vec<Arc<dyn CitationSource>>,
    /// Source preference order, produced by a comparison run.
    ranking: Vec<String>,
    delay: Duration,
}

impl CitationRefreshRunner {
    pub fn new(
        tracker: Arc<SyncTracker>,
        store: Arc<dyn PublicationStore>,
        sources: Vec<Arc<dyn CitationSource>>,
        ranking: Vec<String>,
        delay: Duration,
    ) -> Self {
        Self {
            tracker,
            store,
            sources,
            ranking,
            delay,
        }
    }

    pub async fn run(&self, dry_run: bool) -> Result<()> {
        self.tracker.start(SyncKind::Full, dry_run)?;

        let outcome = match self.execute(dry_run).await {
            Ok(outcome) => outcome,
            Err(err) => {
                warn!(%err, "citation refresh failed");
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

    async fn execute(&self, dry_run: bool) -> Result<RunOutcome> {
        let targets = self.store.citation_targets()?;
        let total = targets.len() as u64;
        self.tracker.update_progress(0, total);

        let ranking: Vec<&str> = self.ranking.iter().map(String::as_str).collect();
        let mut processed = 0u64;
        let mut updated = 0u64;
        let mut unresolved = 0u64;

        for (i, (id, doi)) in targets.iter().enumerate() {
            if self.tracker.is_cancel_requested() {
                return Ok(RunOutcome::Cancelled);
            }
            // Serialize across publications; fan-out happens per DOI inside
            // `observe`.
            if i > 0 {
                sleep(self.delay).await;
            }
            self.tracker
                .update_phase(format!("Refreshing citations {}/{total}", i + 1));

            let observation = citations::observe(doi, &self.sources).await;
            processed += 1;

            match observation.best_count(&ranking) {
                Some((count, source)) => {
                    if !dry_run {
                        self.store.update_citations(*id, count, &source)?;
                    }
                    updated += 1;
                }
                None => unresolved += 1,
            }

            self.tracker.update_progress(processed, total);
            self.tracker.update_stats(updated, unresolved, 0, 0);
        }

        info!(processed, updated, unresolved, dry_run, "citation refresh finished");
        self.tracker.update_phase("Finalizing...");
        Ok(RunOutcome::Completed)
    }
}
