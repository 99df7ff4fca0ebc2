use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::sources::CitationSource;

/// Per-DOI view of what every source reported. Ephemeral; only the selected
/// count and its provenance are persisted.
#[derive(Debug, Clone)]
pub struct CitationObservation {
    pub doi: String,
    pub counts: Vec<(String, Option<u64>)>,
}

impl CitationObservation {
    /// Number of sources that returned a value for this DOI.
    pub fn coverage(&self) -> usize {
        self.counts.iter().filter(|(_, c)| c.is_some()).count()
    }

    /// First source in `ranking` order that has a value, with its count.
    pub fn best_count(&self, ranking: &[&str]) -> Option<(u64, String)> {
        for preferred in ranking {
            if let Some((name, Some(count))) = self
                .counts
                .iter()
                .find(|(name, _)| name == preferred)
            {
                return Some((*count, name.clone()));
            }
        }
        // Ranking exhausted: fall back to any source that answered.
        self.counts
            .iter()
            .find_map(|(name, count)| count.map(|c| (c, name.clone())))
    }
}

/// Query every source for one DOI concurrently. A failing source degrades to
/// a null observation; it never poisons the others.
pub async fn observe(doi: &str, sources: &[Arc<dyn CitationSource>]) -> CitationObservation {
    let lookups = sources.iter().map(|source| {
        let doi = doi.to_string();
        async move {
            let count = match source.citation_count(&doi).await {
                Ok(count) => count,
                Err(err) => {
                    warn!(source = source.name(), doi, %err, "citation lookup failed");
                    None
                }
            };
            (source.name().to_string(), count)
        }
    });

    CitationObservation {
        doi: doi.to_string(),
        counts: join_all(lookups).await,
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceStats {
    pub name: String,
    /// DOIs for which this source returned a value.
    pub hits: usize,
    pub total: u64,
    /// Head-to-head wins: rows where every source answered and this source
    /// reported the maximum.
    pub max_wins: usize,
}

impl SourceStats {
    pub fn coverage_pct(&self, sampled: usize) -> f64 {
        if sampled == 0 {
            0.0
        } else {
            self.hits as f64 * 100.0 / sampled as f64
        }
    }

    pub fn mean(&self) -> f64 {
        if self.hits == 0 {
            0.0
        } else {
            self.total as f64 / self.hits as f64
        }
    }
}

/// Comparative evaluation over a sample of DOIs: the operational report
/// used to decide which source the selection policy should prefer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceComparisonReport {
    pub sampled: usize,
    /// Rows where all sources returned a value; the head-to-head tally is
    /// computed over these only.
    pub complete_rows: usize,
    pub stats: Vec<SourceStats>,
    pub coverage_winner: Option<String>,
    pub magnitude_winner: Option<String>,
    pub recommendation: String,
}

impl SourceComparisonReport {
    /// Preference order for `CitationObservation::best_count`: the
    /// recommended source first, then the rest by coverage.
    pub fn ranking(&self) -> Vec<String> {
        let mut names: Vec<&SourceStats> = self.stats.iter().collect();
        names.sort_by(|a, b| b.hits.cmp(&a.hits).then(b.total.cmp(&a.total)));
        names.iter().map(|s| s.name.clone()).collect()
    }
}

/// Query every source for every sampled DOI, serially across DOIs with a
/// fixed delay, concurrently across sources per DOI. Partial failure for one
/// DOI/source pair degrades that one observation and processing continues.
pub async fn compare_sources(
    dois: &[String],
    sources: &[Arc<dyn CitationSource>],
    delay: Duration,
) -> SourceComparisonReport {
    let mut stats: Vec<SourceStats> = sources
        .iter()
        .map(|s| SourceStats {
            name: s.name().to_string(),
            hits: 0,
            total: 0,
            max_wins: 0,
        })
        .collect();
    let mut complete_rows = 0usize;

    for (i, doi) in dois.iter().enumerate() {
        if i > 0 {
            sleep(delay).await;
        }
        let observation = observe(doi, sources).await;
        debug!(doi, coverage = observation.coverage(), "sampled");

        for (idx, (_, count)) in observation.counts.iter().enumerate() {
            if let Some(count) = count {
                stats[idx].hits += 1;
                stats[idx].total += count;
            }
        }

        // Head-to-head only counts rows where every source answered.
        let values: Vec<u64> = observation
            .counts
            .iter()
            .filter_map(|(_, c)| *c)
            .collect();
        if values.len() == sources.len() && !values.is_empty() {
            complete_rows += 1;
            let max = values.iter().copied().max().unwrap_or(0);
            for (idx, (_, count)) in observation.counts.iter().enumerate() {
                if *count == Some(max) {
                    stats[idx].max_wins += 1;
                }
            }
        }
    }

    // Coverage ties break on total; magnitude ties break on coverage.
    let coverage_winner = stats
        .iter()
        .max_by_key(|s| (s.hits, s.total))
        .filter(|s| s.hits > 0)
        .map(|s| s.name.clone());
    let magnitude_winner = stats
        .iter()
        .max_by_key(|s| (s.total, s.hits))
        .filter(|s| s.total > 0)
        .map(|s| s.name.clone());

    let recommendation = match (&coverage_winner, &magnitude_winner) {
        (Some(c), Some(m)) if c == m => {
            format!("{c} leads on both coverage and reported magnitude; use it outright")
        }
        (Some(c), Some(m)) => format!(
            "trade-off: {c} has the best coverage, {m} reports the highest totals; \
             pick per rendering needs"
        ),
        // All reported counts were zero; coverage is still a signal.
        (Some(c), None) => format!("{c} has the best coverage; every reported count was zero"),
        _ => "no source returned any data for the sample".to_string(),
    };

    SourceComparisonReport {
        sampled: dois.len(),
        complete_rows,
        stats,
        coverage_winner,
        magnitude_winner,
        recommendation,
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use crate::error::{Result, ScienceError};

    use super::*;

    struct FixedSource {
        name: &'static str,
        count: Option<u64>,
        fail: bool,
    }

    #[async_trait]
    impl CitationSource for FixedSource {
        fn name(&self) -> &'static str {
            self.name
        }

        async fn citation_count(&self, _doi: &str) -> Result<Option<u64>> {
            if self.fail {
                return Err(ScienceError::SourceUnavailable(self.name.to_string()));
            }
            Ok(self.count)
        }
    }

    fn sources(defs: &[(&'static str, Option<u64>, bool)]) -> Vec<Arc<dyn CitationSource>> {
        defs
            .iter()
            .copied()
            .map(|(name, count, fail)| {
                Arc::new(FixedSource { name, count, fail }) as Arc<dyn CitationSource>
            })
            .collect()
    }

    #[tokio::test]
    async fn failing_source_degrades_to_null() {
        let sources = sources(&[("a", Some(10), false), ("b", None, true)]);
        let obs = observe("10.1/x", &sources).await;
        assert_eq!(obs.coverage(), 1);
        assert_eq!(obs.counts[1], ("b".to_string(), None));
    }

    #[tokio::test]
    async fn best_count_follows_ranking() {
        let sources = sources(&[("a", Some(10), false), ("b", Some(99), false)]);
        let obs = observe("10.1/x", &sources).await;
        assert_eq!(obs.best_count(&["b", "a"]), Some((99, "b".to_string())));
        assert_eq!(obs.best_count(&["a", "b"]), Some((10, "a".to_string())));
        // Unranked sources are still usable as a fallback.
        assert_eq!(obs.best_count(&["zz"]), Some((10, "a".to_string())));
    }

    #[tokio::test]
    async fn always_null_source_reports_zero_coverage() {
        let dois: Vec<String> = (0..4).map(|i| format!("10.1/{i}")).collect();
        let sources = sources(&[("live", Some(5), false), ("dead", None, false)]);
        let report = compare_sources(&dois, &sources, Duration::from_millis(0)).await;

        assert_eq!(report.sampled, 4);
        assert_eq!(report.stats[0].coverage_pct(report.sampled), 100.0);
        assert_eq!(report.stats[1].coverage_pct(report.sampled), 0.0);
        assert_eq!(report.complete_rows, 0);
        assert_eq!(report.coverage_winner.as_deref(), Some("live"));
    }

    #[tokio::test]
    async fn all_zero_counts_still_recommend_by_coverage() {
        // Recently published papers legitimately have zero citations
        // everywhere; that is full coverage, not an empty sample.
        let dois = vec!["10.1/new".to_string()];
        let sources = sources(&[("a", Some(0), false), ("b", Some(0), false)]);
        let report = compare_sources(&dois, &sources, Duration::from_millis(0)).await;

        assert_eq!(report.stats[0].hits, 1);
        assert_eq!(report.complete_rows, 1);
        assert!(report.coverage_winner.is_some());
        assert_eq!(report.magnitude_winner, None);
        assert!(report.recommendation.contains("best coverage"));
        assert!(!report.recommendation.contains("no source returned"));
    }

    #[tokio::test]
    async fn same_winner_recommended_outright() {
        let dois = vec!["10.1/a".to_string(), "10.1/b".to_string()];
        let sources = sources(&[("big", Some(50), false), ("small", Some(3), false)]);
        let report = compare_sources(&dois, &sources, Duration::from_millis(0)).await;

        assert_eq!(report.complete_rows, 2);
        assert_eq!(report.stats[0].max_wins, 2);
        assert_eq!(report.coverage_winner, report.magnitude_winner);
        assert!(report.recommendation.contains("outright"));
        assert_eq!(report.ranking()[0], "big");
    }
}
