//! End-to-end import and citation refresh runs against a mocked search API
//! and an in-memory store.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use mockito::{Matcher, Server, ServerGuard};
use uuid::Uuid;

use litsync_core::{
    MemoryStore, PublicationRecord, PublicationStore, SyncConfig, SyncKind, SyncStatus,
    SyncTracker,
};
use litsync_science::sources::PubMedSource;
use litsync_science::sync::{CitationRefreshRunner, ImportRunner};
use litsync_science::CitationSource;

fn config() -> SyncConfig {
    SyncConfig {
        search_term: "baroreflex activation therapy".to_string(),
        page_size: 50,
        idle_revert_secs: 3600,
        ..SyncConfig::default()
    }
}

async fn mock_pubmed() -> ServerGuard {
    let mut server = Server::new_async().await;

    server
        .mock("GET", "/esearch.fcgi")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(r#"{"esearchresult": {"count": "2", "idlist": ["38000001", "38000002"]}}"#)
        .create_async()
        .await;

    server
        .mock("GET", "/esummary.fcgi")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(
            r#"{"result": {
                "uids": ["38000001", "38000002"],
                "38000001": {
                    "uid": "38000001",
                    "title": "Baroreflex activation therapy in resistant hypertension.",
                    "fulljournalname": "Hypertension (Dallas, Tex. : 1979)",
                    "pubdate": "2024 Mar",
                    "articleids": [{"idtype": "doi", "value": "10.1161/HYP.0000000000000001"}],
                    "authors": [{"name": "Smith J"}]
                },
                "38000002": {
                    "uid": "38000002",
                    "title": "Device-based neuromodulation: a case series.",
                    "fulljournalname": "Obscure Regional Bulletin",
                    "pubdate": "2023 Nov",
                    "articleids": [],
                    "authors": [{"name": "Jones K"}]
                }
            }}"#,
        )
        .create_async()
        .await;

    server
        .mock("GET", "/efetch.fcgi")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(
            r#"<PubmedArticleSet><PubmedArticle><MedlineCitation><Article><Abstract>
                <AbstractText Label="BACKGROUND">Resistant hypertension is common.</AbstractText>
                <AbstractText Label="RESULTS">Pressure fell substantially.</AbstractText>
            </Abstract></Article></MedlineCitation></PubmedArticle></PubmedArticleSet>"#,
        )
        .create_async()
        .await;

    server
}

#[tokio::test]
async fn full_import_normalizes_and_records_history() {
    let server = mock_pubmed().await;
    let tracker = Arc::new(SyncTracker::new(&config()));
    let store = Arc::new(MemoryStore::new());
    let runner = ImportRunner::new(
        Arc::clone(&tracker),
        Arc::clone(&store) as Arc<dyn PublicationStore>,
        PubMedSource::new_for_tests(server.url()),
        config(),
    );

    runner.run(SyncKind::Full, false).await.unwrap();

    let snapshot = tracker.snapshot();
    assert_eq!(snapshot.status, SyncStatus::Completed);
    assert_eq!(snapshot.processed, 2);
    assert_eq!(snapshot.imported, 2);
    assert_eq!(snapshot.approved, 1);
    assert_eq!(snapshot.pending, 1);
    assert!(snapshot.last_success_time.is_some());

    assert_eq!(store.count().unwrap(), 2);
    let stored = store.find_by_pmid("38000001").unwrap().unwrap();
    assert_eq!(stored.journal, "Hypertension");
    assert_eq!(stored.journal_raw, "Hypertension (Dallas, Tex. : 1979)");
    assert!(stored.approved);
    assert!(stored
        .abstract_text
        .as_deref()
        .unwrap()
        .starts_with("BACKGROUND: "));

    let unreviewed = store.find_by_pmid("38000002").unwrap().unwrap();
    assert_eq!(unreviewed.journal, "Obscure Regional Bulletin");
    assert!(!unreviewed.approved);

    let history = tracker.history(10);
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].status, SyncStatus::Completed);
}

#[tokio::test]
async fn rerun_skips_already_stored_records() {
    let server = mock_pubmed().await;
    let tracker = Arc::new(SyncTracker::new(&config()));
    let store = Arc::new(MemoryStore::new());
    let runner = ImportRunner::new(
        Arc::clone(&tracker),
        Arc::clone(&store) as Arc<dyn PublicationStore>,
        PubMedSource::new_for_tests(server.url()),
        config(),
    );

    runner.run(SyncKind::Full, false).await.unwrap();
    runner.run(SyncKind::Incremental, false).await.unwrap();

    assert_eq!(store.count().unwrap(), 2);
    let snapshot = tracker.snapshot();
    assert_eq!(snapshot.skipped, 2);
    assert_eq!(snapshot.imported, 0);
    assert_eq!(tracker.history(10).len(), 2);
}

#[tokio::test]
async fn dry_run_imports_nothing_and_keeps_watermark() {
    let server = mock_pubmed().await;
    let tracker = Arc::new(SyncTracker::new(&config()));
    let store = Arc::new(MemoryStore::new());
    let runner = ImportRunner::new(
        Arc::clone(&tracker),
        Arc::clone(&store) as Arc<dyn PublicationStore>,
        PubMedSource::new_for_tests(server.url()),
        config(),
    );

    runner.run(SyncKind::Full, true).await.unwrap();

    assert_eq!(store.count().unwrap(), 0);
    let snapshot = tracker.snapshot();
    assert_eq!(snapshot.status, SyncStatus::Completed);
    assert_eq!(snapshot.imported, 2);
    assert!(snapshot.last_success_time.is_none());
}

#[tokio::test]
async fn search_api_failure_lands_in_error_state() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/esearch.fcgi")
        .match_query(Matcher::Any)
        .with_status(500)
        .with_body("upstream exploded")
        .create_async()
        .await;

    let tracker = Arc::new(SyncTracker::new(&config()));
    let store = Arc::new(MemoryStore::new());
    let runner = ImportRunner::new(
        Arc::clone(&tracker),
        Arc::clone(&store) as Arc<dyn PublicationStore>,
        PubMedSource::new_for_tests(server.url()),
        config(),
    );

    assert!(runner.run(SyncKind::Full, false).await.is_err());

    let snapshot = tracker.snapshot();
    assert_eq!(snapshot.status, SyncStatus::Error);
    assert!(snapshot.error.as_deref().unwrap().contains("500"));
    assert_eq!(tracker.history(10).len(), 1);
}

struct StubSource {
    name: &'static str,
    count: Option<u64>,
}

#[async_trait]
impl CitationSource for StubSource {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn citation_count(&self, _doi: &str) -> litsync_science::Result<Option<u64>> {
        Ok(self.count)
    }
}

#[tokio::test]
async fn citation_refresh_persists_count_and_provenance() {
    let store = Arc::new(MemoryStore::new());
    let record = PublicationRecord {
        id: Uuid::new_v4(),
        pmid: "38000001".to_string(),
        doi: Some("10.1161/HYP.0000000000000001".to_string()),
        title: "Baroreflex activation therapy in resistant hypertension.".to_string(),
        journal_raw: "Hypertension (Dallas, Tex. : 1979)".to_string(),
        journal: "Hypertension".to_string(),
        abstract_text: None,
        publication_date: Some("2024 Mar".to_string()),
        authors: vec!["Smith J".to_string()],
        citation_count: None,
        citation_source: None,
        approved: true,
        imported_at: Utc::now(),
    };
    let id = record.id;
    store.insert(record).unwrap();

    let tracker = Arc::new(SyncTracker::new(&config()));
    let sources: Vec<Arc<dyn CitationSource>> = vec![
        Arc::new(StubSource {
            name: "crossref",
            count: Some(41),
        }),
        Arc::new(StubSource {
            name: "openalex",
            count: Some(44),
        }),
    ];
    let runner = CitationRefreshRunner::new(
        Arc::clone(&tracker),
        Arc::clone(&store) as Arc<dyn PublicationStore>,
        sources,
        vec!["openalex".to_string(), "crossref".to_string()],
        Duration::from_millis(0),
    );

    runner.run(false).await.unwrap();

    let refreshed = store.get(id).unwrap();
    assert_eq!(refreshed.citation_count, Some(44));
    assert_eq!(refreshed.citation_source.as_deref(), Some("openalex"));
    assert_eq!(tracker.snapshot().status, SyncStatus::Completed);
}
