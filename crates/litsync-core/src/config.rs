use serde::{Deserialize, Serialize};

/// Runtime configuration shared by the sync tracker and runners.
/// Fields omitted from a config file fall back to the defaults below.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Email address sent to polite-pool APIs (CrossRef, NCBI).
    pub polite_email: Option<String>,
    /// Optional Semantic Scholar API key; raises the allowed request rate.
    pub semantic_scholar_api_key: Option<String>,
    /// PubMed search term describing the device literature corpus.
    pub search_term: String,
    /// Records fetched per ESearch page.
    pub page_size: u32,
    /// Incremental runs re-scan this many days before the last success watermark.
    pub incremental_overlap_days: i64,
    /// Maximum retained sync history entries, newest first.
    pub history_limit: usize,
    /// Grace window before a terminal run reverts to idle.
    pub idle_revert_secs: u64,
    /// Fixed delay between per-publication citation lookups.
    pub citation_delay_ms: u64,
    pub user_agent: String,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            polite_email: None,
            semantic_scholar_api_key: None,
            search_term: String::new(),
            page_size: 50,
            incremental_overlap_days: 7,
            history_limit: 20,
            idle_revert_secs: 60,
            citation_delay_ms: 350,
            user_agent: "litsync/0.1".to_string(),
        }
    }
}

impl SyncConfig {
    pub fn load_from_str(raw: &str) -> crate::error::Result<Self> {
        Ok(toml::from_str(raw)?)
    }
}
