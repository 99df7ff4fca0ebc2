use async_trait::async_trait;

use crate::error::Result;

/// A bibliometric source that can report how often a DOI has been cited.
///
/// Implementations return `Ok(None)` when the source is reachable but does
/// not index the DOI. Transport and API failures surface as `Err`; the
/// reconciler folds them into a null observation so one bad source never
/// aborts a batch.
#[async_trait]
pub trait CitationSource: Send + Sync {
    fn name(&self) -> &'static str;
    async fn citation_count(&self, doi: &str) -> Result<Option<u64>>;
}

pub mod crossref;
pub mod openalex;
pub mod pubmed;
pub mod semantic_scholar;

pub use crossref::CrossRefSource;
pub use openalex::OpenAlexSource;
pub use pubmed::{PubMedRecord, PubMedSource, SearchPage};
pub use semantic_scholar::SemanticScholarSource;
