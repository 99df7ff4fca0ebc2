//! litsync science: PubMed ingestion, citation reconciliation, journal and
//! abstract normalization.

pub mod abstracts;
pub mod citations;
pub mod error;
pub mod http;
pub mod journal;
pub mod sources;
pub mod sync;

pub use citations::{CitationObservation, SourceComparisonReport};
pub use error::{Result, ScienceError};
pub use sources::CitationSource;
