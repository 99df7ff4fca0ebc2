//! Runners that drive a tracked sync run end to end: the publication import
//! and the independently tracked citation refresh.

mod citations_job;
mod runner;

pub use citations_job::CitationRefreshRunner;
pub use runner::ImportRunner;

/// How a runner's inner loop ended; the runner maps this onto the tracker's
/// terminal transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RunOutcome {
    Completed,
    Cancelled,
}
