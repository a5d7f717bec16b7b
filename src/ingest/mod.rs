//! # Activity Ingestion
//!
//! Pulls issue events from the upstream tracker and stores them as
//! normalized activities:
//! - `rate_limit`: shared upstream budget gate
//! - `fetcher`: paginated event retrieval per issue
//! - `classifier`: event kind to action mapping
//! - `enricher`: secondary lookups for descriptions
//! - `pipeline`: the batch run tying them together

pub mod classifier;
pub mod enricher;
pub mod fetcher;
pub mod pipeline;
pub mod rate_limit;

use serde::{Deserialize, Serialize};

pub use classifier::{ActivityAction, Classification, classify};
pub use enricher::{Enrichment, EnrichmentError, EventEnricher};
pub use fetcher::{EventFetcher, FetchedEvents};
pub use pipeline::{IngestReport, IngestionPipeline, IssueBatch, IssueFailure, PipelineState};
pub use rate_limit::{RateLimitDecision, RateLimiter};

/// Upstream repository whose issues feed a local project
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackedProject {
    pub project_id: i64,
    pub owner: String,
    pub repo: String,
}
