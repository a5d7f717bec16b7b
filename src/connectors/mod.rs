//! Connectors module
//!
//! Upstream event sources:
//! - The `EventSource` trait the ingestion pipeline is written against
//! - The GitHub REST implementation

pub mod github;
pub mod trait_;

pub use github::{GitHubApiConfig, GitHubEventsClient};
pub use trait_::{ApiResponse, ConnectorError, EventSource, RateLimitInfo};
