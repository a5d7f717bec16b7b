//! Event source trait definition
//!
//! Defines the interface the ingestion pipeline uses to talk to the upstream
//! issue tracker. Every call reports the rate budget left after it.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::models::{EventDetail, RawEvent};

/// Upstream errors surfaced by event sources
#[derive(Debug, Clone, Error)]
pub enum ConnectorError {
    /// Non-success HTTP status from the provider
    #[error("HTTP error {status}: {}", .body.as_deref().unwrap_or("No body"))]
    HttpError { status: u16, body: Option<String> },

    /// Provider rejected the call because the budget is exhausted
    #[error("Rate limited by provider (reset at: {reset_at:?})")]
    RateLimited { reset_at: Option<DateTime<Utc>> },

    /// Transport failure
    #[error("Network error: {details}")]
    NetworkError { details: String },

    /// Body could not be decoded into the expected shape
    #[error("Malformed response: {details}")]
    MalformedResponse { details: String },

    /// Client could not be built from the supplied settings
    #[error("Configuration error: {details}")]
    ConfigurationError { details: String },
}

impl From<reqwest::Error> for ConnectorError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ConnectorError::MalformedResponse {
                details: err.to_string(),
            }
        } else {
            ConnectorError::NetworkError {
                details: err.to_string(),
            }
        }
    }
}

impl From<url::ParseError> for ConnectorError {
    fn from(err: url::ParseError) -> Self {
        ConnectorError::ConfigurationError {
            details: err.to_string(),
        }
    }
}

/// Rate limit metadata read from response headers
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RateLimitInfo {
    pub remaining: Option<u32>,
    pub reset: Option<DateTime<Utc>>,
}

/// A decoded response together with the rate budget reported alongside it
#[derive(Debug, Clone)]
pub struct ApiResponse<T> {
    pub data: T,
    pub rate_limit: RateLimitInfo,
}

impl<T> ApiResponse<T> {
    pub fn new(data: T, rate_limit: RateLimitInfo) -> Self {
        Self { data, rate_limit }
    }
}

#[async_trait]
pub trait EventSource: Send + Sync {
    /// List one page of events for an issue, in upstream order.
    /// An empty page marks the end of the listing.
    async fn list_events(
        &self,
        owner: &str,
        repo: &str,
        issue_number: i64,
        page: u32,
        per_page: u32,
    ) -> Result<ApiResponse<Vec<RawEvent>>, ConnectorError>;

    /// Fetch a single event with its issue details.
    async fn get_event(
        &self,
        owner: &str,
        repo: &str,
        event_id: i64,
    ) -> Result<ApiResponse<EventDetail>, ConnectorError>;
}
