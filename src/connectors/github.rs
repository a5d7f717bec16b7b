//! GitHub event source implementation
//!
//! REST client for the GitHub issue events endpoints. Reports the
//! `X-RateLimit-*` headers of every response so the pipeline can gate on them.

use async_trait::async_trait;
use chrono::DateTime;
use std::time::Duration;
use tracing::{debug, error, warn};
use url::Url;

use crate::config::AppConfig;
use crate::connectors::trait_::{ApiResponse, ConnectorError, EventSource, RateLimitInfo};
use crate::models::{EventDetail, RawEvent};

const USER_AGENT: &str = "activity-ingest/0.1";
const DEFAULT_API_BASE: &str = "https://api.github.com";

/// GitHub API client configuration
#[derive(Debug, Clone)]
pub struct GitHubApiConfig {
    pub base_url: String,
    pub accept_header: String,
    pub timeout: Duration,
}

impl Default for GitHubApiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_BASE.to_string(),
            accept_header: "application/vnd.github.v3+json".to_string(),
            timeout: Duration::from_secs(30),
        }
    }
}

/// GitHub issue events client
#[derive(Clone)]
pub struct GitHubEventsClient {
    api_config: GitHubApiConfig,
    access_token: Option<String>,
    http: reqwest::Client,
}

impl GitHubEventsClient {
    /// Create a client with explicit API settings
    pub fn new(
        api_config: GitHubApiConfig,
        access_token: Option<String>,
    ) -> Result<Self, ConnectorError> {
        let http = reqwest::Client::builder()
            .timeout(api_config.timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| ConnectorError::ConfigurationError {
                details: format!("failed to build HTTP client: {}", e),
            })?;

        Ok(Self {
            api_config,
            access_token,
            http,
        })
    }

    /// Create a client from application configuration
    pub fn from_config(config: &AppConfig) -> Result<Self, ConnectorError> {
        let api_config = GitHubApiConfig {
            base_url: config
                .github_api_base
                .clone()
                .unwrap_or_else(|| DEFAULT_API_BASE.to_string()),
            timeout: Duration::from_secs(config.http_timeout_seconds),
            ..GitHubApiConfig::default()
        };
        Self::new(api_config, config.github_token.clone())
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, ConnectorError> {
        let mut url = Url::parse(self.api_config.base_url.trim_end_matches('/'))?;
        url.path_segments_mut()
            .map_err(|_| ConnectorError::ConfigurationError {
                details: format!("API base URL cannot be a base: {}", self.api_config.base_url),
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn send(&self, url: Url) -> Result<reqwest::Response, ConnectorError> {
        let mut request = self
            .http
            .get(url)
            .header("Accept", &self.api_config.accept_header);
        if let Some(token) = &self.access_token {
            request = request.header("Authorization", format!("Bearer {}", token));
        }

        let response = request.send().await?;
        if response.status().is_success() {
            return Ok(response);
        }

        let status = response.status().as_u16();
        let rate_limit = extract_rate_limit_info(&response);
        if status == 429 || (status == 403 && rate_limit.remaining == Some(0)) {
            warn!(
                status,
                reset = ?rate_limit.reset,
                "GitHub API rejected the call: rate limit exhausted"
            );
            return Err(ConnectorError::RateLimited {
                reset_at: rate_limit.reset,
            });
        }

        let body = response.text().await.unwrap_or_default();
        if status >= 500 {
            warn!("GitHub API server error: {} - {}", status, body);
        } else {
            error!("GitHub API request failed: {} - {}", status, body);
        }
        Err(ConnectorError::HttpError {
            status,
            body: Some(truncate_body(body)),
        })
    }
}

#[async_trait]
impl EventSource for GitHubEventsClient {
    async fn list_events(
        &self,
        owner: &str,
        repo: &str,
        issue_number: i64,
        page: u32,
        per_page: u32,
    ) -> Result<ApiResponse<Vec<RawEvent>>, ConnectorError> {
        let issue = issue_number.to_string();
        let mut url = self.endpoint(&["repos", owner, repo, "issues", &issue, "events"])?;
        url.query_pairs_mut()
            .append_pair("per_page", &per_page.to_string())
            .append_pair("page", &page.to_string());

        debug!(%url, "Listing issue events");
        let response = self.send(url).await?;
        let rate_limit = extract_rate_limit_info(&response);
        let body: serde_json::Value = response.json().await?;

        Ok(ApiResponse::new(events_from_body(body)?, rate_limit))
    }

    async fn get_event(
        &self,
        owner: &str,
        repo: &str,
        event_id: i64,
    ) -> Result<ApiResponse<EventDetail>, ConnectorError> {
        let id = event_id.to_string();
        let url = self.endpoint(&["repos", owner, repo, "issues", "events", &id])?;

        debug!(%url, "Fetching single issue event");
        let response = self.send(url).await?;
        let rate_limit = extract_rate_limit_info(&response);
        let detail: EventDetail = response.json().await?;

        Ok(ApiResponse::new(detail, rate_limit))
    }
}

/// Decode a listing body; anything that is not a JSON array counts as an empty page.
fn events_from_body(body: serde_json::Value) -> Result<Vec<RawEvent>, ConnectorError> {
    match body {
        serde_json::Value::Array(_) => {
            serde_json::from_value(body).map_err(|e| ConnectorError::MalformedResponse {
                details: format!("invalid issue event: {}", e),
            })
        }
        other => {
            debug!(kind = json_kind(&other), "Event listing was not an array; treating as empty");
            Ok(Vec::new())
        }
    }
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "bool",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}

fn truncate_body(body: String) -> String {
    if body.chars().count() > 200 {
        let mut truncated: String = body.chars().take(200).collect();
        truncated.push_str("...");
        truncated
    } else {
        body
    }
}

/// Extract rate limit information from response headers
fn extract_rate_limit_info(response: &reqwest::Response) -> RateLimitInfo {
    RateLimitInfo {
        remaining: response
            .headers()
            .get("X-RateLimit-Remaining")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse().ok()),
        reset: response
            .headers()
            .get("X-RateLimit-Reset")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse().ok())
            .and_then(|timestamp| DateTime::from_timestamp(timestamp, 0)),
    }
}
