//! Paginated retrieval of an issue's events.

use std::sync::Arc;

use metrics::counter;
use tracing::{debug, warn};

use super::TrackedProject;
use super::rate_limit::{RateLimitDecision, RateLimiter};
use crate::connectors::{ConnectorError, EventSource};
use crate::models::RawEvent;

/// Events gathered for one issue, in upstream order
#[derive(Debug, Clone, Default)]
pub struct FetchedEvents {
    pub events: Vec<RawEvent>,
    /// Number of list calls issued
    pub pages: u32,
    /// The limiter halted during (or before) this fetch
    pub halted: bool,
    /// An empty page was reached, so `events` is the full history
    pub complete: bool,
}

pub struct EventFetcher {
    source: Arc<dyn EventSource>,
    limiter: Arc<RateLimiter>,
    per_page: u32,
}

impl EventFetcher {
    pub fn new(source: Arc<dyn EventSource>, limiter: Arc<RateLimiter>, per_page: u32) -> Self {
        Self {
            source,
            limiter,
            per_page,
        }
    }

    /// Walk pages 1, 2, ... until one comes back empty or the limiter halts.
    ///
    /// A halt is not an error: whatever was gathered so far is returned with
    /// `halted` set. Upstream failures other than a rate-limit rejection are
    /// returned as errors and discard the partial pages.
    pub async fn fetch_all(
        &self,
        project: &TrackedProject,
        issue_number: i64,
    ) -> Result<FetchedEvents, ConnectorError> {
        let mut fetched = FetchedEvents::default();
        if self.limiter.is_halted() {
            fetched.halted = true;
            return Ok(fetched);
        }

        let mut page = 1;
        loop {
            let response = match self
                .source
                .list_events(
                    &project.owner,
                    &project.repo,
                    issue_number,
                    page,
                    self.per_page,
                )
                .await
            {
                Ok(response) => response,
                Err(ConnectorError::RateLimited { reset_at }) => {
                    warn!(issue_number, page, reset_at = ?reset_at, "Event listing rejected by rate limit");
                    self.limiter.halt();
                    fetched.pages += 1;
                    fetched.halted = true;
                    return Ok(fetched);
                }
                Err(err) => return Err(err),
            };
            fetched.pages += 1;

            let count = response.data.len();
            debug!(issue_number, page, count, remaining = ?response.rate_limit.remaining, "Fetched event page");
            counter!("activity_events_fetched_total").increment(count as u64);
            fetched.events.extend(response.data);
            fetched.complete = count == 0;

            if self.limiter.observe(&response.rate_limit) == RateLimitDecision::Halt {
                fetched.halted = true;
                return Ok(fetched);
            }
            if fetched.complete {
                return Ok(fetched);
            }
            page += 1;
        }
    }
}
