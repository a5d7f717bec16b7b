//! Secondary lookups that fill in an activity's description.

use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, warn};

use super::TrackedProject;
use super::classifier::ActivityAction;
use super::rate_limit::RateLimiter;
use crate::connectors::{ConnectorError, EventSource};
use crate::models::RawEvent;

/// An event's enrichment could not be produced
#[derive(Debug, Error)]
pub enum EnrichmentError {
    #[error("rate limit exhausted while enriching event {event_id}")]
    RateLimited { event_id: i64 },

    #[error("event {event_id} detail carries no issue assignee")]
    MissingAssignee { event_id: i64 },

    #[error("lookup of event {event_id} failed: {source}")]
    Upstream {
        event_id: i64,
        #[source]
        source: ConnectorError,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Enrichment {
    pub description: Option<String>,
    /// The lookup left the limiter halted; the description is still valid
    pub halted: bool,
}

pub struct EventEnricher {
    source: Arc<dyn EventSource>,
    limiter: Arc<RateLimiter>,
}

impl EventEnricher {
    pub fn new(source: Arc<dyn EventSource>, limiter: Arc<RateLimiter>) -> Self {
        Self { source, limiter }
    }

    /// Whether enriching `action` costs an upstream call.
    pub fn requires_remote_call(&self, action: ActivityAction) -> bool {
        matches!(action, ActivityAction::Assign)
    }

    pub async fn enrich(
        &self,
        project: &TrackedProject,
        event: &RawEvent,
        action: ActivityAction,
    ) -> Result<Enrichment, EnrichmentError> {
        match action {
            ActivityAction::Assign => self.describe_assignment(project, event).await,
            // TODO: resolve the referencing commit once commit lookups are budgeted
            ActivityAction::Reference => Ok(Enrichment::default()),
            _ => Ok(Enrichment::default()),
        }
    }

    /// The assignee comes from the event detail's issue, not the listing.
    async fn describe_assignment(
        &self,
        project: &TrackedProject,
        event: &RawEvent,
    ) -> Result<Enrichment, EnrichmentError> {
        let event_id = event.id;
        if self.limiter.is_halted() {
            return Err(EnrichmentError::RateLimited { event_id });
        }

        let response = match self
            .source
            .get_event(&project.owner, &project.repo, event_id)
            .await
        {
            Ok(response) => response,
            Err(ConnectorError::RateLimited { .. }) => {
                self.limiter.halt();
                return Err(EnrichmentError::RateLimited { event_id });
            }
            Err(source) => {
                warn!(event_id, error = %source, "Event detail lookup failed");
                return Err(EnrichmentError::Upstream { event_id, source });
            }
        };

        let halted = self.limiter.observe(&response.rate_limit).is_halt();
        let login = response
            .data
            .issue_assignee_login()
            .ok_or(EnrichmentError::MissingAssignee { event_id })?;

        debug!(event_id, assignee = login, "Enriched assignment");
        Ok(Enrichment {
            description: Some(format!("Assigned to {}", login)),
            halted,
        })
    }
}
