//! Ingestion run over a batch of issues.
//!
//! Issues are handled one at a time in input order. For each issue the events
//! are fetched, classified, enriched where needed and written. A rate-limit
//! halt ends the run early with everything already written kept. An unknown
//! event kind fails the run, and an upstream error aborts it; in both cases
//! rows written before stay.

use std::collections::HashSet;
use std::sync::Arc;

use metrics::counter;
use sea_orm::DatabaseConnection;
use serde::Serialize;
use tracing::{debug, error, info, instrument, warn};

use super::TrackedProject;
use super::classifier::{ActivityAction, Classification, classify};
use super::enricher::{EnrichmentError, EventEnricher};
use super::fetcher::EventFetcher;
use super::rate_limit::RateLimiter;
use crate::config::AppConfig;
use crate::connectors::{EventSource, GitHubEventsClient};
use crate::error::IngestError;
use crate::models::RawEvent;
use crate::repositories::{ActivityWriter, NewActivity, WriteOutcome};

/// Where a run currently is, or how it ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PipelineState {
    Idle,
    Fetching { issue: i64 },
    Classifying { issue: i64 },
    Enriching { issue: i64, event_id: i64 },
    Writing { issue: i64, event_id: i64 },
    Done,
    /// Upstream budget reached the floor; the run stopped early
    Halted,
    /// An event kind with no mapping was met
    Failed { kind: String },
    /// An upstream call for `issue` failed; no further issues were attempted
    Aborted { issue: i64, reason: String },
}

impl PipelineState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PipelineState::Done
                | PipelineState::Halted
                | PipelineState::Failed { .. }
                | PipelineState::Aborted { .. }
        )
    }
}

/// Issue numbers to refresh, first occurrence wins
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IssueBatch {
    issues: Vec<i64>,
}

impl IssueBatch {
    pub fn new(issues: &[i64]) -> Self {
        let mut seen = HashSet::with_capacity(issues.len());
        Self {
            issues: issues.iter().copied().filter(|n| seen.insert(*n)).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.issues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.issues.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = i64> + '_ {
        self.issues.iter().copied()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IssueFailure {
    pub issue: i64,
    pub reason: String,
}

/// Outcome of one run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    pub state: PipelineState,
    pub inserted: u64,
    pub overwritten: u64,
    pub skipped: u64,
    pub ignored: u64,
    pub fetched: u64,
    /// Issues whose whole event history was handled
    pub issues_processed: Vec<i64>,
    pub failures: Vec<IssueFailure>,
}

impl Default for IngestReport {
    fn default() -> Self {
        Self {
            state: PipelineState::Idle,
            inserted: 0,
            overwritten: 0,
            skipped: 0,
            ignored: 0,
            fetched: 0,
            issues_processed: Vec::new(),
            failures: Vec::new(),
        }
    }
}

impl IngestReport {
    /// Records newly stored or replaced by the run.
    pub fn written(&self) -> u64 {
        self.inserted + self.overwritten
    }

    fn transition(&mut self, next: PipelineState) {
        debug!(from = ?self.state, to = ?next, "Pipeline transition");
        self.state = next;
    }

    fn record_write(&mut self, outcome: WriteOutcome) {
        match outcome {
            WriteOutcome::Inserted => self.inserted += 1,
            WriteOutcome::Skipped => self.skipped += 1,
            WriteOutcome::Overwritten => self.overwritten += 1,
        }
        counter!("activity_records_written_total", "outcome" => outcome.as_str()).increment(1);
    }

    fn abort(&mut self, issue: i64, reason: String) {
        error!(issue, %reason, "Upstream failure; aborting run");
        self.failures.push(IssueFailure {
            issue,
            reason: reason.clone(),
        });
        self.transition(PipelineState::Aborted { issue, reason });
    }
}

/// How processing of one issue's events ended
enum IssueOutcome {
    Completed,
    /// Stopped at an event that needed an upstream call after the halt
    Blocked,
    Aborted(String),
    UnknownKind(String),
}

pub struct IngestionPipeline {
    project: TrackedProject,
    fetcher: EventFetcher,
    enricher: EventEnricher,
    writer: ActivityWriter,
    limiter: Arc<RateLimiter>,
}

impl IngestionPipeline {
    pub fn new(
        project: TrackedProject,
        source: Arc<dyn EventSource>,
        writer: ActivityWriter,
        limiter: Arc<RateLimiter>,
        per_page: u32,
    ) -> Self {
        Self {
            project,
            fetcher: EventFetcher::new(source.clone(), limiter.clone(), per_page),
            enricher: EventEnricher::new(source, limiter.clone()),
            writer,
            limiter,
        }
    }

    /// Wire a pipeline against GitHub using application configuration.
    pub fn from_config(
        config: &AppConfig,
        db: Arc<DatabaseConnection>,
    ) -> Result<Self, IngestError> {
        let project = config.tracked_project()?;
        let source: Arc<dyn EventSource> = Arc::new(GitHubEventsClient::from_config(config)?);
        let limiter = Arc::new(RateLimiter::new(config.rate_limit_floor));

        Ok(Self::new(
            project,
            source,
            ActivityWriter::new(db),
            limiter,
            config.events_per_page,
        ))
    }

    pub fn project(&self) -> &TrackedProject {
        &self.project
    }

    pub fn limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    /// Ingest the events of `issues` into the activity store.
    ///
    /// Returns `Err` only when the store fails. Rate-limit halts, unknown
    /// kinds and upstream failures end the run and are reported in the
    /// [`IngestReport`].
    #[instrument(skip(self, issues), fields(project_id = self.project.project_id, issue_count = issues.len()))]
    pub async fn run(&self, issues: &[i64], force: bool) -> Result<IngestReport, IngestError> {
        let batch = IssueBatch::new(issues);
        let mut report = IngestReport::default();

        if batch.is_empty() {
            info!("No issues to refresh");
            report.transition(PipelineState::Done);
            return Ok(report);
        }

        info!(
            owner = %self.project.owner,
            repo = %self.project.repo,
            count = batch.len(),
            "Fetching events"
        );

        let total = batch.len();
        for (index, issue) in batch.iter().enumerate() {
            if self.limiter.is_halted() {
                break;
            }

            report.transition(PipelineState::Fetching { issue });
            let fetched = match self.fetcher.fetch_all(&self.project, issue).await {
                Ok(fetched) => fetched,
                Err(err) => {
                    report.abort(issue, format!("fetching events failed: {}", err));
                    return Ok(report);
                }
            };
            report.fetched += fetched.events.len() as u64;
            info!(
                pages = fetched.pages,
                "{}/{} - #{}: {} events",
                index + 1,
                total,
                issue,
                fetched.events.len()
            );

            match self
                .process_issue(&mut report, issue, &fetched.events, force)
                .await?
            {
                IssueOutcome::Completed if fetched.complete => report.issues_processed.push(issue),
                IssueOutcome::Completed if fetched.halted => {
                    debug!(issue, "Issue history only partly fetched before halt");
                }
                IssueOutcome::Completed => {}
                IssueOutcome::Blocked => {
                    info!(issue, "Stopped at an event needing a lookup after the halt");
                }
                IssueOutcome::Aborted(reason) => {
                    report.abort(issue, reason);
                    return Ok(report);
                }
                IssueOutcome::UnknownKind(kind) => {
                    error!(issue, %kind, "Unknown event kind; aborting run");
                    counter!("activity_unknown_events_total", "kind" => kind.clone()).increment(1);
                    report.transition(PipelineState::Failed { kind });
                    return Ok(report);
                }
            }
        }

        let terminal = if self.limiter.is_halted() {
            warn!(
                processed = report.issues_processed.len(),
                total,
                remaining = ?self.limiter.remaining(),
                floor = self.limiter.floor(),
                "Rate limit reached; remaining issues left for the next run"
            );
            PipelineState::Halted
        } else {
            PipelineState::Done
        };
        report.transition(terminal);

        info!(
            inserted = report.inserted,
            overwritten = report.overwritten,
            skipped = report.skipped,
            ignored = report.ignored,
            "Ingestion finished"
        );
        Ok(report)
    }

    async fn process_issue(
        &self,
        report: &mut IngestReport,
        issue: i64,
        events: &[RawEvent],
        force: bool,
    ) -> Result<IssueOutcome, IngestError> {
        for event in events {
            report.transition(PipelineState::Classifying { issue });
            let action = match classify(event) {
                Classification::Action(action) => action,
                Classification::Ignore => {
                    report.ignored += 1;
                    continue;
                }
                Classification::Unknown(kind) => return Ok(IssueOutcome::UnknownKind(kind)),
            };

            let mut description = None;
            if self.enricher.requires_remote_call(action) {
                // A stored row without force is skipped before spending a lookup on it
                if !force
                    && self
                        .writer
                        .find_by_remote_event(event.id, self.project.project_id)
                        .await?
                        .is_some()
                {
                    report.record_write(WriteOutcome::Skipped);
                    continue;
                }
                if self.limiter.is_halted() {
                    return Ok(IssueOutcome::Blocked);
                }
                report.transition(PipelineState::Enriching {
                    issue,
                    event_id: event.id,
                });
                match self.enricher.enrich(&self.project, event, action).await {
                    Ok(enrichment) => {
                        if enrichment.halted {
                            warn!(issue, event_id = event.id, "Rate budget reached on lookup");
                        }
                        description = enrichment.description;
                    }
                    Err(EnrichmentError::RateLimited { .. }) => return Ok(IssueOutcome::Blocked),
                    Err(err) => return Ok(IssueOutcome::Aborted(err.to_string())),
                }
            }

            report.transition(PipelineState::Writing {
                issue,
                event_id: event.id,
            });
            let activity = self.normalize(issue, event, action, description);
            let outcome = self.writer.write(&activity, force).await?;
            report.record_write(outcome);
        }

        Ok(IssueOutcome::Completed)
    }

    fn normalize(
        &self,
        issue: i64,
        event: &RawEvent,
        action: ActivityAction,
        description: Option<String>,
    ) -> NewActivity {
        NewActivity {
            remote_event_id: event.id,
            project_id: self.project.project_id,
            issue_number: issue,
            actor: event.actor_login().to_string(),
            action: action.as_str().to_string(),
            created_at: event.created_at,
            text_raw: description.clone(),
            text: description,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn batch_drops_repeats_keeping_first_position() {
        let batch = IssueBatch::new(&[5, 3, 5, 9, 3]);
        assert_eq!(batch.iter().collect::<Vec<_>>(), vec![5, 3, 9]);
        assert_eq!(batch.len(), 3);
        assert!(IssueBatch::new(&[]).is_empty());
    }

    #[test]
    fn written_counts_inserts_and_overwrites() {
        let report = IngestReport {
            inserted: 3,
            overwritten: 2,
            skipped: 7,
            ..IngestReport::default()
        };
        assert_eq!(report.written(), 5);
    }

    #[test]
    fn terminal_states() {
        assert!(PipelineState::Done.is_terminal());
        assert!(PipelineState::Halted.is_terminal());
        assert!(
            PipelineState::Failed {
                kind: "labeled".to_string()
            }
            .is_terminal()
        );
        assert!(
            PipelineState::Aborted {
                issue: 4,
                reason: "HTTP error 502".to_string()
            }
            .is_terminal()
        );
        assert!(!PipelineState::Fetching { issue: 1 }.is_terminal());
        assert!(!PipelineState::Idle.is_terminal());
    }

    #[test]
    fn state_serializes_with_status_tag() {
        let json = serde_json::to_value(PipelineState::Failed {
            kind: "labeled".to_string(),
        })
        .unwrap();
        assert_eq!(json["status"], "failed");
        assert_eq!(json["kind"], "labeled");
    }
}
