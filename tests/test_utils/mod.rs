//! Test utilities shared by the integration tests.
//!
//! Provides an in-memory SQLite store with migrations applied and a scripted
//! upstream event source that records every call it receives.

#![allow(dead_code)]

use activity_ingest::connectors::{ApiResponse, ConnectorError, EventSource, RateLimitInfo};
use activity_ingest::ingest::TrackedProject;
use activity_ingest::models::{EventActor, EventDetail, EventIssue, RawEvent};
use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use migration::{Migrator, MigratorTrait};
use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::{Arc, Mutex};

/// Sets up an in-memory SQLite database with all migrations applied.
///
/// The pool is capped at one connection so every query sees the same
/// in-memory database.
pub async fn setup_test_db() -> Result<DatabaseConnection> {
    let mut opts = ConnectOptions::new("sqlite::memory:".to_string());
    opts.max_connections(1).sqlx_logging(false);
    let db = Database::connect(opts).await?;

    Migrator::up(&db, None).await?;

    Ok(db)
}

/// Same as [`setup_test_db`], wrapped for components that share the pool.
pub async fn setup_test_db_arc() -> Result<Arc<DatabaseConnection>> {
    Ok(Arc::new(setup_test_db().await?))
}

/// File-backed SQLite store with a pool of `max_connections`, migrated.
///
/// Unlike the in-memory store, separate connections here can race each other.
pub async fn setup_file_db(dir: &Path, max_connections: u32) -> Result<Arc<DatabaseConnection>> {
    let url = format!("sqlite://{}?mode=rwc", dir.join("activities.db").display());

    // Migrate before the race pool opens, so every pooled connection sees the
    // unique index the ON CONFLICT insert targets.
    let mut migrate_opts = ConnectOptions::new(url.clone());
    migrate_opts.max_connections(1).sqlx_logging(false);
    let migrate_db = Database::connect(migrate_opts).await?;
    Migrator::up(&migrate_db, None).await?;
    migrate_db.close().await?;

    let mut opts = ConnectOptions::new(url);
    opts.max_connections(max_connections)
        .min_connections(max_connections)
        .sqlx_logging(false);
    let db = Database::connect(opts).await?;

    Ok(Arc::new(db))
}

pub fn tracked_project() -> TrackedProject {
    TrackedProject {
        project_id: 1,
        owner: "joomla".to_string(),
        repo: "joomla-cms".to_string(),
    }
}

fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 15, 9, 0, 0).unwrap()
}

/// Builds a listed event; ids double as minute offsets so ordering is stable.
pub fn event(id: i64, kind: &str) -> RawEvent {
    RawEvent {
        id,
        kind: kind.to_string(),
        actor: Some(EventActor {
            login: "octocat".to_string(),
        }),
        created_at: base_time() + Duration::minutes(id),
        assignee: None,
        commit_id: None,
    }
}

/// An upstream call as seen by [`ScriptedSource`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    List { issue: i64, page: u32 },
    Get { event_id: i64 },
}

/// Scripted upstream: serves configured events page by page and reports a
/// budget that drops by one with every call.
pub struct ScriptedSource {
    issues: HashMap<i64, Vec<RawEvent>>,
    assignees: HashMap<i64, String>,
    failing_issues: HashSet<i64>,
    rejected_issues: HashSet<i64>,
    rejected_events: HashSet<i64>,
    remaining: Mutex<u32>,
    calls: Mutex<Vec<Call>>,
}

impl ScriptedSource {
    pub fn new(budget: u32) -> Self {
        Self {
            issues: HashMap::new(),
            assignees: HashMap::new(),
            failing_issues: HashSet::new(),
            rejected_issues: HashSet::new(),
            rejected_events: HashSet::new(),
            remaining: Mutex::new(budget),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn with_issue(mut self, issue: i64, events: Vec<RawEvent>) -> Self {
        self.issues.insert(issue, events);
        self
    }

    /// Current assignee of the issue behind `event_id`, as the detail call reports it
    pub fn with_assignee(mut self, event_id: i64, login: &str) -> Self {
        self.assignees.insert(event_id, login.to_string());
        self
    }

    /// Listing this issue answers with a server error
    pub fn failing_issue(mut self, issue: i64) -> Self {
        self.failing_issues.insert(issue);
        self
    }

    /// Listing this issue is refused as over the rate limit
    pub fn rate_limited_issue(mut self, issue: i64) -> Self {
        self.rejected_issues.insert(issue);
        self
    }

    /// The detail call for this event is refused as over the rate limit
    pub fn rate_limited_event(mut self, event_id: i64) -> Self {
        self.rejected_events.insert(event_id);
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn listed_issues(&self) -> Vec<i64> {
        let mut issues = Vec::new();
        for call in self.calls() {
            if let Call::List { issue, .. } = call
                && !issues.contains(&issue)
            {
                issues.push(issue);
            }
        }
        issues
    }

    pub fn detail_calls(&self) -> usize {
        self.calls()
            .iter()
            .filter(|call| matches!(call, Call::Get { .. }))
            .count()
    }

    fn spend(&self, call: Call) -> RateLimitInfo {
        self.calls.lock().unwrap().push(call);
        let mut remaining = self.remaining.lock().unwrap();
        *remaining = remaining.saturating_sub(1);
        RateLimitInfo {
            remaining: Some(*remaining),
            reset: None,
        }
    }
}

#[async_trait]
impl EventSource for ScriptedSource {
    async fn list_events(
        &self,
        _owner: &str,
        _repo: &str,
        issue_number: i64,
        page: u32,
        per_page: u32,
    ) -> Result<ApiResponse<Vec<RawEvent>>, ConnectorError> {
        let rate_limit = self.spend(Call::List {
            issue: issue_number,
            page,
        });

        if self.rejected_issues.contains(&issue_number) {
            return Err(ConnectorError::RateLimited { reset_at: None });
        }
        if self.failing_issues.contains(&issue_number) {
            return Err(ConnectorError::HttpError {
                status: 502,
                body: Some("Bad Gateway".to_string()),
            });
        }

        let events = self
            .issues
            .get(&issue_number)
            .map(|events| {
                events
                    .iter()
                    .skip(((page - 1) * per_page) as usize)
                    .take(per_page as usize)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        Ok(ApiResponse::new(events, rate_limit))
    }

    async fn get_event(
        &self,
        _owner: &str,
        _repo: &str,
        event_id: i64,
    ) -> Result<ApiResponse<EventDetail>, ConnectorError> {
        let rate_limit = self.spend(Call::Get { event_id });
        if self.rejected_events.contains(&event_id) {
            return Err(ConnectorError::RateLimited { reset_at: None });
        }

        let listed = self
            .issues
            .values()
            .flatten()
            .find(|event| event.id == event_id)
            .cloned()
            .ok_or(ConnectorError::HttpError {
                status: 404,
                body: None,
            })?;

        let detail = EventDetail {
            event: listed,
            issue: Some(EventIssue {
                number: 0,
                assignee: self.assignees.get(&event_id).map(|login| EventActor {
                    login: login.clone(),
                }),
            }),
        };

        Ok(ApiResponse::new(detail, rate_limit))
    }
}
