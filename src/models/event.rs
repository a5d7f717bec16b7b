//! Upstream issue event payloads
//!
//! Shapes returned by the GitHub issue events API. These only live for the
//! duration of an ingestion run and are never persisted as-is.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Login reported by GitHub for events whose actor account was deleted.
pub const GHOST_LOGIN: &str = "ghost";

/// A user reference embedded in an event payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventActor {
    pub login: String,
}

/// A single issue event as listed by `GET /repos/{owner}/{repo}/issues/{n}/events`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawEvent {
    pub id: i64,
    /// Event kind tag (`closed`, `assigned`, ...)
    #[serde(rename = "event")]
    pub kind: String,
    #[serde(default)]
    pub actor: Option<EventActor>,
    pub created_at: DateTime<Utc>,
    /// Present on `assigned`/`unassigned` events
    #[serde(default)]
    pub assignee: Option<EventActor>,
    /// Present on `referenced`/`merged`/`closed` events tied to a commit
    #[serde(default)]
    pub commit_id: Option<String>,
}

impl RawEvent {
    /// Actor login, falling back to GitHub's placeholder for deleted users.
    pub fn actor_login(&self) -> &str {
        self.actor
            .as_ref()
            .map(|actor| actor.login.as_str())
            .unwrap_or(GHOST_LOGIN)
    }
}

/// Issue summary embedded in a single-event response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventIssue {
    pub number: i64,
    #[serde(default)]
    pub assignee: Option<EventActor>,
}

/// A single event as returned by `GET /repos/{owner}/{repo}/issues/events/{id}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventDetail {
    #[serde(flatten)]
    pub event: RawEvent,
    #[serde(default)]
    pub issue: Option<EventIssue>,
}

impl EventDetail {
    /// Login of the issue's assignee at the time of the lookup.
    pub fn issue_assignee_login(&self) -> Option<&str> {
        self.issue
            .as_ref()
            .and_then(|issue| issue.assignee.as_ref())
            .map(|assignee| assignee.login.as_str())
    }
}
