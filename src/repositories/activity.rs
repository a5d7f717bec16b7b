//! Activity writer for database operations
//!
//! Persists normalized activities keyed by (remote_event_id, project_id). The
//! UNIQUE index on that pair is the only dedup mechanism: inserts use
//! `ON CONFLICT DO NOTHING`, so concurrent writers cannot create duplicates.

use chrono::{DateTime, Utc};
use sea_orm::sea_query::{Expr, OnConflict};
use sea_orm::{
    ColumnTrait, DatabaseConnection, DbErr, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
    Set,
};
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

use crate::models::activity::{self, Entity as Activity};

/// A normalized activity ready to be stored
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewActivity {
    pub remote_event_id: i64,
    pub project_id: i64,
    pub issue_number: i64,
    pub actor: String,
    pub action: String,
    pub created_at: DateTime<Utc>,
    pub text: Option<String>,
    pub text_raw: Option<String>,
}

/// What a single write did to the store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    Inserted,
    /// The key already existed and force was off
    Skipped,
    /// The key already existed and its content was replaced in place
    Overwritten,
}

impl WriteOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            WriteOutcome::Inserted => "inserted",
            WriteOutcome::Skipped => "skipped",
            WriteOutcome::Overwritten => "overwritten",
        }
    }
}

/// Idempotent writer for the activities table
#[derive(Debug, Clone)]
pub struct ActivityWriter {
    /// Database connection pool
    pub db: Arc<DatabaseConnection>,
}

impl ActivityWriter {
    /// Creates a new ActivityWriter instance
    ///
    /// # Arguments
    ///
    /// * `db` - Database connection pool
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Stores an activity unless one with the same key exists.
    ///
    /// # Arguments
    ///
    /// * `activity` - The normalized activity
    /// * `force` - Overwrite an existing row's content instead of skipping it
    ///
    /// # Returns
    ///
    /// Returns the outcome of the write. An existing key is never an error.
    pub async fn write(&self, activity: &NewActivity, force: bool) -> Result<WriteOutcome, DbErr> {
        if self.insert_if_absent(activity).await? {
            return Ok(WriteOutcome::Inserted);
        }

        if !force {
            debug!(
                remote_event_id = activity.remote_event_id,
                project_id = activity.project_id,
                "Activity already stored; skipping"
            );
            return Ok(WriteOutcome::Skipped);
        }

        let now = Utc::now().fixed_offset();
        let updated = Activity::update_many()
            .col_expr(activity::Column::IssueNumber, Expr::value(activity.issue_number))
            .col_expr(activity::Column::Actor, Expr::value(activity.actor.clone()))
            .col_expr(activity::Column::Action, Expr::value(activity.action.clone()))
            .col_expr(
                activity::Column::CreatedAt,
                Expr::value(activity.created_at.fixed_offset()),
            )
            .col_expr(activity::Column::Text, Expr::value(activity.text.clone()))
            .col_expr(activity::Column::TextRaw, Expr::value(activity.text_raw.clone()))
            .col_expr(activity::Column::UpdatedAt, Expr::value(now))
            .filter(activity::Column::RemoteEventId.eq(activity.remote_event_id))
            .filter(activity::Column::ProjectId.eq(activity.project_id))
            .exec(&*self.db)
            .await?;

        if updated.rows_affected == 0 {
            // Row was removed between the conflicting insert and the update
            return Ok(if self.insert_if_absent(activity).await? {
                WriteOutcome::Inserted
            } else {
                WriteOutcome::Skipped
            });
        }

        Ok(WriteOutcome::Overwritten)
    }

    /// Finds the stored activity for an upstream event in a project
    ///
    /// # Arguments
    ///
    /// * `remote_event_id` - Upstream event id
    /// * `project_id` - Local project id
    pub async fn find_by_remote_event(
        &self,
        remote_event_id: i64,
        project_id: i64,
    ) -> Result<Option<activity::Model>, DbErr> {
        Activity::find()
            .filter(activity::Column::RemoteEventId.eq(remote_event_id))
            .filter(activity::Column::ProjectId.eq(project_id))
            .one(&*self.db)
            .await
    }

    /// Lists an issue's activities, oldest first
    pub async fn list_for_issue(
        &self,
        project_id: i64,
        issue_number: i64,
    ) -> Result<Vec<activity::Model>, DbErr> {
        Activity::find()
            .filter(activity::Column::ProjectId.eq(project_id))
            .filter(activity::Column::IssueNumber.eq(issue_number))
            .order_by_asc(activity::Column::CreatedAt)
            .order_by_asc(activity::Column::RemoteEventId)
            .all(&*self.db)
            .await
    }

    pub async fn count_for_project(&self, project_id: i64) -> Result<u64, DbErr> {
        Activity::find()
            .filter(activity::Column::ProjectId.eq(project_id))
            .count(&*self.db)
            .await
    }

    /// Returns true when a new row was stored.
    async fn insert_if_absent(&self, activity: &NewActivity) -> Result<bool, DbErr> {
        let now = Utc::now().fixed_offset();
        let model = activity::ActiveModel {
            id: Set(Uuid::new_v4()),
            remote_event_id: Set(activity.remote_event_id),
            project_id: Set(activity.project_id),
            issue_number: Set(activity.issue_number),
            actor: Set(activity.actor.clone()),
            action: Set(activity.action.clone()),
            created_at: Set(activity.created_at.fixed_offset()),
            text: Set(activity.text.clone()),
            text_raw: Set(activity.text_raw.clone()),
            inserted_at: Set(now),
            updated_at: Set(now),
        };

        let rows = Activity::insert(model)
            .on_conflict(
                OnConflict::columns([
                    activity::Column::RemoteEventId,
                    activity::Column::ProjectId,
                ])
                .do_nothing()
                .to_owned(),
            )
            .exec_without_returning(&*self.db)
            .await?;

        Ok(rows == 1)
    }
}
