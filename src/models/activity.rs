//! Activity entity model
//!
//! This module contains the SeaORM entity model for the activities table,
//! which stores normalized issue events ingested from the upstream tracker.

use sea_orm::ActiveModelBehavior;
use sea_orm::entity::prelude::*;
use sea_orm::prelude::DateTimeWithTimeZone;
use serde::Serialize;
use uuid::Uuid;

/// Activity entity representing one normalized upstream issue event
#[derive(Clone, Debug, PartialEq, Eq, Serialize, DeriveEntityModel)]
#[sea_orm(table_name = "activities")]
pub struct Model {
    /// Row identity; kept stable across forced overwrites
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    /// Upstream event id (unique together with `project_id`)
    pub remote_event_id: i64,

    /// Local project the event belongs to
    pub project_id: i64,

    /// Issue number within the upstream repository
    pub issue_number: i64,

    /// Login of the user who triggered the event
    pub actor: String,

    /// Normalized action tag (e.g. close, reopen, assign)
    pub action: String,

    /// Timestamp when the event occurred upstream
    pub created_at: DateTimeWithTimeZone,

    /// Rendered description, if any
    pub text: Option<String>,

    /// Raw description text
    pub text_raw: Option<String>,

    /// Timestamp when the row was first stored
    pub inserted_at: DateTimeWithTimeZone,

    /// Timestamp of the last write to the row
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
