//! Migration to create the activities table.
//!
//! Each row is one normalized issue event pulled from the upstream tracker.
//! The pair (remote_event_id, project_id) is unique so that concurrent
//! ingestion runs cannot insert the same event twice.

use sea_orm_migration::prelude::*;
use sea_orm_migration::sea_orm::Statement;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Activities::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Activities::Id).uuid().not_null().primary_key())
                    .col(
                        ColumnDef::new(Activities::RemoteEventId)
                            .big_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Activities::ProjectId).big_integer().not_null())
                    .col(
                        ColumnDef::new(Activities::IssueNumber)
                            .big_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Activities::Actor).text().not_null())
                    .col(ColumnDef::new(Activities::Action).text().not_null())
                    .col(
                        ColumnDef::new(Activities::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Activities::Text).text().null())
                    .col(ColumnDef::new(Activities::TextRaw).text().null())
                    .col(
                        ColumnDef::new(Activities::InsertedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(Activities::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        // Dedup key: ON CONFLICT targets this index.
        manager
            .create_index(
                Index::create()
                    .name("idx_activities_remote_event_project")
                    .table(Activities::Table)
                    .col(Activities::RemoteEventId)
                    .col(Activities::ProjectId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        // Per-issue timeline reads ordered by event time
        manager
            .get_connection()
            .execute(Statement::from_string(
                manager.get_database_backend(),
                "CREATE INDEX IF NOT EXISTS idx_activities_project_issue_created ON activities (project_id, issue_number, created_at)".to_string(),
            ))
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(
                Index::drop()
                    .name("idx_activities_project_issue_created")
                    .to_owned(),
            )
            .await?;

        manager
            .drop_index(
                Index::drop()
                    .name("idx_activities_remote_event_project")
                    .to_owned(),
            )
            .await?;

        manager
            .drop_table(Table::drop().table(Activities::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Activities {
    Table,
    Id,
    RemoteEventId,
    ProjectId,
    IssueNumber,
    Actor,
    Action,
    CreatedAt,
    Text,
    TextRaw,
    InsertedAt,
    UpdatedAt,
}
