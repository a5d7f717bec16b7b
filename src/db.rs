//! Activity store connection.
//!
//! Opens the SeaORM pool the ingester writes through and brings the schema
//! up to date on request.

use anyhow::Result;
use migration::{Migrator, MigratorTrait};
use sea_orm::{ConnectOptions, Database, DatabaseConnection, DbErr};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{info, warn};

use crate::config::AppConfig;

/// Connection attempts before giving up on the store
const CONNECT_ATTEMPTS: u32 = 5;
const FIRST_RETRY_DELAY: Duration = Duration::from_millis(100);

/// Errors that can occur during database setup.
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("activity store unreachable after {attempts} attempts: {source}")]
    ConnectionFailed {
        attempts: u32,
        #[source]
        source: DbErr,
    },
    #[error("Invalid database configuration: {message}")]
    InvalidConfiguration { message: String },
}

/// Pool settings derived from configuration.
pub fn connect_options(cfg: &AppConfig) -> Result<ConnectOptions, DatabaseError> {
    let url = cfg.database_url.trim();
    if url.is_empty() {
        return Err(DatabaseError::InvalidConfiguration {
            message: "Database URL cannot be empty".to_string(),
        });
    }

    let mut opt = ConnectOptions::new(url.to_string());
    opt.max_connections(cfg.db_max_connections)
        .min_connections(1)
        .acquire_timeout(Duration::from_millis(cfg.db_acquire_timeout_ms))
        .idle_timeout(Duration::from_secs(60))
        .sqlx_logging(true)
        .sqlx_logging_level(log::LevelFilter::Debug);
    Ok(opt)
}

/// Opens the activity store, retrying with doubling delays.
///
/// # Examples
///
/// ```no_run
/// use activity_ingest::{config::AppConfig, db::init_pool};
///
/// #[tokio::main]
/// async fn main() -> anyhow::Result<()> {
///     let config = AppConfig::default();
///     let db = init_pool(&config).await?;
///     Ok(())
/// }
/// ```
pub async fn init_pool(cfg: &AppConfig) -> Result<DatabaseConnection> {
    let opt = connect_options(cfg)?;

    let mut delay = FIRST_RETRY_DELAY;
    let mut attempt = 1;
    loop {
        match Database::connect(opt.clone()).await {
            Ok(conn) => {
                info!(attempt, "Connected to activity store");
                return Ok(conn);
            }
            Err(source) if attempt >= CONNECT_ATTEMPTS => {
                return Err(DatabaseError::ConnectionFailed {
                    attempts: attempt,
                    source,
                }
                .into());
            }
            Err(err) => {
                warn!(attempt, error = %err, retry_in = ?delay, "Activity store not reachable yet");
                sleep(delay).await;
                delay *= 2;
                attempt += 1;
            }
        }
    }
}

/// Applies pending migrations.
pub async fn migrate(db: &DatabaseConnection) -> Result<()> {
    Migrator::up(db, None).await?;
    info!("Activity schema is up to date");
    Ok(())
}
