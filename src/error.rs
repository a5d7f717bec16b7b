//! # Error Handling
//!
//! Run-level errors of the ingester. Rate-limit halts and unknown event kinds
//! are reported through the run's terminal state, not through these.

use thiserror::Error;

use crate::config::ConfigError;
use crate::connectors::ConnectorError;

/// Errors that abort an ingestion run or prevent it from starting
#[derive(Debug, Error)]
pub enum IngestError {
    /// The activity store failed; records written before the failure stand
    #[error("activity store error: {0}")]
    Database(#[from] sea_orm::DbErr),

    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    /// The upstream client could not be constructed
    #[error("upstream client error: {0}")]
    Connector(#[from] ConnectorError),
}
