//! # Activity Ingest Library
//!
//! Ingests issue events from GitHub into a local activity store without
//! duplicates and within the upstream rate budget.

pub mod config;
pub mod connectors;
pub mod db;
pub mod error;
pub mod ingest;
pub mod models;
pub mod repositories;
pub mod telemetry;
pub use migration;
