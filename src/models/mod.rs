//! # Data Models
//!
//! SeaORM entities and the upstream event shapes consumed by the ingester.

pub mod activity;
pub mod event;

pub use activity::Entity as Activity;
pub use event::{EventActor, EventDetail, EventIssue, RawEvent};
