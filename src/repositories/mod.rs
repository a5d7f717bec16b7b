//! # Repository Layer
//!
//! SeaORM access to the activity store.

pub mod activity;

pub use activity::{ActivityWriter, NewActivity, WriteOutcome};
