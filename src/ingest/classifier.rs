//! Upstream event kind to normalized action mapping.

use serde::Serialize;

use crate::models::RawEvent;

/// Normalized action tag stored with each activity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityAction {
    Reference,
    Close,
    Reopen,
    Assign,
    Merge,
    HeadRefDeleted,
    HeadRefRestored,
}

impl ActivityAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityAction::Reference => "reference",
            ActivityAction::Close => "close",
            ActivityAction::Reopen => "reopen",
            ActivityAction::Assign => "assign",
            ActivityAction::Merge => "merge",
            ActivityAction::HeadRefDeleted => "head_ref_deleted",
            ActivityAction::HeadRefRestored => "head_ref_restored",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    Action(ActivityAction),
    /// Known kind that carries no activity worth storing
    Ignore,
    /// Kind this ingester has no mapping for
    Unknown(String),
}

pub fn classify(event: &RawEvent) -> Classification {
    classify_kind(&event.kind)
}

pub fn classify_kind(kind: &str) -> Classification {
    let action = match kind {
        "referenced" => ActivityAction::Reference,
        "closed" => ActivityAction::Close,
        "reopened" => ActivityAction::Reopen,
        "assigned" => ActivityAction::Assign,
        "merged" => ActivityAction::Merge,
        "head_ref_deleted" => ActivityAction::HeadRefDeleted,
        "head_ref_restored" => ActivityAction::HeadRefRestored,
        "mentioned" | "subscribed" | "unsubscribed" => return Classification::Ignore,
        other => return Classification::Unknown(other.to_string()),
    };
    Classification::Action(action)
}
