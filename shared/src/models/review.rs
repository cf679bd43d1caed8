//! Task review models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Outcome of a post-hoc task review
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewResult {
    Pending,
    Confirmed,
    Rejected,
}

impl ReviewResult {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReviewResult::Pending => "pending",
            ReviewResult::Confirmed => "confirmed",
            ReviewResult::Rejected => "rejected",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(ReviewResult::Pending),
            "confirmed" => Some(ReviewResult::Confirmed),
            "rejected" => Some(ReviewResult::Rejected),
            _ => None,
        }
    }
}

/// Review record attached 1:1 to a completed preparation task
///
/// Lives outside the reservation lifecycle; confirming or rejecting a task
/// never touches lot quantities.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskReview {
    pub task_id: Uuid,
    pub reviewer_id: Uuid,
    pub result: ReviewResult,
    pub reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
