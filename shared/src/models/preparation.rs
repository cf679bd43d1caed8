//! Preparation task and item models
//!
//! A preparation task is a picking assignment fulfilling part of one sales
//! order. Each of its items reserves a quantity against a specific inventory
//! lot on behalf of a specific order line.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Status of a preparation task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    InProgress,
    Completed,
    Cancelled,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Completed => "completed",
            TaskStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(TaskStatus::Pending),
            "in_progress" => Some(TaskStatus::InProgress),
            "completed" => Some(TaskStatus::Completed),
            "cancelled" => Some(TaskStatus::Cancelled),
            _ => None,
        }
    }

    /// Terminal statuses admit no further transition
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Cancelled)
    }

    /// Valid transitions: pending -> in_progress -> completed, with
    /// cancelled reachable from any non-terminal status.
    pub fn can_transition_to(&self, next: TaskStatus) -> bool {
        if *self == next {
            return !self.is_terminal();
        }
        match (*self, next) {
            (TaskStatus::Pending, TaskStatus::InProgress) => true,
            (TaskStatus::InProgress, TaskStatus::Completed) => true,
            (from, TaskStatus::Cancelled) => !from.is_terminal(),
            _ => false,
        }
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A preparation (picking) task for one sales order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreparationTask {
    pub id: Uuid,
    pub department_id: Uuid,
    pub order_id: Uuid,
    pub supervisor_id: Uuid,
    pub packer_id: Uuid,
    pub status: TaskStatus,
    pub deadline: DateTime<Utc>,
    pub note: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One reserved line within a preparation task
///
/// `requested_quantity` has already been subtracted from the referenced
/// lot's quantity on hand; removing the item or cancelling the task must
/// add it back.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreparationItem {
    pub id: Uuid,
    pub task_id: Uuid,
    pub order_item_id: Uuid,
    pub lot_id: Uuid,
    /// Quantity reserved (debited from the lot) when the item was created
    pub requested_quantity: Decimal,
    /// Quantity actually packed, recorded by the packer; 0 until updated
    pub packed_quantity: Decimal,
    pub pre_evidence_url: Option<String>,
    pub post_evidence_url: Option<String>,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trip() {
        for s in [
            TaskStatus::Pending,
            TaskStatus::InProgress,
            TaskStatus::Completed,
            TaskStatus::Cancelled,
        ] {
            assert_eq!(TaskStatus::parse(s.as_str()), Some(s));
        }
        assert_eq!(TaskStatus::parse("done"), None);
    }

    #[test]
    fn test_forward_transitions() {
        assert!(TaskStatus::Pending.can_transition_to(TaskStatus::InProgress));
        assert!(TaskStatus::InProgress.can_transition_to(TaskStatus::Completed));
    }

    #[test]
    fn test_cancel_from_non_terminal_only() {
        assert!(TaskStatus::Pending.can_transition_to(TaskStatus::Cancelled));
        assert!(TaskStatus::InProgress.can_transition_to(TaskStatus::Cancelled));
        assert!(!TaskStatus::Completed.can_transition_to(TaskStatus::Cancelled));
        assert!(!TaskStatus::Cancelled.can_transition_to(TaskStatus::Cancelled));
    }

    #[test]
    fn test_no_backward_or_skipping_transitions() {
        assert!(!TaskStatus::Pending.can_transition_to(TaskStatus::Completed));
        assert!(!TaskStatus::InProgress.can_transition_to(TaskStatus::Pending));
        assert!(!TaskStatus::Completed.can_transition_to(TaskStatus::InProgress));
        assert!(!TaskStatus::Cancelled.can_transition_to(TaskStatus::Pending));
    }
}
