//! Task review service
//!
//! Reviews are a post-hoc outcome record attached 1:1 to a completed task.
//! They live outside the reservation lifecycle: confirming or rejecting a
//! task never touches lot quantities.

use sqlx::PgPool;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use serde::Deserialize;
use shared::{ReviewResult, TaskReview, TaskStatus};

/// Review service for recording task outcomes
#[derive(Clone)]
pub struct ReviewService {
    db: PgPool,
}

/// Input for recording or updating a review
#[derive(Debug, Deserialize)]
pub struct UpdateReviewInput {
    pub result: ReviewResult,
    pub reason: Option<String>,
}

/// Row for review queries
#[derive(Debug, sqlx::FromRow)]
struct ReviewRow {
    task_id: Uuid,
    reviewer_id: Uuid,
    result: String,
    reason: Option<String>,
    created_at: chrono::DateTime<chrono::Utc>,
    updated_at: chrono::DateTime<chrono::Utc>,
}

impl ReviewRow {
    fn into_review(self) -> AppResult<TaskReview> {
        let result = ReviewResult::parse(&self.result)
            .ok_or_else(|| AppError::Internal(format!("Unknown review result: {}", self.result)))?;

        Ok(TaskReview {
            task_id: self.task_id,
            reviewer_id: self.reviewer_id,
            result,
            reason: self.reason,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

impl ReviewService {
    /// Create a new ReviewService instance
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Get the review of a task
    pub async fn get_review(&self, department_id: Uuid, task_id: Uuid) -> AppResult<TaskReview> {
        let row = sqlx::query_as::<_, ReviewRow>(
            r#"
            SELECT r.task_id, r.reviewer_id, r.result, r.reason, r.created_at, r.updated_at
            FROM task_reviews r
            JOIN preparation_tasks t ON t.id = r.task_id
            WHERE r.task_id = $1 AND t.department_id = $2
            "#,
        )
        .bind(task_id)
        .bind(department_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Review".to_string()))?;

        row.into_review()
    }

    /// Record or update the review outcome of a completed task
    pub async fn update_review(
        &self,
        department_id: Uuid,
        reviewer_id: Uuid,
        task_id: Uuid,
        input: UpdateReviewInput,
    ) -> AppResult<TaskReview> {
        let status = sqlx::query_scalar::<_, String>(
            "SELECT status FROM preparation_tasks WHERE id = $1 AND department_id = $2",
        )
        .bind(task_id)
        .bind(department_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Preparation task".to_string()))?;

        if TaskStatus::parse(&status) != Some(TaskStatus::Completed) {
            return Err(AppError::InvalidStateTransition(format!(
                "Only completed tasks can be reviewed, task is {}",
                status
            )));
        }

        let row = sqlx::query_as::<_, ReviewRow>(
            r#"
            INSERT INTO task_reviews (task_id, reviewer_id, result, reason)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (task_id)
            DO UPDATE SET reviewer_id = $2, result = $3, reason = $4, updated_at = NOW()
            RETURNING task_id, reviewer_id, result, reason, created_at, updated_at
            "#,
        )
        .bind(task_id)
        .bind(reviewer_id)
        .bind(input.result.as_str())
        .bind(&input.reason)
        .fetch_one(&self.db)
        .await?;

        row.into_review()
    }
}
