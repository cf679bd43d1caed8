//! HTTP handlers for task review endpoints

use axum::{
    extract::{Path, State},
    Json,
};
use uuid::Uuid;

use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::services::review::{ReviewService, UpdateReviewInput};
use crate::models::TaskReview;
use crate::AppState;

/// Get the review of a task
pub async fn get_review(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(task_id): Path<Uuid>,
) -> AppResult<Json<TaskReview>> {
    let service = ReviewService::new(state.db);
    let review = service
        .get_review(current_user.0.department_id, task_id)
        .await?;
    Ok(Json(review))
}

/// Record or update the review outcome of a completed task
pub async fn update_review(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(task_id): Path<Uuid>,
    Json(input): Json<UpdateReviewInput>,
) -> AppResult<Json<TaskReview>> {
    let service = ReviewService::new(state.db);
    let review = service
        .update_review(
            current_user.0.department_id,
            current_user.0.user_id,
            task_id,
            input,
        )
        .await?;
    Ok(Json(review))
}
