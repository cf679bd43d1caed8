//! HTTP handlers for preparation task endpoints

use axum::{
    extract::{Path, Query, State},
    Json,
};
use uuid::Uuid;

use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::services::preparation::{
    CreateTaskInput, PreparationService, TaskDetail, TaskFilter, UpdatePackedInput,
    UpdateTaskInput,
};
use crate::models::PreparationItem;
use crate::AppState;
use shared::{PaginatedResponse, Pagination};

/// Create a preparation task, reserving stock for every item
pub async fn create_task(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<CreateTaskInput>,
) -> AppResult<Json<TaskDetail>> {
    let service = PreparationService::new(state.db);
    let task = service
        .create_task(current_user.0.department_id, input)
        .await?;
    Ok(Json(task))
}

/// Update a preparation task (restore-then-reapply when items change)
pub async fn update_task(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(task_id): Path<Uuid>,
    Json(input): Json<UpdateTaskInput>,
) -> AppResult<Json<TaskDetail>> {
    let service = PreparationService::new(state.db);
    let task = service
        .update_task(current_user.0.department_id, task_id, input)
        .await?;
    Ok(Json(task))
}

/// Cancel a preparation task, repaying its reservations
pub async fn cancel_task(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(task_id): Path<Uuid>,
) -> AppResult<Json<TaskDetail>> {
    let service = PreparationService::new(state.db);
    let task = service
        .cancel_task(current_user.0.department_id, task_id)
        .await?;
    Ok(Json(task))
}

/// Record packed quantity and evidence for one item
pub async fn update_packed_quantity(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path((task_id, item_id)): Path<(Uuid, Uuid)>,
    Json(input): Json<UpdatePackedInput>,
) -> AppResult<Json<PreparationItem>> {
    let service = PreparationService::new(state.db);
    let item = service
        .update_packed_quantity(current_user.0.department_id, task_id, item_id, input)
        .await?;
    Ok(Json(item))
}

/// Get a task with its items and review
pub async fn get_task(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(task_id): Path<Uuid>,
) -> AppResult<Json<TaskDetail>> {
    let service = PreparationService::new(state.db);
    let task = service
        .get_task(current_user.0.department_id, task_id)
        .await?;
    Ok(Json(task))
}

/// List tasks for the department
pub async fn list_tasks(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(filter): Query<TaskFilter>,
    Query(pagination): Query<Pagination>,
) -> AppResult<Json<PaginatedResponse<TaskDetail>>> {
    let service = PreparationService::new(state.db);
    let tasks = service
        .list_tasks(current_user.0.department_id, filter, pagination)
        .await?;
    Ok(Json(tasks))
}
