//! Preparation task orchestration
//!
//! Use-case layer for preparation (picking) tasks. Each operation owns one
//! transaction: create reserves stock for every item or persists nothing;
//! update compensates the old reservation in full and reapplies the new
//! item list ("restore then reapply"); cancel compensates and keeps the
//! items as a historical record. Packer-level item updates never touch the
//! stock ledger.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::services::order;
use crate::services::reservation::{self, ReservationRequest};
use shared::validation::{
    validate_deadline, validate_packed_quantity, validate_positive_quantity,
    validate_status_transition,
};
use shared::{
    PaginatedResponse, Pagination, PaginationMeta, PreparationItem, PreparationTask, ReviewResult,
    TaskReview, TaskStatus,
};

/// Preparation service orchestrating tasks, items and stock reservations
#[derive(Clone)]
pub struct PreparationService {
    db: PgPool,
}

/// One requested item line of a task payload
#[derive(Debug, Clone, Deserialize)]
pub struct TaskItemInput {
    pub order_item_id: Uuid,
    pub lot_id: Uuid,
    pub quantity: Decimal,
    pub note: Option<String>,
}

/// Input for creating a preparation task
#[derive(Debug, Deserialize)]
pub struct CreateTaskInput {
    pub order_id: Uuid,
    pub supervisor_id: Uuid,
    pub packer_id: Uuid,
    pub deadline: DateTime<Utc>,
    pub note: Option<String>,
    pub items: Vec<TaskItemInput>,
}

/// Typed patch for updating a preparation task
///
/// Every scalar field is optional; absent fields keep their stored value.
/// When `items` is supplied the existing items are fully compensated and
/// replaced by the new list.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateTaskInput {
    pub supervisor_id: Option<Uuid>,
    pub packer_id: Option<Uuid>,
    pub status: Option<TaskStatus>,
    pub deadline: Option<DateTime<Utc>>,
    pub note: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub items: Option<Vec<TaskItemInput>>,
}

/// Input for the packer-level item update
#[derive(Debug, Deserialize)]
pub struct UpdatePackedInput {
    pub packed_quantity: Option<Decimal>,
    pub pre_evidence_url: Option<String>,
    pub post_evidence_url: Option<String>,
}

/// Filter for task listing
#[derive(Debug, Default, Deserialize)]
pub struct TaskFilter {
    pub status: Option<TaskStatus>,
    pub packer_id: Option<Uuid>,
    pub order_id: Option<Uuid>,
}

/// Task with items and review expanded for display
#[derive(Debug, Clone, Serialize)]
pub struct TaskDetail {
    #[serde(flatten)]
    pub task: PreparationTask,
    pub items: Vec<TaskItemDetail>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub review: Option<TaskReview>,
}

/// Item with lot/product display fields joined in
#[derive(Debug, Clone, Serialize)]
pub struct TaskItemDetail {
    #[serde(flatten)]
    pub item: PreparationItem,
    pub lot_number: String,
    pub product_name: String,
    pub product_sku: String,
}

/// Row for task queries
#[derive(Debug, sqlx::FromRow)]
struct TaskRow {
    id: Uuid,
    department_id: Uuid,
    order_id: Uuid,
    supervisor_id: Uuid,
    packer_id: Uuid,
    status: String,
    deadline: DateTime<Utc>,
    note: Option<String>,
    started_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TaskRow {
    fn into_task(self) -> AppResult<PreparationTask> {
        let status = TaskStatus::parse(&self.status)
            .ok_or_else(|| AppError::Internal(format!("Unknown task status: {}", self.status)))?;

        Ok(PreparationTask {
            id: self.id,
            department_id: self.department_id,
            order_id: self.order_id,
            supervisor_id: self.supervisor_id,
            packer_id: self.packer_id,
            status,
            deadline: self.deadline,
            note: self.note,
            started_at: self.started_at,
            completed_at: self.completed_at,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

/// Row for item queries with display joins
#[derive(Debug, sqlx::FromRow)]
struct ItemDetailRow {
    id: Uuid,
    task_id: Uuid,
    order_item_id: Uuid,
    lot_id: Uuid,
    requested_quantity: Decimal,
    packed_quantity: Decimal,
    pre_evidence_url: Option<String>,
    post_evidence_url: Option<String>,
    note: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    lot_number: String,
    product_name: String,
    product_sku: String,
}

impl From<ItemDetailRow> for TaskItemDetail {
    fn from(row: ItemDetailRow) -> Self {
        TaskItemDetail {
            item: PreparationItem {
                id: row.id,
                task_id: row.task_id,
                order_item_id: row.order_item_id,
                lot_id: row.lot_id,
                requested_quantity: row.requested_quantity,
                packed_quantity: row.packed_quantity,
                pre_evidence_url: row.pre_evidence_url,
                post_evidence_url: row.post_evidence_url,
                note: row.note,
                created_at: row.created_at,
                updated_at: row.updated_at,
            },
            lot_number: row.lot_number,
            product_name: row.product_name,
            product_sku: row.product_sku,
        }
    }
}

/// Row for reservation state of existing items
#[derive(Debug, sqlx::FromRow)]
struct ReservedItemRow {
    order_item_id: Uuid,
    lot_id: Uuid,
    requested_quantity: Decimal,
}

/// Row for review queries
#[derive(Debug, sqlx::FromRow)]
struct ReviewRow {
    task_id: Uuid,
    reviewer_id: Uuid,
    result: String,
    reason: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
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

const TASK_COLUMNS: &str = "id, department_id, order_id, supervisor_id, packer_id, status, \
     deadline, note, started_at, completed_at, created_at, updated_at";

impl PreparationService {
    /// Create a new PreparationService instance
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Create a task and reserve stock for every item
    ///
    /// Any reservation failure aborts the whole create, task row included;
    /// a task is never persisted half-reserved.
    pub async fn create_task(
        &self,
        department_id: Uuid,
        input: CreateTaskInput,
    ) -> AppResult<TaskDetail> {
        validate_items(&input.items)?;
        if validate_deadline(input.deadline, Utc::now()).is_err() {
            return Err(AppError::Validation {
                field: "deadline".to_string(),
                message: "Deadline must be in the future".to_string(),
                message_th: "กำหนดส่งต้องเป็นเวลาในอนาคต".to_string(),
            });
        }

        let mut tx = self.db.begin().await?;

        order::ensure_order_exists(&mut tx, department_id, input.order_id).await?;

        let order_item_ids: Vec<Uuid> = input.items.iter().map(|i| i.order_item_id).collect();
        if !order_item_ids.is_empty() {
            order::ensure_items_belong_to_order(&mut tx, input.order_id, &order_item_ids).await?;
        }

        let task_id = sqlx::query_scalar::<_, Uuid>(
            r#"
            INSERT INTO preparation_tasks (department_id, order_id, supervisor_id, packer_id, status, deadline, note)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id
            "#,
        )
        .bind(department_id)
        .bind(input.order_id)
        .bind(input.supervisor_id)
        .bind(input.packer_id)
        .bind(TaskStatus::Pending.as_str())
        .bind(input.deadline)
        .bind(&input.note)
        .fetch_one(&mut *tx)
        .await?;

        apply_items(&mut tx, department_id, task_id, &input.items).await?;

        tx.commit().await?;

        tracing::info!(task_id = %task_id, items = input.items.len(), "Preparation task created");

        self.get_task(department_id, task_id).await
    }

    /// Update a task: compensate every existing item, then reapply
    ///
    /// Recomputing a per-line diff would be more code and more failure
    /// modes; inside one transaction, undo-everything-redo-everything is
    /// just as atomic. An update therefore touches every lot the task
    /// references, which is acceptable at the item counts tasks carry.
    pub async fn update_task(
        &self,
        department_id: Uuid,
        task_id: Uuid,
        input: UpdateTaskInput,
    ) -> AppResult<TaskDetail> {
        let mut tx = self.db.begin().await?;

        let row = lock_task(&mut tx, department_id, task_id).await?;
        let current = row.into_task()?;

        if current.status.is_terminal() {
            return Err(AppError::InvalidStateTransition(format!(
                "Task is {} and can no longer be updated",
                current.status
            )));
        }

        // Cancelling must repay the task's reservations; only cancel_task
        // does that, so the update path refuses the cancelled status.
        let status = match input.status {
            Some(TaskStatus::Cancelled) => {
                return Err(AppError::InvalidStateTransition(
                    "Tasks are cancelled through the cancel operation".to_string(),
                ));
            }
            Some(next) => {
                if validate_status_transition(current.status, next).is_err() {
                    return Err(AppError::InvalidStateTransition(format!(
                        "Cannot move task from {} to {}",
                        current.status, next
                    )));
                }
                next
            }
            None => current.status,
        };

        if let Some(deadline) = input.deadline {
            if validate_deadline(deadline, Utc::now()).is_err() {
                return Err(AppError::Validation {
                    field: "deadline".to_string(),
                    message: "Deadline must be in the future".to_string(),
                    message_th: "กำหนดส่งต้องเป็นเวลาในอนาคต".to_string(),
                });
            }
        }

        // Exhaustive typed patch; absent fields keep their stored value
        let supervisor_id = input.supervisor_id.unwrap_or(current.supervisor_id);
        let packer_id = input.packer_id.unwrap_or(current.packer_id);
        let deadline = input.deadline.unwrap_or(current.deadline);
        let note = input.note.or(current.note);
        let started_at = match (input.started_at, current.started_at) {
            (Some(supplied), _) => Some(supplied),
            (None, Some(existing)) => Some(existing),
            (None, None) if status == TaskStatus::InProgress => Some(Utc::now()),
            (None, None) => None,
        };
        let completed_at = match (input.completed_at, current.completed_at) {
            (Some(supplied), _) => Some(supplied),
            (None, Some(existing)) => Some(existing),
            (None, None) if status == TaskStatus::Completed => Some(Utc::now()),
            (None, None) => None,
        };

        if let Some(new_items) = &input.items {
            validate_items(new_items)?;

            restore_items(&mut tx, task_id).await?;

            sqlx::query("DELETE FROM preparation_items WHERE task_id = $1")
                .bind(task_id)
                .execute(&mut *tx)
                .await?;

            let order_item_ids: Vec<Uuid> = new_items.iter().map(|i| i.order_item_id).collect();
            if !order_item_ids.is_empty() {
                order::ensure_items_belong_to_order(&mut tx, current.order_id, &order_item_ids)
                    .await?;
            }

            apply_items(&mut tx, department_id, task_id, new_items).await?;
        }

        sqlx::query(
            r#"
            UPDATE preparation_tasks
            SET supervisor_id = $1, packer_id = $2, status = $3, deadline = $4, note = $5,
                started_at = $6, completed_at = $7, updated_at = NOW()
            WHERE id = $8
            "#,
        )
        .bind(supervisor_id)
        .bind(packer_id)
        .bind(status.as_str())
        .bind(deadline)
        .bind(&note)
        .bind(started_at)
        .bind(completed_at)
        .bind(task_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::info!(task_id = %task_id, status = %status, "Preparation task updated");

        self.get_task(department_id, task_id).await
    }

    /// Cancel a task, repaying every reservation debt
    ///
    /// Each item's quantity goes back onto its lot and onto its order
    /// line's outstanding quantity, so the line becomes eligible for
    /// re-preparation. Items are kept as a record of what was reserved.
    pub async fn cancel_task(&self, department_id: Uuid, task_id: Uuid) -> AppResult<TaskDetail> {
        let mut tx = self.db.begin().await?;

        let row = lock_task(&mut tx, department_id, task_id).await?;
        let current = row.into_task()?;

        if current.status == TaskStatus::Cancelled {
            return Err(AppError::InvalidStateTransition(
                "Task is already cancelled".to_string(),
            ));
        }
        if !current.status.can_transition_to(TaskStatus::Cancelled) {
            return Err(AppError::InvalidStateTransition(format!(
                "Cannot cancel a {} task",
                current.status
            )));
        }

        restore_items(&mut tx, task_id).await?;

        sqlx::query(
            "UPDATE preparation_tasks SET status = $1, updated_at = NOW() WHERE id = $2",
        )
        .bind(TaskStatus::Cancelled.as_str())
        .bind(task_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::info!(task_id = %task_id, "Preparation task cancelled");

        self.get_task(department_id, task_id).await
    }

    /// Record the packed quantity and evidence for one item
    ///
    /// Restricted to exactly these fields; the reservation and the lot's
    /// quantity on hand are never touched, so concurrent updates on
    /// different items of the same task are safe.
    pub async fn update_packed_quantity(
        &self,
        department_id: Uuid,
        task_id: Uuid,
        item_id: Uuid,
        input: UpdatePackedInput,
    ) -> AppResult<PreparationItem> {
        if let Some(packed) = input.packed_quantity {
            if validate_packed_quantity(packed).is_err() {
                return Err(AppError::Validation {
                    field: "packed_quantity".to_string(),
                    message: "Packed quantity cannot be negative".to_string(),
                    message_th: "ปริมาณที่แพ็คต้องไม่เป็นค่าลบ".to_string(),
                });
            }
        }

        let row = sqlx::query_as::<_, ItemDetailRow>(
            r#"
            UPDATE preparation_items pi
            SET packed_quantity = COALESCE($1, pi.packed_quantity),
                pre_evidence_url = COALESCE($2, pi.pre_evidence_url),
                post_evidence_url = COALESCE($3, pi.post_evidence_url),
                updated_at = NOW()
            FROM preparation_tasks t, lots l, products p
            WHERE pi.id = $4 AND pi.task_id = $5
              AND t.id = pi.task_id AND t.department_id = $6
              AND l.id = pi.lot_id AND p.id = l.product_id
            RETURNING pi.id, pi.task_id, pi.order_item_id, pi.lot_id, pi.requested_quantity,
                      pi.packed_quantity, pi.pre_evidence_url, pi.post_evidence_url, pi.note,
                      pi.created_at, pi.updated_at,
                      l.lot_number, p.name AS product_name, p.sku AS product_sku
            "#,
        )
        .bind(input.packed_quantity)
        .bind(&input.pre_evidence_url)
        .bind(&input.post_evidence_url)
        .bind(item_id)
        .bind(task_id)
        .bind(department_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Preparation item".to_string()))?;

        Ok(TaskItemDetail::from(row).item)
    }

    /// Get a task with its items and review
    pub async fn get_task(&self, department_id: Uuid, task_id: Uuid) -> AppResult<TaskDetail> {
        let row = sqlx::query_as::<_, TaskRow>(&format!(
            "SELECT {} FROM preparation_tasks WHERE id = $1 AND department_id = $2",
            TASK_COLUMNS
        ))
        .bind(task_id)
        .bind(department_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Preparation task".to_string()))?;

        let task = row.into_task()?;
        let items = self.fetch_items(task_id).await?;
        let review = self.fetch_review(task_id).await?;

        Ok(TaskDetail {
            task,
            items,
            review,
        })
    }

    /// List tasks for a department, newest first
    pub async fn list_tasks(
        &self,
        department_id: Uuid,
        filter: TaskFilter,
        pagination: Pagination,
    ) -> AppResult<PaginatedResponse<TaskDetail>> {
        let total = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*)
            FROM preparation_tasks
            WHERE department_id = $1
              AND ($2::text IS NULL OR status = $2)
              AND ($3::uuid IS NULL OR packer_id = $3)
              AND ($4::uuid IS NULL OR order_id = $4)
            "#,
        )
        .bind(department_id)
        .bind(filter.status.map(|s| s.as_str()))
        .bind(filter.packer_id)
        .bind(filter.order_id)
        .fetch_one(&self.db)
        .await?;

        let rows = sqlx::query_as::<_, TaskRow>(&format!(
            r#"
            SELECT {}
            FROM preparation_tasks
            WHERE department_id = $1
              AND ($2::text IS NULL OR status = $2)
              AND ($3::uuid IS NULL OR packer_id = $3)
              AND ($4::uuid IS NULL OR order_id = $4)
            ORDER BY created_at DESC
            LIMIT $5 OFFSET $6
            "#,
            TASK_COLUMNS
        ))
        .bind(department_id)
        .bind(filter.status.map(|s| s.as_str()))
        .bind(filter.packer_id)
        .bind(filter.order_id)
        .bind(pagination.limit())
        .bind(pagination.offset())
        .fetch_all(&self.db)
        .await?;

        let mut details = Vec::with_capacity(rows.len());
        for row in rows {
            let task = row.into_task()?;
            let items = self.fetch_items(task.id).await?;
            let review = self.fetch_review(task.id).await?;
            details.push(TaskDetail {
                task,
                items,
                review,
            });
        }

        Ok(PaginatedResponse {
            data: details,
            pagination: PaginationMeta::new(&pagination, total as u64),
        })
    }

    /// Fetch a task's items with display joins
    async fn fetch_items(&self, task_id: Uuid) -> AppResult<Vec<TaskItemDetail>> {
        let rows = sqlx::query_as::<_, ItemDetailRow>(
            r#"
            SELECT pi.id, pi.task_id, pi.order_item_id, pi.lot_id, pi.requested_quantity,
                   pi.packed_quantity, pi.pre_evidence_url, pi.post_evidence_url, pi.note,
                   pi.created_at, pi.updated_at,
                   l.lot_number, p.name AS product_name, p.sku AS product_sku
            FROM preparation_items pi
            JOIN lots l ON l.id = pi.lot_id
            JOIN products p ON p.id = l.product_id
            WHERE pi.task_id = $1
            ORDER BY pi.created_at
            "#,
        )
        .bind(task_id)
        .fetch_all(&self.db)
        .await?;

        Ok(rows.into_iter().map(|r| r.into()).collect())
    }

    /// Fetch a task's review, if one has been recorded
    async fn fetch_review(&self, task_id: Uuid) -> AppResult<Option<TaskReview>> {
        let row = sqlx::query_as::<_, ReviewRow>(
            r#"
            SELECT task_id, reviewer_id, result, reason, created_at, updated_at
            FROM task_reviews
            WHERE task_id = $1
            "#,
        )
        .bind(task_id)
        .fetch_optional(&self.db)
        .await?;

        row.map(|r| r.into_review()).transpose()
    }
}

/// Lock a task row for the duration of the transaction
async fn lock_task(
    conn: &mut PgConnection,
    department_id: Uuid,
    task_id: Uuid,
) -> AppResult<TaskRow> {
    sqlx::query_as::<_, TaskRow>(&format!(
        "SELECT {} FROM preparation_tasks WHERE id = $1 AND department_id = $2 FOR UPDATE",
        TASK_COLUMNS
    ))
    .bind(task_id)
    .bind(department_id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| AppError::NotFound("Preparation task".to_string()))
}

/// Validate item payloads before touching any stock
fn validate_items(items: &[TaskItemInput]) -> AppResult<()> {
    for item in items {
        if validate_positive_quantity(item.quantity).is_err() {
            return Err(AppError::Validation {
                field: "items.quantity".to_string(),
                message: "Requested quantity must be positive".to_string(),
                message_th: "ปริมาณต้องเป็นค่าบวก".to_string(),
            });
        }
    }
    Ok(())
}

/// Reserve stock and order-line outstanding quantity for new items, then
/// insert the item rows
///
/// Order lines are debited in ascending order-item-id order and lots in
/// ascending lot-id order (inside the reservation engine), so concurrent
/// transactions acquire row locks in the same sequence.
async fn apply_items(
    conn: &mut PgConnection,
    department_id: Uuid,
    task_id: Uuid,
    items: &[TaskItemInput],
) -> AppResult<()> {
    let mut by_order_item: Vec<&TaskItemInput> = items.iter().collect();
    by_order_item.sort_by_key(|i| i.order_item_id);
    for item in by_order_item {
        order::take_outstanding_quantity(conn, item.order_item_id, item.quantity).await?;
    }

    let requests: Vec<ReservationRequest> = items
        .iter()
        .map(|i| ReservationRequest {
            lot_id: i.lot_id,
            quantity: i.quantity,
        })
        .collect();
    reservation::reserve(conn, department_id, &requests).await?;

    for item in items {
        sqlx::query(
            r#"
            INSERT INTO preparation_items (task_id, order_item_id, lot_id, requested_quantity, note)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(task_id)
        .bind(item.order_item_id)
        .bind(item.lot_id)
        .bind(item.quantity)
        .bind(&item.note)
        .execute(&mut *conn)
        .await?;
    }

    Ok(())
}

/// Repay the reservation debt of every existing item of a task: restore
/// each order line's outstanding quantity, then increment each lot
///
/// Locks are taken in the same sequence as [`apply_items`], order lines
/// before lots, so the forward and compensating paths cannot cross-wait on
/// each other's rows.
async fn restore_items(conn: &mut PgConnection, task_id: Uuid) -> AppResult<()> {
    let existing = sqlx::query_as::<_, ReservedItemRow>(
        r#"
        SELECT order_item_id, lot_id, requested_quantity
        FROM preparation_items
        WHERE task_id = $1
        "#,
    )
    .bind(task_id)
    .fetch_all(&mut *conn)
    .await?;

    let mut by_order_item: Vec<&ReservedItemRow> = existing.iter().collect();
    by_order_item.sort_by_key(|i| i.order_item_id);
    for item in by_order_item {
        order::restore_outstanding_quantity(conn, item.order_item_id, item.requested_quantity)
            .await?;
    }

    let requests: Vec<ReservationRequest> = existing
        .iter()
        .map(|i| ReservationRequest {
            lot_id: i.lot_id,
            quantity: i.requested_quantity,
        })
        .collect();
    reservation::release(conn, &requests).await?;

    Ok(())
}
