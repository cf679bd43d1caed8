//! Sales order collaborator surface
//!
//! The order lifecycle is owned elsewhere; preparation consumes orders
//! through the outstanding ("remaining") quantity of their lines. The
//! transactional mutations here are the only writes preparation performs
//! against orders.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use shared::{OrderItem, SalesOrder};

/// Read service for sales orders
#[derive(Clone)]
pub struct OrderService {
    db: PgPool,
}

/// Order with its lines expanded
#[derive(Debug, Clone, Serialize)]
pub struct OrderDetail {
    #[serde(flatten)]
    pub order: SalesOrder,
    pub items: Vec<OrderItem>,
}

/// Row for order queries
#[derive(Debug, sqlx::FromRow)]
struct OrderRow {
    id: Uuid,
    department_id: Uuid,
    code: String,
    customer_name: String,
    created_at: DateTime<Utc>,
}

/// Row for order line queries
#[derive(Debug, sqlx::FromRow)]
struct OrderItemRow {
    id: Uuid,
    order_id: Uuid,
    product_id: Uuid,
    quantity: Decimal,
    remaining_quantity: Decimal,
    created_at: DateTime<Utc>,
}

impl From<OrderItemRow> for OrderItem {
    fn from(row: OrderItemRow) -> Self {
        OrderItem {
            id: row.id,
            order_id: row.order_id,
            product_id: row.product_id,
            quantity: row.quantity,
            remaining_quantity: row.remaining_quantity,
            created_at: row.created_at,
        }
    }
}

impl OrderService {
    /// Create a new OrderService instance
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Get an order with its lines
    pub async fn get_order(&self, department_id: Uuid, order_id: Uuid) -> AppResult<OrderDetail> {
        let row = sqlx::query_as::<_, OrderRow>(
            r#"
            SELECT id, department_id, code, customer_name, created_at
            FROM sales_orders
            WHERE id = $1 AND department_id = $2
            "#,
        )
        .bind(order_id)
        .bind(department_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Order".to_string()))?;

        let items = sqlx::query_as::<_, OrderItemRow>(
            r#"
            SELECT id, order_id, product_id, quantity, remaining_quantity, created_at
            FROM order_items
            WHERE order_id = $1
            ORDER BY created_at
            "#,
        )
        .bind(order_id)
        .fetch_all(&self.db)
        .await?;

        Ok(OrderDetail {
            order: SalesOrder {
                id: row.id,
                department_id: row.department_id,
                code: row.code,
                customer_name: row.customer_name,
                created_at: row.created_at,
            },
            items: items.into_iter().map(|r| r.into()).collect(),
        })
    }

    /// Get the outstanding quantity of a single order line
    pub async fn get_outstanding_quantity(
        &self,
        department_id: Uuid,
        order_item_id: Uuid,
    ) -> AppResult<Decimal> {
        sqlx::query_scalar::<_, Decimal>(
            r#"
            SELECT oi.remaining_quantity
            FROM order_items oi
            JOIN sales_orders o ON o.id = oi.order_id
            WHERE oi.id = $1 AND o.department_id = $2
            "#,
        )
        .bind(order_item_id)
        .bind(department_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Order item".to_string()))
    }
}

/// Verify that an order exists in the department, inside a transaction
pub async fn ensure_order_exists(
    conn: &mut PgConnection,
    department_id: Uuid,
    order_id: Uuid,
) -> AppResult<()> {
    let exists = sqlx::query_scalar::<_, bool>(
        "SELECT EXISTS(SELECT 1 FROM sales_orders WHERE id = $1 AND department_id = $2)",
    )
    .bind(order_id)
    .bind(department_id)
    .fetch_one(&mut *conn)
    .await?;

    if !exists {
        return Err(AppError::NotFound("Order".to_string()));
    }

    Ok(())
}

/// Verify that every referenced order line belongs to the given order
pub async fn ensure_items_belong_to_order(
    conn: &mut PgConnection,
    order_id: Uuid,
    order_item_ids: &[Uuid],
) -> AppResult<()> {
    let matching = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(DISTINCT id) FROM order_items WHERE order_id = $1 AND id = ANY($2)",
    )
    .bind(order_id)
    .bind(order_item_ids)
    .fetch_one(&mut *conn)
    .await?;

    let distinct: std::collections::HashSet<Uuid> = order_item_ids.iter().copied().collect();
    if matching as usize != distinct.len() {
        return Err(AppError::Validation {
            field: "items".to_string(),
            message: "Every item must reference an order line of the task's order".to_string(),
            message_th: "รายการทั้งหมดต้องอ้างอิงรายการสั่งซื้อของออเดอร์เดียวกัน".to_string(),
        });
    }

    Ok(())
}

/// Deduct a newly reserved quantity from an order line's outstanding
/// quantity
///
/// The guard in the WHERE clause makes the deduction atomic: it fails
/// instead of driving the outstanding quantity negative when concurrent
/// tasks compete for the same line.
pub async fn take_outstanding_quantity(
    conn: &mut PgConnection,
    order_item_id: Uuid,
    amount: Decimal,
) -> AppResult<()> {
    let result = sqlx::query(
        r#"
        UPDATE order_items
        SET remaining_quantity = remaining_quantity - $1
        WHERE id = $2 AND remaining_quantity >= $1
        "#,
    )
    .bind(amount)
    .bind(order_item_id)
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::InsufficientOutstanding(order_item_id));
    }

    Ok(())
}

/// Restore a reserved quantity onto an order line's outstanding quantity,
/// making the line eligible for re-preparation
pub async fn restore_outstanding_quantity(
    conn: &mut PgConnection,
    order_item_id: Uuid,
    amount: Decimal,
) -> AppResult<()> {
    let result = sqlx::query(
        r#"
        UPDATE order_items
        SET remaining_quantity = remaining_quantity + $1
        WHERE id = $2
        "#,
    )
    .bind(amount)
    .bind(order_item_id)
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Order item".to_string()));
    }

    Ok(())
}
