//! Stock ledger operations on inventory lots
//!
//! The quantity on hand of a lot is the single shared mutable resource of
//! the preparation subsystem. Every mutation goes through this module, on a
//! caller-supplied transaction, under a `FOR UPDATE` row lock held until
//! that transaction commits or rolls back. Two reservations racing for the
//! same lot therefore serialize: the second blocks on the row lock and
//! observes the post-decrement quantity.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgConnection;
use uuid::Uuid;

use crate::error::{AppError, AppResult};

/// Snapshot of a lot while its row lock is held
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct LockedLot {
    pub id: Uuid,
    pub lot_number: String,
    pub expiry_at: DateTime<Utc>,
    pub quantity_on_hand: Decimal,
}

/// Acquire an exclusive row lock on a lot and read its current state
///
/// The lock is held for the remainder of the enclosing transaction.
pub async fn lock_lot(
    conn: &mut PgConnection,
    department_id: Uuid,
    lot_id: Uuid,
) -> AppResult<LockedLot> {
    let lot = sqlx::query_as::<_, LockedLot>(
        r#"
        SELECT id, lot_number, expiry_at, quantity_on_hand
        FROM lots
        WHERE id = $1 AND department_id = $2
        FOR UPDATE
        "#,
    )
    .bind(lot_id)
    .bind(department_id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| AppError::NotFound("Lot".to_string()))?;

    Ok(lot)
}

/// Subtract a reserved amount from a lot's quantity on hand
///
/// Must only be called after [`lock_lot`] and a successful reservability
/// check in the same transaction, so the amount never exceeds the quantity
/// on hand.
pub async fn decrement_lot(conn: &mut PgConnection, lot_id: Uuid, amount: Decimal) -> AppResult<()> {
    let result = sqlx::query(
        r#"
        UPDATE lots
        SET quantity_on_hand = quantity_on_hand - $1, updated_at = NOW()
        WHERE id = $2
        "#,
    )
    .bind(amount)
    .bind(lot_id)
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Lot".to_string()));
    }

    Ok(())
}

/// Add a previously debited amount back onto a lot
///
/// Compensating operation for restore paths; no upper bound is checked
/// because it only ever repays earlier decrements.
pub async fn increment_lot(conn: &mut PgConnection, lot_id: Uuid, amount: Decimal) -> AppResult<()> {
    let result = sqlx::query(
        r#"
        UPDATE lots
        SET quantity_on_hand = quantity_on_hand + $1, updated_at = NOW()
        WHERE id = $2
        "#,
    )
    .bind(amount)
    .bind(lot_id)
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Lot".to_string()));
    }

    Ok(())
}
