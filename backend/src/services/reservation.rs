//! Reservation engine for inventory lots
//!
//! Validates and applies a batch of lot reservations inside the caller's
//! transaction. The batch is all-or-nothing: the first failed check aborts
//! the transaction, rolling back any decrements already applied in the same
//! call.

use chrono::Utc;
use rust_decimal::Decimal;
use sqlx::PgConnection;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::services::stock;
use shared::validation::{check_reservable, validate_positive_quantity, ReservationIssue};

/// One requested reservation against a lot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReservationRequest {
    pub lot_id: Uuid,
    pub quantity: Decimal,
}

/// Reserve every requested quantity, or fail the whole batch
///
/// Lots are locked in ascending lot-id order regardless of caller order, so
/// two transactions touching overlapping lot sets always acquire their
/// locks in the same sequence and cannot deadlock on each other. Which lot
/// fulfills which order line (FEFO or otherwise) is the caller's choice and
/// is not revisited here.
pub async fn reserve(
    conn: &mut PgConnection,
    department_id: Uuid,
    requests: &[ReservationRequest],
) -> AppResult<()> {
    for request in requests {
        if validate_positive_quantity(request.quantity).is_err() {
            return Err(AppError::Validation {
                field: "quantity".to_string(),
                message: "Reservation quantity must be positive".to_string(),
                message_th: "ปริมาณต้องเป็นค่าบวก".to_string(),
            });
        }
    }

    for request in in_lock_order(requests) {
        let lot = stock::lock_lot(conn, department_id, request.lot_id).await?;
        let now = Utc::now();

        match check_reservable(lot.quantity_on_hand, lot.expiry_at, request.quantity, now) {
            Ok(()) => {}
            Err(ReservationIssue::Expired) => {
                return Err(AppError::ExpiredLot {
                    lot_id: lot.id,
                    lot_number: lot.lot_number,
                    expired_at: lot.expiry_at,
                });
            }
            Err(ReservationIssue::InsufficientStock) => {
                return Err(AppError::InsufficientStock {
                    lot_id: lot.id,
                    lot_number: lot.lot_number,
                    requested: request.quantity,
                    available: lot.quantity_on_hand,
                });
            }
        }

        stock::decrement_lot(conn, request.lot_id, request.quantity).await?;
    }

    Ok(())
}

/// Repay a set of reservation debits, e.g. when a task is cancelled or its
/// items are replaced
///
/// Increments take the same row locks as decrements, so they follow the
/// same canonical ordering.
pub async fn release(
    conn: &mut PgConnection,
    requests: &[ReservationRequest],
) -> AppResult<()> {
    for request in in_lock_order(requests) {
        stock::increment_lot(conn, request.lot_id, request.quantity).await?;
    }

    Ok(())
}

/// Canonical lock order: ascending lot id, caller order as tie-breaker
fn in_lock_order(requests: &[ReservationRequest]) -> Vec<ReservationRequest> {
    let mut ordered = requests.to_vec();
    ordered.sort_by_key(|r| r.lot_id);
    ordered
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn req(lot: u128, quantity: &str) -> ReservationRequest {
        ReservationRequest {
            lot_id: Uuid::from_u128(lot),
            quantity: Decimal::from_str(quantity).unwrap(),
        }
    }

    #[test]
    fn test_lock_order_is_ascending_lot_id() {
        let requests = vec![req(3, "1"), req(1, "2"), req(2, "3")];
        let ordered = in_lock_order(&requests);
        assert_eq!(
            ordered.iter().map(|r| r.lot_id).collect::<Vec<_>>(),
            vec![Uuid::from_u128(1), Uuid::from_u128(2), Uuid::from_u128(3)]
        );
    }

    #[test]
    fn test_lock_order_independent_of_caller_order() {
        let forward = vec![req(1, "5"), req(2, "5")];
        let backward = vec![req(2, "5"), req(1, "5")];
        assert_eq!(in_lock_order(&forward), in_lock_order(&backward));
    }

    #[test]
    fn test_lock_order_keeps_duplicate_lots_adjacent() {
        let requests = vec![req(2, "1"), req(1, "1"), req(2, "4")];
        let ordered = in_lock_order(&requests);
        assert_eq!(ordered[1].lot_id, ordered[2].lot_id);
    }
}
