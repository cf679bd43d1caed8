//! Validation utilities for the Warehouse Order Management Platform

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::models::TaskStatus;

// ============================================================================
// Quantity Validations
// ============================================================================

/// Validate a reservation quantity is strictly positive
pub fn validate_positive_quantity(quantity: Decimal) -> Result<(), &'static str> {
    if quantity <= Decimal::ZERO {
        return Err("Quantity must be positive");
    }
    Ok(())
}

/// Validate a packed quantity is non-negative
pub fn validate_packed_quantity(quantity: Decimal) -> Result<(), &'static str> {
    if quantity < Decimal::ZERO {
        return Err("Packed quantity cannot be negative");
    }
    Ok(())
}

/// Check whether a lot can cover a reservation right now
///
/// Expiry is checked before stock so an expired lot is reported as expired
/// even when its remaining quantity would also be short.
pub fn check_reservable(
    quantity_on_hand: Decimal,
    expiry_at: DateTime<Utc>,
    requested: Decimal,
    now: DateTime<Utc>,
) -> Result<(), ReservationIssue> {
    if expiry_at <= now {
        return Err(ReservationIssue::Expired);
    }
    if quantity_on_hand < requested {
        return Err(ReservationIssue::InsufficientStock);
    }
    Ok(())
}

/// Why a lot cannot cover a reservation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReservationIssue {
    Expired,
    InsufficientStock,
}

// ============================================================================
// Task Validations
// ============================================================================

/// Validate a status change against the task state machine
pub fn validate_status_transition(from: TaskStatus, to: TaskStatus) -> Result<(), &'static str> {
    if from.can_transition_to(to) {
        Ok(())
    } else {
        Err("Status transition not permitted")
    }
}

/// Validate a deadline is not in the past
pub fn validate_deadline(deadline: DateTime<Utc>, now: DateTime<Utc>) -> Result<(), &'static str> {
    if deadline <= now {
        return Err("Deadline must be in the future");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn test_positive_quantity() {
        assert!(validate_positive_quantity(dec("0.5")).is_ok());
        assert!(validate_positive_quantity(Decimal::ZERO).is_err());
        assert!(validate_positive_quantity(dec("-1")).is_err());
    }

    #[test]
    fn test_packed_quantity_allows_zero() {
        assert!(validate_packed_quantity(Decimal::ZERO).is_ok());
        assert!(validate_packed_quantity(dec("-0.1")).is_err());
    }

    #[test]
    fn test_reservable_happy_path() {
        let now = Utc::now();
        let expiry = now + Duration::days(30);
        assert!(check_reservable(dec("10"), expiry, dec("6"), now).is_ok());
    }

    #[test]
    fn test_expired_lot_reported_before_stock() {
        let now = Utc::now();
        let expiry = now - Duration::days(1);
        // Expired and also short on stock: expiry wins
        assert_eq!(
            check_reservable(dec("1"), expiry, dec("5"), now),
            Err(ReservationIssue::Expired)
        );
    }

    #[test]
    fn test_insufficient_stock() {
        let now = Utc::now();
        let expiry = now + Duration::days(30);
        assert_eq!(
            check_reservable(dec("4"), expiry, dec("6"), now),
            Err(ReservationIssue::InsufficientStock)
        );
    }

    #[test]
    fn test_exact_quantity_is_reservable() {
        let now = Utc::now();
        let expiry = now + Duration::days(1);
        assert!(check_reservable(dec("6"), expiry, dec("6"), now).is_ok());
    }

    #[test]
    fn test_deadline_must_be_in_the_future() {
        let now = Utc::now();
        assert!(validate_deadline(now + Duration::hours(1), now).is_ok());
        assert!(validate_deadline(now, now).is_err());
        assert!(validate_deadline(now - Duration::hours(1), now).is_err());
    }

    #[test]
    fn test_status_transition_follows_state_machine() {
        assert!(validate_status_transition(TaskStatus::Pending, TaskStatus::InProgress).is_ok());
        assert!(validate_status_transition(TaskStatus::InProgress, TaskStatus::Completed).is_ok());
        assert!(validate_status_transition(TaskStatus::Pending, TaskStatus::Completed).is_err());
        assert!(validate_status_transition(TaskStatus::Completed, TaskStatus::Cancelled).is_err());
    }
}
