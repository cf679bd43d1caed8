//! Inventory lot models
//!
//! A lot is a finite, dated batch of a product held at a department
//! (warehouse). It is the unit of stock accounting: every reservation is a
//! debit against a lot's quantity on hand.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// An inventory lot tracked in the stock ledger
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InventoryLot {
    pub id: Uuid,
    pub department_id: Uuid,
    pub product_id: Uuid,
    /// Batch number printed on the physical stock (e.g., "LOT-2026-BKK01-0042")
    pub lot_number: String,
    pub expiry_at: DateTime<Utc>,
    /// On-hand quantity net of all active reservations; never negative
    pub quantity_on_hand: Decimal,
    /// Conversion rate from the lot's storage unit to the sales unit
    pub conversion_rate: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
