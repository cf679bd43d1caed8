//! Sales order models
//!
//! The order lifecycle (pricing, invoicing, delivery) is owned by a
//! separate subsystem; preparation consumes orders through their lines'
//! outstanding quantities only.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A sales order as seen by the preparation subsystem
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SalesOrder {
    pub id: Uuid,
    pub department_id: Uuid,
    /// Human-facing order code (e.g., "SO-2026-00317")
    pub code: String,
    pub customer_name: String,
    pub created_at: DateTime<Utc>,
}

/// One line of a sales order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderItem {
    pub id: Uuid,
    pub order_id: Uuid,
    pub product_id: Uuid,
    /// Quantity originally ordered
    pub quantity: Decimal,
    /// Quantity not yet covered by an active preparation item
    pub remaining_quantity: Decimal,
    pub created_at: DateTime<Utc>,
}
