//! Lot read service
//!
//! Read-only surface over the lot table: display joins for the HTTP layer
//! and the low-stock / expiring listings consumed by the external alert
//! scan. All writes to `quantity_on_hand` go through the stock ledger, not
//! through this service.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use shared::{PaginatedResponse, Pagination, PaginationMeta};

/// Lot service for stock-level reads
#[derive(Clone)]
pub struct LotService {
    db: PgPool,
}

/// Lot with product display fields joined in
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct LotView {
    pub id: Uuid,
    pub department_id: Uuid,
    pub product_id: Uuid,
    pub lot_number: String,
    pub expiry_at: DateTime<Utc>,
    pub quantity_on_hand: Decimal,
    pub conversion_rate: Decimal,
    pub product_name: String,
    pub product_sku: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Filter for lot listing
#[derive(Debug, Default, Deserialize)]
pub struct LotFilter {
    pub product_id: Option<Uuid>,
    /// Only lots at or below this quantity
    pub below_quantity: Option<Decimal>,
    /// Only lots expiring before this timestamp
    pub expiring_before: Option<DateTime<Utc>>,
    /// Exclude lots that have already expired
    pub usable_only: Option<bool>,
}

impl LotService {
    /// Create a new LotService instance
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Get a lot by ID
    pub async fn get_lot(&self, department_id: Uuid, lot_id: Uuid) -> AppResult<LotView> {
        let lot = sqlx::query_as::<_, LotView>(
            r#"
            SELECT l.id, l.department_id, l.product_id, l.lot_number, l.expiry_at,
                   l.quantity_on_hand, l.conversion_rate,
                   p.name AS product_name, p.sku AS product_sku,
                   l.created_at, l.updated_at
            FROM lots l
            JOIN products p ON p.id = l.product_id
            WHERE l.id = $1 AND l.department_id = $2
            "#,
        )
        .bind(lot_id)
        .bind(department_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Lot".to_string()))?;

        Ok(lot)
    }

    /// List lots for a department, soonest-expiring first
    pub async fn list_lots(
        &self,
        department_id: Uuid,
        filter: LotFilter,
        pagination: Pagination,
    ) -> AppResult<PaginatedResponse<LotView>> {
        let total = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*)
            FROM lots l
            WHERE l.department_id = $1
              AND ($2::uuid IS NULL OR l.product_id = $2)
              AND ($3::numeric IS NULL OR l.quantity_on_hand <= $3)
              AND ($4::timestamptz IS NULL OR l.expiry_at < $4)
              AND (NOT $5 OR l.expiry_at > NOW())
            "#,
        )
        .bind(department_id)
        .bind(filter.product_id)
        .bind(filter.below_quantity)
        .bind(filter.expiring_before)
        .bind(filter.usable_only.unwrap_or(false))
        .fetch_one(&self.db)
        .await?;

        let lots = sqlx::query_as::<_, LotView>(
            r#"
            SELECT l.id, l.department_id, l.product_id, l.lot_number, l.expiry_at,
                   l.quantity_on_hand, l.conversion_rate,
                   p.name AS product_name, p.sku AS product_sku,
                   l.created_at, l.updated_at
            FROM lots l
            JOIN products p ON p.id = l.product_id
            WHERE l.department_id = $1
              AND ($2::uuid IS NULL OR l.product_id = $2)
              AND ($3::numeric IS NULL OR l.quantity_on_hand <= $3)
              AND ($4::timestamptz IS NULL OR l.expiry_at < $4)
              AND (NOT $5 OR l.expiry_at > NOW())
            ORDER BY l.expiry_at
            LIMIT $6 OFFSET $7
            "#,
        )
        .bind(department_id)
        .bind(filter.product_id)
        .bind(filter.below_quantity)
        .bind(filter.expiring_before)
        .bind(filter.usable_only.unwrap_or(false))
        .bind(pagination.limit())
        .bind(pagination.offset())
        .fetch_all(&self.db)
        .await?;

        Ok(PaginatedResponse {
            data: lots,
            pagination: PaginationMeta::new(&pagination, total as u64),
        })
    }
}
