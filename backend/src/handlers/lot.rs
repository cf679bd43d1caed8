//! HTTP handlers for lot read endpoints

use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use uuid::Uuid;

use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::services::lot::{LotFilter, LotService, LotView};
use crate::AppState;
use shared::{PaginatedResponse, Pagination};

/// Query parameters for lot listing
#[derive(Debug, Default, Deserialize)]
pub struct ListLotsQuery {
    pub product_id: Option<Uuid>,
    pub below_quantity: Option<Decimal>,
    /// Only lots expiring within the configured warning window
    pub expiring: Option<bool>,
    pub usable_only: Option<bool>,
}

/// Get a lot by ID
pub async fn get_lot(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(lot_id): Path<Uuid>,
) -> AppResult<Json<LotView>> {
    let service = LotService::new(state.db);
    let lot = service.get_lot(current_user.0.department_id, lot_id).await?;
    Ok(Json(lot))
}

/// List lots for the department
pub async fn list_lots(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(query): Query<ListLotsQuery>,
    Query(pagination): Query<Pagination>,
) -> AppResult<Json<PaginatedResponse<LotView>>> {
    let expiring_before = if query.expiring.unwrap_or(false) {
        Some(Utc::now() + Duration::days(state.config.preparation.expiry_warning_days))
    } else {
        None
    };

    let filter = LotFilter {
        product_id: query.product_id,
        below_quantity: query.below_quantity,
        expiring_before,
        usable_only: query.usable_only,
    };

    let service = LotService::new(state.db);
    let lots = service
        .list_lots(current_user.0.department_id, filter, pagination)
        .await?;
    Ok(Json(lots))
}
