//! HTTP handlers for the sales-order read surface

use axum::{
    extract::{Path, State},
    Json,
};
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::services::order::{OrderDetail, OrderService};
use crate::AppState;

/// Get an order with its lines
pub async fn get_order(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(order_id): Path<Uuid>,
) -> AppResult<Json<OrderDetail>> {
    let service = OrderService::new(state.db);
    let order = service
        .get_order(current_user.0.department_id, order_id)
        .await?;
    Ok(Json(order))
}

/// Get the outstanding quantity of one order line
pub async fn get_outstanding_quantity(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(order_item_id): Path<Uuid>,
) -> AppResult<Json<OutstandingResponse>> {
    let service = OrderService::new(state.db);
    let remaining = service
        .get_outstanding_quantity(current_user.0.department_id, order_item_id)
        .await?;
    Ok(Json(OutstandingResponse {
        order_item_id,
        remaining_quantity: remaining,
    }))
}

/// Response for the outstanding-quantity endpoint
#[derive(Debug, Serialize)]
pub struct OutstandingResponse {
    pub order_item_id: Uuid,
    pub remaining_quantity: Decimal,
}
