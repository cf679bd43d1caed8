//! Route definitions for the Warehouse Order Management Platform

use axum::{
    middleware,
    routing::{get, post, put},
    Router,
};

use crate::{handlers, middleware::context_middleware, AppState};

/// Create API routes
pub fn api_routes() -> Router<AppState> {
    Router::new()
        // Health check (public)
        .route("/health", get(handlers::health_check))
        // Protected routes - preparation task management
        .nest("/preparations", preparation_routes())
        // Protected routes - lot reads
        .nest("/lots", lot_routes())
        // Protected routes - order reads
        .nest("/orders", order_routes())
}

/// Preparation task routes (protected)
fn preparation_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_tasks).post(handlers::create_task))
        .route(
            "/:task_id",
            get(handlers::get_task).put(handlers::update_task),
        )
        .route("/:task_id/cancel", post(handlers::cancel_task))
        .route(
            "/:task_id/items/:item_id",
            put(handlers::update_packed_quantity),
        )
        .route(
            "/:task_id/review",
            get(handlers::get_review).put(handlers::update_review),
        )
        .route_layer(middleware::from_fn(context_middleware))
}

/// Lot read routes (protected)
fn lot_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_lots))
        .route("/:lot_id", get(handlers::get_lot))
        .route_layer(middleware::from_fn(context_middleware))
}

/// Order read routes (protected)
fn order_routes() -> Router<AppState> {
    Router::new()
        .route("/:order_id", get(handlers::get_order))
        .route(
            "/items/:order_item_id/outstanding",
            get(handlers::get_outstanding_quantity),
        )
        .route_layer(middleware::from_fn(context_middleware))
}
