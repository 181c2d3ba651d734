//! Route definitions for the Farm Produce Distribution Platform

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use crate::{handlers, middleware::auth_middleware, AppState};

/// Create API routes
pub fn api_routes() -> Router<AppState> {
    Router::new()
        // Health check (public)
        .route("/health", get(handlers::health_check))
        // Payment gateway webhook (public - HMAC authenticated)
        .route("/webhook/payment", post(handlers::handle_payment_webhook))
        // Protected routes - allocation previews
        .nest("/allocation", allocation_routes())
        // Protected routes - orders
        .nest("/orders", order_routes())
        // Protected routes - pallet stock
        .nest("/pallets", pallet_routes())
        // Protected routes - reservation administration
        .nest("/reservations", reservation_routes())
        // Protected routes - product catalog
        .nest("/products", product_routes())
}

/// Allocation preview routes (protected)
fn allocation_routes() -> Router<AppState> {
    Router::new()
        .route("/preview", post(handlers::preview_allocation))
        .route_layer(middleware::from_fn(auth_middleware))
}

/// Order routes (protected)
fn order_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(handlers::create_order))
        .route("/:order_id", get(handlers::get_order))
        .route("/:order_id/confirm-payment", post(handlers::confirm_payment))
        .route("/:order_id/cancel", post(handlers::cancel_order))
        .route_layer(middleware::from_fn(auth_middleware))
}

/// Pallet stock routes (protected, staff checks in handlers)
fn pallet_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_pallets).post(handlers::create_pallet))
        .route("/:pallet_id", get(handlers::get_pallet))
        .route_layer(middleware::from_fn(auth_middleware))
}

/// Reservation administration routes (protected, staff checks in handlers)
fn reservation_routes() -> Router<AppState> {
    Router::new()
        .route("/sweep", post(handlers::sweep_reservations))
        .route("/:reservation_id", get(handlers::get_reservation))
        .route("/:reservation_id/release", post(handlers::release_reservation))
        .route("/:reservation_id/restock", post(handlers::restock_reservation))
        .route_layer(middleware::from_fn(auth_middleware))
}

/// Product catalog routes (protected)
fn product_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_products).post(handlers::create_product))
        .route("/:product_id", get(handlers::get_product))
        .route_layer(middleware::from_fn(auth_middleware))
}
