//! HTTP handlers for order management

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::HeaderMap,
    Json,
};
use serde::Serialize;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::external::payment::PaymentWebhookEvent;
use crate::external::PaymentStatus;
use crate::middleware::CurrentUser;
use crate::services::order::{CreateOrderInput, OrderItemRecord, OrderRecord, PlacedOrder};
use crate::services::OrderService;
use crate::AppState;

fn order_service(state: AppState) -> OrderService {
    OrderService::new(
        state.db,
        state.config,
        state.payment,
        state.messaging,
    )
}

/// Place a new order
pub async fn create_order(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<CreateOrderInput>,
) -> AppResult<Json<PlacedOrder>> {
    let service = order_service(state);
    let placed = service.create_order(current_user.0.user_id, input).await?;
    Ok(Json(placed))
}

/// Order with its line items
#[derive(Debug, Serialize)]
pub struct OrderView {
    #[serde(flatten)]
    pub order: OrderRecord,
    pub items: Vec<OrderItemRecord>,
}

/// Get an order with its items
pub async fn get_order(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(order_id): Path<Uuid>,
) -> AppResult<Json<OrderView>> {
    let service = order_service(state);
    let order = service.get_order(order_id).await?;
    if order.customer_id != current_user.0.user_id && !current_user.0.is_staff {
        return Err(AppError::NotFound("Order".to_string()));
    }
    let items = service.get_order_items(order_id).await?;
    Ok(Json(OrderView { order, items }))
}

/// Confirm payment for an order (customer-initiated return from checkout)
pub async fn confirm_payment(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Path(order_id): Path<Uuid>,
) -> AppResult<Json<OrderRecord>> {
    let service = order_service(state);
    let order = service.confirm_payment(order_id).await?;
    Ok(Json(order))
}

/// Cancel a pending order
pub async fn cancel_order(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(order_id): Path<Uuid>,
) -> AppResult<Json<OrderRecord>> {
    let service = order_service(state.clone());
    let order = service.get_order(order_id).await?;
    if order.customer_id != current_user.0.user_id && !current_user.0.is_staff {
        return Err(AppError::NotFound("Order".to_string()));
    }
    let cancelled = service.cancel_order(order_id).await?;
    Ok(Json(cancelled))
}

/// Payment gateway webhook (public, HMAC-authenticated)
pub async fn handle_payment_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> AppResult<&'static str> {
    let signature = headers
        .get("x-payment-signature")
        .and_then(|h| h.to_str().ok())
        .ok_or_else(|| AppError::Unauthorized("Missing webhook signature".to_string()))?;

    if !state.payment.verify_webhook_signature(&body, signature) {
        return Err(AppError::Unauthorized("Invalid webhook signature".to_string()));
    }

    let event: PaymentWebhookEvent = serde_json::from_slice(&body).map_err(|e| {
        AppError::Validation {
            field: "body".to_string(),
            message: format!("Malformed webhook payload: {}", e),
        }
    })?;

    let service = order_service(state);
    match event.status {
        PaymentStatus::Succeeded => {
            service.confirm_payment(event.order_id).await?;
        }
        PaymentStatus::Failed | PaymentStatus::Cancelled => {
            // The order may already be cancelled or wound down; that is fine.
            match service.cancel_order(event.order_id).await {
                Ok(_) => {}
                Err(AppError::InvalidStateTransition(_)) | Err(AppError::NotFound(_)) => {}
                Err(err) => return Err(err),
            }
        }
        PaymentStatus::Pending => {}
    }

    Ok("OK")
}
