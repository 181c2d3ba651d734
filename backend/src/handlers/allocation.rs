//! HTTP handlers for allocation previews

use axum::{extract::State, Json};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::services::AllocationService;
use crate::AppState;

/// Request for a feasibility/price preview of one product line
#[derive(Debug, Deserialize)]
pub struct PreviewRequest {
    pub product_id: Uuid,
    pub quantity_kg: Decimal,
}

/// Preview of whether a requested quantity can be fulfilled.
/// Reports totals only; pallet identifiers stay internal.
#[derive(Debug, Serialize)]
pub struct PreviewResponse {
    pub product_id: Uuid,
    pub requested_kg: Decimal,
    pub available_kg: Decimal,
    pub fully_fulfilled: bool,
}

/// Preview allocation for a cart line without taking any hold
pub async fn preview_allocation(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Json(request): Json<PreviewRequest>,
) -> AppResult<Json<PreviewResponse>> {
    let service = AllocationService::new(state.db);
    let plan = service.plan(request.product_id, request.quantity_kg).await?;
    Ok(Json(PreviewResponse {
        product_id: request.product_id,
        requested_kg: plan.requested_quantity_kg,
        available_kg: plan.total_allocated_kg,
        fully_fulfilled: plan.fully_fulfilled,
    }))
}
