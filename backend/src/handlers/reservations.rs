//! HTTP handlers for reservation administration

use axum::{
    extract::{Path, State},
    Json,
};
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use crate::error::AppResult;
use crate::middleware::{require_staff, CurrentUser};
use crate::services::{PalletService, ReservationService};
use crate::AppState;
use shared::{Reservation, ReservationItem};

fn reservation_service(state: &AppState) -> ReservationService {
    ReservationService::new(
        state.db.clone(),
        state.config.reservation.max_reserve_attempts,
    )
}

/// Reservation with its ordered pallet holds
#[derive(Debug, Serialize)]
pub struct ReservationView {
    #[serde(flatten)]
    pub reservation: Reservation,
    pub items: Vec<ReservationItem>,
}

/// Get a reservation with its holds (staff only)
pub async fn get_reservation(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(reservation_id): Path<Uuid>,
) -> AppResult<Json<ReservationView>> {
    require_staff(&current_user.0)?;
    let service = reservation_service(&state);
    let (reservation, items) = service.get_reservation(reservation_id).await?;
    Ok(Json(ReservationView { reservation, items }))
}

/// Manually release an active reservation (staff only)
pub async fn release_reservation(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(reservation_id): Path<Uuid>,
) -> AppResult<Json<()>> {
    require_staff(&current_user.0)?;
    let service = reservation_service(&state);
    service.release(reservation_id).await?;
    Ok(Json(()))
}

/// Result of an on-demand expiry sweep
#[derive(Debug, Serialize)]
pub struct SweepResponse {
    pub expired: u64,
}

/// Run the expiry sweep on demand (staff only)
pub async fn sweep_reservations(
    State(state): State<AppState>,
    current_user: CurrentUser,
) -> AppResult<Json<SweepResponse>> {
    require_staff(&current_user.0)?;
    let service = reservation_service(&state);
    let expired = service.release_expired().await?;
    Ok(Json(SweepResponse { expired }))
}

/// Result of a refund restock
#[derive(Debug, Serialize)]
pub struct RestockResponse {
    pub restocked_kg: Decimal,
}

/// Restock a committed reservation after a refund (staff only)
pub async fn restock_reservation(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(reservation_id): Path<Uuid>,
) -> AppResult<Json<RestockResponse>> {
    require_staff(&current_user.0)?;
    let service = PalletService::new(state.db);
    let restocked_kg = service.restock_committed(reservation_id).await?;
    Ok(Json(RestockResponse { restocked_kg }))
}
