//! HTTP handlers for warehouse intake and pallet stock views

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::error::AppResult;
use crate::middleware::{require_staff, CurrentUser};
use crate::services::pallet::{CreatePalletInput, PalletRecord, PalletStockView};
use crate::services::PalletService;
use crate::AppState;

/// Register a pallet of incoming stock (staff only)
pub async fn create_pallet(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<CreatePalletInput>,
) -> AppResult<Json<PalletRecord>> {
    require_staff(&current_user.0)?;
    let service = PalletService::new(state.db);
    let pallet = service.create_pallet(input).await?;
    Ok(Json(pallet))
}

/// Query filter for pallet listings
#[derive(Debug, Deserialize)]
pub struct ListPalletsQuery {
    pub product_id: Option<Uuid>,
}

/// List pallets, oldest first (staff only)
pub async fn list_pallets(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(query): Query<ListPalletsQuery>,
) -> AppResult<Json<Vec<PalletStockView>>> {
    require_staff(&current_user.0)?;
    let service = PalletService::new(state.db);
    let pallets = service.list_pallets(query.product_id).await?;
    Ok(Json(pallets))
}

/// Get one pallet with its active hold total (staff only)
pub async fn get_pallet(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(pallet_id): Path<Uuid>,
) -> AppResult<Json<PalletStockView>> {
    require_staff(&current_user.0)?;
    let service = PalletService::new(state.db);
    let pallet = service.get_pallet(pallet_id).await?;
    Ok(Json(pallet))
}
