//! Warehouse intake service for pallet stock
//!
//! Intake creates pallets; the reservation manager is the only other writer
//! of pallet quantities, except for the explicit refund restock implemented
//! here, which reverses a committed reservation after the payment provider
//! refunds the order.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use shared::{validate_pallet_quantity, ReservationState};

/// Pallet service for warehouse intake and stock views
#[derive(Clone)]
pub struct PalletService {
    db: PgPool,
}

/// Input for registering incoming stock
#[derive(Debug, Deserialize)]
pub struct CreatePalletInput {
    pub warehouse_id: Uuid,
    pub product_id: Uuid,
    /// Date the stock arrived; defaults to today
    pub entered_at: Option<NaiveDate>,
    pub quantity_kg: Decimal,
    pub expires_at: Option<NaiveDate>,
}

/// Pallet row as stored
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct PalletRecord {
    pub id: Uuid,
    pub warehouse_id: Uuid,
    pub product_id: Uuid,
    pub entered_at: NaiveDate,
    pub initial_quantity_kg: Decimal,
    pub current_quantity_kg: Decimal,
    pub expires_at: Option<NaiveDate>,
    pub is_depleted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Pallet view with its active hold total
#[derive(Debug, Clone, Serialize)]
pub struct PalletStockView {
    #[serde(flatten)]
    pub pallet: PalletRecord,
    /// Quantity currently held by active reservations
    pub held_kg: Decimal,
}

#[derive(Debug, FromRow)]
struct PalletStockRow {
    id: Uuid,
    warehouse_id: Uuid,
    product_id: Uuid,
    entered_at: NaiveDate,
    initial_quantity_kg: Decimal,
    current_quantity_kg: Decimal,
    expires_at: Option<NaiveDate>,
    is_depleted: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    held_kg: Decimal,
}

impl PalletService {
    /// Create a new PalletService instance
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Register a pallet of incoming stock
    pub async fn create_pallet(&self, input: CreatePalletInput) -> AppResult<PalletRecord> {
        if let Err(msg) = validate_pallet_quantity(input.quantity_kg) {
            return Err(AppError::Validation {
                field: "quantity_kg".to_string(),
                message: msg.to_string(),
            });
        }

        let warehouse_exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM warehouses WHERE id = $1 AND is_active = true)",
        )
        .bind(input.warehouse_id)
        .fetch_one(&self.db)
        .await?;
        if !warehouse_exists {
            return Err(AppError::NotFound("Warehouse".to_string()));
        }

        let product_exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM products WHERE id = $1 AND is_active = true)",
        )
        .bind(input.product_id)
        .fetch_one(&self.db)
        .await?;
        if !product_exists {
            return Err(AppError::NotFound("Product".to_string()));
        }

        let entered_at = input.entered_at.unwrap_or_else(|| Utc::now().date_naive());

        let pallet = sqlx::query_as::<_, PalletRecord>(
            r#"
            INSERT INTO pallets (warehouse_id, product_id, entered_at,
                                 initial_quantity_kg, current_quantity_kg, expires_at)
            VALUES ($1, $2, $3, $4, $4, $5)
            RETURNING id, warehouse_id, product_id, entered_at, initial_quantity_kg,
                      current_quantity_kg, expires_at, is_depleted, created_at, updated_at
            "#,
        )
        .bind(input.warehouse_id)
        .bind(input.product_id)
        .bind(entered_at)
        .bind(input.quantity_kg)
        .bind(input.expires_at)
        .fetch_one(&self.db)
        .await?;

        tracing::info!(
            pallet_id = %pallet.id,
            product_id = %pallet.product_id,
            quantity_kg = %pallet.initial_quantity_kg,
            "pallet registered"
        );
        Ok(pallet)
    }

    /// Get a pallet with its active hold total
    pub async fn get_pallet(&self, pallet_id: Uuid) -> AppResult<PalletStockView> {
        let row = sqlx::query_as::<_, PalletStockRow>(
            r#"
            SELECT p.id, p.warehouse_id, p.product_id, p.entered_at,
                   p.initial_quantity_kg, p.current_quantity_kg, p.expires_at,
                   p.is_depleted, p.created_at, p.updated_at,
                   COALESCE((SELECT SUM(ri.quantity_kg)
                             FROM reservation_items ri
                             JOIN reservations r ON r.id = ri.reservation_id
                             WHERE ri.pallet_id = p.id AND r.state = 'active'), 0) AS held_kg
            FROM pallets p
            WHERE p.id = $1
            "#,
        )
        .bind(pallet_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Pallet".to_string()))?;

        Ok(row.into_view())
    }

    /// List pallets, optionally filtered by product, oldest first
    pub async fn list_pallets(&self, product_id: Option<Uuid>) -> AppResult<Vec<PalletStockView>> {
        let rows = sqlx::query_as::<_, PalletStockRow>(
            r#"
            SELECT p.id, p.warehouse_id, p.product_id, p.entered_at,
                   p.initial_quantity_kg, p.current_quantity_kg, p.expires_at,
                   p.is_depleted, p.created_at, p.updated_at,
                   COALESCE((SELECT SUM(ri.quantity_kg)
                             FROM reservation_items ri
                             JOIN reservations r ON r.id = ri.reservation_id
                             WHERE ri.pallet_id = p.id AND r.state = 'active'), 0) AS held_kg
            FROM pallets p
            WHERE ($1::uuid IS NULL OR p.product_id = $1)
            ORDER BY p.entered_at ASC, p.id ASC
            "#,
        )
        .bind(product_id)
        .fetch_all(&self.db)
        .await?;

        Ok(rows.into_iter().map(PalletStockRow::into_view).collect())
    }

    /// Reverse a committed reservation after a refund.
    ///
    /// `release` refuses committed holds by design; this is the one explicit
    /// path that puts committed quantity back on the pallets it came from.
    pub async fn restock_committed(&self, reservation_id: Uuid) -> AppResult<Decimal> {
        let mut tx = self.db.begin().await?;

        let (state, restocked_at): (String, Option<DateTime<Utc>>) = sqlx::query_as(
            "SELECT state, restocked_at FROM reservations WHERE id = $1 FOR UPDATE",
        )
        .bind(reservation_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound("Reservation".to_string()))?;

        if ReservationState::parse(&state) != Some(ReservationState::Committed) {
            return Err(AppError::InvalidStateTransition(format!(
                "Only committed reservations can be restocked (state is {})",
                state
            )));
        }
        if restocked_at.is_some() {
            return Err(AppError::InvalidStateTransition(
                "Reservation has already been restocked".to_string(),
            ));
        }

        sqlx::query(
            "UPDATE reservations SET restocked_at = NOW() WHERE id = $1",
        )
        .bind(reservation_id)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            UPDATE pallets p
            SET current_quantity_kg = p.current_quantity_kg + ri.quantity_kg,
                is_depleted = false,
                updated_at = NOW()
            FROM reservation_items ri
            WHERE ri.pallet_id = p.id AND ri.reservation_id = $1
            "#,
        )
        .bind(reservation_id)
        .execute(&mut *tx)
        .await?;

        let restocked: Decimal = sqlx::query_scalar(
            "SELECT COALESCE(SUM(quantity_kg), 0) FROM reservation_items WHERE reservation_id = $1",
        )
        .bind(reservation_id)
        .fetch_one(&mut *tx)
        .await?;

        // A refund restock on a paid order moves the order itself to refunded.
        sqlx::query(
            r#"
            UPDATE orders SET status = 'refunded', updated_at = NOW()
            WHERE status = 'paid'
              AND id = (SELECT order_id FROM reservations WHERE id = $1)
            "#,
        )
        .bind(reservation_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::info!(%reservation_id, restocked_kg = %restocked, "committed reservation restocked");
        Ok(restocked)
    }
}

impl PalletStockRow {
    fn into_view(self) -> PalletStockView {
        PalletStockView {
            pallet: PalletRecord {
                id: self.id,
                warehouse_id: self.warehouse_id,
                product_id: self.product_id,
                entered_at: self.entered_at,
                initial_quantity_kg: self.initial_quantity_kg,
                current_quantity_kg: self.current_quantity_kg,
                expires_at: self.expires_at,
                is_depleted: self.is_depleted,
                created_at: self.created_at,
                updated_at: self.updated_at,
            },
            held_kg: self.held_kg,
        }
    }
}
