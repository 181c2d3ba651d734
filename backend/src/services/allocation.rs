//! Allocation planner: assigns requested quantity to pallets, oldest first
//!
//! Planning is a pure read. It never mutates stock or reservation state, so
//! the order flow can call it any number of times for price and feasibility
//! previews. Only the reservation service turns a plan into durable holds.

use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use rust_decimal::Decimal;
use shared::{build_plan, validate_positive_weight, AllocationPlan, PalletCandidate};

/// Allocation service for computing FIFO allocation plans
#[derive(Clone)]
pub struct AllocationService {
    db: PgPool,
}

#[derive(Debug, FromRow)]
struct AvailabilityRow {
    pallet_id: Uuid,
    entered_at: chrono::NaiveDate,
    available_kg: Decimal,
}

impl AllocationService {
    /// Create a new AllocationService instance
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Compute a FIFO allocation plan for a product.
    ///
    /// A non-positive request is a caller error; an unknown or inactive
    /// product is reported as not found.
    pub async fn plan(
        &self,
        product_id: Uuid,
        requested_quantity_kg: Decimal,
    ) -> AppResult<AllocationPlan> {
        if let Err(msg) = validate_positive_weight(requested_quantity_kg) {
            return Err(AppError::Validation {
                field: "quantity_kg".to_string(),
                message: msg.to_string(),
            });
        }

        let product_exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM products WHERE id = $1 AND is_active = true)",
        )
        .bind(product_id)
        .fetch_one(&self.db)
        .await?;

        if !product_exists {
            return Err(AppError::NotFound("Product".to_string()));
        }

        let candidates = fetch_availability(&self.db, product_id).await?;
        Ok(build_plan(&candidates, requested_quantity_kg))
    }
}

/// Read per-pallet availability for a product, oldest pallets first.
///
/// `available_kg` is the pallet's current quantity plus everything held by
/// active reservations whose TTL has already elapsed: an expired hold counts
/// as released even before the sweep has finalized it, so availability
/// readers and mutators never disagree about a hold that timed out.
///
/// Takes any Postgres executor so the reservation service can run the same
/// read inside its transaction.
pub(crate) async fn fetch_availability<'e, E>(
    executor: E,
    product_id: Uuid,
) -> Result<Vec<PalletCandidate>, sqlx::Error>
where
    E: sqlx::Executor<'e, Database = sqlx::Postgres>,
{
    let rows = sqlx::query_as::<_, AvailabilityRow>(
        r#"
        SELECT p.id AS pallet_id, p.entered_at,
               p.current_quantity_kg
               + COALESCE(SUM(ri.quantity_kg)
                          FILTER (WHERE r.state = 'active' AND r.expires_at <= NOW()), 0)
               AS available_kg
        FROM pallets p
        LEFT JOIN reservation_items ri ON ri.pallet_id = p.id
        LEFT JOIN reservations r ON r.id = ri.reservation_id
        WHERE p.product_id = $1
        GROUP BY p.id, p.entered_at, p.current_quantity_kg
        ORDER BY p.entered_at ASC, p.id ASC
        "#,
    )
    .bind(product_id)
    .fetch_all(executor)
    .await?;

    Ok(rows
        .into_iter()
        .map(|r| PalletCandidate {
            pallet_id: r.pallet_id,
            entered_at: r.entered_at,
            available_kg: r.available_kg,
        })
        .collect())
}
