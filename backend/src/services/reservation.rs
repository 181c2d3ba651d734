//! Reservation manager: durable, time-bounded holds on pallet stock
//!
//! All stock mutation funnels through this service. A reserve call runs as
//! one Postgres transaction per line item: sweep due holds, recompute the
//! plan, then take each pallet with a conditional decrement. The decrement's
//! WHERE clause re-checks the quantity against the latest committed row, so
//! two racing reservations can never both take the same kilograms; the loser
//! observes zero affected rows and the whole transaction rolls back.
//! Correctness rests on that storage-level check, not on in-process locking,
//! because several service instances may run against the same database.

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use sqlx::{FromRow, PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::services::allocation::fetch_availability;
use shared::{
    build_plan, validate_positive_weight, validate_reservation_ttl, AllocationPlan, Reservation,
    ReservationItem, ReservationState,
};

/// Reservation service managing holds against pallet stock
#[derive(Clone)]
pub struct ReservationService {
    db: PgPool,
    max_reserve_attempts: u32,
}

/// Outcome of a successful reserve call
#[derive(Debug, Clone)]
pub struct ReservedHold {
    pub reservation_id: Uuid,
    pub total_quantity_kg: Decimal,
    pub fully_fulfilled: bool,
}

#[derive(Debug, FromRow)]
struct ReservationRow {
    id: Uuid,
    order_id: Uuid,
    product_id: Uuid,
    requested_quantity_kg: Decimal,
    state: String,
    created_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    finalized_at: Option<DateTime<Utc>>,
}

impl ReservationRow {
    fn into_model(self) -> AppResult<Reservation> {
        let state = ReservationState::parse(&self.state).ok_or_else(|| {
            AppError::Internal(anyhow::anyhow!(
                "unknown reservation state '{}' for {}",
                self.state,
                self.id
            ))
        })?;
        Ok(Reservation {
            id: self.id,
            order_id: self.order_id,
            product_id: self.product_id,
            requested_quantity_kg: self.requested_quantity_kg,
            state,
            created_at: self.created_at,
            expires_at: self.expires_at,
            finalized_at: self.finalized_at,
        })
    }
}

impl ReservationService {
    /// Create a new ReservationService instance
    pub fn new(db: PgPool, max_reserve_attempts: u32) -> Self {
        Self {
            db,
            max_reserve_attempts: max_reserve_attempts.max(1),
        }
    }

    /// Reserve stock for one order line item.
    ///
    /// Computes a fresh plan at commit time (never reuses a preview), then
    /// decrements every planned pallet and inserts the reservation as a
    /// single atomic unit. A lost stock race is retried with a fresh plan up
    /// to the configured attempt bound; exhaustion surfaces as insufficient
    /// stock, since the contended quantity evidently is not there to take.
    ///
    /// With `accept_partial` the caller opts into reserving whatever part of
    /// the request is coverable; otherwise a short plan fails the call
    /// without mutation.
    pub async fn reserve(
        &self,
        order_id: Uuid,
        product_id: Uuid,
        requested_quantity_kg: Decimal,
        ttl: Duration,
        accept_partial: bool,
    ) -> AppResult<ReservedHold> {
        if let Err(msg) = validate_positive_weight(requested_quantity_kg) {
            return Err(AppError::Validation {
                field: "quantity_kg".to_string(),
                message: msg.to_string(),
            });
        }
        if let Err(msg) = validate_reservation_ttl(ttl.num_seconds()) {
            return Err(AppError::Validation {
                field: "ttl".to_string(),
                message: msg.to_string(),
            });
        }

        let product_name = sqlx::query_scalar::<_, String>(
            "SELECT name FROM products WHERE id = $1 AND is_active = true",
        )
        .bind(product_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Product".to_string()))?;

        let mut last_available = Decimal::ZERO;
        for attempt in 1..=self.max_reserve_attempts {
            match self
                .try_reserve(
                    order_id,
                    product_id,
                    &product_name,
                    requested_quantity_kg,
                    ttl,
                    accept_partial,
                )
                .await
            {
                Ok(hold) => {
                    tracing::info!(
                        reservation_id = %hold.reservation_id,
                        %order_id,
                        %product_id,
                        quantity_kg = %hold.total_quantity_kg,
                        attempt,
                        "reserved stock"
                    );
                    return Ok(hold);
                }
                Err(AppError::ConcurrencyConflict) if attempt < self.max_reserve_attempts => {
                    tracing::warn!(
                        %order_id,
                        %product_id,
                        attempt,
                        "stock race lost, replanning"
                    );
                }
                Err(AppError::ConcurrencyConflict) => {
                    // Retries exhausted under sustained contention; report
                    // what was observable rather than a transport error.
                    let candidates = fetch_availability(&self.db, product_id).await?;
                    last_available = candidates.iter().map(|c| c.available_kg).sum();
                    break;
                }
                Err(other) => return Err(other),
            }
        }

        Err(AppError::InsufficientStock {
            product: product_name,
            requested_kg: requested_quantity_kg,
            available_kg: last_available,
        })
    }

    async fn try_reserve(
        &self,
        order_id: Uuid,
        product_id: Uuid,
        product_name: &str,
        requested_quantity_kg: Decimal,
        ttl: Duration,
        accept_partial: bool,
    ) -> AppResult<ReservedHold> {
        let mut tx = self.db.begin().await?;

        // Enforce expiry before trusting any availability read: due holds
        // for this product are finalized here, inside our transaction.
        sweep_due(&mut tx, Some(product_id)).await?;

        let candidates = fetch_availability(&mut *tx, product_id).await?;
        let plan = build_plan(&candidates, requested_quantity_kg);

        if !plan.fully_fulfilled && !accept_partial {
            return Err(AppError::InsufficientStock {
                product: product_name.to_string(),
                requested_kg: requested_quantity_kg,
                available_kg: plan.total_allocated_kg,
            });
        }
        if plan.allocations.is_empty() {
            return Err(AppError::InsufficientStock {
                product: product_name.to_string(),
                requested_kg: requested_quantity_kg,
                available_kg: Decimal::ZERO,
            });
        }

        apply_plan_decrements(&mut tx, &plan).await?;

        let reservation_id = Uuid::new_v4();
        let expires_at = Utc::now() + ttl;
        sqlx::query(
            r#"
            INSERT INTO reservations (id, order_id, product_id, requested_quantity_kg, state, expires_at)
            VALUES ($1, $2, $3, $4, 'active', $5)
            "#,
        )
        .bind(reservation_id)
        .bind(order_id)
        .bind(product_id)
        .bind(requested_quantity_kg)
        .bind(expires_at)
        .execute(&mut *tx)
        .await?;

        for (position, leg) in plan.allocations.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO reservation_items (reservation_id, pallet_id, quantity_kg, position)
                VALUES ($1, $2, $3, $4)
                "#,
            )
            .bind(reservation_id)
            .bind(leg.pallet_id)
            .bind(leg.quantity_kg)
            .bind(position as i32)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        Ok(ReservedHold {
            reservation_id,
            total_quantity_kg: plan.total_allocated_kg,
            fully_fulfilled: plan.fully_fulfilled,
        })
    }

    /// Release an active reservation, returning its quantity to the pallets.
    ///
    /// Idempotent in the soft sense: releasing an already released or
    /// expired reservation reports `AlreadyFinalized` without mutation.
    /// Committed holds are permanent and refuse release; the refund path
    /// reverses them through the explicit restock operation instead.
    pub async fn release(&self, reservation_id: Uuid) -> AppResult<()> {
        let mut tx = self.db.begin().await?;
        let reservation = lock_reservation(&mut tx, reservation_id).await?;

        match reservation.state {
            ReservationState::Active => {
                apply_release(&mut tx, reservation_id, ReservationState::Released).await?;
                tx.commit().await?;
                tracing::info!(%reservation_id, "reservation released");
                Ok(())
            }
            ReservationState::Released | ReservationState::Expired => {
                Err(AppError::AlreadyFinalized(reservation.state))
            }
            ReservationState::Committed => Err(AppError::InvalidStateTransition(
                "Committed reservations cannot be released; use the refund restock path"
                    .to_string(),
            )),
        }
    }

    /// Make an active reservation permanent after payment confirmation.
    ///
    /// No quantity moves here: the decrement happened at reserve time, so
    /// committing only removes the hold from expiry's reach. A hold whose
    /// TTL already elapsed is expired on the spot and the commit refused,
    /// keeping this mutator consistent with expiry-aware availability reads.
    pub async fn commit(&self, reservation_id: Uuid) -> AppResult<()> {
        let mut tx = self.db.begin().await?;
        let reservation = lock_reservation(&mut tx, reservation_id).await?;

        match reservation.state {
            ReservationState::Active if reservation.expires_at <= Utc::now() => {
                apply_release(&mut tx, reservation_id, ReservationState::Expired).await?;
                tx.commit().await?;
                Err(AppError::InvalidStateTransition(
                    "Reservation expired before commit".to_string(),
                ))
            }
            ReservationState::Active => {
                sqlx::query(
                    "UPDATE reservations SET state = 'committed', finalized_at = NOW() WHERE id = $1",
                )
                .bind(reservation_id)
                .execute(&mut *tx)
                .await?;
                tx.commit().await?;
                tracing::info!(%reservation_id, "reservation committed");
                Ok(())
            }
            other => Err(AppError::InvalidStateTransition(format!(
                "Cannot commit a reservation in state {}",
                other
            ))),
        }
    }

    /// Expiry sweep: finalize every active reservation whose TTL elapsed.
    ///
    /// Returns the number of reservations expired. Runs from the background
    /// interval task and from the on-demand admin endpoint; availability
    /// reads do not depend on it having run.
    pub async fn release_expired(&self) -> AppResult<u64> {
        let mut tx = self.db.begin().await?;
        let count = sweep_due(&mut tx, None).await?;
        tx.commit().await?;
        if count > 0 {
            tracing::info!(count, "expired reservations swept");
        }
        Ok(count)
    }

    /// Fetch a reservation with its ordered pallet holds
    pub async fn get_reservation(
        &self,
        reservation_id: Uuid,
    ) -> AppResult<(Reservation, Vec<ReservationItem>)> {
        let row = sqlx::query_as::<_, ReservationRow>(
            r#"
            SELECT id, order_id, product_id, requested_quantity_kg, state,
                   created_at, expires_at, finalized_at
            FROM reservations
            WHERE id = $1
            "#,
        )
        .bind(reservation_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Reservation".to_string()))?;

        let items = sqlx::query_as::<_, (Uuid, Uuid, Decimal, i32)>(
            r#"
            SELECT reservation_id, pallet_id, quantity_kg, position
            FROM reservation_items
            WHERE reservation_id = $1
            ORDER BY position ASC
            "#,
        )
        .bind(reservation_id)
        .fetch_all(&self.db)
        .await?
        .into_iter()
        .map(|(reservation_id, pallet_id, quantity_kg, position)| ReservationItem {
            reservation_id,
            pallet_id,
            quantity_kg,
            position,
        })
        .collect();

        Ok((row.into_model()?, items))
    }

    /// List reservations belonging to an order
    pub async fn list_for_order(&self, order_id: Uuid) -> AppResult<Vec<Reservation>> {
        let rows = sqlx::query_as::<_, ReservationRow>(
            r#"
            SELECT id, order_id, product_id, requested_quantity_kg, state,
                   created_at, expires_at, finalized_at
            FROM reservations
            WHERE order_id = $1
            ORDER BY created_at ASC
            "#,
        )
        .bind(order_id)
        .fetch_all(&self.db)
        .await?;

        rows.into_iter().map(ReservationRow::into_model).collect()
    }
}

/// Lock one reservation row for the duration of the transaction
async fn lock_reservation(
    tx: &mut Transaction<'_, Postgres>,
    reservation_id: Uuid,
) -> AppResult<Reservation> {
    let row = sqlx::query_as::<_, ReservationRow>(
        r#"
        SELECT id, order_id, product_id, requested_quantity_kg, state,
               created_at, expires_at, finalized_at
        FROM reservations
        WHERE id = $1
        FOR UPDATE
        "#,
    )
    .bind(reservation_id)
    .fetch_optional(&mut **tx)
    .await?
    .ok_or_else(|| AppError::NotFound("Reservation".to_string()))?;

    row.into_model()
}

/// Decrement every planned pallet, all-or-nothing.
///
/// The WHERE guard re-checks the quantity atomically; a zero-row update
/// means another transaction got there first and the caller must roll back
/// and replan.
async fn apply_plan_decrements(
    tx: &mut Transaction<'_, Postgres>,
    plan: &AllocationPlan,
) -> AppResult<()> {
    for leg in &plan.allocations {
        let result = sqlx::query(
            r#"
            UPDATE pallets
            SET current_quantity_kg = current_quantity_kg - $1,
                is_depleted = (current_quantity_kg - $1 <= 0),
                updated_at = NOW()
            WHERE id = $2 AND current_quantity_kg >= $1
            "#,
        )
        .bind(leg.quantity_kg)
        .bind(leg.pallet_id)
        .execute(&mut **tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::ConcurrencyConflict);
        }
    }
    Ok(())
}

/// Return a reservation's held quantity to its pallets and finalize it.
///
/// Shared by manual release, the expiry sweep and the pre-reserve sweep so
/// every path restores stock with the same per-pallet increment.
async fn apply_release(
    tx: &mut Transaction<'_, Postgres>,
    reservation_id: Uuid,
    target: ReservationState,
) -> AppResult<()> {
    debug_assert!(ReservationState::Active.can_transition_to(target));

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
    .execute(&mut **tx)
    .await?;

    sqlx::query("UPDATE reservations SET state = $2, finalized_at = NOW() WHERE id = $1")
        .bind(reservation_id)
        .bind(target.as_str())
        .execute(&mut **tx)
        .await?;

    Ok(())
}

/// Finalize due active reservations, optionally scoped to one product.
///
/// Rows are locked in id order so concurrent sweeps and releases cannot
/// deadlock against each other.
async fn sweep_due(
    tx: &mut Transaction<'_, Postgres>,
    product_id: Option<Uuid>,
) -> AppResult<u64> {
    let due: Vec<Uuid> = sqlx::query_scalar(
        r#"
        SELECT id FROM reservations
        WHERE state = 'active' AND expires_at <= NOW()
          AND ($1::uuid IS NULL OR product_id = $1)
        ORDER BY id
        FOR UPDATE
        "#,
    )
    .bind(product_id)
    .fetch_all(&mut **tx)
    .await?;

    for reservation_id in &due {
        apply_release(tx, *reservation_id, ReservationState::Expired).await?;
        tracing::debug!(%reservation_id, "reservation expired");
    }

    Ok(due.len() as u64)
}
