//! Order flow: checkout, payment confirmation, cancellation
//!
//! The order service owns the compensating actions around the reservation
//! manager. Reservations are atomic per line item; if any line of an order
//! cannot be reserved (or the order record itself fails to persist), every
//! hold already taken for that order is released and the order removed.

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use std::collections::HashSet;
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::external::{MessagingClient, PaymentClient, PaymentStatus};
use crate::services::pallet::PalletService;
use crate::services::reservation::ReservationService;
use shared::{commission_for, validate_positive_weight, OrderStatus, ReservationState};

/// Order service driving checkout, payment and cancellation
#[derive(Clone)]
pub struct OrderService {
    db: PgPool,
    config: Arc<Config>,
    reservations: ReservationService,
    pallets: PalletService,
    payment: PaymentClient,
    messaging: Option<MessagingClient>,
}

/// One requested line of a new order
#[derive(Debug, Serialize, Deserialize)]
pub struct OrderItemInput {
    pub product_id: Uuid,
    pub quantity_kg: Decimal,
}

/// Input for placing an order
#[derive(Debug, Deserialize, Validate)]
pub struct CreateOrderInput {
    #[validate(length(min = 1, message = "Order must contain at least one item"))]
    pub items: Vec<OrderItemInput>,
    /// Delivery contact for SMS/WhatsApp updates
    pub contact_phone: Option<String>,
    /// Opt in to receiving whatever part of the request is in stock
    #[serde(default)]
    pub accept_partial: bool,
}

/// Order row as stored
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct OrderRecord {
    pub id: Uuid,
    pub customer_id: Uuid,
    pub status: String,
    pub contact_phone: Option<String>,
    pub total_weight_kg: Decimal,
    pub total_price: Decimal,
    pub commission_rate: Option<Decimal>,
    pub commission_amount: Option<Decimal>,
    pub payment_reference: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Order item row as stored
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct OrderItemRecord {
    pub id: Uuid,
    pub order_id: Uuid,
    pub product_id: Uuid,
    pub quantity_kg: Decimal,
    pub unit_price: Decimal,
    pub line_total: Decimal,
    pub reservation_id: Option<Uuid>,
}

/// Per-line outcome reported back to the customer.
/// Never exposes pallet identifiers or retry internals.
#[derive(Debug, Clone, Serialize)]
pub struct LineOutcome {
    pub product_id: Uuid,
    pub product_name: String,
    pub requested_kg: Decimal,
    pub reserved_kg: Decimal,
    pub fully_fulfilled: bool,
}

/// Result of placing an order
#[derive(Debug, Serialize)]
pub struct PlacedOrder {
    pub order: OrderRecord,
    pub lines: Vec<LineOutcome>,
    pub checkout_url: Option<String>,
}

#[derive(Debug, FromRow)]
struct PricedProduct {
    id: Uuid,
    name: String,
    price_per_kg: Decimal,
}

impl OrderService {
    /// Create a new OrderService instance
    pub fn new(
        db: PgPool,
        config: Arc<Config>,
        payment: PaymentClient,
        messaging: Option<MessagingClient>,
    ) -> Self {
        let reservations =
            ReservationService::new(db.clone(), config.reservation.max_reserve_attempts);
        let pallets = PalletService::new(db.clone());
        Self {
            db,
            config,
            reservations,
            pallets,
            payment,
            messaging,
        }
    }

    /// Place an order: persist it, reserve stock per line item, then
    /// initiate the payment charge.
    pub async fn create_order(
        &self,
        customer_id: Uuid,
        input: CreateOrderInput,
    ) -> AppResult<PlacedOrder> {
        input.validate().map_err(|e| AppError::Validation {
            field: "items".to_string(),
            message: e.to_string(),
        })?;

        let mut seen = HashSet::new();
        for item in &input.items {
            if let Err(msg) = validate_positive_weight(item.quantity_kg) {
                return Err(AppError::Validation {
                    field: "quantity_kg".to_string(),
                    message: msg.to_string(),
                });
            }
            if !seen.insert(item.product_id) {
                return Err(AppError::Validation {
                    field: "items".to_string(),
                    message: "Each product may appear in at most one line item".to_string(),
                });
            }
        }

        // Resolve prices up front so an unknown product fails before any
        // order row exists.
        let mut priced = Vec::with_capacity(input.items.len());
        for item in &input.items {
            let product = sqlx::query_as::<_, PricedProduct>(
                "SELECT id, name, price_per_kg FROM products WHERE id = $1 AND is_active = true",
            )
            .bind(item.product_id)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| AppError::NotFound("Product".to_string()))?;
            priced.push((product, item.quantity_kg));
        }

        let order_id = Uuid::new_v4();
        sqlx::query(
            r#"
            INSERT INTO orders (id, customer_id, status, contact_phone, total_weight_kg, total_price)
            VALUES ($1, $2, 'pending_payment', $3, 0, 0)
            "#,
        )
        .bind(order_id)
        .bind(customer_id)
        .bind(&input.contact_phone)
        .execute(&self.db)
        .await?;

        let ttl = Duration::seconds(self.config.reservation.default_ttl_secs);
        let mut reservation_ids = Vec::new();
        let mut lines = Vec::new();
        let mut total_weight = Decimal::ZERO;
        let mut total_price = Decimal::ZERO;

        for (product, requested_kg) in &priced {
            let hold = match self
                .reservations
                .reserve(order_id, product.id, *requested_kg, ttl, input.accept_partial)
                .await
            {
                Ok(hold) => hold,
                Err(err) => {
                    self.abort_order(order_id, &reservation_ids).await;
                    return Err(err);
                }
            };
            reservation_ids.push(hold.reservation_id);

            let line_total = (hold.total_quantity_kg * product.price_per_kg).round_dp(2);
            let insert = sqlx::query(
                r#"
                INSERT INTO order_items (order_id, product_id, quantity_kg, unit_price,
                                         line_total, reservation_id)
                VALUES ($1, $2, $3, $4, $5, $6)
                "#,
            )
            .bind(order_id)
            .bind(product.id)
            .bind(hold.total_quantity_kg)
            .bind(product.price_per_kg)
            .bind(line_total)
            .bind(hold.reservation_id)
            .execute(&self.db)
            .await;
            if let Err(err) = insert {
                self.abort_order(order_id, &reservation_ids).await;
                return Err(err.into());
            }

            total_weight += hold.total_quantity_kg;
            total_price += line_total;
            lines.push(LineOutcome {
                product_id: product.id,
                product_name: product.name.clone(),
                requested_kg: *requested_kg,
                reserved_kg: hold.total_quantity_kg,
                fully_fulfilled: hold.fully_fulfilled,
            });
        }

        let intent = match self.payment.charge(order_id, total_price).await {
            Ok(intent) => intent,
            Err(err) => {
                self.abort_order(order_id, &reservation_ids).await;
                return Err(err);
            }
        };

        let order = sqlx::query_as::<_, OrderRecord>(
            r#"
            UPDATE orders
            SET total_weight_kg = $2, total_price = $3, payment_reference = $4,
                updated_at = NOW()
            WHERE id = $1
            RETURNING id, customer_id, status, contact_phone, total_weight_kg, total_price,
                      commission_rate, commission_amount, payment_reference,
                      created_at, updated_at
            "#,
        )
        .bind(order_id)
        .bind(total_weight)
        .bind(total_price)
        .bind(&intent.reference)
        .fetch_one(&self.db)
        .await?;

        tracing::info!(
            %order_id,
            %customer_id,
            total_weight_kg = %total_weight,
            total_price = %total_price,
            "order placed"
        );

        Ok(PlacedOrder {
            order,
            lines,
            checkout_url: intent.checkout_url,
        })
    }

    /// Confirm payment for an order and make its holds permanent.
    ///
    /// Commits every reservation; if any hold expired before the payment
    /// landed, the whole order is wound down (remaining holds released,
    /// charge cancelled) so the customer is never billed for stock that was
    /// returned to the pool.
    pub async fn confirm_payment(&self, order_id: Uuid) -> AppResult<OrderRecord> {
        let order = self.get_order(order_id).await?;
        if OrderStatus::parse(&order.status) != Some(OrderStatus::PendingPayment) {
            return Err(AppError::InvalidStateTransition(format!(
                "Order is not awaiting payment (status is {})",
                order.status
            )));
        }

        let reference = order
            .payment_reference
            .as_deref()
            .ok_or_else(|| AppError::PaymentGateway("order has no payment reference".to_string()))?;
        let status = self.payment.confirm(reference).await?;
        if status != PaymentStatus::Succeeded {
            return Err(AppError::PaymentGateway(format!(
                "payment not confirmed by gateway (status {:?})",
                status
            )));
        }

        let reservations = self.reservations.list_for_order(order_id).await?;
        for reservation in &reservations {
            if let Err(err) = self.reservations.commit(reservation.id).await {
                tracing::warn!(
                    %order_id,
                    reservation_id = %reservation.id,
                    error = %err,
                    "commit failed during payment confirmation, winding order down"
                );
                self.wind_down(order_id, reference).await;
                return Err(err);
            }
        }

        let (commission_rate, commission_amount) =
            commission_for(order.total_price, order.total_weight_kg);

        let updated = sqlx::query_as::<_, OrderRecord>(
            r#"
            UPDATE orders
            SET status = 'paid', commission_rate = $2, commission_amount = $3,
                updated_at = NOW()
            WHERE id = $1
            RETURNING id, customer_id, status, contact_phone, total_weight_kg, total_price,
                      commission_rate, commission_amount, payment_reference,
                      created_at, updated_at
            "#,
        )
        .bind(order_id)
        .bind(commission_rate)
        .bind(commission_amount)
        .fetch_one(&self.db)
        .await?;

        self.notify_confirmation(&updated).await;

        tracing::info!(%order_id, "payment confirmed, holds committed");
        Ok(updated)
    }

    /// Cancel a pending order, releasing every hold
    pub async fn cancel_order(&self, order_id: Uuid) -> AppResult<OrderRecord> {
        let order = self.get_order(order_id).await?;
        if OrderStatus::parse(&order.status) != Some(OrderStatus::PendingPayment) {
            return Err(AppError::InvalidStateTransition(format!(
                "Only pending orders can be cancelled (status is {})",
                order.status
            )));
        }

        self.release_all(order_id).await?;

        if let Some(reference) = order.payment_reference.as_deref() {
            if let Err(err) = self.payment.cancel(reference).await {
                tracing::warn!(%order_id, error = %err, "payment cancel failed");
            }
        }

        let updated = sqlx::query_as::<_, OrderRecord>(
            r#"
            UPDATE orders SET status = 'cancelled', updated_at = NOW()
            WHERE id = $1
            RETURNING id, customer_id, status, contact_phone, total_weight_kg, total_price,
                      commission_rate, commission_amount, payment_reference,
                      created_at, updated_at
            "#,
        )
        .bind(order_id)
        .fetch_one(&self.db)
        .await?;

        tracing::info!(%order_id, "order cancelled");
        Ok(updated)
    }

    /// Get an order
    pub async fn get_order(&self, order_id: Uuid) -> AppResult<OrderRecord> {
        sqlx::query_as::<_, OrderRecord>(
            r#"
            SELECT id, customer_id, status, contact_phone, total_weight_kg, total_price,
                   commission_rate, commission_amount, payment_reference,
                   created_at, updated_at
            FROM orders
            WHERE id = $1
            "#,
        )
        .bind(order_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Order".to_string()))
    }

    /// Get an order's items
    pub async fn get_order_items(&self, order_id: Uuid) -> AppResult<Vec<OrderItemRecord>> {
        let items = sqlx::query_as::<_, OrderItemRecord>(
            r#"
            SELECT id, order_id, product_id, quantity_kg, unit_price, line_total, reservation_id
            FROM order_items
            WHERE order_id = $1
            ORDER BY id ASC
            "#,
        )
        .bind(order_id)
        .fetch_all(&self.db)
        .await?;
        Ok(items)
    }

    /// Release every non-committed reservation of an order, tolerating
    /// holds the sweep already finalized.
    async fn release_all(&self, order_id: Uuid) -> AppResult<()> {
        let reservations = self.reservations.list_for_order(order_id).await?;
        for reservation in reservations {
            if reservation.state == ReservationState::Committed {
                continue;
            }
            match self.reservations.release(reservation.id).await {
                Ok(()) | Err(AppError::AlreadyFinalized(_)) => {}
                Err(err) => return Err(err),
            }
        }
        Ok(())
    }

    /// Compensating action: the order could not be completed, so release
    /// every hold taken for it and remove the order record. Failures here
    /// are logged, not propagated; the expiry sweep will reclaim anything
    /// a failed release leaves behind.
    async fn abort_order(&self, order_id: Uuid, reservation_ids: &[Uuid]) {
        for reservation_id in reservation_ids {
            match self.reservations.release(*reservation_id).await {
                Ok(()) | Err(AppError::AlreadyFinalized(_)) => {}
                Err(err) => {
                    tracing::error!(
                        %order_id,
                        %reservation_id,
                        error = %err,
                        "compensating release failed; hold will expire via sweep"
                    );
                }
            }
        }
        if let Err(err) = sqlx::query("DELETE FROM orders WHERE id = $1")
            .bind(order_id)
            .execute(&self.db)
            .await
        {
            tracing::error!(%order_id, error = %err, "failed to delete aborted order");
        }
    }

    /// Wind down an order whose payment confirmation could not complete.
    ///
    /// Every hold must give its quantity back: active holds are released,
    /// and holds that were already committed earlier in the confirmation
    /// loop are reversed through the restock path, since `release` refuses
    /// committed reservations. Without the restock leg those kilograms
    /// would stay subtracted from the pallets with no paid order behind
    /// them.
    async fn wind_down(&self, order_id: Uuid, payment_reference: &str) {
        match self.reservations.list_for_order(order_id).await {
            Ok(reservations) => {
                for reservation in reservations {
                    let result = match reversal_for(reservation.state) {
                        HoldReversal::Restock => self
                            .pallets
                            .restock_committed(reservation.id)
                            .await
                            .map(|_| ()),
                        HoldReversal::Release => self.reservations.release(reservation.id).await,
                        HoldReversal::None => Ok(()),
                    };
                    match result {
                        Ok(()) | Err(AppError::AlreadyFinalized(_)) => {}
                        Err(err) => tracing::error!(
                            %order_id,
                            reservation_id = %reservation.id,
                            error = %err,
                            "hold reversal during wind-down failed"
                        ),
                    }
                }
            }
            Err(err) => {
                tracing::error!(%order_id, error = %err, "listing holds during wind-down failed");
            }
        }
        if let Err(err) = self.payment.cancel(payment_reference).await {
            tracing::warn!(%order_id, error = %err, "payment cancel during wind-down failed");
        }
        if let Err(err) = sqlx::query("UPDATE orders SET status = 'cancelled', updated_at = NOW() WHERE id = $1")
            .bind(order_id)
            .execute(&self.db)
            .await
        {
            tracing::error!(%order_id, error = %err, "failed to mark order cancelled");
        }
    }

    /// Best-effort confirmation text; never fails the payment flow
    async fn notify_confirmation(&self, order: &OrderRecord) {
        let (Some(messaging), Some(phone)) = (&self.messaging, order.contact_phone.as_deref())
        else {
            return;
        };
        let short_id = order.id.simple().to_string()[..8].to_uppercase();
        if let Err(err) = messaging
            .send_order_confirmation(phone, &short_id, &order.total_weight_kg.to_string())
            .await
        {
            tracing::warn!(order_id = %order.id, error = %err, "confirmation message failed");
        }
    }
}

/// How one hold is reversed when an order is wound down
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HoldReversal {
    /// Committed quantity goes back through the explicit restock path
    Restock,
    /// Active holds are released normally
    Release,
    /// Already finalized without quantity outstanding
    None,
}

fn reversal_for(state: ReservationState) -> HoldReversal {
    match state {
        ReservationState::Committed => HoldReversal::Restock,
        ReservationState::Active => HoldReversal::Release,
        ReservationState::Released | ReservationState::Expired => HoldReversal::None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wind_down_reverses_committed_holds_through_restock() {
        assert_eq!(
            reversal_for(ReservationState::Committed),
            HoldReversal::Restock
        );
    }

    #[test]
    fn wind_down_releases_active_holds() {
        assert_eq!(reversal_for(ReservationState::Active), HoldReversal::Release);
    }

    #[test]
    fn wind_down_leaves_finalized_holds_alone() {
        assert_eq!(
            reversal_for(ReservationState::Released),
            HoldReversal::None
        );
        assert_eq!(reversal_for(ReservationState::Expired), HoldReversal::None);
    }
}
