//! Pallet (stock lot) models

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A physical batch of one product at one warehouse.
///
/// `entered_at` is the FIFO ordering key: allocation always drains the
/// oldest pallets first. Invariant:
/// `0 <= current_quantity_kg <= initial_quantity_kg`, and `is_depleted`
/// is true exactly when `current_quantity_kg` is zero. Pallets are never
/// deleted, only flagged depleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pallet {
    pub id: Uuid,
    pub warehouse_id: Uuid,
    pub product_id: Uuid,
    /// Date the stock arrived at the warehouse
    pub entered_at: NaiveDate,
    pub initial_quantity_kg: Decimal,
    /// Remaining quantity not held by any reservation. Decremented when a
    /// reservation is taken, incremented back when one is released.
    pub current_quantity_kg: Decimal,
    /// Best-before date of the produce itself, where known
    pub expires_at: Option<NaiveDate>,
    pub is_depleted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Pallet {
    /// Whether the pallet still satisfies its quantity invariant
    pub fn quantities_consistent(&self) -> bool {
        self.current_quantity_kg >= Decimal::ZERO
            && self.current_quantity_kg <= self.initial_quantity_kg
            && self.is_depleted == (self.current_quantity_kg == Decimal::ZERO)
    }
}
