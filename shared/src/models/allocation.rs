//! Allocation plan models
//!
//! A plan is transient: it is computed from a snapshot of availability and
//! never persisted. Only the reservation manager turns a plan into durable
//! holds.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One (pallet, quantity) leg of an allocation plan
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PalletAllocation {
    pub pallet_id: Uuid,
    pub quantity_kg: Decimal,
}

/// Result of planning one (product, quantity) request against available
/// stock, oldest pallets first.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AllocationPlan {
    /// Legs in consumption order (ascending pallet entry date)
    pub allocations: Vec<PalletAllocation>,
    pub requested_quantity_kg: Decimal,
    pub total_allocated_kg: Decimal,
    /// True when the full requested quantity was covered
    pub fully_fulfilled: bool,
}

impl AllocationPlan {
    pub fn empty(requested_quantity_kg: Decimal) -> Self {
        Self {
            allocations: Vec::new(),
            requested_quantity_kg,
            total_allocated_kg: Decimal::ZERO,
            fully_fulfilled: false,
        }
    }

    pub fn shortfall_kg(&self) -> Decimal {
        self.requested_quantity_kg - self.total_allocated_kg
    }
}

/// Availability snapshot of one pallet, as read for planning
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PalletCandidate {
    pub pallet_id: Uuid,
    pub entered_at: NaiveDate,
    pub available_kg: Decimal,
}

/// Greedily consume availability in FIFO order.
///
/// Candidates are ordered by entry date ascending, ties broken by pallet id
/// for determinism, and drained with `min(remaining, available)` per pallet
/// until the request is covered or stock runs out. Partial fulfillment is a
/// normal outcome reported through `fully_fulfilled`, not an error.
pub fn build_plan(candidates: &[PalletCandidate], requested_kg: Decimal) -> AllocationPlan {
    let mut ordered: Vec<&PalletCandidate> = candidates
        .iter()
        .filter(|c| c.available_kg > Decimal::ZERO)
        .collect();
    ordered.sort_by(|a, b| {
        a.entered_at
            .cmp(&b.entered_at)
            .then(a.pallet_id.cmp(&b.pallet_id))
    });

    let mut plan = AllocationPlan::empty(requested_kg);
    let mut remaining = requested_kg;

    for candidate in ordered {
        if remaining <= Decimal::ZERO {
            break;
        }
        let take = remaining.min(candidate.available_kg);
        plan.allocations.push(PalletAllocation {
            pallet_id: candidate.pallet_id,
            quantity_kg: take,
        });
        plan.total_allocated_kg += take;
        remaining -= take;
    }

    plan.fully_fulfilled = plan.total_allocated_kg == requested_kg;
    plan
}
