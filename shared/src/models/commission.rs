//! Distributor commission rates
//!
//! Commission is a pure function of the order's total weight tier; the rate
//! table mirrors the distributor agreement and has no other inputs.

use rust_decimal::Decimal;

/// Weight tiers as (lower bound in kg, rate mantissa at scale 4).
/// Ordered descending so the first matching tier wins.
const TIERS: [(i64, i64); 4] = [
    (1000, 400), // >= 1000 kg -> 4.00%
    (500, 500),  // >= 500 kg  -> 5.00%
    (100, 650),  // >= 100 kg  -> 6.50%
    (0, 800),    // below      -> 8.00%
];

/// Commission rate for a total order weight
pub fn rate_for_weight(total_kg: Decimal) -> Decimal {
    for (lower_bound_kg, rate_mantissa) in TIERS {
        if total_kg >= Decimal::from(lower_bound_kg) {
            return Decimal::new(rate_mantissa, 4);
        }
    }
    Decimal::new(800, 4)
}

/// Commission (rate, amount) for an order; amount rounds to cents
pub fn commission_for(total_price: Decimal, total_kg: Decimal) -> (Decimal, Decimal) {
    let rate = rate_for_weight(total_kg);
    (rate, (total_price * rate).round_dp(2))
}
