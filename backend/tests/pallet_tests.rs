//! Pallet stock tests
//!
//! Tests for pallet quantity invariants and warehouse intake validation:
//! - 0 <= current <= initial, depleted flag tracks zero
//! - Intake quantity bounded by the physical pallet limit

use proptest::prelude::*;
use rust_decimal::Decimal;
use std::str::FromStr;

use chrono::{NaiveDate, Utc};
use shared::{validate_pallet_quantity, Pallet};
use uuid::Uuid;

fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

fn pallet(initial: &str, current: &str, depleted: bool) -> Pallet {
    Pallet {
        id: Uuid::new_v4(),
        warehouse_id: Uuid::new_v4(),
        product_id: Uuid::new_v4(),
        entered_at: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
        initial_quantity_kg: dec(initial),
        current_quantity_kg: dec(current),
        expires_at: None,
        is_depleted: depleted,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

mod quantity_invariant {
    use super::*;

    #[test]
    fn fresh_pallet_is_consistent() {
        assert!(pallet("500", "500", false).quantities_consistent());
    }

    #[test]
    fn partially_drained_pallet_is_consistent() {
        assert!(pallet("500", "120.5", false).quantities_consistent());
    }

    #[test]
    fn depleted_flag_must_track_zero() {
        assert!(pallet("500", "0", true).quantities_consistent());
        assert!(!pallet("500", "0", false).quantities_consistent());
        assert!(!pallet("500", "10", true).quantities_consistent());
    }

    #[test]
    fn over_or_under_drained_pallet_is_inconsistent() {
        assert!(!pallet("500", "-1", false).quantities_consistent());
        assert!(!pallet("500", "501", false).quantities_consistent());
    }
}

mod intake_validation {
    use super::*;

    #[test]
    fn intake_within_pallet_limit() {
        assert!(validate_pallet_quantity(dec("0.5")).is_ok());
        assert!(validate_pallet_quantity(dec("2000")).is_ok());
    }

    #[test]
    fn intake_rejects_zero_and_overweight() {
        assert!(validate_pallet_quantity(Decimal::ZERO).is_err());
        assert!(validate_pallet_quantity(dec("-10")).is_err());
        assert!(validate_pallet_quantity(dec("2000.001")).is_err());
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Any drain bounded by the current quantity preserves the invariant
    #[test]
    fn bounded_drains_preserve_consistency(
        initial_grams in 1i64..=2_000_000,
        drain_permille in 0i64..=1000,
    ) {
        let initial = Decimal::new(initial_grams, 3);
        let drained = (initial * Decimal::new(drain_permille, 3)).round_dp(3);
        let current = initial - drained;

        let p = Pallet {
            id: Uuid::new_v4(),
            warehouse_id: Uuid::new_v4(),
            product_id: Uuid::new_v4(),
            entered_at: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            initial_quantity_kg: initial,
            current_quantity_kg: current,
            expires_at: None,
            is_depleted: current == Decimal::ZERO,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        prop_assert!(p.quantities_consistent());
    }
}
