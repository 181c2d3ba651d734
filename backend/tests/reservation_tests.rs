//! Reservation lifecycle tests
//!
//! Tests for the reservation state machine and hold accounting:
//! - Only Active reservations change state, every target is terminal
//! - Expiry eligibility: active and past the TTL deadline
//! - Conservation of stock across reserve and release
//! - TTL validation bounds

use proptest::prelude::*;
use rust_decimal::Decimal;
use std::str::FromStr;

use chrono::{Duration, NaiveDate, Utc};
use shared::{
    build_plan, validate_reservation_ttl, PalletCandidate, Reservation, ReservationState,
};
use uuid::Uuid;

fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

fn active_reservation(ttl_minutes: i64) -> Reservation {
    let now = Utc::now();
    Reservation {
        id: Uuid::new_v4(),
        order_id: Uuid::new_v4(),
        product_id: Uuid::new_v4(),
        requested_quantity_kg: dec("25"),
        state: ReservationState::Active,
        created_at: now,
        expires_at: now + Duration::minutes(ttl_minutes),
        finalized_at: None,
    }
}

const ALL_STATES: [ReservationState; 4] = [
    ReservationState::Active,
    ReservationState::Committed,
    ReservationState::Released,
    ReservationState::Expired,
];

// ============================================================================
// State Machine Tests
// ============================================================================

mod state_machine {
    use super::*;

    #[test]
    fn active_is_the_only_non_terminal_state() {
        assert!(!ReservationState::Active.is_terminal());
        assert!(ReservationState::Committed.is_terminal());
        assert!(ReservationState::Released.is_terminal());
        assert!(ReservationState::Expired.is_terminal());
    }

    #[test]
    fn transition_grid() {
        for from in ALL_STATES {
            for to in ALL_STATES {
                let allowed = from == ReservationState::Active && to.is_terminal();
                assert_eq!(
                    from.can_transition_to(to),
                    allowed,
                    "unexpected verdict for {} -> {}",
                    from,
                    to
                );
            }
        }
    }

    #[test]
    fn committed_reservations_never_expire() {
        let mut reservation = active_reservation(-10);
        assert!(reservation.is_due_for_expiry(Utc::now()));

        reservation.state = ReservationState::Committed;
        reservation.finalized_at = Some(Utc::now());
        assert!(!reservation.is_due_for_expiry(Utc::now()));
    }

    #[test]
    fn expiry_deadline_is_inclusive() {
        let reservation = active_reservation(15);
        assert!(!reservation.is_due_for_expiry(reservation.created_at));
        assert!(reservation.is_due_for_expiry(reservation.expires_at));
        assert!(reservation.is_due_for_expiry(reservation.expires_at + Duration::seconds(1)));
    }

    #[test]
    fn state_strings_round_trip() {
        for state in ALL_STATES {
            assert_eq!(ReservationState::parse(state.as_str()), Some(state));
        }
        assert_eq!(ReservationState::parse("held"), None);
        assert_eq!(ReservationState::parse("ACTIVE"), None);
    }
}

// ============================================================================
// TTL Validation
// ============================================================================

mod ttl_validation {
    use super::*;

    #[test]
    fn default_checkout_ttl_is_valid() {
        assert!(validate_reservation_ttl(900).is_ok());
    }

    #[test]
    fn ttl_must_be_positive() {
        assert!(validate_reservation_ttl(0).is_err());
        assert!(validate_reservation_ttl(-900).is_err());
    }

    #[test]
    fn ttl_is_capped_at_one_day() {
        assert!(validate_reservation_ttl(86_400).is_ok());
        assert!(validate_reservation_ttl(86_401).is_err());
    }
}

// ============================================================================
// Hold Accounting
// ============================================================================

/// Simulated shelf: apply a plan's decrements, then add them back on release,
/// mirroring how the reservation service mutates pallet rows.
mod hold_accounting {
    use super::*;

    fn shelf() -> Vec<PalletCandidate> {
        vec![
            PalletCandidate {
                pallet_id: Uuid::new_v4(),
                entered_at: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
                available_kg: dec("60"),
            },
            PalletCandidate {
                pallet_id: Uuid::new_v4(),
                entered_at: NaiveDate::from_ymd_opt(2024, 3, 2).unwrap(),
                available_kg: dec("40"),
            },
        ]
    }

    fn apply_holds(shelf: &mut [PalletCandidate], plan: &shared::AllocationPlan, sign: Decimal) {
        for leg in &plan.allocations {
            let pallet = shelf
                .iter_mut()
                .find(|c| c.pallet_id == leg.pallet_id)
                .unwrap();
            pallet.available_kg += sign * leg.quantity_kg;
        }
    }

    #[test]
    fn reserve_then_release_restores_stock() {
        let mut stock = shelf();
        let before: Decimal = stock.iter().map(|c| c.available_kg).sum();

        let plan = build_plan(&stock, dec("75"));
        assert!(plan.fully_fulfilled);

        apply_holds(&mut stock, &plan, Decimal::NEGATIVE_ONE);
        let held: Decimal = stock.iter().map(|c| c.available_kg).sum();
        assert_eq!(held, before - dec("75"));

        apply_holds(&mut stock, &plan, Decimal::ONE);
        let after: Decimal = stock.iter().map(|c| c.available_kg).sum();
        assert_eq!(after, before);
    }

    #[test]
    fn second_reservation_sees_reduced_stock() {
        let mut stock = shelf();

        let first = build_plan(&stock, dec("90"));
        apply_holds(&mut stock, &first, Decimal::NEGATIVE_ONE);

        let second = build_plan(&stock, dec("20"));
        assert!(!second.fully_fulfilled);
        assert_eq!(second.total_allocated_kg, dec("10"));
    }

    #[test]
    fn wound_down_order_returns_all_stock_including_committed_holds() {
        // Two order lines: the first hold gets committed during payment
        // confirmation, the second expires before its commit. Winding the
        // order down must return both quantities, the committed one via
        // restock and the expired one via release.
        let mut stock = shelf();
        let before: Decimal = stock.iter().map(|c| c.available_kg).sum();

        let committed_line = build_plan(&stock, dec("50"));
        apply_holds(&mut stock, &committed_line, Decimal::NEGATIVE_ONE);
        let expired_line = build_plan(&stock, dec("30"));
        apply_holds(&mut stock, &expired_line, Decimal::NEGATIVE_ONE);

        let held: Decimal = stock.iter().map(|c| c.available_kg).sum();
        assert_eq!(held, before - dec("80"));

        // Expiry sweep finalizes the second line and returns its quantity
        apply_holds(&mut stock, &expired_line, Decimal::ONE);
        // Restock reverses the committed first line
        apply_holds(&mut stock, &committed_line, Decimal::ONE);

        let after: Decimal = stock.iter().map(|c| c.available_kg).sum();
        assert_eq!(after, before);
        assert!(build_plan(&stock, before).fully_fulfilled);
    }

    #[test]
    fn released_hold_becomes_reservable_again() {
        let mut stock = shelf();

        let first = build_plan(&stock, dec("100"));
        apply_holds(&mut stock, &first, Decimal::NEGATIVE_ONE);
        assert!(build_plan(&stock, dec("1")).allocations.is_empty());

        apply_holds(&mut stock, &first, Decimal::ONE);
        let retry = build_plan(&stock, dec("100"));
        assert!(retry.fully_fulfilled);
    }
}

// ============================================================================
// Property Tests
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Reserve/release round trip conserves total stock for any plan
    #[test]
    fn reserve_release_conserves_stock(
        weights in prop::collection::vec(1i64..=200_000, 1..=8),
        requested_grams in 1i64..=800_000,
    ) {
        let mut stock: Vec<PalletCandidate> = weights
            .iter()
            .enumerate()
            .map(|(i, grams)| PalletCandidate {
                pallet_id: Uuid::new_v4(),
                entered_at: NaiveDate::from_ymd_opt(2024, 3, (i % 28 + 1) as u32).unwrap(),
                available_kg: Decimal::new(*grams, 3),
            })
            .collect();
        let before: Decimal = stock.iter().map(|c| c.available_kg).sum();

        let plan = build_plan(&stock, Decimal::new(requested_grams, 3));
        for leg in &plan.allocations {
            let pallet = stock.iter_mut().find(|c| c.pallet_id == leg.pallet_id).unwrap();
            pallet.available_kg -= leg.quantity_kg;
            prop_assert!(pallet.available_kg >= Decimal::ZERO, "pallet driven negative");
        }
        for leg in &plan.allocations {
            let pallet = stock.iter_mut().find(|c| c.pallet_id == leg.pallet_id).unwrap();
            pallet.available_kg += leg.quantity_kg;
        }

        let after: Decimal = stock.iter().map(|c| c.available_kg).sum();
        prop_assert_eq!(after, before);
    }

    /// Expiry eligibility depends only on state and deadline
    #[test]
    fn expiry_eligibility(ttl_minutes in -120i64..=120, state_idx in 0usize..4) {
        let mut reservation = active_reservation(ttl_minutes);
        reservation.state = ALL_STATES[state_idx];

        let due = reservation.is_due_for_expiry(Utc::now());
        let expected = reservation.state == ReservationState::Active && ttl_minutes <= 0;
        prop_assert_eq!(due, expected);
    }
}
