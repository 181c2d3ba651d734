//! Reservation models and state machine

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// State of a reservation.
///
/// The only legal transitions are out of `Active`:
/// `Active -> Committed` (payment confirmed, hold becomes permanent),
/// `Active -> Released` (manual release / cancellation),
/// `Active -> Expired` (TTL elapsed, released by the sweep).
/// All three targets are terminal; a finalized reservation is never
/// resurrected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReservationState {
    Active,
    Committed,
    Released,
    Expired,
}

impl ReservationState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReservationState::Active => "active",
            ReservationState::Committed => "committed",
            ReservationState::Released => "released",
            ReservationState::Expired => "expired",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "active" => Some(ReservationState::Active),
            "committed" => Some(ReservationState::Committed),
            "released" => Some(ReservationState::Released),
            "expired" => Some(ReservationState::Expired),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, ReservationState::Active)
    }

    /// Whether the state machine permits `self -> to`
    pub fn can_transition_to(&self, to: ReservationState) -> bool {
        matches!(self, ReservationState::Active) && to.is_terminal()
    }
}

impl std::fmt::Display for ReservationState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A time-bounded hold on pallet stock for one order line item.
///
/// While `Active`, the held quantity has already been subtracted from each
/// pallet's `current_quantity_kg`; releasing adds it back, committing makes
/// the subtraction permanent. Conservation invariant per pallet:
/// `current_quantity_kg + sum of active holds` equals the quantity the
/// pallet had before any of those holds were taken.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reservation {
    pub id: Uuid,
    pub order_id: Uuid,
    pub product_id: Uuid,
    pub requested_quantity_kg: Decimal,
    pub state: ReservationState,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub finalized_at: Option<DateTime<Utc>>,
}

impl Reservation {
    /// An active reservation past its expiry is due for the sweep and must
    /// be treated as released by every availability computation.
    pub fn is_due_for_expiry(&self, now: DateTime<Utc>) -> bool {
        self.state == ReservationState::Active && self.expires_at <= now
    }
}

/// One (pallet, quantity) pair of a reservation, in plan order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReservationItem {
    pub reservation_id: Uuid,
    pub pallet_id: Uuid,
    pub quantity_kg: Decimal,
    /// Position within the reservation's allocation plan
    pub position: i32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn active_transitions_to_all_terminal_states() {
        let active = ReservationState::Active;
        assert!(active.can_transition_to(ReservationState::Committed));
        assert!(active.can_transition_to(ReservationState::Released));
        assert!(active.can_transition_to(ReservationState::Expired));
        assert!(!active.can_transition_to(ReservationState::Active));
    }

    #[test]
    fn terminal_states_permit_no_transition() {
        for from in [
            ReservationState::Committed,
            ReservationState::Released,
            ReservationState::Expired,
        ] {
            for to in [
                ReservationState::Active,
                ReservationState::Committed,
                ReservationState::Released,
                ReservationState::Expired,
            ] {
                assert!(!from.can_transition_to(to), "{} -> {} allowed", from, to);
            }
        }
    }

    #[test]
    fn state_round_trips_through_strings() {
        for state in [
            ReservationState::Active,
            ReservationState::Committed,
            ReservationState::Released,
            ReservationState::Expired,
        ] {
            assert_eq!(ReservationState::parse(state.as_str()), Some(state));
        }
        assert_eq!(ReservationState::parse("pending"), None);
    }

    #[test]
    fn expiry_eligibility_requires_active_and_elapsed_ttl() {
        let now = Utc::now();
        let mut reservation = Reservation {
            id: Uuid::new_v4(),
            order_id: Uuid::new_v4(),
            product_id: Uuid::new_v4(),
            requested_quantity_kg: Decimal::from(10),
            state: ReservationState::Active,
            created_at: now - Duration::minutes(20),
            expires_at: now - Duration::minutes(5),
            finalized_at: None,
        };
        assert!(reservation.is_due_for_expiry(now));

        reservation.expires_at = now + Duration::minutes(5);
        assert!(!reservation.is_due_for_expiry(now));

        reservation.expires_at = now - Duration::minutes(5);
        reservation.state = ReservationState::Committed;
        assert!(!reservation.is_due_for_expiry(now));
    }
}
