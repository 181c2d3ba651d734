//! Validation utilities for the Farm Produce Distribution Platform

use rust_decimal::Decimal;

/// Validate that a requested weight is strictly positive
pub fn validate_positive_weight(quantity_kg: Decimal) -> Result<(), &'static str> {
    if quantity_kg <= Decimal::ZERO {
        return Err("Quantity must be greater than zero");
    }
    Ok(())
}

/// Validate a reservation TTL in seconds (must be positive and bounded;
/// checkout holds are short-lived by design)
pub fn validate_reservation_ttl(ttl_secs: i64) -> Result<(), &'static str> {
    if ttl_secs <= 0 {
        return Err("Reservation TTL must be positive");
    }
    if ttl_secs > 86_400 {
        return Err("Reservation TTL must not exceed 24 hours");
    }
    Ok(())
}

/// Validate that an intake quantity fits on a single pallet
pub fn validate_pallet_quantity(quantity_kg: Decimal) -> Result<(), &'static str> {
    if quantity_kg <= Decimal::ZERO {
        return Err("Pallet quantity must be greater than zero");
    }
    if quantity_kg > Decimal::from(2_000) {
        return Err("Pallet quantity exceeds the 2000 kg pallet limit");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn positive_weight_accepts_fractional_kilograms() {
        assert!(validate_positive_weight(dec("0.5")).is_ok());
        assert!(validate_positive_weight(dec("120")).is_ok());
    }

    #[test]
    fn positive_weight_rejects_zero_and_negative() {
        assert!(validate_positive_weight(Decimal::ZERO).is_err());
        assert!(validate_positive_weight(dec("-3")).is_err());
    }

    #[test]
    fn reservation_ttl_bounds() {
        assert!(validate_reservation_ttl(900).is_ok());
        assert!(validate_reservation_ttl(0).is_err());
        assert!(validate_reservation_ttl(-60).is_err());
        assert!(validate_reservation_ttl(86_401).is_err());
    }

    #[test]
    fn pallet_quantity_limit() {
        assert!(validate_pallet_quantity(dec("2000")).is_ok());
        assert!(validate_pallet_quantity(dec("2000.5")).is_err());
        assert!(validate_pallet_quantity(Decimal::ZERO).is_err());
    }
}
