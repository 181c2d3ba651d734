//! Order model tests
//!
//! Tests for order status handling and order arithmetic:
//! - Status strings round trip through the database representation
//! - Line totals and order totals agree
//! - Commission is only present once an order is paid

use rust_decimal::Decimal;
use std::str::FromStr;

use chrono::Utc;
use shared::{commission_for, Order, OrderItem, OrderStatus};
use uuid::Uuid;

fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

fn line(product_price: &str, quantity: &str) -> OrderItem {
    let unit_price = dec(product_price);
    let quantity_kg = dec(quantity);
    OrderItem {
        id: Uuid::new_v4(),
        order_id: Uuid::new_v4(),
        product_id: Uuid::new_v4(),
        quantity_kg,
        unit_price,
        line_total: (unit_price * quantity_kg).round_dp(2),
        reservation_id: Some(Uuid::new_v4()),
    }
}

#[test]
fn status_strings_round_trip() {
    for status in [
        OrderStatus::PendingPayment,
        OrderStatus::Paid,
        OrderStatus::Cancelled,
        OrderStatus::Refunded,
    ] {
        assert_eq!(OrderStatus::parse(status.as_str()), Some(status));
    }
    assert_eq!(OrderStatus::parse("shipped"), None);
}

#[test]
fn line_totals_sum_to_order_totals() {
    let lines = vec![line("45.50", "12.5"), line("30.00", "80"), line("62.25", "7.25")];

    let total_weight: Decimal = lines.iter().map(|l| l.quantity_kg).sum();
    let total_price: Decimal = lines.iter().map(|l| l.line_total).sum();

    assert_eq!(total_weight, dec("99.75"));
    assert_eq!(total_price, dec("3420.06"));

    // 99.75 kg lands in the sub-100 tier
    let (rate, amount) = commission_for(total_price, total_weight);
    assert_eq!(rate, dec("0.08"));
    assert_eq!(amount, dec("273.60"));
}

#[test]
fn pending_order_carries_no_commission() {
    let order = Order {
        id: Uuid::new_v4(),
        customer_id: Uuid::new_v4(),
        status: OrderStatus::PendingPayment,
        total_weight_kg: dec("150"),
        total_price: dec("4500.00"),
        commission_rate: None,
        commission_amount: None,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    };

    assert_eq!(order.status, OrderStatus::PendingPayment);
    assert!(order.commission_rate.is_none());
    assert!(order.commission_amount.is_none());
}

#[test]
fn paid_order_commission_matches_the_tier_table() {
    let total_price = dec("4500.00");
    let total_weight = dec("150");
    let (rate, amount) = commission_for(total_price, total_weight);

    let order = Order {
        id: Uuid::new_v4(),
        customer_id: Uuid::new_v4(),
        status: OrderStatus::Paid,
        total_weight_kg: total_weight,
        total_price,
        commission_rate: Some(rate),
        commission_amount: Some(amount),
        created_at: Utc::now(),
        updated_at: Utc::now(),
    };

    assert_eq!(order.commission_rate, Some(dec("0.065")));
    assert_eq!(order.commission_amount, Some(dec("292.50")));
}
