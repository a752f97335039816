//! Small pure helpers used across the engine.
use chrono::Utc;
use rand::Rng;
use stz_common::Money;

use crate::db_types::OrderNumber;

const ORDER_NUMBER_PREFIX: &str = "STZ";
const SUFFIX_ALPHABET: &[u8] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// Generates an order number of the form `STZ-YYYYMMDD-RAND4`. Uniqueness is enforced by the
/// database; collisions are retried by the caller.
pub fn generate_order_number() -> OrderNumber {
    let date = Utc::now().format("%Y%m%d");
    let mut rng = rand::thread_rng();
    let suffix: String =
        (0..4).map(|_| SUFFIX_ALPHABET[rng.gen_range(0..SUFFIX_ALPHABET.len())] as char).collect();
    OrderNumber(format!("{ORDER_NUMBER_PREFIX}-{date}-{suffix}"))
}

/// Generates a unique gateway reference for a payment attempt.
pub fn generate_payment_reference(order_number: &OrderNumber) -> String {
    format!("{}-{}", order_number.as_str(), Utc::now().timestamp_millis())
}

/// The price breakdown of an order. [`total`][PriceBreakdown::total] is fixed at creation time
/// and is the single source of truth for every later escrow movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PriceBreakdown {
    pub base_price: Money,
    pub fabric_adjustment: Money,
    pub size_adjustment: Money,
    pub add_ons_total: Money,
    pub delivery_fee: Money,
}

impl PriceBreakdown {
    pub fn total(&self) -> Money {
        self.base_price + self.fabric_adjustment + self.size_adjustment + self.add_ons_total + self.delivery_fee
    }

    /// The platform's cut, computed once at order creation from the commission percentage that is
    /// current at that moment. Never larger than the total.
    pub fn commission(&self, percentage: f64) -> Money {
        let commission = self.total().percentage(percentage);
        commission.min(self.total()).max(Money::from(0))
    }
}

#[cfg(test)]
mod test {
    use stz_common::Money;

    use super::{generate_order_number, generate_payment_reference, PriceBreakdown};

    #[test]
    fn order_number_format() {
        let n = generate_order_number();
        let parts: Vec<&str> = n.as_str().split('-').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "STZ");
        assert_eq!(parts[1].len(), 8);
        assert!(parts[1].chars().all(|c| c.is_ascii_digit()));
        assert_eq!(parts[2].len(), 4);
        assert!(parts[2].chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()));
    }

    #[test]
    fn payment_reference_embeds_order_number() {
        let n = generate_order_number();
        let r = generate_payment_reference(&n);
        assert!(r.starts_with(n.as_str()));
    }

    #[test]
    fn pricing_scenario() {
        // base 28000 + delivery 1500, no add-ons, 10% commission
        let breakdown = PriceBreakdown {
            base_price: Money::from(28_000),
            fabric_adjustment: Money::from(0),
            size_adjustment: Money::from(0),
            add_ons_total: Money::from(0),
            delivery_fee: Money::from(1_500),
        };
        assert_eq!(breakdown.total(), Money::from(29_500));
        assert_eq!(breakdown.commission(10.0), Money::from(2_950));
        assert_eq!(breakdown.total() - breakdown.commission(10.0), Money::from(26_550));
    }

    #[test]
    fn commission_is_clamped() {
        let breakdown = PriceBreakdown {
            base_price: Money::from(100),
            fabric_adjustment: Money::from(0),
            size_adjustment: Money::from(0),
            add_ons_total: Money::from(0),
            delivery_fee: Money::from(0),
        };
        assert_eq!(breakdown.commission(150.0), Money::from(100));
        assert_eq!(breakdown.commission(-5.0), Money::from(0));
    }
}
