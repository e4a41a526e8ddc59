use async_trait::async_trait;
use rust_decimal::{Decimal, RoundingStrategy, prelude::ToPrimitive};
use thiserror::Error;
use uuid::Uuid;

pub mod stripe;

pub use stripe::StripeGateway;

/// Handle for an authorized-but-not-yet-captured charge held by the
/// external processor. Capture happens out-of-band with the client secret.
#[derive(Debug, Clone)]
pub struct PaymentIntent {
    pub id: String,
    pub client_secret: String,
}

#[derive(Debug, Error)]
pub enum PaymentError {
    #[error("payment gateway request failed")]
    Request(#[from] reqwest::Error),

    #[error("payment gateway rejected the request: {0}")]
    Rejected(String),

    #[error("unexpected payment gateway response")]
    Malformed,
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Create a payment intent for `amount_minor` units of `currency`,
    /// tagged with the user id for later reconciliation.
    async fn create_intent(
        &self,
        amount_minor: i64,
        currency: &str,
        user_id: Uuid,
    ) -> Result<PaymentIntent, PaymentError>;
}

/// Convert a decimal amount to minor currency units (cents), rounding
/// midpoints away from zero. Returns `None` if the amount does not fit.
pub fn to_minor_units(amount: Decimal) -> Option<i64> {
    (amount * Decimal::from(100))
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_i64()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use std::str::FromStr;

    #[test]
    fn whole_amounts_convert_to_cents() {
        assert_eq!(to_minor_units(Decimal::from(20)), Some(2000));
        assert_eq!(
            to_minor_units(Decimal::from_str("89.99").unwrap()),
            Some(8999)
        );
    }

    #[test]
    fn sub_cent_amounts_round_half_away_from_zero() {
        assert_eq!(to_minor_units(Decimal::from_str("0.005").unwrap()), Some(1));
        assert_eq!(
            to_minor_units(Decimal::from_str("10.994").unwrap()),
            Some(1099)
        );
    }

    #[test]
    fn out_of_range_amounts_are_rejected() {
        let huge = Decimal::from(i64::MAX);
        assert_eq!(to_minor_units(huge), None);
    }
}
