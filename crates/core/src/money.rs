//! Monetary amounts.
//!
//! Amounts are exact decimals in the shop currency (two fractional digits
//! when stored or displayed).

use rust_decimal::{Decimal, RoundingStrategy};

use crate::DomainError;

pub type Money = Decimal;

/// Largest storable amount: ten digits, two of them fractional.
pub fn max_money() -> Money {
    Decimal::new(9_999_999_999, 2)
}

/// Reject amounts above [`max_money`]. `what` names the field in the message.
pub fn ensure_storable(what: &str, amount: Money) -> Result<(), DomainError> {
    if amount > max_money() {
        return Err(DomainError::validation(format!("{what} must not exceed {}", max_money())));
    }
    Ok(())
}

/// Round to cents, half away from zero.
pub fn round_money(amount: Money) -> Money {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rounds_half_away_from_zero() {
        assert_eq!(round_money(Decimal::new(12345, 3)), Decimal::new(1235, 2));
        assert_eq!(round_money(Decimal::new(12344, 3)), Decimal::new(1234, 2));
        assert_eq!(round_money(Decimal::new(20, 0)), Decimal::new(2000, 2));
    }

    #[test]
    fn storable_amounts_stop_at_ten_digits() {
        assert!(ensure_storable("price", Decimal::new(9_999_999_999, 2)).is_ok());
        let err = ensure_storable("price", Decimal::new(10_000_000_000, 2)).unwrap_err();
        assert!(matches!(err, DomainError::Validation(msg) if msg.starts_with("price")));
        assert!(ensure_storable("price", Decimal::MAX).is_err());
    }
}
