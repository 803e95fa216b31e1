//! Fixed-point money helpers.
//!
//! Amounts are `rust_decimal::Decimal`; the system never computes taxes or
//! prices itself, it only validates and multiplies caller-supplied amounts.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};

use crate::error::{DomainError, DomainResult};

/// Monetary amount in the store currency.
pub type Money = Decimal;

/// Number of decimal places money is rounded to.
pub const MONEY_SCALE: u32 = 2;

/// Maximum drift tolerated when reconciling caller-supplied totals.
pub fn money_tolerance() -> Money {
    Decimal::new(1, MONEY_SCALE)
}

/// Round half away from zero to cents.
pub fn round_money(amount: Money) -> Money {
    amount.round_dp_with_strategy(MONEY_SCALE, RoundingStrategy::MidpointAwayFromZero)
}

/// `true` when `a` and `b` differ by no more than [`money_tolerance`].
pub fn approx_eq(a: Money, b: Money) -> bool {
    (a - b).abs() <= money_tolerance()
}

/// `amount * quantity`, for line totals.
pub fn extend(amount: Money, quantity: i64) -> DomainResult<Money> {
    amount
        .checked_mul(Decimal::from(quantity))
        .ok_or_else(|| DomainError::overflow(format!("{amount} x {quantity}")))
}

/// `a + b`, failing instead of panicking when the sum leaves `Decimal`'s range.
pub fn add(a: Money, b: Money) -> DomainResult<Money> {
    a.checked_add(b)
        .ok_or_else(|| DomainError::overflow(format!("{a} + {b}")))
}

/// `a + b` for quantities and points.
pub fn add_units(a: i64, b: i64) -> DomainResult<i64> {
    a.checked_add(b)
        .ok_or_else(|| DomainError::overflow(format!("{a} + {b}")))
}

/// Floor a decimal to a whole number; `None` if it does not fit in an `i64`.
pub fn floor_to_i64(amount: Decimal) -> Option<i64> {
    amount.floor().to_i64()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    #[test]
    fn tolerance_is_one_cent() {
        assert!(approx_eq(dec("10.00"), dec("10.01")));
        assert!(!approx_eq(dec("10.00"), dec("10.02")));
    }

    #[test]
    fn rounding_is_half_away_from_zero() {
        assert_eq!(round_money(dec("2.345")), dec("2.35"));
        assert_eq!(round_money(dec("-2.345")), dec("-2.35"));
    }

    #[test]
    fn extend_rejects_products_outside_decimal_range() {
        assert_eq!(extend(dec("2.50"), 4).unwrap(), dec("10.00"));
        let err = extend(Decimal::MAX, i64::MAX).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn sums_report_overflow_as_validation() {
        assert!(matches!(add(Decimal::MAX, Decimal::ONE), Err(DomainError::Validation(_))));
        assert!(matches!(add_units(i64::MAX, 1), Err(DomainError::Validation(_))));
        assert_eq!(add_units(-3, 5).unwrap(), 2);
    }

    #[test]
    fn floor_truncates_towards_negative_infinity() {
        assert_eq!(floor_to_i64(dec("42.99")), Some(42));
        assert_eq!(floor_to_i64(dec("-0.5")), Some(-1));
    }

    proptest! {
        #![proptest_config(ProptestConfig { cases: 256, .. ProptestConfig::default() })]

        #[test]
        fn extend_matches_repeated_addition(cents in 0i64..100_000, qty in 0i64..50) {
            let unit = Decimal::new(cents, MONEY_SCALE);
            let mut sum = Decimal::ZERO;
            for _ in 0..qty {
                sum += unit;
            }
            prop_assert_eq!(extend(unit, qty).unwrap(), sum);
        }
    }
}
