use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Neg, Sub};

/// Signed currency amount with exact cent precision. Negative values are
/// outflows from the account holder's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(Decimal);

impl Money {
    pub fn from_cents(cents: i64) -> Self {
        Money(Decimal::from(cents) / Decimal::from(100))
    }

    pub fn from_decimal(decimal: Decimal) -> Self {
        Money(decimal.round_dp(2))
    }

    pub fn zero() -> Self {
        Money(Decimal::ZERO)
    }

    pub fn is_zero(self) -> bool {
        self.0.is_zero()
    }

    pub fn is_outflow(self) -> bool {
        self.0.is_sign_negative() && !self.0.is_zero()
    }

    pub fn abs(self) -> Self {
        Money(self.0.abs())
    }

    /// Absolute difference between the magnitudes of two amounts, so that a
    /// -15.99 charge and a 15.99 bill are zero apart.
    pub fn magnitude_diff(self, other: Money) -> Money {
        (self.abs() - other.abs()).abs()
    }

    /// Arithmetic mean rounded to cents. `None` for an empty slice or when
    /// the total does not fit in a `Decimal`.
    pub fn mean(values: &[Money]) -> Option<Money> {
        if values.is_empty() {
            return None;
        }
        let total = values
            .iter()
            .try_fold(Decimal::ZERO, |acc, m| acc.checked_add(m.0))?;
        let mean = total.checked_div(Decimal::from(values.len()))?;
        Some(Money::from_decimal(mean))
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_sign_negative() && !self.0.is_zero() {
            write!(f, "-${:.2}", self.0.abs())
        } else {
            write!(f, "${:.2}", self.0)
        }
    }
}

impl Sub for Money {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self {
        Money(self.0 - rhs.0)
    }
}

impl Neg for Money {
    type Output = Self;
    fn neg(self) -> Self {
        Money(-self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn magnitude_diff_ignores_sign() {
        let bill = Money::from_cents(1599);
        let charge = Money::from_cents(-1599);
        assert!(charge.magnitude_diff(bill).is_zero());
        assert_eq!(
            Money::from_cents(-5060).magnitude_diff(Money::from_cents(5000)),
            Money::from_cents(60)
        );
    }

    #[test]
    fn outflow_is_strictly_negative() {
        assert!(Money::from_cents(-1).is_outflow());
        assert!(!Money::zero().is_outflow());
        assert!(!Money::from_cents(100).is_outflow());
    }

    #[test]
    fn mean_rounds_to_cents() {
        let values = [
            Money::from_cents(1000),
            Money::from_cents(1000),
            Money::from_cents(1001),
        ];
        assert_eq!(Money::mean(&values), Some(Money::from_cents(1000)));
        assert_eq!(Money::mean(&[]), None);
    }

    #[test]
    fn mean_of_overflowing_total_is_none() {
        let huge = Money::from_decimal(Decimal::MAX);
        assert_eq!(Money::mean(&[huge, huge]), None);
        assert_eq!(Money::mean(&[huge]), Some(huge));
    }

    #[test]
    fn display_formats_sign_and_cents() {
        assert_eq!(Money::from_cents(1599).to_string(), "$15.99");
        assert_eq!(Money::from_cents(-50).to_string(), "-$0.50");
    }
}
