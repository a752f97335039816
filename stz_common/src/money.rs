use std::{
    fmt::Display,
    iter::Sum,
    ops::{Add, Mul, Neg, Sub, SubAssign},
};

use serde::{Deserialize, Serialize};
use sqlx::Type;
use thiserror::Error;

pub const NAIRA_CURRENCY_CODE: &str = "NGN";

//--------------------------------------       Money        ----------------------------------------------------------
/// An amount of money in minor units (kobo). All prices, fees and ledger amounts on the platform are
/// expressed in `Money`. Payment gateways already deal in minor units, so no scaling happens at the edges.
#[derive(Debug, Clone, Copy, Default, Type, Ord, PartialOrd, Serialize, Deserialize)]
#[sqlx(transparent)]
pub struct Money(i64);

impl Add for Money {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self(self.0 + rhs.0)
    }
}

impl Sub for Money {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        Self(self.0 - rhs.0)
    }
}

impl SubAssign for Money {
    fn sub_assign(&mut self, rhs: Self) {
        self.0 -= rhs.0;
    }
}

impl Neg for Money {
    type Output = Self;

    fn neg(self) -> Self::Output {
        Self(-self.0)
    }
}

impl Mul<i64> for Money {
    type Output = Self;

    fn mul(self, rhs: i64) -> Self::Output {
        Self(self.0 * rhs)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), Add::add)
    }
}

#[derive(Debug, Clone, Error)]
#[error("Value cannot be represented in kobo: {0}")]
pub struct MoneyConversionError(String);

impl From<i64> for Money {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl PartialEq for Money {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl Eq for Money {}

impl TryFrom<u64> for Money {
    type Error = MoneyConversionError;

    fn try_from(value: u64) -> Result<Self, Self::Error> {
        if value > i64::MAX as u64 {
            Err(MoneyConversionError(format!("Value {} is too large to convert to Money", value)))
        } else {
            #[allow(clippy::cast_possible_wrap)]
            Ok(Self(value as i64))
        }
    }
}

impl Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let naira = self.0 as f64 / 100.0;
        write!(f, "₦{naira:0.2}")
    }
}

impl Money {
    pub fn value(&self) -> i64 {
        self.0
    }

    pub fn from_naira(naira: i64) -> Self {
        Self(naira * 100)
    }

    pub fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// The given percentage of this amount, rounded half-up to the nearest minor unit.
    pub fn percentage(&self, pct: f64) -> Self {
        #[allow(clippy::cast_possible_truncation)]
        Self((self.0 as f64 * pct / 100.0).round() as i64)
    }
}

#[cfg(test)]
mod test {
    use super::Money;

    #[test]
    fn arithmetic() {
        let a = Money::from(28_000);
        let b = Money::from(1_500);
        assert_eq!(a + b, Money::from(29_500));
        assert_eq!(a - b, Money::from(26_500));
        assert_eq!(-b, Money::from(-1_500));
        assert_eq!(b * 3, Money::from(4_500));
        let total: Money = [a, b, Money::from(500)].into_iter().sum();
        assert_eq!(total, Money::from(30_000));
    }

    #[test]
    fn percentage_rounds_half_up() {
        assert_eq!(Money::from(29_500).percentage(10.0), Money::from(2_950));
        assert_eq!(Money::from(101).percentage(10.0), Money::from(10));
        assert_eq!(Money::from(105).percentage(10.0), Money::from(11));
        assert_eq!(Money::from(1_000).percentage(12.5), Money::from(125));
    }

    #[test]
    fn display_is_in_naira() {
        assert_eq!(Money::from(29_500).to_string(), "₦295.00");
        assert_eq!(Money::from(5).to_string(), "₦0.05");
    }
}
