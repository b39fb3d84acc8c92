use std::{
    fmt::Display,
    iter::Sum,
    ops::{Add, Mul},
};

use serde::{Deserialize, Serialize};
use sqlx::Type;
use thiserror::Error;

use crate::op;

pub const KES_CURRENCY_CODE: &str = "KES";

//--------------------------------------        Kes        ---------------------------------------------------------
/// An amount of Kenyan shillings. M-Pesa only moves whole shillings, so there is no fractional part.
#[derive(Debug, Clone, Copy, Default, Type, PartialEq, Eq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[sqlx(transparent)]
pub struct Kes(i64);

op!(binary Kes, Add, add);
op!(binary Kes, Sub, sub);
op!(inplace Kes, AddAssign, add_assign);
op!(inplace Kes, SubAssign, sub_assign);
op!(unary Kes, Neg, neg);

impl Mul<i64> for Kes {
    type Output = Self;

    fn mul(self, rhs: i64) -> Self::Output {
        Self::from(self.value() * rhs)
    }
}

impl Sum for Kes {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), Add::add)
    }
}

#[derive(Debug, Clone, Error, PartialEq)]
#[error("Value cannot be represented in shillings: {0}")]
pub struct KesConversionError(String);

impl From<i64> for Kes {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl TryFrom<f64> for Kes {
    type Error = KesConversionError;

    /// Rounds to the nearest whole shilling, the same way the payment provider does.
    fn try_from(value: f64) -> Result<Self, Self::Error> {
        if !value.is_finite() {
            return Err(KesConversionError(format!("{value} is not a finite number")));
        }
        let rounded = value.round();
        if rounded.abs() > i64::MAX as f64 {
            return Err(KesConversionError(format!("{value} is out of range")));
        }
        #[allow(clippy::cast_possible_truncation)]
        Ok(Self(rounded as i64))
    }
}

impl Display for Kes {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{KES_CURRENCY_CODE} {}", self.0)
    }
}

impl Kes {
    pub fn value(&self) -> i64 {
        self.0
    }

    pub fn is_positive(&self) -> bool {
        self.0 > 0
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn arithmetic() {
        let mut a = Kes::from(500);
        a += Kes::from(250);
        assert_eq!(a, Kes::from(750));
        a -= Kes::from(50);
        assert_eq!(a.value(), 700);
        assert_eq!(-a, Kes::from(-700));
        assert_eq!(Kes::from(3) * 4, Kes::from(12));
        let total: Kes = [100, 200, 300].into_iter().map(Kes::from).sum();
        assert_eq!(total, Kes::from(600));
    }

    #[test]
    fn from_float_rounds() {
        assert_eq!(Kes::try_from(499.6).unwrap(), Kes::from(500));
        assert_eq!(Kes::try_from(0.4).unwrap(), Kes::from(0));
        assert!(Kes::try_from(f64::NAN).is_err());
        assert!(Kes::try_from(f64::INFINITY).is_err());
    }

    #[test]
    fn display_and_serde() {
        assert_eq!(Kes::from(1500).to_string(), "KES 1500");
        assert_eq!(serde_json::to_string(&Kes::from(42)).unwrap(), "42");
        let k: Kes = serde_json::from_str("1000000").unwrap();
        assert_eq!(k.value(), 1_000_000);
    }
}
