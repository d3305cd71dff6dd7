//! Money in Vietnamese đồng.
//!
//! The shop prices everything in VND, which has no fractional unit in
//! practice. Amounts are kept as `Decimal` so that values coming from the
//! backend (sometimes `"150000.00"`, sometimes `150000`) never lose
//! precision, and are rounded only when displayed.

use core::fmt;
use core::iter::Sum;
use core::ops::Add;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// An amount of money in VND.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Vnd(Decimal);

impl Vnd {
    /// Create an amount from a decimal value.
    #[must_use]
    pub const fn new(amount: Decimal) -> Self {
        Self(amount)
    }

    /// Create an amount from a whole number of đồng.
    #[must_use]
    pub fn from_dong(amount: i64) -> Self {
        Self(Decimal::from(amount))
    }

    /// Zero đồng.
    #[must_use]
    pub const fn zero() -> Self {
        Self(Decimal::ZERO)
    }

    /// The underlying decimal amount.
    #[must_use]
    pub const fn amount(&self) -> Decimal {
        self.0
    }

    /// Whole đồng, rounded half away from zero.
    ///
    /// Returns `None` only for amounts outside the `i64` range.
    #[must_use]
    pub fn to_dong(&self) -> Option<i64> {
        self.0
            .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
            .to_i64()
    }

    /// Multiply by a quantity, returning `None` on overflow.
    #[must_use]
    pub fn checked_mul(&self, quantity: u32) -> Option<Self> {
        self.0.checked_mul(Decimal::from(quantity)).map(Self)
    }

    /// Whether the amount is strictly positive.
    #[must_use]
    pub fn is_positive(&self) -> bool {
        self.0 > Decimal::ZERO
    }
}

impl From<Decimal> for Vnd {
    fn from(amount: Decimal) -> Self {
        Self(amount)
    }
}

impl Add for Vnd {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self(self.0 + rhs.0)
    }
}

impl Sum for Vnd {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::zero(), Add::add)
    }
}

impl<'a> Sum<&'a Self> for Vnd {
    fn sum<I: Iterator<Item = &'a Self>>(iter: I) -> Self {
        iter.copied().sum()
    }
}

/// Formats as `1.250.000 ₫`.
impl fmt::Display for Vnd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rounded = self
            .0
            .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero);
        let negative = rounded.is_sign_negative() && !rounded.is_zero();
        let digits = rounded.abs().trunc().to_string();

        let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
        for (i, ch) in digits.chars().enumerate() {
            if i > 0 && (digits.len() - i) % 3 == 0 {
                grouped.push('.');
            }
            grouped.push(ch);
        }

        if negative {
            write!(f, "-{grouped} ₫")
        } else {
            write!(f, "{grouped} ₫")
        }
    }
}

/// Whole-number percentage saved when a product is on sale.
///
/// Returns `None` unless `0 < sale_price < price`.
#[must_use]
pub fn discount_percent(price: Vnd, sale_price: Option<Vnd>) -> Option<u8> {
    let sale = sale_price?;
    if !sale.is_positive() || sale >= price {
        return None;
    }

    let saved = (price.0 - sale.0) / price.0 * Decimal::ONE_HUNDRED;
    saved
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_u8()
}
