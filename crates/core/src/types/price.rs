//! Prices, discounts and currency conversion.
//!
//! Catalog prices are whole Toman. The payment gateway takes Rial, so the
//! conversion lives here next to the amount type instead of at call sites.

use core::fmt;

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// Number of Rial in one Toman.
const RIAL_PER_TOMAN: i64 = 10;

/// An amount of money in Toman.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Toman(#[serde(with = "rust_decimal::serde::float")] Decimal);

impl Toman {
    /// Zero Toman.
    pub const ZERO: Self = Self(Decimal::ZERO);

    /// Create an amount from a decimal value.
    #[must_use]
    pub const fn new(amount: Decimal) -> Self {
        Self(amount)
    }

    /// Create an amount from a whole number of Toman.
    #[must_use]
    pub fn from_whole(amount: i64) -> Self {
        Self(Decimal::from(amount))
    }

    /// The underlying decimal value.
    #[must_use]
    pub const fn amount(&self) -> Decimal {
        self.0
    }

    /// Convert to whole Rial for the payment gateway.
    ///
    /// Fractions of a Rial are rounded half away from zero.
    #[must_use]
    pub fn to_rial(&self) -> i64 {
        let rial = (self.0 * Decimal::from(RIAL_PER_TOMAN))
            .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero);
        i64::try_from(rial).unwrap_or(0)
    }

    /// Format with thousands separators, e.g. `1,250,000`.
    #[must_use]
    pub fn grouped(&self) -> String {
        group_thousands(&self.0.round_dp(0).to_string())
    }
}

impl fmt::Display for Toman {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} Toman", self.grouped())
    }
}

impl core::ops::Add for Toman {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self(self.0 + rhs.0)
    }
}

impl core::iter::Sum for Toman {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::ZERO, |acc, x| acc + x)
    }
}

/// Insert `,` every three digits of the integer part.
fn group_thousands(digits: &str) -> String {
    let (sign, digits) = digits
        .strip_prefix('-')
        .map_or(("", digits), |rest| ("-", rest));

    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    format!("{sign}{out}")
}

/// How a product discount value is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscountKind {
    /// The value is a percentage of the price.
    #[default]
    Percent,
    /// The value is a fixed Toman amount off the price.
    Amount,
}

/// A discount as sent by the API (`discount` + `discountType`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Discount {
    #[serde(with = "rust_decimal::serde::float")]
    pub value: Decimal,
    pub kind: DiscountKind,
}

/// Result of applying a discount to a price.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiscountedPrice {
    /// Price before the discount.
    pub original: Toman,
    /// Price after the discount, never negative.
    pub final_price: Toman,
    /// Whole-number percentage to show on the badge (0..=100).
    pub percent: u8,
}

impl DiscountedPrice {
    /// Whether any discount actually applies.
    #[must_use]
    pub fn has_discount(&self) -> bool {
        self.final_price < self.original
    }
}

impl Discount {
    /// Percentage discount.
    #[must_use]
    pub const fn percent(value: Decimal) -> Self {
        Self {
            value,
            kind: DiscountKind::Percent,
        }
    }

    /// Fixed-amount discount.
    #[must_use]
    pub const fn amount(value: Decimal) -> Self {
        Self {
            value,
            kind: DiscountKind::Amount,
        }
    }

    /// Apply the discount to `price`.
    ///
    /// A zero or negative discount leaves the price untouched. Percentages
    /// above 100 and amounts above the price are clamped so the final price
    /// never drops below zero.
    #[must_use]
    pub fn apply(&self, price: Toman) -> DiscountedPrice {
        let original = price.amount();
        let hundred = Decimal::ONE_HUNDRED;

        if self.value <= Decimal::ZERO || original <= Decimal::ZERO {
            return DiscountedPrice {
                original: price,
                final_price: price,
                percent: 0,
            };
        }

        let (final_amount, percent) = match self.kind {
            DiscountKind::Percent => {
                let pct = self.value.min(hundred);
                (original - original * pct / hundred, pct)
            }
            DiscountKind::Amount => {
                let off = self.value.min(original);
                (original - off, off / original * hundred)
            }
        };

        let percent = percent
            .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
            .clamp(Decimal::ZERO, hundred);

        DiscountedPrice {
            original: price,
            final_price: Toman::new(final_amount.round_dp(0).max(Decimal::ZERO)),
            percent: u8::try_from(percent).unwrap_or(0),
        }
    }
}

/// Apply an optional discount; `None` means full price.
#[must_use]
pub fn discounted(price: Toman, discount: Option<Discount>) -> DiscountedPrice {
    discount.map_or(
        DiscountedPrice {
            original: price,
            final_price: price,
            percent: 0,
        },
        |d| d.apply(price),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percent_discount() {
        let result = Discount::percent(Decimal::from(10)).apply(Toman::from_whole(100_000));
        assert_eq!(result.final_price, Toman::from_whole(90_000));
        assert_eq!(result.percent, 10);
        assert!(result.has_discount());
    }

    #[test]
    fn test_amount_discount() {
        let result = Discount::amount(Decimal::from(15_000)).apply(Toman::from_whole(100_000));
        assert_eq!(result.final_price, Toman::from_whole(85_000));
        assert_eq!(result.percent, 15);
    }

    #[test]
    fn test_amount_discount_rounds_percent() {
        // 12,345 off 100,000 is 12.345% -> shown as 12%
        let result = Discount::amount(Decimal::from(12_345)).apply(Toman::from_whole(100_000));
        assert_eq!(result.final_price, Toman::from_whole(87_655));
        assert_eq!(result.percent, 12);
    }

    #[test]
    fn test_discount_clamped() {
        let over_percent = Discount::percent(Decimal::from(150)).apply(Toman::from_whole(50_000));
        assert_eq!(over_percent.final_price, Toman::ZERO);
        assert_eq!(over_percent.percent, 100);

        let over_amount = Discount::amount(Decimal::from(80_000)).apply(Toman::from_whole(50_000));
        assert_eq!(over_amount.final_price, Toman::ZERO);
        assert_eq!(over_amount.percent, 100);
    }

    #[test]
    fn test_zero_or_missing_discount() {
        let price = Toman::from_whole(42_000);
        let zero = Discount::percent(Decimal::ZERO).apply(price);
        assert_eq!(zero.final_price, price);
        assert_eq!(zero.percent, 0);
        assert!(!zero.has_discount());

        let none = discounted(price, None);
        assert_eq!(none.final_price, price);
    }

    #[test]
    fn test_to_rial() {
        assert_eq!(Toman::from_whole(90_000).to_rial(), 900_000);
    }

    #[test]
    fn test_grouped_display() {
        assert_eq!(Toman::from_whole(1_250_000).grouped(), "1,250,000");
        assert_eq!(Toman::from_whole(999).grouped(), "999");
        assert_eq!(Toman::from_whole(1000).to_string(), "1,000 Toman");
    }

    #[test]
    fn test_deserialize_number() {
        let t: Toman = serde_json::from_str("125000").unwrap_or_default();
        assert_eq!(t, Toman::from_whole(125_000));
    }
}
