// Money value type and rounding primitives
//
// Amounts are integer minor units tagged with their currency. Arithmetic
// between different currencies is refused; conversion goes through the
// currency converter. Decimal is only used for rates and percentages, and
// every result is rounded back to whole minor units here.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::pricing::error::{PResult, PricingError};
use crate::pricing::types::{CurrencyCode, RoundingMode, RoundingRule};

/// Midpoint handling for `RoundingMode::Nearest`: half away from zero
///
/// 0.5 minor units round up for positive amounts (1231.5 -> 1232) and
/// down for negative ones (-720.5 -> -721).
pub const NEAREST_MIDPOINT: RoundingStrategy = RoundingStrategy::MidpointAwayFromZero;

/// A currency-tagged amount in minor units
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Money {
    pub amount_minor: i64,
    pub currency: CurrencyCode,
}

impl Money {
    pub const fn new(amount_minor: i64, currency: CurrencyCode) -> Self {
        Self {
            amount_minor,
            currency,
        }
    }

    pub const fn zero(currency: CurrencyCode) -> Self {
        Self::new(0, currency)
    }

    pub const fn is_zero(&self) -> bool {
        self.amount_minor == 0
    }

    /// Same-currency addition
    pub fn checked_add(self, other: Money) -> PResult<Money> {
        self.ensure_same_currency(&other)?;
        self.amount_minor
            .checked_add(other.amount_minor)
            .map(|amount| Money::new(amount, self.currency))
            .ok_or_else(|| overflow("addition"))
    }

    /// Same-currency subtraction
    pub fn checked_sub(self, other: Money) -> PResult<Money> {
        self.ensure_same_currency(&other)?;
        self.amount_minor
            .checked_sub(other.amount_minor)
            .map(|amount| Money::new(amount, self.currency))
            .ok_or_else(|| overflow("subtraction"))
    }

    /// Multiply a unit figure by a quantity
    pub fn times(self, qty: u32) -> PResult<Money> {
        self.amount_minor
            .checked_mul(i64::from(qty))
            .map(|amount| Money::new(amount, self.currency))
            .ok_or_else(|| overflow("quantity multiplication"))
    }

    /// Multiply by a decimal factor, rounding to whole minor units
    pub fn scale(self, factor: Decimal, mode: RoundingMode) -> PResult<Money> {
        let scaled = Decimal::from(self.amount_minor)
            .checked_mul(factor)
            .ok_or_else(|| overflow("scaling"))?;
        Ok(Money::new(
            round_to_minor(scaled, mode, self.currency)?,
            self.currency,
        ))
    }

    fn ensure_same_currency(&self, other: &Money) -> PResult<()> {
        if self.currency != other.currency {
            return Err(PricingError::CurrencyMismatch {
                left: self.currency,
                right: other.currency,
            });
        }
        Ok(())
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let exponent = self.currency.minor_exponent();
        if exponent == 0 {
            return write!(f, "{} {}", self.amount_minor, self.currency);
        }
        let major = Decimal::new(self.amount_minor, exponent);
        write!(f, "{} {}", major, self.currency)
    }
}

fn overflow(operation: &str) -> PricingError {
    PricingError::Calculation(format!("Amount overflow during {}", operation))
}

/// Convert a decimal minor-unit value into an integer amount
pub fn decimal_to_minor(value: Decimal) -> PResult<i64> {
    value
        .to_i64()
        .ok_or_else(|| PricingError::Calculation(format!("Amount {} out of range", value)))
}

/// Round a fractional minor-unit amount with the given mode
///
/// `Psycho` first rounds to the nearest minor unit, then applies the
/// attractive-ending adjustment for the currency.
pub fn round_to_minor(value: Decimal, mode: RoundingMode, currency: CurrencyCode) -> PResult<i64> {
    let rounded = match mode {
        RoundingMode::Nearest | RoundingMode::Psycho => {
            value.round_dp_with_strategy(0, NEAREST_MIDPOINT)
        }
        RoundingMode::Floor => value.floor(),
        RoundingMode::Ceil => value.ceil(),
    };
    let amount = decimal_to_minor(rounded)?;
    match mode {
        RoundingMode::Psycho => psycho_round(amount, currency),
        _ => Ok(amount),
    }
}

/// Step used by psychological rounding: 100 minor units for two-decimal
/// currencies (…99), 10 for zero-decimal currencies (…9)
pub fn psycho_step(currency: CurrencyCode) -> i64 {
    if currency.minor_exponent() == 0 {
        10
    } else {
        100
    }
}

/// Adjust a positive amount so it ends in `step - 1`
///
/// Amounts that already end that way are returned unchanged, which makes
/// the adjustment idempotent. Otherwise the amount is rounded half-up to
/// a multiple of the step (never below one step) and offset by -1.
pub fn psycho_round(amount_minor: i64, currency: CurrencyCode) -> PResult<i64> {
    if amount_minor <= 0 {
        return Ok(amount_minor);
    }
    let step = psycho_step(currency);
    if amount_minor % step == step - 1 {
        return Ok(amount_minor);
    }
    let multiples = amount_minor
        .checked_add(step / 2)
        .ok_or_else(|| overflow("psychological rounding"))?
        / step;
    multiples
        .max(1)
        .checked_mul(step)
        .map(|amount| amount - 1)
        .ok_or_else(|| overflow("psychological rounding"))
}

/// Apply an artist price-ending rule, always rounding upward
///
/// Rounding up keeps any margin floor already enforced on the price.
pub fn apply_rounding_rule(amount_minor: i64, rule: RoundingRule) -> PResult<i64> {
    let ending = match rule {
        RoundingRule::None => return Ok(amount_minor),
        RoundingRule::End00 => 0,
        RoundingRule::End90 => 90,
        RoundingRule::End99 => 99,
    };
    if amount_minor <= 0 {
        return Ok(amount_minor);
    }
    let base = amount_minor - amount_minor.rem_euclid(100);
    let candidate = base
        .checked_add(ending)
        .ok_or_else(|| overflow("price ending"))?;
    if candidate >= amount_minor {
        Ok(candidate)
    } else {
        candidate
            .checked_add(100)
            .ok_or_else(|| overflow("price ending"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn eur() -> CurrencyCode {
        CurrencyCode::parse("EUR").unwrap()
    }

    fn jpy() -> CurrencyCode {
        CurrencyCode::parse("JPY").unwrap()
    }

    #[test]
    fn test_arithmetic() {
        let a = Money::new(1099, eur());
        let b = Money::new(500, eur());
        assert_eq!(a.checked_add(b).unwrap().amount_minor, 1599);
        assert_eq!(a.checked_sub(b).unwrap().amount_minor, 599);
        assert_eq!(a.times(3).unwrap().amount_minor, 3297);
    }

    #[test]
    fn test_cross_currency_arithmetic_is_refused() {
        let a = Money::new(1000, eur());
        let b = Money::new(1000, jpy());
        assert!(matches!(
            a.checked_add(b),
            Err(PricingError::CurrencyMismatch { .. })
        ));
        assert!(a.checked_sub(b).is_err());
    }

    #[test]
    fn test_overflow_is_an_error() {
        let a = Money::new(i64::MAX, eur());
        assert!(matches!(a.times(2), Err(PricingError::Calculation(_))));
        assert!(a.checked_add(Money::new(1, eur())).is_err());
    }

    #[test]
    fn test_nearest_rounds_half_away_from_zero() {
        assert_eq!(round_to_minor(dec!(1231.5), RoundingMode::Nearest, eur()).unwrap(), 1232);
        assert_eq!(round_to_minor(dec!(1231.49), RoundingMode::Nearest, eur()).unwrap(), 1231);
        assert_eq!(round_to_minor(dec!(-720.5), RoundingMode::Nearest, eur()).unwrap(), -721);
        // 2.5 goes to 3, not to the even neighbour
        assert_eq!(round_to_minor(dec!(2.5), RoundingMode::Nearest, eur()).unwrap(), 3);
    }

    #[test]
    fn test_floor_and_ceil() {
        assert_eq!(round_to_minor(dec!(10.9), RoundingMode::Floor, eur()).unwrap(), 10);
        assert_eq!(round_to_minor(dec!(10.1), RoundingMode::Ceil, eur()).unwrap(), 11);
        assert_eq!(round_to_minor(dec!(10), RoundingMode::Ceil, eur()).unwrap(), 10);
    }

    #[test]
    fn test_psycho_round() {
        assert_eq!(psycho_round(8462, eur()).unwrap(), 8499);
        assert_eq!(psycho_round(8412, eur()).unwrap(), 8399);
        assert_eq!(psycho_round(8450, eur()).unwrap(), 8499);
        assert_eq!(psycho_round(8499, eur()).unwrap(), 8499);
        assert_eq!(psycho_round(30, eur()).unwrap(), 99);
        assert_eq!(psycho_round(0, eur()).unwrap(), 0);
        assert_eq!(psycho_round(1234, jpy()).unwrap(), 1229);
        assert_eq!(psycho_round(1239, jpy()).unwrap(), 1239);
    }

    #[test]
    fn test_rounding_near_the_amount_limit_is_an_error() {
        assert!(matches!(
            psycho_round(i64::MAX - 10, eur()),
            Err(PricingError::Calculation(_))
        ));
        assert!(matches!(
            round_to_minor(Decimal::from(i64::MAX - 10), RoundingMode::Psycho, eur()),
            Err(PricingError::Calculation(_))
        ));
        assert!(matches!(
            apply_rounding_rule(i64::MAX, RoundingRule::End00),
            Err(PricingError::Calculation(_))
        ));
        // already on the ending, nothing to add
        assert_eq!(psycho_round(i64::MAX - 8, eur()).unwrap(), i64::MAX - 8);
    }

    #[test]
    fn test_rounding_rule_rounds_up() {
        assert_eq!(apply_rounding_rule(8462, RoundingRule::None).unwrap(), 8462);
        assert_eq!(apply_rounding_rule(8462, RoundingRule::End00).unwrap(), 8500);
        assert_eq!(apply_rounding_rule(8400, RoundingRule::End00).unwrap(), 8400);
        assert_eq!(apply_rounding_rule(8462, RoundingRule::End90).unwrap(), 8490);
        assert_eq!(apply_rounding_rule(8495, RoundingRule::End90).unwrap(), 8590);
        assert_eq!(apply_rounding_rule(8462, RoundingRule::End99).unwrap(), 8499);
        assert_eq!(apply_rounding_rule(8499, RoundingRule::End99).unwrap(), 8499);
    }

    #[test]
    fn test_scale() {
        let net = Money::new(6480, eur());
        let vat = net.scale(dec!(0.19), RoundingMode::Nearest).unwrap();
        assert_eq!(vat.amount_minor, 1231);
        assert_eq!(vat.currency, eur());
    }

    #[test]
    fn test_display() {
        assert_eq!(Money::new(1099, eur()).to_string(), "10.99 EUR");
        assert_eq!(Money::new(1500, jpy()).to_string(), "1500 JPY");
    }
}
