// Tax Calculator
//
// Flat VAT per destination country. Unlisted destinations use the
// default jurisdiction rate and are logged, never rejected.

use rust_decimal::Decimal;
use std::collections::HashMap;

use crate::config::PricingConfig;
use crate::pricing::error::PResult;
use crate::pricing::money::Money;
use crate::pricing::types::{CountryCode, RoundingMode};

#[derive(Debug, Clone)]
pub struct TaxCalculator {
    rates_pct: HashMap<CountryCode, Decimal>,
    default_pct: Decimal,
}

impl TaxCalculator {
    pub fn new(config: &PricingConfig) -> Self {
        Self {
            rates_pct: config.vat_rates.clone(),
            default_pct: config.default_vat_pct,
        }
    }

    /// VAT percentage for a destination
    pub fn rate_for(&self, destination: CountryCode) -> Decimal {
        match self.rates_pct.get(&destination) {
            Some(rate) => *rate,
            None => {
                tracing::warn!(
                    "No VAT rate configured for {}, using default {}%",
                    destination,
                    self.default_pct
                );
                self.default_pct
            }
        }
    }

    /// VAT on a net amount, rounded to the nearest minor unit
    pub fn compute_tax(&self, net: Money, destination: CountryCode) -> PResult<Money> {
        let rate = self.rate_for(destination) / Decimal::ONE_HUNDRED;
        net.scale(rate, RoundingMode::Nearest)
    }
}
