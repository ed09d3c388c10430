// Shipping Estimator
//
// Informational shipping figure: a flat cost per destination class,
// waived once the order subtotal reaches the class's free threshold.
// Checkout may recompute exact shipping later.

use crate::config::{PricingConfig, ShippingClass};
use crate::pricing::currency::{CurrencyConverter, RateTable};
use crate::pricing::error::PResult;
use crate::pricing::money::Money;
use crate::pricing::types::{CountryCode, CurrencyCode};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShippingEstimate {
    pub cost: Money,
    pub waived: bool,
}

#[derive(Debug, Clone)]
pub struct ShippingEstimator {
    base_currency: CurrencyCode,
    domestic_country: CountryCode,
    domestic: ShippingClass,
    international: ShippingClass,
}

impl ShippingEstimator {
    pub fn new(config: &PricingConfig) -> Self {
        Self {
            base_currency: config.base_currency,
            domestic_country: config.domestic_country,
            domestic: config.domestic_shipping,
            international: config.international_shipping,
        }
    }

    fn class_for(&self, destination: CountryCode) -> ShippingClass {
        if destination == self.domestic_country {
            self.domestic
        } else {
            self.international
        }
    }

    /// Estimate shipping for an order subtotal
    ///
    /// Thresholds and costs are configured in the base currency and
    /// converted into the subtotal's currency at the reference rate.
    pub fn estimate_shipping(
        &self,
        subtotal: Money,
        destination: CountryCode,
        converter: &CurrencyConverter,
        rates: &RateTable,
    ) -> PResult<ShippingEstimate> {
        let class = self.class_for(destination);
        let threshold = converter.convert_reference(
            Money::new(class.free_threshold_minor, self.base_currency),
            subtotal.currency,
            rates,
        )?;

        if subtotal.amount_minor >= threshold.amount_minor {
            return Ok(ShippingEstimate {
                cost: Money::zero(subtotal.currency),
                waived: true,
            });
        }

        let cost = converter.convert_reference(
            Money::new(class.cost_minor, self.base_currency),
            subtotal.currency,
            rates,
        )?;
        Ok(ShippingEstimate {
            cost,
            waived: false,
        })
    }
}
