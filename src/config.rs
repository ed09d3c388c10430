// Pricing configuration
//
// Loaded once at start-up and shared immutably. Values come from the
// process environment (a .env file is honoured by the binary); parsing
// goes through a key lookup so tests never touch process state.

use rust_decimal::Decimal;
use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

use crate::pricing::types::{CountryCode, CurrencyCode, PrintKind, RoundingMode};

const DEFAULT_VAT_RATES: &str = "DE:19,FR:20,IT:22,ES:21,NL:21,AT:20,GB:20,US:0,JP:10";
const DEFAULT_COUNTRY_CURRENCIES: &str = "US:USD,GB:GBP,JP:JPY,CH:CHF";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

impl ConfigError {
    fn invalid(key: &str, message: impl Into<String>) -> Self {
        ConfigError::InvalidValue {
            key: key.to_string(),
            message: message.into(),
        }
    }
}

/// Free-shipping threshold and flat cost for one destination class,
/// in base-currency minor units
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShippingClass {
    pub free_threshold_minor: i64,
    pub cost_minor: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PricingConfig {
    pub base_currency: CurrencyCode,
    pub default_markup_pct: Decimal,
    pub kind_markup_pct: HashMap<PrintKind, Decimal>,
    pub min_margin_pct: Decimal,
    pub fx_markup_bps: u32,
    pub fx_rounding: RoundingMode,
    pub vat_rates: HashMap<CountryCode, Decimal>,
    pub default_vat_pct: Decimal,
    pub domestic_country: CountryCode,
    pub domestic_shipping: ShippingClass,
    pub international_shipping: ShippingClass,
    pub country_currencies: HashMap<CountryCode, CurrencyCode>,
    pub rate_refresh_interval: Duration,
    pub rule_cache_ttl: Duration,
}

impl PricingConfig {
    /// Read every pricing key from the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Parse configuration from an arbitrary key lookup
    ///
    /// Unset or blank keys take their defaults; malformed values are errors.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let base_currency = parse_or(&get, "PRICING_BASE_CURRENCY", "EUR", |v| {
            CurrencyCode::parse(v).map_err(|e| e.to_string())
        })?;

        // Built-in per-kind markups only apply while the default is unset;
        // an explicit default covers every kind without its own key
        let default_markup_set = get("PRICING_DEFAULT_MARKUP_PCT").is_some();
        let default_markup_pct = parse_or(&get, "PRICING_DEFAULT_MARKUP_PCT", "50", parse_decimal)?;
        let mut kind_markup_pct = HashMap::new();
        for (kind, key, default) in [
            (PrintKind::Canvas, "PRICING_CANVAS_MARKUP_PCT", "60"),
            (PrintKind::Metal, "PRICING_METAL_MARKUP_PCT", "70"),
            (PrintKind::Photo, "PRICING_PHOTO_MARKUP_PCT", "50"),
        ] {
            if get(key).is_some() || !default_markup_set {
                kind_markup_pct.insert(kind, parse_or(&get, key, default, parse_decimal)?);
            }
        }

        let min_margin_pct = parse_or(&get, "PRICING_MIN_MARGIN_PCT", "30", parse_decimal)?;
        if min_margin_pct < Decimal::ZERO || min_margin_pct >= Decimal::ONE_HUNDRED {
            return Err(ConfigError::invalid(
                "PRICING_MIN_MARGIN_PCT",
                "must be at least 0 and below 100",
            ));
        }

        let fx_markup_bps = parse_or(&get, "PRICING_FX_MARKUP_BPS", "150", parse_from_str::<u32>)?;
        let fx_rounding = parse_or(&get, "PRICING_FX_ROUNDING", "nearest", |v| {
            RoundingMode::from_str(v)
        })?;

        let vat_rates = parse_or(&get, "PRICING_VAT_RATES", DEFAULT_VAT_RATES, |v| {
            parse_pairs(v, parse_percentage)
        })?;
        let default_vat_pct = parse_or(&get, "PRICING_DEFAULT_VAT_PCT", "19", parse_percentage)?;
        let domestic_country = parse_or(&get, "PRICING_DOMESTIC_COUNTRY", "DE", |v| {
            CountryCode::parse(v).map_err(|e| e.to_string())
        })?;

        let domestic_shipping = ShippingClass {
            free_threshold_minor: parse_or(
                &get,
                "SHIPPING_DOMESTIC_THRESHOLD_MINOR",
                "15000",
                parse_amount,
            )?,
            cost_minor: parse_or(&get, "SHIPPING_DOMESTIC_COST_MINOR", "990", parse_amount)?,
        };
        let international_shipping = ShippingClass {
            free_threshold_minor: parse_or(
                &get,
                "SHIPPING_INTERNATIONAL_THRESHOLD_MINOR",
                "30000",
                parse_amount,
            )?,
            cost_minor: parse_or(&get, "SHIPPING_INTERNATIONAL_COST_MINOR", "2490", parse_amount)?,
        };

        let country_currencies = parse_or(
            &get,
            "PRICING_COUNTRY_CURRENCIES",
            DEFAULT_COUNTRY_CURRENCIES,
            |v| parse_pairs(v, |c| CurrencyCode::parse(c).map_err(|e| e.to_string())),
        )?;

        let refresh_minutes = parse_or(
            &get,
            "RATE_REFRESH_INTERVAL_MINUTES",
            "15",
            parse_from_str::<u64>,
        )?;
        if refresh_minutes == 0 {
            return Err(ConfigError::invalid(
                "RATE_REFRESH_INTERVAL_MINUTES",
                "must be at least 1",
            ));
        }
        let ttl_seconds = parse_or(&get, "RULE_CACHE_TTL_SECONDS", "30", parse_from_str::<u64>)?;

        Ok(Self {
            base_currency,
            default_markup_pct,
            kind_markup_pct,
            min_margin_pct,
            fx_markup_bps,
            fx_rounding,
            vat_rates,
            default_vat_pct,
            domestic_country,
            domestic_shipping,
            international_shipping,
            country_currencies,
            rate_refresh_interval: Duration::from_secs(refresh_minutes * 60),
            rule_cache_ttl: Duration::from_secs(ttl_seconds),
        })
    }

    /// Configured markup for a print kind, falling back to the default
    pub fn markup_for(&self, kind: PrintKind) -> Decimal {
        self.kind_markup_pct
            .get(&kind)
            .copied()
            .unwrap_or(self.default_markup_pct)
    }

    /// Currency a destination pays in when the request does not say
    pub fn currency_for(&self, country: CountryCode) -> CurrencyCode {
        self.country_currencies
            .get(&country)
            .copied()
            .unwrap_or(self.base_currency)
    }
}

fn parse_or<G, T, P>(get: &G, key: &str, default: &str, parse: P) -> Result<T, ConfigError>
where
    G: Fn(&str) -> Option<String>,
    P: Fn(&str) -> Result<T, String>,
{
    let raw = get(key);
    let value = raw.as_deref().unwrap_or(default).trim();
    parse(value).map_err(|message| ConfigError::invalid(key, message))
}

fn parse_from_str<T>(value: &str) -> Result<T, String>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value.parse::<T>().map_err(|e| e.to_string())
}

fn parse_decimal(value: &str) -> Result<Decimal, String> {
    Decimal::from_str(value).map_err(|e| format!("'{}' is not a number: {}", value, e))
}

fn parse_percentage(value: &str) -> Result<Decimal, String> {
    let pct = parse_decimal(value)?;
    if pct < Decimal::ZERO || pct > Decimal::ONE_HUNDRED {
        return Err(format!("{} is not a percentage between 0 and 100", pct));
    }
    Ok(pct)
}

fn parse_amount(value: &str) -> Result<i64, String> {
    let amount = parse_from_str::<i64>(value)?;
    if amount < 0 {
        return Err(format!("{} must not be negative", amount));
    }
    Ok(amount)
}

/// Parse `CC:value,CC:value` into a country map
fn parse_pairs<T, P>(value: &str, parse_value: P) -> Result<HashMap<CountryCode, T>, String>
where
    P: Fn(&str) -> Result<T, String>,
{
    let mut map = HashMap::new();
    for entry in value.split(',').map(str::trim).filter(|e| !e.is_empty()) {
        let (country, raw) = entry
            .split_once(':')
            .ok_or_else(|| format!("entry '{}' is not COUNTRY:VALUE", entry))?;
        let country = CountryCode::parse(country).map_err(|e| e.to_string())?;
        map.insert(country, parse_value(raw.trim())?);
    }
    Ok(map)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = PricingConfig::from_lookup(|_| None).unwrap();
        assert_eq!(config.base_currency.as_str(), "EUR");
        assert_eq!(config.default_markup_pct, dec!(50));
        assert_eq!(config.markup_for(PrintKind::Metal), dec!(70));
        assert_eq!(config.min_margin_pct, dec!(30));
        assert_eq!(config.fx_markup_bps, 150);
        assert_eq!(config.fx_rounding, RoundingMode::Nearest);
        assert_eq!(config.vat_rates.len(), 9);
        assert_eq!(config.default_vat_pct, dec!(19));
        assert_eq!(config.domestic_country.as_str(), "DE");
        assert_eq!(config.domestic_shipping.free_threshold_minor, 15_000);
        assert_eq!(config.international_shipping.cost_minor, 2_490);
        assert_eq!(config.rate_refresh_interval, Duration::from_secs(900));
        assert_eq!(config.rule_cache_ttl, Duration::from_secs(30));
    }

    #[test]
    fn test_overrides() {
        let config = PricingConfig::from_lookup(lookup(&[
            ("PRICING_BASE_CURRENCY", "usd"),
            ("PRICING_FX_ROUNDING", "PSYCHO"),
            ("PRICING_VAT_RATES", "DE:19, CH:8.1"),
            ("RULE_CACHE_TTL_SECONDS", "0"),
            ("PRICING_CANVAS_MARKUP_PCT", " "),
        ]))
        .unwrap();

        assert_eq!(config.base_currency.as_str(), "USD");
        assert_eq!(config.fx_rounding, RoundingMode::Psycho);
        assert_eq!(config.vat_rates.len(), 2);
        assert_eq!(
            config.vat_rates.get(&CountryCode::parse("CH").unwrap()),
            Some(&dec!(8.1))
        );
        assert_eq!(config.rule_cache_ttl, Duration::ZERO);
        // Blank values fall back to the default
        assert_eq!(config.markup_for(PrintKind::Canvas), dec!(60));
    }

    #[test]
    fn test_default_markup_covers_kinds_without_their_own_key() {
        let config = PricingConfig::from_lookup(lookup(&[
            ("PRICING_DEFAULT_MARKUP_PCT", "80"),
            ("PRICING_METAL_MARKUP_PCT", "90"),
        ]))
        .unwrap();

        assert_eq!(config.markup_for(PrintKind::Canvas), dec!(80));
        assert_eq!(config.markup_for(PrintKind::Photo), dec!(80));
        assert_eq!(config.markup_for(PrintKind::Metal), dec!(90));
    }

    #[test]
    fn test_currency_inference() {
        let config = PricingConfig::from_lookup(|_| None).unwrap();
        let us = CountryCode::parse("US").unwrap();
        let fr = CountryCode::parse("FR").unwrap();
        assert_eq!(config.currency_for(us).as_str(), "USD");
        assert_eq!(config.currency_for(fr).as_str(), "EUR");
    }

    #[test]
    fn test_malformed_values_are_rejected() {
        let cases = [
            ("PRICING_MIN_MARGIN_PCT", "100"),
            ("PRICING_FX_MARKUP_BPS", "-5"),
            ("PRICING_FX_ROUNDING", "bankers"),
            ("PRICING_VAT_RATES", "DE=19"),
            ("PRICING_DEFAULT_VAT_PCT", "140"),
            ("SHIPPING_DOMESTIC_COST_MINOR", "-1"),
            ("PRICING_COUNTRY_CURRENCIES", "US:DOLLAR"),
            ("RATE_REFRESH_INTERVAL_MINUTES", "0"),
        ];
        for (key, value) in cases {
            let result = PricingConfig::from_lookup(lookup(&[(key, value)]));
            assert!(
                matches!(&result, Err(ConfigError::InvalidValue { key: k, .. }) if k == key),
                "{}={} should be rejected, got {:?}",
                key,
                value,
                result
            );
        }
    }
}
