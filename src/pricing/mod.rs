// Price Quote Engine
//
// Computes a currency-correct, tax-inclusive, itemized quote for an
// original artwork or a print edition:
// - Base price: list price, or print cost with artist markup and margin floor
// - Discounts: scope-matched, time-windowed, priority-ordered promotional rules
// - Currency conversion from periodically refreshed rate snapshots
// - VAT per destination and an informational shipping estimate
//
// Inputs are fetched from the collaborator stores at the start of a quote;
// the pipeline itself is synchronous and side-effect free.

pub mod base_price;
pub mod currency;
pub mod discount;
pub mod error;
pub mod metrics;
pub mod money;
pub mod quote;
pub mod shipping;
pub mod tax;
pub mod types;

pub use base_price::{BasePrice, BasePriceResolver, CostKey};
pub use currency::{CurrencyConverter, RateRefresher, RateStore, RateTable};
pub use discount::{DiscountOutcome, DiscountResolver, PricingRule, RuleScope, RuleTarget};
pub use error::{PResult, PricingError};
pub use metrics::{MetricsSummary, PerformanceMetrics};
pub use money::Money;
pub use quote::{Quote, UnitBreakdown};
pub use shipping::{ShippingEstimate, ShippingEstimator};
pub use tax::TaxCalculator;
pub use types::{CountryCode, CurrencyCode, Format, PrintKind, RoundingMode, RoundingRule};

use chrono::{DateTime, Utc};
use std::sync::Arc;
use uuid::Uuid;

use crate::config::PricingConfig;
use crate::stores::{
    ArtistPricingProfile, ArtistProfileStore, CatalogStore, CostTable, PrintBaseCost, RuleStore,
    ScopeHint, SellableItem,
};
use quote::{assemble_quote, QuoteContext, UnitFigures};

/// Largest quantity a single quote accepts
pub const MAX_QUOTE_QTY: u32 = 1000;

/// What the caller wants priced
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuoteRequest {
    pub item_id: Uuid,
    pub edition_id: Option<Uuid>,
    pub format: Format,
    pub size_label: Option<String>,
    pub qty: u32,
    pub destination_country: CountryCode,
    /// Defaults to the destination's currency, else the base currency
    pub currency: Option<CurrencyCode>,
}

/// The read-only stores a quote draws on
#[derive(Clone)]
pub struct Collaborators {
    pub catalog: Arc<dyn CatalogStore>,
    pub rules: Arc<dyn RuleStore>,
    pub costs: Arc<dyn CostTable>,
    pub profiles: Arc<dyn ArtistProfileStore>,
}

impl Collaborators {
    /// Use one store for every collaborator
    pub fn shared<S>(store: Arc<S>) -> Self
    where
        S: CatalogStore + RuleStore + CostTable + ArtistProfileStore + 'static,
    {
        Self {
            catalog: store.clone(),
            rules: store.clone(),
            costs: store.clone(),
            profiles: store,
        }
    }

    /// Replace the rule store, e.g. with a cached one
    pub fn with_rules(mut self, rules: Arc<dyn RuleStore>) -> Self {
        self.rules = rules;
        self
    }
}

/// Inputs captured at the start of a quote
pub struct PricingInputs<'a> {
    pub request: &'a QuoteRequest,
    pub item: &'a SellableItem,
    pub cost: Option<&'a PrintBaseCost>,
    pub profile: Option<&'a ArtistPricingProfile>,
    pub rules: &'a [PricingRule],
    pub rates: &'a RateTable,
    pub now: DateTime<Utc>,
}

/// Quote Engine
///
/// Sequences base price, discounts, conversion, tax and shipping.
/// Any stage error aborts the quote; partial quotes are never returned.
pub struct QuoteEngine {
    config: Arc<PricingConfig>,
    collaborators: Collaborators,
    rates: Arc<RateStore>,
    base_price: BasePriceResolver,
    discounts: DiscountResolver,
    converter: CurrencyConverter,
    tax: TaxCalculator,
    shipping: ShippingEstimator,
    metrics: PerformanceMetrics,
}

impl QuoteEngine {
    pub fn new(
        config: Arc<PricingConfig>,
        collaborators: Collaborators,
        rates: Arc<RateStore>,
        metrics: PerformanceMetrics,
    ) -> Self {
        Self {
            base_price: BasePriceResolver::new(&config),
            discounts: DiscountResolver::new(),
            converter: CurrencyConverter::new(config.fx_markup_bps, config.fx_rounding),
            tax: TaxCalculator::new(&config),
            shipping: ShippingEstimator::new(&config),
            config,
            collaborators,
            rates,
            metrics,
        }
    }

    pub fn metrics(&self) -> &PerformanceMetrics {
        &self.metrics
    }

    /// Quote at the current time
    pub async fn get_quote(&self, request: &QuoteRequest) -> PResult<Quote> {
        self.get_quote_at(request, Utc::now()).await
    }

    /// Quote as of `now`; rule windows are evaluated at this instant
    pub async fn get_quote_at(&self, request: &QuoteRequest, now: DateTime<Utc>) -> PResult<Quote> {
        let _timer = self.metrics.start_quote();

        let result = self.fetch_and_price(request, now).await;
        if let Err(ref e) = result {
            self.metrics.record_quote_failure();
            if e.is_internal() {
                tracing::error!("Quote for item {} failed: {}", request.item_id, e);
            } else {
                tracing::debug!("Quote for item {} rejected: {}", request.item_id, e);
            }
        }
        result
    }

    async fn fetch_and_price(&self, request: &QuoteRequest, now: DateTime<Utc>) -> PResult<Quote> {
        validate_qty(request.qty)?;

        // Snapshot first so one quote never mixes two rate tables
        let rates = self.rates.snapshot();

        let item = self
            .collaborators
            .catalog
            .get_sellable_item(request.item_id, request.edition_id)
            .await?
            .ok_or(PricingError::ItemNotFound {
                artwork_id: request.item_id,
                edition_id: request.edition_id,
            })?;

        let cost_key = self
            .base_price
            .cost_key(&item, request.format, request.size_label.as_deref())?;

        let cost = async {
            match &cost_key {
                Some(key) => {
                    self.collaborators
                        .costs
                        .get_print_base_cost(key.kind, &key.size_label)
                        .await
                }
                None => Ok(None),
            }
        };
        let profile = async {
            match (item.artist_id, &cost_key) {
                (Some(artist_id), Some(_)) => {
                    self.collaborators
                        .profiles
                        .get_artist_pricing_profile(artist_id)
                        .await
                }
                _ => Ok(None),
            }
        };
        let rules = self
            .collaborators
            .rules
            .list_active_pricing_rules(ScopeHint::for_item(&item, Some(request.format)));

        let (cost, profile, rules) = tokio::try_join!(cost, profile, rules)?;

        self.price(PricingInputs {
            request,
            item: &item,
            cost: cost.as_ref(),
            profile: profile.as_ref(),
            rules: &rules,
            rates: &rates,
            now,
        })
    }

    /// Run the pricing pipeline over already fetched inputs
    pub fn price(&self, inputs: PricingInputs<'_>) -> PResult<Quote> {
        let request = inputs.request;
        validate_qty(request.qty)?;

        let base = self.base_price.resolve_base_price(
            inputs.item,
            request.format,
            request.size_label.as_deref(),
            inputs.cost,
            inputs.profile,
        )?;

        let target = RuleTarget::for_item(inputs.item, Some(request.format));
        let outcome = self
            .discounts
            .resolve(&target, base.unit_price, inputs.rules, inputs.now)?;

        let currency = request
            .currency
            .unwrap_or_else(|| self.config.currency_for(request.destination_country));
        let list = self.converter.convert(base.unit_price, currency, inputs.rates)?;
        let net = self.converter.convert(outcome.net_price, currency, inputs.rates)?;
        let vat = self.tax.compute_tax(net, request.destination_country)?;

        let unit = UnitFigures { list, net, vat };
        let shipping = self.shipping.estimate_shipping(
            unit.order_subtotal(request.qty)?,
            request.destination_country,
            &self.converter,
            inputs.rates,
        )?;

        let used_rates =
            currency != base.unit_price.currency || currency != self.config.base_currency;
        let applied_rule_ids = outcome.applied_rule_ids();

        tracing::debug!(
            "Quoted item {} as {} x{} in {}: net {} with rules {:?}",
            request.item_id,
            request.format,
            request.qty,
            currency,
            net,
            applied_rule_ids
        );

        let context = QuoteContext {
            item_id: request.item_id,
            edition_id: request.edition_id,
            format: request.format,
            size_label: request.size_label.clone(),
            qty: request.qty,
            destination_country: request.destination_country.to_string(),
            applied_rule_ids,
            vat_rate_pct: self.tax.rate_for(request.destination_country),
            lead_time_days: base.lead_time_days,
            rates_as_of: used_rates.then(|| inputs.rates.as_of()),
        };
        assemble_quote(context, unit, shipping)
    }
}

fn validate_qty(qty: u32) -> PResult<()> {
    if qty == 0 || qty > MAX_QUOTE_QTY {
        return Err(PricingError::Validation(format!(
            "qty must be between 1 and {}, got {}",
            MAX_QUOTE_QTY, qty
        )));
    }
    Ok(())
}


#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;
    use crate::pricing::discount::test_support::t0;
    use crate::stores::InMemoryStores;
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn test_example_scenario_with_markup_above_floor() {
        let stores = Arc::new(stores(dec!(25)));
        let quote = engine(stores)
            .get_quote_at(&canvas_request(2), t0())
            .await
            .unwrap();

        assert_eq!(quote.unit.list_minor, 7700);
        assert_eq!(quote.unit.discounts_minor, -1220);
        assert_eq!(quote.unit.net_minor, 6480);
        assert_eq!(quote.unit.vat_minor, 1231);
        assert_eq!(quote.unit.subtotal_minor, 7711);
        assert_eq!(quote.subtotal_minor, 15_422);
        assert_eq!(quote.applied_rule_ids, vec![artist_rule().rule_id, global_rule().rule_id]);
        assert_eq!(quote.currency, code("EUR"));
        // 154.22 EUR clears the 150.00 domestic threshold
        assert!(quote.free_shipping_applied);
        assert_eq!(quote.total_minor, 15_422);
        assert_eq!(quote.lead_time_days, Some(7));
        assert_eq!(quote.rates_as_of, None);
    }

    #[tokio::test]
    async fn test_example_scenario_with_margin_floor() {
        // 40% markup gives 7700, a 28.6% margin; the 35% floor lifts it to 8462
        let stores = Arc::new(stores(dec!(35)));
        let quote = engine(stores)
            .get_quote_at(&canvas_request(2), t0())
            .await
            .unwrap();

        assert_eq!(quote.unit.list_minor, 8462);
        assert_eq!(quote.unit.net_minor, 7166);
        assert_eq!(quote.unit.vat_minor, 1362);
        assert_eq!(quote.unit.subtotal_minor, 8528);
        assert_eq!(quote.total_minor, 17_056);
    }

    #[tokio::test]
    async fn test_currency_inferred_from_destination() {
        let stores = Arc::new(stores(dec!(25)));
        let request = QuoteRequest {
            qty: 1,
            destination_country: country("US"),
            ..canvas_request(1)
        };
        let quote = engine(stores).get_quote_at(&request, t0()).await.unwrap();

        assert_eq!(quote.currency, code("USD"));
        // 77.00 EUR -> 84.70 USD +1.5%; 64.80 EUR -> 71.28 USD +1.5%
        assert_eq!(quote.unit.list_minor, 8597);
        assert_eq!(quote.unit.net_minor, 7235);
        assert_eq!(quote.unit.vat_minor, 0);
        // International shipping 24.90 EUR at the reference rate
        assert_eq!(quote.shipping_minor, 2739);
        assert_eq!(quote.total_minor, 9974);
        assert!(!quote.free_shipping_applied);
        assert_eq!(quote.rates_as_of, Some(rates().as_of()));
    }

    #[tokio::test]
    async fn test_explicit_currency_wins() {
        let stores = Arc::new(stores(dec!(25)));
        let request = QuoteRequest {
            destination_country: country("US"),
            currency: Some(code("EUR")),
            ..canvas_request(1)
        };
        let quote = engine(stores).get_quote_at(&request, t0()).await.unwrap();
        assert_eq!(quote.currency, code("EUR"));
        assert_eq!(quote.unit.net_minor, 6480);
    }

    #[tokio::test]
    async fn test_missing_rate_aborts_quote() {
        let stores = Arc::new(stores(dec!(25)));
        let engine = engine(stores);
        let request = QuoteRequest {
            currency: Some(code("CHF")),
            ..canvas_request(1)
        };
        let result = engine.get_quote_at(&request, t0()).await;
        assert!(matches!(result, Err(PricingError::MissingRate(c)) if c == code("CHF")));
        assert_eq!(engine.metrics().summary().quote_failures, 1);
    }

    #[tokio::test]
    async fn test_unknown_item() {
        let stores = Arc::new(stores(dec!(25)));
        let request = QuoteRequest {
            item_id: Uuid::from_u128(0xDEAD),
            ..canvas_request(1)
        };
        let result = engine(stores).get_quote_at(&request, t0()).await;
        assert!(matches!(result, Err(PricingError::ItemNotFound { .. })));
    }

    #[tokio::test]
    async fn test_missing_cost_row() {
        let stores = Arc::new(stores(dec!(25)));
        let request = QuoteRequest {
            size_label: Some("100x140".to_string()),
            ..canvas_request(1)
        };
        let result = engine(stores).get_quote_at(&request, t0()).await;
        assert!(matches!(result, Err(PricingError::CostNotConfigured { .. })));
    }

    #[tokio::test]
    async fn test_original_quote() {
        let stores = Arc::new(stores(dec!(25)));
        let request = QuoteRequest {
            format: Format::Original,
            size_label: None,
            ..canvas_request(1)
        };
        let quote = engine(stores).get_quote_at(&request, t0()).await.unwrap();

        // 1200.00 -5.00 exclusive, then -10%
        assert_eq!(quote.unit.list_minor, 120_000);
        assert_eq!(quote.unit.net_minor, 107_550);
        assert_eq!(quote.lead_time_days, None);
        assert!(quote.free_shipping_applied);
    }

    #[tokio::test]
    async fn test_qty_bounds() {
        let stores = Arc::new(stores(dec!(25)));
        let engine = engine(stores);
        for qty in [0, MAX_QUOTE_QTY + 1] {
            let result = engine.get_quote_at(&canvas_request(qty), t0()).await;
            assert!(matches!(result, Err(PricingError::Validation(_))));
        }
    }

    #[tokio::test]
    async fn test_expired_rules_do_not_apply() {
        let stores = Arc::new(stores(dec!(25)));
        let later = t0() + chrono::Duration::days(365);
        stores.replace_rules(vec![PricingRule {
            ends_at: Some(t0()),
            ..global_rule()
        }]);
        let quote = engine(stores).get_quote_at(&canvas_request(1), later).await.unwrap();
        assert!(quote.applied_rule_ids.is_empty());
        assert_eq!(quote.unit.discounts_minor, 0);
    }

    #[tokio::test]
    async fn test_quote_metrics() {
        let stores = Arc::new(stores(dec!(25)));
        let engine = engine(stores);
        engine.get_quote_at(&canvas_request(1), t0()).await.unwrap();
        engine.get_quote_at(&canvas_request(1), t0()).await.unwrap();

        let summary = engine.metrics().summary();
        assert_eq!(summary.quotes, 2);
        assert_eq!(summary.quote_failures, 0);
    }

    #[tokio::test]
    async fn test_rate_snapshot_is_taken_per_quote() {
        let stores = Arc::new(stores(dec!(25)));
        let config = Arc::new(PricingConfig::from_lookup(|_| None).unwrap());
        let rate_store = Arc::new(RateStore::new(rates()));
        let engine = QuoteEngine::new(
            config,
            Collaborators::shared(stores.clone()),
            rate_store.clone(),
            PerformanceMetrics::new(),
        );
        let request = QuoteRequest {
            currency: Some(code("USD")),
            ..canvas_request(1)
        };

        let before = engine.get_quote_at(&request, t0()).await.unwrap();

        let mut doubled = std::collections::HashMap::new();
        doubled.insert(code("USD"), dec!(2.20));
        rate_store.publish(RateTable::new(code("EUR"), doubled, t0()).unwrap());

        let after = engine.get_quote_at(&request, t0()).await.unwrap();
        assert!(after.unit.net_minor > before.unit.net_minor);
    }

    #[tokio::test]
    async fn test_cached_rule_store_is_used() {
        use crate::stores::CachedRuleStore;
        use std::time::Duration;

        let stores = Arc::new(stores(dec!(25)));
        let metrics = PerformanceMetrics::new();
        let cached = Arc::new(CachedRuleStore::with_metrics(
            stores.clone(),
            Duration::from_secs(60),
            metrics.clone(),
        ));
        let engine = QuoteEngine::new(
            Arc::new(PricingConfig::from_lookup(|_| None).unwrap()),
            Collaborators::shared(stores.clone()).with_rules(cached),
            Arc::new(RateStore::new(rates())),
            metrics.clone(),
        );

        engine.get_quote_at(&canvas_request(1), t0()).await.unwrap();
        engine.get_quote_at(&canvas_request(1), t0()).await.unwrap();
        assert_eq!(stores.rule_loads(), 1);
        assert_eq!(metrics.summary().cache_hits, 1);
    }

    #[test]
    fn test_price_requires_no_io() {
        let stores = InMemoryStores::new();
        let engine = engine(Arc::new(stores));
        let request = canvas_request(2);
        let item = crate::pricing::base_price::test_support::artwork();
        let cost = crate::pricing::base_price::test_support::canvas_cost();
        let rates = rates();

        let quote = engine
            .price(PricingInputs {
                request: &request,
                item: &item,
                cost: Some(&cost),
                profile: None,
                rules: &[],
                rates: &rates,
                now: t0(),
            })
            .unwrap();
        // Configured canvas markup of 60%
        assert_eq!(quote.unit.list_minor, 8800);
    }
}

#[cfg(test)]
mod property_tests {
    use super::test_support::*;
    use super::*;
    use crate::pricing::base_price::test_support::{artwork, canvas_cost};
    use crate::pricing::discount::test_support::{rule, t0};
    use proptest::prelude::*;
    use rust_decimal::Decimal;

    fn price(engine: &QuoteEngine, request: &QuoteRequest, rules: &[PricingRule]) -> Quote {
        let item = artwork();
        let cost = canvas_cost();
        let rates = rates();
        engine
            .price(PricingInputs {
                request,
                item: &item,
                cost: Some(&cost),
                profile: None,
                rules,
                rates: &rates,
                now: t0(),
            })
            .unwrap()
    }

    fn arb_destination() -> impl Strategy<Value = (CountryCode, Option<CurrencyCode>)> {
        (
            prop::sample::select(vec!["DE", "FR", "US", "GB", "JP", "ZZ"]),
            prop::sample::select(vec![None, Some("EUR"), Some("USD"), Some("JPY"), Some("GBP")]),
        )
            .prop_map(|(c, cur)| (country(c), cur.map(code)))
    }

    /// Raising the quantity can only turn free shipping on, never off
    #[test]
    fn prop_free_shipping_is_monotonic_in_qty() {
        let engine = engine(Arc::new(crate::stores::InMemoryStores::new()));
        proptest!(|((destination, currency) in arb_destination(), qty in 1u32..MAX_QUOTE_QTY)| {
            let request = QuoteRequest {
                destination_country: destination,
                currency,
                ..canvas_request(qty)
            };
            let more = QuoteRequest { qty: qty + 1, ..request.clone() };

            let rules = [global_rule(), artist_rule()];
            let smaller = price(&engine, &request, &rules);
            let larger = price(&engine, &more, &rules);
            prop_assert!(!smaller.free_shipping_applied || larger.free_shipping_applied);
        });
    }

    /// Totals stay non-negative and the same inputs give the same quote
    #[test]
    fn prop_quotes_are_deterministic_and_non_negative() {
        let engine = engine(Arc::new(crate::stores::InMemoryStores::new()));
        proptest!(|(
            (destination, currency) in arb_destination(),
            qty in 1u32..=20,
            fixed in prop::collection::vec(-20_000i64..=0, 0..5),
        )| {
            let rules: Vec<PricingRule> = fixed
                .iter()
                .enumerate()
                .map(|(i, amount)| PricingRule {
                    fixed_add_minor: Some(*amount),
                    percentage: Some(Decimal::from(-(i as i64) * 10)),
                    stackable: i % 2 == 0,
                    ..rule(i as u128 + 10)
                })
                .collect();
            let request = QuoteRequest {
                destination_country: destination,
                currency,
                ..canvas_request(qty)
            };

            let first = price(&engine, &request, &rules);
            let second = price(&engine, &request, &rules);
            prop_assert_eq!(
                serde_json::to_vec(&first).unwrap(),
                serde_json::to_vec(&second).unwrap()
            );
            prop_assert!(first.net_minor >= 0);
            prop_assert!(first.total_minor >= 0);
            prop_assert_eq!(first.net_minor, first.list_minor + first.discounts_minor);
        });
    }
}
