// Currency Converter and exchange rate snapshots
//
// Rates are quoted against the accounting base currency and refreshed in
// the background. Requests take an immutable snapshot (Arc<RateTable>) at
// the start of a quote; a refresh publishes a new table with an atomic
// swap and never touches a snapshot already handed out.

use arc_swap::ArcSwap;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::task::JoinHandle;

use crate::pricing::error::{PResult, PricingError};
use crate::pricing::metrics::PerformanceMetrics;
use crate::pricing::money::{round_to_minor, Money};
use crate::pricing::types::{CurrencyCode, RoundingMode};
use crate::stores::RateProvider;

/// Exchange rates relative to a base currency
///
/// A rate is the number of major units of a currency per one major unit
/// of the base currency (EUR base, USD 1.10 means 1 EUR = 1.10 USD).
#[derive(Debug, Clone)]
pub struct RateTable {
    base: CurrencyCode,
    rates: HashMap<CurrencyCode, Decimal>,
    as_of: DateTime<Utc>,
}

impl RateTable {
    /// Build a table, rejecting non-positive rates
    pub fn new(
        base: CurrencyCode,
        rates: HashMap<CurrencyCode, Decimal>,
        as_of: DateTime<Utc>,
    ) -> PResult<Self> {
        if let Some((code, rate)) = rates.iter().find(|(_, rate)| **rate <= Decimal::ZERO) {
            return Err(PricingError::InvalidConfiguration(format!(
                "Exchange rate for {} must be positive, got {}",
                code, rate
            )));
        }
        Ok(Self { base, rates, as_of })
    }

    /// A table that only knows the base currency
    pub fn empty(base: CurrencyCode) -> Self {
        Self {
            base,
            rates: HashMap::new(),
            as_of: DateTime::<Utc>::default(),
        }
    }

    pub fn base(&self) -> CurrencyCode {
        self.base
    }

    pub fn as_of(&self) -> DateTime<Utc> {
        self.as_of
    }

    pub fn len(&self) -> usize {
        self.rates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rates.is_empty()
    }

    /// Rate for a currency; the base currency is always 1
    pub fn rate_for(&self, currency: CurrencyCode) -> PResult<Decimal> {
        if currency == self.base {
            return Ok(Decimal::ONE);
        }
        self.rates
            .get(&currency)
            .copied()
            .ok_or(PricingError::MissingRate(currency))
    }
}

/// Converts minor-unit amounts between currencies
///
/// Conversion goes through the base currency: source -> base (rounded to
/// base minor units), base -> target, then the markup surcharge, then the
/// configured rounding strategy.
#[derive(Debug, Clone, Copy)]
pub struct CurrencyConverter {
    markup_bps: u32,
    rounding: RoundingMode,
}

impl CurrencyConverter {
    pub fn new(markup_bps: u32, rounding: RoundingMode) -> Self {
        Self {
            markup_bps,
            rounding,
        }
    }

    /// Convert with markup and the configured rounding strategy
    ///
    /// Same-currency amounts are returned unchanged: no surcharge applies
    /// when nothing is converted.
    pub fn convert(&self, amount: Money, to: CurrencyCode, rates: &RateTable) -> PResult<Money> {
        if amount.currency == to {
            return Ok(amount);
        }
        convert_with(amount, to, rates, self.markup_bps, self.rounding)
    }

    /// Convert at the plain reference rate (no markup, nearest rounding)
    ///
    /// Used for policy amounts such as shipping thresholds, which are not
    /// prices charged to the customer.
    pub fn convert_reference(
        &self,
        amount: Money,
        to: CurrencyCode,
        rates: &RateTable,
    ) -> PResult<Money> {
        if amount.currency == to {
            return Ok(amount);
        }
        convert_with(amount, to, rates, 0, RoundingMode::Nearest)
    }
}

fn convert_with(
    amount: Money,
    to: CurrencyCode,
    rates: &RateTable,
    markup_bps: u32,
    rounding: RoundingMode,
) -> PResult<Money> {
    let from_rate = rates.rate_for(amount.currency)?;
    let to_rate = rates.rate_for(to)?;
    let base = rates.base();

    // Intermediate rounding never applies the psychological ending
    let intermediate = match rounding {
        RoundingMode::Psycho => RoundingMode::Nearest,
        other => other,
    };

    let base_exact = checked(
        Decimal::from(amount.amount_minor)
            .checked_mul(pow10(base.minor_exponent()))
            .and_then(|v| v.checked_div(from_rate))
            .and_then(|v| v.checked_div(pow10(amount.currency.minor_exponent()))),
    )?;
    let base_minor = round_to_minor(base_exact, intermediate, base)?;

    let target_exact = checked(
        Decimal::from(base_minor)
            .checked_mul(to_rate)
            .and_then(|v| v.checked_mul(pow10(to.minor_exponent())))
            .and_then(|v| v.checked_div(pow10(base.minor_exponent()))),
    )?;

    let markup = Decimal::from(10_000u64 + u64::from(markup_bps)) / Decimal::from(10_000u64);
    let with_markup = checked(target_exact.checked_mul(markup))?;

    Ok(Money::new(round_to_minor(with_markup, rounding, to)?, to))
}

fn pow10(exponent: u32) -> Decimal {
    Decimal::from(10i64.pow(exponent))
}

fn checked(value: Option<Decimal>) -> PResult<Decimal> {
    value.ok_or_else(|| PricingError::Calculation("Overflow during currency conversion".to_string()))
}

/// Holder of the current rate table snapshot
pub struct RateStore {
    current: ArcSwap<RateTable>,
}

impl RateStore {
    pub fn new(initial: RateTable) -> Self {
        Self {
            current: ArcSwap::from_pointee(initial),
        }
    }

    /// Snapshot to hold for the duration of one quote
    pub fn snapshot(&self) -> Arc<RateTable> {
        self.current.load_full()
    }

    /// Publish a freshly fetched table; existing snapshots are unaffected
    pub fn publish(&self, table: RateTable) {
        self.current.store(Arc::new(table));
    }
}

/// Background task that keeps the rate store fresh
///
/// A failed fetch keeps the last good table and is only logged, so
/// requests keep being served from a stale snapshot.
pub struct RateRefresher {
    provider: Arc<dyn RateProvider>,
    store: Arc<RateStore>,
    interval: Duration,
    metrics: PerformanceMetrics,
    shutdown: Arc<Notify>,
}

impl RateRefresher {
    pub fn new(
        provider: Arc<dyn RateProvider>,
        store: Arc<RateStore>,
        interval: Duration,
        metrics: PerformanceMetrics,
    ) -> Self {
        Self {
            provider,
            store,
            interval,
            metrics,
            shutdown: Arc::new(Notify::new()),
        }
    }

    /// Handle used to stop the background loop
    pub fn shutdown_handle(&self) -> Arc<Notify> {
        self.shutdown.clone()
    }

    /// Fetch once and publish on success; returns whether a table was published
    pub async fn refresh_once(&self) -> bool {
        let current_base = self.store.snapshot().base();
        match self.provider.get_rates().await {
            Ok(table) if table.base() != current_base => {
                tracing::warn!(
                    "Ignoring exchange rates quoted against {} (expected {})",
                    table.base(),
                    current_base
                );
                self.metrics.record_rate_refresh(false);
                false
            }
            Ok(table) => {
                tracing::info!(
                    "Exchange rates refreshed: {} currencies as of {}",
                    table.len(),
                    table.as_of()
                );
                self.store.publish(table);
                self.metrics.record_rate_refresh(true);
                true
            }
            Err(e) => {
                tracing::warn!(
                    "Exchange rate refresh failed, serving rates as of {}: {}",
                    self.store.snapshot().as_of(),
                    e
                );
                self.metrics.record_rate_refresh(false);
                false
            }
        }
    }

    /// Spawn the periodic refresh loop
    ///
    /// The first tick fires one full interval after start; callers load
    /// the initial table with `refresh_once` before serving traffic.
    pub fn start(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            tracing::info!(
                "Rate refresher started (every {}s)",
                self.interval.as_secs()
            );

            let start = tokio::time::Instant::now() + self.interval;
            let mut ticker = tokio::time::interval_at(start, self.interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = self.shutdown.notified() => {
                        tracing::info!("Rate refresher received shutdown signal");
                        break;
                    }
                    _ = ticker.tick() => {
                        self.refresh_once().await;
                    }
                }
            }
        })
    }
}
