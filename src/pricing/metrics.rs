// Performance Metrics for the quote service
//
// Tracks quote timings, failures, rule cache hit rates and exchange rate
// refresh outcomes.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use utoipa::ToSchema;

/// Performance threshold for slow quotes (100ms)
const SLOW_QUOTE_THRESHOLD_MS: u64 = 100;

/// Shared counters; clones point at the same atomics
#[derive(Debug, Clone)]
pub struct PerformanceMetrics {
    inner: Arc<MetricsInner>,
}

#[derive(Debug, Default)]
struct MetricsInner {
    rule_cache_hits: AtomicU64,
    rule_cache_misses: AtomicU64,

    quotes: AtomicU64,
    quote_failures: AtomicU64,
    total_quote_time_us: AtomicU64,
    slow_quotes: AtomicU64,

    rate_refreshes: AtomicU64,
    rate_refresh_failures: AtomicU64,
}

impl PerformanceMetrics {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(MetricsInner::default()),
        }
    }

    pub fn record_cache_hit(&self) {
        self.inner.rule_cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cache_miss(&self) {
        self.inner.rule_cache_misses.fetch_add(1, Ordering::Relaxed);
    }

    /// Rule cache hit rate (0.0 to 1.0)
    pub fn cache_hit_rate(&self) -> f64 {
        let hits = self.inner.rule_cache_hits.load(Ordering::Relaxed);
        let misses = self.inner.rule_cache_misses.load(Ordering::Relaxed);
        let total = hits + misses;

        if total == 0 {
            0.0
        } else {
            hits as f64 / total as f64
        }
    }

    /// Start timing a quote; the timer records on drop
    pub fn start_quote(&self) -> QuoteTimer {
        QuoteTimer {
            start: Instant::now(),
            metrics: self.clone(),
        }
    }

    pub fn record_quote_failure(&self) {
        self.inner.quote_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rate_refresh(&self, succeeded: bool) {
        let counter = if succeeded {
            &self.inner.rate_refreshes
        } else {
            &self.inner.rate_refresh_failures
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn record_quote(&self, duration: Duration) {
        self.inner.quotes.fetch_add(1, Ordering::Relaxed);
        self.inner
            .total_quote_time_us
            .fetch_add(duration.as_micros() as u64, Ordering::Relaxed);

        if duration.as_millis() as u64 > SLOW_QUOTE_THRESHOLD_MS {
            self.inner.slow_quotes.fetch_add(1, Ordering::Relaxed);
            tracing::warn!("Slow quote calculation: {}ms", duration.as_millis());
        }
    }

    /// Average quote time in milliseconds
    pub fn avg_quote_time_ms(&self) -> f64 {
        let count = self.inner.quotes.load(Ordering::Relaxed);
        let total_us = self.inner.total_quote_time_us.load(Ordering::Relaxed);

        if count == 0 {
            0.0
        } else {
            (total_us as f64 / count as f64) / 1000.0
        }
    }

    pub fn summary(&self) -> MetricsSummary {
        MetricsSummary {
            cache_hit_rate: self.cache_hit_rate(),
            cache_hits: self.inner.rule_cache_hits.load(Ordering::Relaxed),
            cache_misses: self.inner.rule_cache_misses.load(Ordering::Relaxed),
            quotes: self.inner.quotes.load(Ordering::Relaxed),
            quote_failures: self.inner.quote_failures.load(Ordering::Relaxed),
            avg_quote_time_ms: self.avg_quote_time_ms(),
            slow_quotes: self.inner.slow_quotes.load(Ordering::Relaxed),
            rate_refreshes: self.inner.rate_refreshes.load(Ordering::Relaxed),
            rate_refresh_failures: self.inner.rate_refresh_failures.load(Ordering::Relaxed),
        }
    }

    pub fn log_summary(&self) {
        let summary = self.summary();
        tracing::info!(
            "Quote Metrics:\n\
             Rule cache: {:.1}% hit rate ({} hits, {} misses)\n\
             Quotes: {} computed, {} failed, avg {:.2}ms, {} slow\n\
             Rates: {} refreshes, {} failed",
            summary.cache_hit_rate * 100.0,
            summary.cache_hits,
            summary.cache_misses,
            summary.quotes,
            summary.quote_failures,
            summary.avg_quote_time_ms,
            summary.slow_quotes,
            summary.rate_refreshes,
            summary.rate_refresh_failures,
        );
    }
}

impl Default for PerformanceMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Timer for a single quote
pub struct QuoteTimer {
    start: Instant,
    metrics: PerformanceMetrics,
}

impl Drop for QuoteTimer {
    fn drop(&mut self) {
        self.metrics.record_quote(self.start.elapsed());
    }
}

/// Snapshot of the counters
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MetricsSummary {
    pub cache_hit_rate: f64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub quotes: u64,
    pub quote_failures: u64,
    pub avg_quote_time_ms: f64,
    pub slow_quotes: u64,
    pub rate_refreshes: u64,
    pub rate_refresh_failures: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_metrics_creation() {
        let metrics = PerformanceMetrics::new();
        assert_eq!(metrics.cache_hit_rate(), 0.0);
        assert_eq!(metrics.avg_quote_time_ms(), 0.0);
    }

    #[test]
    fn test_cache_metrics() {
        let metrics = PerformanceMetrics::new();

        metrics.record_cache_hit();
        metrics.record_cache_hit();
        metrics.record_cache_miss();

        assert_eq!(metrics.cache_hit_rate(), 2.0 / 3.0);
    }

    #[test]
    fn test_quote_timer() {
        let metrics = PerformanceMetrics::new();

        {
            let _timer = metrics.start_quote();
            thread::sleep(Duration::from_millis(10));
        }

        let summary = metrics.summary();
        assert_eq!(summary.quotes, 1);
        assert!(summary.avg_quote_time_ms >= 10.0);
    }

    #[test]
    fn test_slow_quote_detection() {
        let metrics = PerformanceMetrics::new();

        {
            let _timer = metrics.start_quote();
            thread::sleep(Duration::from_millis(150));
        }

        assert_eq!(metrics.summary().slow_quotes, 1);
    }

    #[test]
    fn test_rate_refresh_counters() {
        let metrics = PerformanceMetrics::new();
        metrics.record_rate_refresh(true);
        metrics.record_rate_refresh(false);
        metrics.record_rate_refresh(false);

        let summary = metrics.summary();
        assert_eq!(summary.rate_refreshes, 1);
        assert_eq!(summary.rate_refresh_failures, 2);
    }
}
