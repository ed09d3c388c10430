// Rule Set Cache
//
// Wraps a rule store with a short TTL so quotes do not hit the database
// for every request. Edits become visible within one TTL; invalidation
// is best-effort.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

use crate::pricing::discount::PricingRule;
use crate::pricing::error::PResult;
use crate::pricing::metrics::PerformanceMetrics;
use crate::stores::{RuleStore, ScopeHint};

#[derive(Debug, Default)]
struct RuleCache {
    rules: Vec<PricingRule>,
    last_updated: Option<Instant>,
    /// Whether `rules` ever held a successful load
    loaded: bool,
}

impl RuleCache {
    fn is_stale(&self, ttl: Duration) -> bool {
        match self.last_updated {
            Some(last_update) => last_update.elapsed() >= ttl,
            None => true,
        }
    }

    fn mark_updated(&mut self) {
        self.last_updated = Some(Instant::now());
    }
}

/// TTL cache over the full active rule set
///
/// The cached set is loaded without a scope hint so one entry serves
/// every item; the discount resolver does the matching.
pub struct CachedRuleStore {
    inner: Arc<dyn RuleStore>,
    cache: RwLock<RuleCache>,
    ttl: Duration,
    metrics: Option<PerformanceMetrics>,
}

impl CachedRuleStore {
    pub fn new(inner: Arc<dyn RuleStore>, ttl: Duration) -> Self {
        Self {
            inner,
            cache: RwLock::new(RuleCache::default()),
            ttl,
            metrics: None,
        }
    }

    pub fn with_metrics(inner: Arc<dyn RuleStore>, ttl: Duration, metrics: PerformanceMetrics) -> Self {
        Self {
            metrics: Some(metrics),
            ..Self::new(inner, ttl)
        }
    }

    fn record_cache_hit(&self) {
        if let Some(ref metrics) = self.metrics {
            metrics.record_cache_hit();
        }
    }

    fn record_cache_miss(&self) {
        if let Some(ref metrics) = self.metrics {
            metrics.record_cache_miss();
        }
    }

    /// Force the next read to reload
    pub async fn invalidate(&self) {
        let mut cache = self.cache.write().await;
        cache.last_updated = None;
    }

    /// Load the rule set ahead of the first quote
    pub async fn warm(&self) -> PResult<usize> {
        Ok(self.list_active_pricing_rules(ScopeHint::all()).await?.len())
    }
}

#[async_trait]
impl RuleStore for CachedRuleStore {
    async fn list_active_pricing_rules(&self, _hint: ScopeHint<'_>) -> PResult<Vec<PricingRule>> {
        // Fast path under the read lock
        {
            let cache = self.cache.read().await;
            if !cache.is_stale(self.ttl) {
                self.record_cache_hit();
                return Ok(cache.rules.clone());
            }
        }

        self.record_cache_miss();
        let mut cache = self.cache.write().await;

        // Another request may have reloaded while we waited
        if !cache.is_stale(self.ttl) {
            return Ok(cache.rules.clone());
        }

        match self.inner.list_active_pricing_rules(ScopeHint::all()).await {
            Ok(rules) => {
                tracing::debug!("Rule cache reloaded with {} active rules", rules.len());
                cache.rules = rules;
                cache.loaded = true;
                cache.mark_updated();
                Ok(cache.rules.clone())
            }
            Err(e) if cache.loaded => {
                // Keep serving the previous set and retry after another TTL
                tracing::warn!("Rule reload failed, serving cached rules: {}", e);
                cache.mark_updated();
                Ok(cache.rules.clone())
            }
            Err(e) => Err(e),
        }
    }
}
