// In-memory collaborators
//
// Deterministic data for tests and local development. Rules and rates
// can be swapped at runtime to exercise cache staleness and refresh.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;
use uuid::Uuid;

use crate::pricing::currency::RateTable;
use crate::pricing::discount::PricingRule;
use crate::pricing::error::{PResult, PricingError};
use crate::pricing::types::PrintKind;
use crate::stores::{
    ArtistPricingProfile, ArtistProfileStore, CatalogStore, CostTable, PrintBaseCost,
    RateProvider, RuleStore, ScopeHint, SellableItem,
};

#[derive(Default)]
pub struct InMemoryStores {
    items: HashMap<(Uuid, Option<Uuid>), SellableItem>,
    costs: HashMap<(PrintKind, String), PrintBaseCost>,
    profiles: HashMap<Uuid, ArtistPricingProfile>,
    rules: RwLock<Vec<PricingRule>>,
    rates: RwLock<Option<RateTable>>,
    rule_loads: AtomicU64,
}

impl InMemoryStores {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an item under its (artwork, edition) key
    pub fn with_item(mut self, item: SellableItem) -> Self {
        self.items.insert((item.artwork_id, item.edition_id), item);
        self
    }

    pub fn with_cost(mut self, cost: PrintBaseCost) -> Self {
        self.costs.insert((cost.kind, cost.size_label.clone()), cost);
        self
    }

    pub fn with_profile(mut self, profile: ArtistPricingProfile) -> Self {
        self.profiles.insert(profile.artist_id, profile);
        self
    }

    pub fn with_rule(self, rule: PricingRule) -> Self {
        if let Ok(mut rules) = self.rules.write() {
            rules.push(rule);
        }
        self
    }

    pub fn with_rates(self, table: RateTable) -> Self {
        self.set_rates(table);
        self
    }

    /// Replace the whole rule set, as an admin edit would
    pub fn replace_rules(&self, new_rules: Vec<PricingRule>) {
        if let Ok(mut rules) = self.rules.write() {
            *rules = new_rules;
        }
    }

    pub fn set_rates(&self, table: RateTable) {
        if let Ok(mut rates) = self.rates.write() {
            *rates = Some(table);
        }
    }

    /// Number of times the rule set has been read
    pub fn rule_loads(&self) -> u64 {
        self.rule_loads.load(Ordering::Relaxed)
    }
}

fn poisoned() -> PricingError {
    PricingError::Calculation("In-memory store lock poisoned".to_string())
}

#[async_trait]
impl CatalogStore for InMemoryStores {
    async fn get_sellable_item(
        &self,
        artwork_id: Uuid,
        edition_id: Option<Uuid>,
    ) -> PResult<Option<SellableItem>> {
        Ok(self.items.get(&(artwork_id, edition_id)).cloned())
    }
}

#[async_trait]
impl RuleStore for InMemoryStores {
    async fn list_active_pricing_rules(&self, _hint: ScopeHint<'_>) -> PResult<Vec<PricingRule>> {
        self.rule_loads.fetch_add(1, Ordering::Relaxed);
        let rules = self.rules.read().map_err(|_| poisoned())?;

        let mut active = Vec::with_capacity(rules.len());
        for rule in rules.iter().filter(|rule| rule.active) {
            rule.validate()?;
            active.push(rule.clone());
        }
        Ok(active)
    }
}

#[async_trait]
impl CostTable for InMemoryStores {
    async fn get_print_base_cost(
        &self,
        kind: PrintKind,
        size_label: &str,
    ) -> PResult<Option<PrintBaseCost>> {
        Ok(self.costs.get(&(kind, size_label.to_string())).cloned())
    }
}

#[async_trait]
impl ArtistProfileStore for InMemoryStores {
    async fn get_artist_pricing_profile(
        &self,
        artist_id: Uuid,
    ) -> PResult<Option<ArtistPricingProfile>> {
        Ok(self.profiles.get(&artist_id).cloned())
    }
}

#[async_trait]
impl RateProvider for InMemoryStores {
    async fn get_rates(&self) -> PResult<RateTable> {
        self.rates
            .read()
            .map_err(|_| poisoned())?
            .clone()
            .ok_or_else(|| PricingError::InvalidConfiguration("No exchange rates loaded".to_string()))
    }
}
