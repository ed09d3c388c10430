// Collaborator interfaces for the quote engine
//
// The engine reads catalog items, pricing rules, print costs, artist
// profiles and exchange rates through these traits. Postgres and
// in-memory implementations live in the submodules; the rule store is
// wrapped in a TTL cache.

pub mod memory;
pub mod postgres;
pub mod rule_cache;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::pricing::currency::RateTable;
use crate::pricing::discount::PricingRule;
use crate::pricing::error::PResult;
use crate::pricing::money::Money;
use crate::pricing::types::{Format, PrintKind, RoundingRule};

pub use memory::InMemoryStores;
pub use postgres::PgStores;
pub use rule_cache::CachedRuleStore;

/// Catalog view of an artwork, or of one edition of it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SellableItem {
    pub artwork_id: Uuid,
    pub edition_id: Option<Uuid>,
    pub title: String,
    pub medium: String,
    pub artist_id: Option<Uuid>,
    /// Size of the original, or of the edition when one is addressed
    pub size_label: Option<String>,
    /// Price of the original; absent for print-only works
    pub list_price: Option<Money>,
    pub published: bool,
    pub original_sold: bool,
    /// Print kind an edition is fixed to
    pub edition_kind: Option<PrintKind>,
    pub edition_sold_out: bool,
}

/// Production cost of one print kind at one size, in the base currency
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrintBaseCost {
    pub kind: PrintKind,
    pub size_label: String,
    pub base_cost_minor: i64,
    pub packaging_cost_minor: i64,
    pub lead_time_days: u32,
    pub active: bool,
}

impl PrintBaseCost {
    pub fn total_cost_minor(&self) -> i64 {
        self.base_cost_minor.saturating_add(self.packaging_cost_minor)
    }
}

/// Artist overrides for print markups, margin and price endings
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ArtistPricingProfile {
    pub artist_id: Uuid,
    /// Applies to every print kind without a kind-specific markup
    pub print_markup_pct: Option<Decimal>,
    pub canvas_markup_pct: Option<Decimal>,
    pub metal_markup_pct: Option<Decimal>,
    pub photo_markup_pct: Option<Decimal>,
    pub min_margin_pct: Option<Decimal>,
    #[serde(default)]
    pub rounding_rule: RoundingRule,
}

impl ArtistPricingProfile {
    /// Markup the artist set for this kind, falling back to their print markup
    pub fn markup_for(&self, kind: PrintKind) -> Option<Decimal> {
        let specific = match kind {
            PrintKind::Canvas => self.canvas_markup_pct,
            PrintKind::Metal => self.metal_markup_pct,
            PrintKind::Photo => self.photo_markup_pct,
        };
        specific.or(self.print_markup_pct)
    }
}

/// Narrows the rules a store returns; `None` fields do not narrow
///
/// Stores may return more rules than the hint asks for, never fewer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScopeHint<'a> {
    pub medium: Option<&'a str>,
    pub artist_id: Option<Uuid>,
    pub artwork_id: Option<Uuid>,
    pub format: Option<Format>,
}

impl<'a> ScopeHint<'a> {
    /// Every active rule
    pub fn all() -> Self {
        Self::default()
    }

    pub fn for_item(item: &'a SellableItem, format: Option<Format>) -> Self {
        Self {
            medium: Some(&item.medium),
            artist_id: item.artist_id,
            artwork_id: Some(item.artwork_id),
            format,
        }
    }
}

#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// Look up an artwork, or one of its editions when `edition_id` is set
    async fn get_sellable_item(
        &self,
        artwork_id: Uuid,
        edition_id: Option<Uuid>,
    ) -> PResult<Option<SellableItem>>;
}

#[async_trait]
pub trait RuleStore: Send + Sync {
    /// Active rules, already validated
    async fn list_active_pricing_rules(&self, hint: ScopeHint<'_>) -> PResult<Vec<PricingRule>>;
}

#[async_trait]
pub trait CostTable: Send + Sync {
    async fn get_print_base_cost(
        &self,
        kind: PrintKind,
        size_label: &str,
    ) -> PResult<Option<PrintBaseCost>>;
}

#[async_trait]
pub trait ArtistProfileStore: Send + Sync {
    async fn get_artist_pricing_profile(
        &self,
        artist_id: Uuid,
    ) -> PResult<Option<ArtistPricingProfile>>;
}

#[async_trait]
pub trait RateProvider: Send + Sync {
    /// Current rates against the base currency
    async fn get_rates(&self) -> PResult<RateTable>;
}
