// Postgres-backed collaborators
//
// Runtime-checked sqlx queries over the tables in `migrations/`. Rows are
// mapped into domain records here; enum-like text columns that fail to
// parse are configuration errors, not silent defaults.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;
use std::collections::HashMap;
use uuid::Uuid;

use crate::pricing::currency::RateTable;
use crate::pricing::discount::{PricingRule, RuleScope};
use crate::pricing::error::{PResult, PricingError};
use crate::pricing::money::Money;
use crate::pricing::types::{CurrencyCode, PrintKind, RoundingRule};
use crate::stores::{
    ArtistPricingProfile, ArtistProfileStore, CatalogStore, CostTable, PrintBaseCost,
    RateProvider, RuleStore, ScopeHint, SellableItem,
};

/// All collaborators over one connection pool
#[derive(Clone)]
pub struct PgStores {
    pool: PgPool,
    base_currency: CurrencyCode,
}

impl PgStores {
    pub fn new(pool: PgPool, base_currency: CurrencyCode) -> Self {
        Self {
            pool,
            base_currency,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct SellableItemRow {
    artwork_id: Uuid,
    edition_id: Option<Uuid>,
    title: String,
    medium: String,
    artist_id: Option<Uuid>,
    size_label: Option<String>,
    list_price_minor: Option<i64>,
    currency: String,
    published: bool,
    original_sold: bool,
    edition_kind: Option<String>,
    edition_sold_out: bool,
}

impl SellableItemRow {
    fn into_item(self) -> PResult<SellableItem> {
        let currency = CurrencyCode::parse(&self.currency).map_err(|_| {
            PricingError::InvalidConfiguration(format!(
                "Artwork {} has invalid currency '{}'",
                self.artwork_id, self.currency
            ))
        })?;
        let edition_kind = self
            .edition_kind
            .as_deref()
            .map(str::parse::<PrintKind>)
            .transpose()
            .map_err(|e| {
                PricingError::InvalidConfiguration(format!(
                    "Edition of artwork {} has invalid kind: {}",
                    self.artwork_id, e
                ))
            })?;

        Ok(SellableItem {
            artwork_id: self.artwork_id,
            edition_id: self.edition_id,
            title: self.title,
            medium: self.medium,
            artist_id: self.artist_id,
            size_label: self.size_label,
            list_price: self.list_price_minor.map(|amount| Money::new(amount, currency)),
            published: self.published,
            original_sold: self.original_sold,
            edition_kind,
            edition_sold_out: self.edition_sold_out,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct PricingRuleRow {
    id: Uuid,
    name: String,
    scope: String,
    scope_value: Option<String>,
    percentage: Option<Decimal>,
    fixed_add_minor: Option<i64>,
    max_discount_minor: Option<i64>,
    priority: i32,
    stackable: bool,
    starts_at: Option<DateTime<Utc>>,
    ends_at: Option<DateTime<Utc>>,
    active: bool,
    created_at: DateTime<Utc>,
}

impl PricingRuleRow {
    fn into_rule(self) -> PResult<PricingRule> {
        let scope = RuleScope::from_parts(&self.scope, self.scope_value.as_deref()).map_err(
            |reason| PricingError::InvalidPricingRule {
                rule_id: self.id,
                reason,
            },
        )?;

        let rule = PricingRule {
            rule_id: self.id,
            name: self.name,
            scope,
            percentage: self.percentage,
            fixed_add_minor: self.fixed_add_minor,
            max_discount_minor: self.max_discount_minor,
            priority: self.priority,
            stackable: self.stackable,
            starts_at: self.starts_at,
            ends_at: self.ends_at,
            active: self.active,
            created_at: self.created_at,
        };
        rule.validate()?;
        Ok(rule)
    }
}

#[derive(Debug, sqlx::FromRow)]
struct PrintBaseCostRow {
    kind: String,
    size_label: String,
    base_cost_minor: i64,
    packaging_cost_minor: i64,
    lead_time_days: i32,
    active: bool,
}

impl PrintBaseCostRow {
    fn into_cost(self) -> PResult<PrintBaseCost> {
        let lead_time_days = u32::try_from(self.lead_time_days).map_err(|_| {
            PricingError::InvalidConfiguration(format!(
                "Print cost {} / {} has negative lead time {}",
                self.kind, self.size_label, self.lead_time_days
            ))
        })?;
        Ok(PrintBaseCost {
            kind: self.kind.parse()?,
            size_label: self.size_label,
            base_cost_minor: self.base_cost_minor,
            packaging_cost_minor: self.packaging_cost_minor,
            lead_time_days,
            active: self.active,
        })
    }
}

/// Stored ARTIST/ARTWORK qualifiers may use any textual UUID form; the
/// rule query strips them down to bare lowercase hex before comparing
fn uuid_key(id: Uuid) -> String {
    id.simple().to_string()
}

#[derive(Debug, sqlx::FromRow)]
struct ArtistProfileRow {
    artist_id: Uuid,
    print_markup_pct: Option<Decimal>,
    canvas_markup_pct: Option<Decimal>,
    metal_markup_pct: Option<Decimal>,
    photo_markup_pct: Option<Decimal>,
    min_margin_pct: Option<Decimal>,
    rounding_rule: String,
}

#[derive(Debug, sqlx::FromRow)]
struct ExchangeRateRow {
    currency: String,
    rate_from_base: Decimal,
    updated_at: DateTime<Utc>,
}

#[async_trait]
impl CatalogStore for PgStores {
    async fn get_sellable_item(
        &self,
        artwork_id: Uuid,
        edition_id: Option<Uuid>,
    ) -> PResult<Option<SellableItem>> {
        let row = sqlx::query_as::<_, SellableItemRow>(
            r#"
            SELECT a.id AS artwork_id, e.id AS edition_id, a.title, a.medium, a.artist_id,
                   COALESCE(e.size_label, a.size_label) AS size_label,
                   a.list_price_minor, a.currency, a.published, a.sold AS original_sold,
                   e.kind AS edition_kind, COALESCE(e.sold_out, FALSE) AS edition_sold_out
            FROM artworks a
            LEFT JOIN editions e ON e.artwork_id = a.id AND e.id = $2
            WHERE a.id = $1
            "#,
        )
        .bind(artwork_id)
        .bind(edition_id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        // An edition that does not belong to this artwork is not found
        if edition_id.is_some() && row.edition_id.is_none() {
            return Ok(None);
        }
        row.into_item().map(Some)
    }
}

#[async_trait]
impl RuleStore for PgStores {
    async fn list_active_pricing_rules(&self, hint: ScopeHint<'_>) -> PResult<Vec<PricingRule>> {
        let rows = sqlx::query_as::<_, PricingRuleRow>(
            r#"
            SELECT id, name, scope, scope_value, percentage, fixed_add_minor,
                   max_discount_minor, priority, stackable, starts_at, ends_at,
                   active, created_at
            FROM pricing_rules
            WHERE active = TRUE
              AND (scope = 'GLOBAL'
                   OR (scope = 'MEDIUM' AND ($1::text IS NULL OR LOWER(scope_value) = LOWER($1)))
                   OR (scope = 'ARTIST' AND ($2::text IS NULL OR REGEXP_REPLACE(REGEXP_REPLACE(LOWER(TRIM(scope_value)), '^urn:uuid:', ''), '[^0-9a-f]', '', 'g') = $2))
                   OR (scope = 'ARTWORK' AND ($3::text IS NULL OR REGEXP_REPLACE(REGEXP_REPLACE(LOWER(TRIM(scope_value)), '^urn:uuid:', ''), '[^0-9a-f]', '', 'g') = $3))
                   OR (scope = 'EDITION_KIND' AND ($4::text IS NULL OR LOWER(scope_value) = $4)))
            ORDER BY priority, created_at, id
            "#,
        )
        .bind(hint.medium)
        .bind(hint.artist_id.map(uuid_key))
        .bind(hint.artwork_id.map(uuid_key))
        .bind(hint.format.map(|format| format.to_string()))
        .fetch_all(&self.pool)
        .await?;

        let rules = rows
            .into_iter()
            .map(PricingRuleRow::into_rule)
            .collect::<PResult<Vec<_>>>()?;

        tracing::debug!("Loaded {} active pricing rules", rules.len());
        Ok(rules)
    }
}

#[async_trait]
impl CostTable for PgStores {
    async fn get_print_base_cost(
        &self,
        kind: PrintKind,
        size_label: &str,
    ) -> PResult<Option<PrintBaseCost>> {
        let row = sqlx::query_as::<_, PrintBaseCostRow>(
            r#"
            SELECT kind, size_label, base_cost_minor, packaging_cost_minor, lead_time_days, active
            FROM print_base_costs
            WHERE kind = $1 AND size_label = $2
            "#,
        )
        .bind(kind.as_str())
        .bind(size_label)
        .fetch_optional(&self.pool)
        .await?;

        row.map(PrintBaseCostRow::into_cost).transpose()
    }
}

#[async_trait]
impl ArtistProfileStore for PgStores {
    async fn get_artist_pricing_profile(
        &self,
        artist_id: Uuid,
    ) -> PResult<Option<ArtistPricingProfile>> {
        let row = sqlx::query_as::<_, ArtistProfileRow>(
            r#"
            SELECT artist_id, print_markup_pct, canvas_markup_pct, metal_markup_pct,
                   photo_markup_pct, min_margin_pct, rounding_rule
            FROM artist_pricing_profiles
            WHERE artist_id = $1
            "#,
        )
        .bind(artist_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|row| -> PResult<ArtistPricingProfile> {
            let rounding_rule = row
                .rounding_rule
                .parse::<RoundingRule>()
                .map_err(PricingError::InvalidConfiguration)?;
            Ok(ArtistPricingProfile {
                artist_id: row.artist_id,
                print_markup_pct: row.print_markup_pct,
                canvas_markup_pct: row.canvas_markup_pct,
                metal_markup_pct: row.metal_markup_pct,
                photo_markup_pct: row.photo_markup_pct,
                min_margin_pct: row.min_margin_pct,
                rounding_rule,
            })
        })
        .transpose()
    }
}

#[async_trait]
impl RateProvider for PgStores {
    async fn get_rates(&self) -> PResult<RateTable> {
        let rows = sqlx::query_as::<_, ExchangeRateRow>(
            "SELECT currency, rate_from_base, updated_at FROM exchange_rates",
        )
        .fetch_all(&self.pool)
        .await?;

        let as_of = rows
            .iter()
            .map(|row| row.updated_at)
            .min()
            .unwrap_or_else(Utc::now);

        let mut rates = HashMap::with_capacity(rows.len());
        for row in rows {
            let currency = CurrencyCode::parse(&row.currency)?;
            if currency != self.base_currency {
                rates.insert(currency, row.rate_from_base);
            }
        }

        RateTable::new(self.base_currency, rates, as_of)
    }
}
