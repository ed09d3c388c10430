// Discount Resolver
//
// Selects, orders and combines promotional pricing rules into a net
// discount. Rules are scope-matched, time-windowed and priority-ordered;
// at most one exclusive rule applies, stackable rules always apply, and
// each rule is computed against the running price left by the previous
// one.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use uuid::Uuid;

use crate::pricing::error::{PResult, PricingError};
use crate::pricing::money::{round_to_minor, Money};
use crate::pricing::types::{Format, PrintKind, RoundingMode};
use crate::stores::SellableItem;

/// Priority given to rules that do not set one (lower runs first)
pub const DEFAULT_RULE_PRIORITY: i32 = 100;

fn default_priority() -> i32 {
    DEFAULT_RULE_PRIORITY
}

/// What a rule applies to, carrying only the qualifier the scope needs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RuleScope {
    Global,
    Medium(String),
    Artist(Uuid),
    Artwork(Uuid),
    EditionKind(PrintKind),
}

impl RuleScope {
    /// Build a scope from its stored (scope, qualifier) columns
    pub fn from_parts(scope: &str, value: Option<&str>) -> Result<Self, String> {
        let value = value.map(str::trim).filter(|v| !v.is_empty());
        let scope = scope.trim().to_ascii_uppercase();

        match (scope.as_str(), value) {
            ("GLOBAL", None) => Ok(RuleScope::Global),
            ("GLOBAL", Some(v)) => Err(format!("GLOBAL scope takes no qualifier, got '{}'", v)),
            ("MEDIUM", Some(v)) => Ok(RuleScope::Medium(v.to_string())),
            ("ARTIST", Some(v)) => Uuid::parse_str(v)
                .map(RuleScope::Artist)
                .map_err(|_| format!("Invalid artist id '{}'", v)),
            ("ARTWORK", Some(v)) => Uuid::parse_str(v)
                .map(RuleScope::Artwork)
                .map_err(|_| format!("Invalid artwork id '{}'", v)),
            ("EDITION_KIND", Some(v)) => v
                .parse::<PrintKind>()
                .map(RuleScope::EditionKind)
                .map_err(|_| format!("Invalid edition kind '{}'", v)),
            ("MEDIUM" | "ARTIST" | "ARTWORK" | "EDITION_KIND", None) => {
                Err(format!("{} scope requires a qualifier", scope))
            }
            (other, _) => Err(format!("Unknown rule scope '{}'", other)),
        }
    }

    /// Whether this scope covers the target
    pub fn matches(&self, target: &RuleTarget<'_>) -> bool {
        match self {
            RuleScope::Global => true,
            RuleScope::Medium(medium) => medium.eq_ignore_ascii_case(target.medium.trim()),
            RuleScope::Artist(artist_id) => target.artist_id == Some(*artist_id),
            RuleScope::Artwork(artwork_id) => target.artwork_id == *artwork_id,
            RuleScope::EditionKind(kind) => {
                matches!(target.format, Some(Format::Print(requested)) if requested == *kind)
            }
        }
    }
}

/// A promotional pricing rule
///
/// `percentage` and `fixed_add_minor` are signed price adjustments
/// (-10 means 10% off, -500 means 5.00 off); at least one is present.
/// Fixed amounts are in the currency of the price being discounted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricingRule {
    pub rule_id: Uuid,
    pub name: String,
    pub scope: RuleScope,
    pub percentage: Option<Decimal>,
    pub fixed_add_minor: Option<i64>,
    pub max_discount_minor: Option<i64>,
    #[serde(default = "default_priority")]
    pub priority: i32,
    pub stackable: bool,
    pub starts_at: Option<DateTime<Utc>>,
    pub ends_at: Option<DateTime<Utc>>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

impl PricingRule {
    /// Check the rule's values before it is allowed into resolution
    pub fn validate(&self) -> PResult<()> {
        let invalid = |reason: &str| PricingError::InvalidPricingRule {
            rule_id: self.rule_id,
            reason: reason.to_string(),
        };

        if self.percentage.is_none() && self.fixed_add_minor.is_none() {
            return Err(invalid("percentage or fixed_add_minor is required"));
        }
        if let Some(pct) = self.percentage {
            if pct > Decimal::ZERO || pct < Decimal::from(-100) {
                return Err(invalid("percentage must be between -100 and 0"));
            }
        }
        if matches!(self.fixed_add_minor, Some(fixed) if fixed > 0) {
            return Err(invalid("fixed_add_minor must not be positive"));
        }
        if matches!(self.max_discount_minor, Some(cap) if cap < 0) {
            return Err(invalid("max_discount_minor must be non-negative"));
        }
        if let (Some(start), Some(end)) = (self.starts_at, self.ends_at) {
            if start > end {
                return Err(invalid("starts_at is after ends_at"));
            }
        }
        if matches!(&self.scope, RuleScope::Medium(m) if m.trim().is_empty()) {
            return Err(invalid("MEDIUM scope requires a qualifier"));
        }
        Ok(())
    }

    /// Active and inside its time window (both ends inclusive, open if unset)
    pub fn is_live_at(&self, now: DateTime<Utc>) -> bool {
        if !self.active {
            return false;
        }
        if matches!(self.starts_at, Some(start) if now < start) {
            return false;
        }
        if matches!(self.ends_at, Some(end) if now > end) {
            return false;
        }
        true
    }

    /// Signed adjustment this rule makes to `running` (always <= 0)
    fn adjustment(&self, running: Money) -> PResult<i64> {
        let from_percentage = match self.percentage {
            Some(pct) => round_to_minor(
                Decimal::from(running.amount_minor) * pct / Decimal::ONE_HUNDRED,
                RoundingMode::Nearest,
                running.currency,
            )?,
            None => 0,
        };
        let mut adjustment = from_percentage
            .checked_add(self.fixed_add_minor.unwrap_or(0))
            .ok_or_else(|| PricingError::Calculation("Discount overflow".to_string()))?;

        if let Some(cap) = self.max_discount_minor {
            adjustment = adjustment.max(-cap);
        }
        // Never take the running price below zero
        Ok(adjustment.max(-running.amount_minor).min(0))
    }
}

/// The attributes of a quote request that rules are matched against
#[derive(Debug, Clone, Copy)]
pub struct RuleTarget<'a> {
    pub medium: &'a str,
    pub artist_id: Option<Uuid>,
    pub artwork_id: Uuid,
    /// Requested format; `None` when no format has been chosen yet
    pub format: Option<Format>,
}

impl<'a> RuleTarget<'a> {
    pub fn for_item(item: &'a SellableItem, format: Option<Format>) -> Self {
        Self {
            medium: &item.medium,
            artist_id: item.artist_id,
            artwork_id: item.artwork_id,
            format,
        }
    }
}

/// A rule that contributed to the net price
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AppliedRule {
    pub rule_id: Uuid,
    pub stackable: bool,
    pub adjustment_minor: i64,
}

/// Result of discount resolution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscountOutcome {
    pub net_price: Money,
    /// `net_price - base_price`, never positive
    pub discounts_minor: i64,
    pub applied: Vec<AppliedRule>,
}

impl DiscountOutcome {
    pub fn applied_rule_ids(&self) -> Vec<Uuid> {
        self.applied.iter().map(|rule| rule.rule_id).collect()
    }
}

/// Discount Resolver
///
/// Stateless; the rule set is passed in per call and never trusted to be
/// pre-filtered.
#[derive(Debug, Clone, Copy, Default)]
pub struct DiscountResolver;

impl DiscountResolver {
    pub fn new() -> Self {
        Self
    }

    /// Rules that are live at `now` and whose scope matches the target,
    /// in evaluation order
    ///
    /// Order is priority ascending, then creation time, then rule id; the
    /// sort is stable so identical keys keep their input order.
    pub fn applicable_rules<'r>(
        &self,
        target: &RuleTarget<'_>,
        rules: &'r [PricingRule],
        now: DateTime<Utc>,
    ) -> Vec<&'r PricingRule> {
        let mut applicable: Vec<&PricingRule> = rules
            .iter()
            .filter(|rule| rule.is_live_at(now) && rule.scope.matches(target))
            .collect();

        applicable.sort_by(|a, b| evaluation_order(a, b));
        applicable
    }

    /// Resolve the net price of `base_price` under `rules` at `now`
    pub fn resolve(
        &self,
        target: &RuleTarget<'_>,
        base_price: Money,
        rules: &[PricingRule],
        now: DateTime<Utc>,
    ) -> PResult<DiscountOutcome> {
        let mut running = base_price;
        let mut exclusive_applied = false;
        let mut applied = Vec::new();

        for rule in self.applicable_rules(target, rules, now) {
            if !rule.stackable {
                if exclusive_applied {
                    tracing::debug!("Skipping exclusive rule {}: another exclusive rule won", rule.rule_id);
                    continue;
                }
                exclusive_applied = true;
            }

            let adjustment = rule.adjustment(running)?;
            running = Money::new(running.amount_minor + adjustment, running.currency);
            applied.push(AppliedRule {
                rule_id: rule.rule_id,
                stackable: rule.stackable,
                adjustment_minor: adjustment,
            });
        }

        Ok(DiscountOutcome {
            net_price: running,
            discounts_minor: running.amount_minor - base_price.amount_minor,
            applied,
        })
    }
}

fn evaluation_order(a: &PricingRule, b: &PricingRule) -> Ordering {
    a.priority
        .cmp(&b.priority)
        .then_with(|| a.created_at.cmp(&b.created_at))
        .then_with(|| a.rule_id.cmp(&b.rule_id))
}
