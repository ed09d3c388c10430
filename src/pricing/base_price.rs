// Base Price Resolver
//
// Pre-discount unit price for an (item, format, size) request. Originals
// sell at their list price; prints are priced from the cost table with
// the artist's markup, a minimum-margin floor and the artist's price
// ending. Quantity is applied later by the quote assembler.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::collections::HashMap;

use crate::config::PricingConfig;
use crate::pricing::error::{PResult, PricingError};
use crate::pricing::money::{apply_rounding_rule, round_to_minor, Money};
use crate::pricing::types::{CurrencyCode, Format, PrintKind, RoundingMode, RoundingRule};
use crate::stores::{ArtistPricingProfile, PrintBaseCost, SellableItem};

/// Cost-table key for a print request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CostKey {
    pub kind: PrintKind,
    pub size_label: String,
}

/// Result of base price resolution
#[derive(Debug, Clone, PartialEq)]
pub struct BasePrice {
    pub unit_price: Money,
    /// Production plus packaging cost for prints
    pub cost: Option<Money>,
    pub markup_pct: Option<Decimal>,
    pub margin_floor_applied: bool,
    pub lead_time_days: Option<u32>,
}

#[derive(Debug, Clone)]
pub struct BasePriceResolver {
    base_currency: CurrencyCode,
    /// Configured markup per kind, with the configured default already applied
    kind_markup_pct: HashMap<PrintKind, Decimal>,
    min_margin_pct: Decimal,
}

impl BasePriceResolver {
    pub fn new(config: &PricingConfig) -> Self {
        Self {
            base_currency: config.base_currency,
            kind_markup_pct: PrintKind::ALL
                .iter()
                .map(|kind| (*kind, config.markup_for(*kind)))
                .collect(),
            min_margin_pct: config.min_margin_pct,
        }
    }

    /// Check the item can be sold in this format and work out which cost
    /// row a print needs
    ///
    /// Returns `None` for originals. The requested size wins over the size
    /// recorded on the item (an edition's fixed size).
    pub fn cost_key(
        &self,
        item: &SellableItem,
        format: Format,
        size_label: Option<&str>,
    ) -> PResult<Option<CostKey>> {
        if !item.published {
            return Err(not_sellable(item, "artwork is not published"));
        }

        match format {
            Format::Original => {
                if item.edition_id.is_some() {
                    return Err(PricingError::InvalidFormat(
                        "an edition cannot be quoted as an original".to_string(),
                    ));
                }
                if item.original_sold {
                    return Err(not_sellable(item, "original has been sold"));
                }
                if item.list_price.is_none() {
                    return Err(not_sellable(item, "original has no list price"));
                }
                Ok(None)
            }
            Format::Print(kind) => {
                if item.edition_sold_out {
                    return Err(not_sellable(item, "edition is sold out"));
                }
                if let Some(fixed) = item.edition_kind {
                    if fixed != kind {
                        return Err(PricingError::InvalidFormat(format!(
                            "edition is only available as {}, not {}",
                            fixed, kind
                        )));
                    }
                }
                let size_label = size_label
                    .or(item.size_label.as_deref())
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .ok_or_else(|| {
                        PricingError::Validation(format!("size_label is required for {} prints", kind))
                    })?;
                Ok(Some(CostKey {
                    kind,
                    size_label: size_label.to_string(),
                }))
            }
        }
    }

    /// Resolve the per-unit base price
    ///
    /// `cost` is the row fetched for `cost_key`; a missing or inactive row
    /// is `CostNotConfigured`, never a zero cost.
    pub fn resolve_base_price(
        &self,
        item: &SellableItem,
        format: Format,
        size_label: Option<&str>,
        cost: Option<&PrintBaseCost>,
        profile: Option<&ArtistPricingProfile>,
    ) -> PResult<BasePrice> {
        let Some(key) = self.cost_key(item, format, size_label)? else {
            let list_price = item
                .list_price
                .ok_or_else(|| not_sellable(item, "original has no list price"))?;
            return Ok(BasePrice {
                unit_price: list_price,
                cost: None,
                markup_pct: None,
                margin_floor_applied: false,
                lead_time_days: None,
            });
        };

        let cost = match cost {
            Some(cost) if cost.active && cost.kind == key.kind && cost.size_label == key.size_label => cost,
            _ => {
                return Err(PricingError::CostNotConfigured {
                    kind: key.kind,
                    size_label: key.size_label,
                })
            }
        };
        if cost.base_cost_minor < 0 || cost.packaging_cost_minor < 0 {
            return Err(PricingError::InvalidConfiguration(format!(
                "Negative print cost for {} / {}",
                key.kind, key.size_label
            )));
        }

        let cost_minor = cost.total_cost_minor();
        let markup_pct = self.markup_pct(key.kind, profile)?;
        let min_margin_pct = self.min_margin_pct(profile)?;

        let marked_up = round_to_minor(
            Decimal::from(cost_minor) * (Decimal::ONE_HUNDRED + markup_pct) / Decimal::ONE_HUNDRED,
            RoundingMode::Nearest,
            self.base_currency,
        )?;
        let floor = margin_floor(cost_minor, min_margin_pct)?;
        let margin_floor_applied = marked_up < floor;
        let price = marked_up.max(floor);

        let rounding_rule = profile.map(|p| p.rounding_rule).unwrap_or(RoundingRule::None);
        let unit_price = apply_rounding_rule(price, rounding_rule)?;

        if margin_floor_applied {
            tracing::debug!(
                "Margin floor lifted {} {} from {} to {} (min margin {}%)",
                key.kind,
                key.size_label,
                marked_up,
                price,
                min_margin_pct
            );
        }

        Ok(BasePrice {
            unit_price: Money::new(unit_price, self.base_currency),
            cost: Some(Money::new(cost_minor, self.base_currency)),
            markup_pct: Some(markup_pct),
            margin_floor_applied,
            lead_time_days: Some(cost.lead_time_days),
        })
    }

    /// Markup chain: artist per-kind, artist print, configured per-kind, configured default
    fn markup_pct(&self, kind: PrintKind, profile: Option<&ArtistPricingProfile>) -> PResult<Decimal> {
        let markup = profile
            .and_then(|p| p.markup_for(kind))
            .or_else(|| self.kind_markup_pct.get(&kind).copied())
            .ok_or_else(|| {
                PricingError::InvalidConfiguration(format!("No markup configured for {}", kind))
            })?;
        if markup < -Decimal::ONE_HUNDRED {
            return Err(PricingError::InvalidConfiguration(format!(
                "Markup {}% for {} would give a negative price",
                markup, kind
            )));
        }
        Ok(markup)
    }

    fn min_margin_pct(&self, profile: Option<&ArtistPricingProfile>) -> PResult<Decimal> {
        let margin = profile
            .and_then(|p| p.min_margin_pct)
            .unwrap_or(self.min_margin_pct);
        if margin < Decimal::ZERO || margin >= Decimal::ONE_HUNDRED {
            return Err(PricingError::InvalidConfiguration(format!(
                "Minimum margin {}% must be at least 0 and below 100",
                margin
            )));
        }
        Ok(margin)
    }
}

/// Lowest price whose margin over `cost_minor` is at least `min_margin_pct`
///
/// Margin is measured on price: (price - cost) / price.
pub fn margin_floor(cost_minor: i64, min_margin_pct: Decimal) -> PResult<i64> {
    let exact = Decimal::from(cost_minor) * Decimal::ONE_HUNDRED
        / (Decimal::ONE_HUNDRED - min_margin_pct);
    exact
        .ceil()
        .to_i64()
        .ok_or_else(|| PricingError::Calculation(format!("Margin floor {} out of range", exact)))
}

fn not_sellable(item: &SellableItem, reason: &str) -> PricingError {
    PricingError::ItemNotSellable {
        artwork_id: item.artwork_id,
        reason: reason.to_string(),
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use uuid::Uuid;

    pub const ARTIST: Uuid = Uuid::from_u128(0xA1);
    pub const ARTWORK: Uuid = Uuid::from_u128(0xB1);

    pub fn eur() -> CurrencyCode {
        CurrencyCode::parse("EUR").unwrap()
    }

    /// A published, unsold original that is also offered as prints
    pub fn artwork() -> SellableItem {
        SellableItem {
            artwork_id: ARTWORK,
            edition_id: None,
            title: "Harbour at Dusk".to_string(),
            medium: "Oil on canvas".to_string(),
            artist_id: Some(ARTIST),
            size_label: Some("50x70".to_string()),
            list_price: Some(Money::new(120_000, eur())),
            published: true,
            original_sold: false,
            edition_kind: None,
            edition_sold_out: false,
        }
    }

    pub fn canvas_cost() -> PrintBaseCost {
        PrintBaseCost {
            kind: PrintKind::Canvas,
            size_label: "50x70".to_string(),
            base_cost_minor: 5000,
            packaging_cost_minor: 500,
            lead_time_days: 7,
            active: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    fn resolver() -> BasePriceResolver {
        BasePriceResolver::new(&PricingConfig::from_lookup(|_| None).unwrap())
    }

    fn canvas() -> Format {
        Format::Print(PrintKind::Canvas)
    }

    fn profile(markup: Decimal, min_margin: Decimal) -> ArtistPricingProfile {
        ArtistPricingProfile {
            artist_id: ARTIST,
            canvas_markup_pct: Some(markup),
            min_margin_pct: Some(min_margin),
            ..Default::default()
        }
    }

    #[test]
    fn test_original_uses_list_price() {
        let price = resolver()
            .resolve_base_price(&artwork(), Format::Original, None, None, None)
            .unwrap();
        assert_eq!(price.unit_price, Money::new(120_000, eur()));
        assert_eq!(price.cost, None);
        assert_eq!(price.lead_time_days, None);
    }

    #[test]
    fn test_print_markup_from_profile() {
        let cost = canvas_cost();
        let profile = profile(dec!(40), dec!(25));
        let price = resolver()
            .resolve_base_price(&artwork(), canvas(), Some("50x70"), Some(&cost), Some(&profile))
            .unwrap();

        assert_eq!(price.unit_price, Money::new(7700, eur()));
        assert_eq!(price.cost, Some(Money::new(5500, eur())));
        assert!(!price.margin_floor_applied);
        assert_eq!(price.lead_time_days, Some(7));
    }

    #[test]
    fn test_margin_floor_wins_over_markup() {
        let cost = canvas_cost();
        let profile = profile(dec!(40), dec!(35));
        let price = resolver()
            .resolve_base_price(&artwork(), canvas(), Some("50x70"), Some(&cost), Some(&profile))
            .unwrap();

        // 5500 / 0.65 = 8461.54, rounded up
        assert_eq!(price.unit_price.amount_minor, 8462);
        assert!(price.margin_floor_applied);
    }

    #[test]
    fn test_markup_falls_back_to_configuration() {
        let cost = canvas_cost();
        let no_canvas = ArtistPricingProfile {
            artist_id: ARTIST,
            print_markup_pct: Some(dec!(80)),
            ..Default::default()
        };

        let price = resolver()
            .resolve_base_price(&artwork(), canvas(), Some("50x70"), Some(&cost), Some(&no_canvas))
            .unwrap();
        assert_eq!(price.markup_pct, Some(dec!(80)));
        assert_eq!(price.unit_price.amount_minor, 9900);

        // No profile at all: configured canvas markup (60%)
        let price = resolver()
            .resolve_base_price(&artwork(), canvas(), Some("50x70"), Some(&cost), None)
            .unwrap();
        assert_eq!(price.markup_pct, Some(dec!(60)));
        assert_eq!(price.unit_price.amount_minor, 8800);
    }

    #[test]
    fn test_configured_default_markup_applies_without_kind_markup() {
        let config = PricingConfig::from_lookup(|key| {
            (key == "PRICING_DEFAULT_MARKUP_PCT").then(|| "80".to_string())
        })
        .unwrap();
        let cost = canvas_cost();

        let price = BasePriceResolver::new(&config)
            .resolve_base_price(&artwork(), canvas(), Some("50x70"), Some(&cost), None)
            .unwrap();
        assert_eq!(price.markup_pct, Some(dec!(80)));
        assert_eq!(price.unit_price.amount_minor, 9900);
    }

    #[test]
    fn test_artist_rounding_rule() {
        let cost = canvas_cost();
        let profile = ArtistPricingProfile {
            rounding_rule: RoundingRule::End90,
            ..profile(dec!(40), dec!(25))
        };
        let price = resolver()
            .resolve_base_price(&artwork(), canvas(), Some("50x70"), Some(&cost), Some(&profile))
            .unwrap();
        assert_eq!(price.unit_price.amount_minor, 7790);
    }

    #[test]
    fn test_missing_or_inactive_cost_is_an_error() {
        let result = resolver().resolve_base_price(&artwork(), canvas(), Some("50x70"), None, None);
        assert!(matches!(result, Err(PricingError::CostNotConfigured { .. })));

        let inactive = PrintBaseCost { active: false, ..canvas_cost() };
        let result =
            resolver().resolve_base_price(&artwork(), canvas(), Some("50x70"), Some(&inactive), None);
        assert!(matches!(
            result,
            Err(PricingError::CostNotConfigured { kind: PrintKind::Canvas, .. })
        ));

        // A row for another size is not a match
        let result =
            resolver().resolve_base_price(&artwork(), canvas(), Some("30x40"), Some(&canvas_cost()), None);
        assert!(matches!(result, Err(PricingError::CostNotConfigured { .. })));
    }

    #[test]
    fn test_sellability() {
        let unpublished = SellableItem { published: false, ..artwork() };
        assert!(matches!(
            resolver().cost_key(&unpublished, canvas(), None),
            Err(PricingError::ItemNotSellable { .. })
        ));

        let sold = SellableItem { original_sold: true, ..artwork() };
        assert!(matches!(
            resolver().cost_key(&sold, Format::Original, None),
            Err(PricingError::ItemNotSellable { .. })
        ));
        // Prints of a sold original can still be made
        assert!(resolver().cost_key(&sold, canvas(), None).is_ok());

        let print_only = SellableItem { list_price: None, ..artwork() };
        assert!(matches!(
            resolver().cost_key(&print_only, Format::Original, None),
            Err(PricingError::ItemNotSellable { .. })
        ));

        let sold_out = SellableItem {
            edition_id: Some(Uuid::from_u128(0xE1)),
            edition_sold_out: true,
            ..artwork()
        };
        assert!(matches!(
            resolver().cost_key(&sold_out, canvas(), None),
            Err(PricingError::ItemNotSellable { .. })
        ));
    }

    #[test]
    fn test_edition_kind_is_enforced() {
        let edition = SellableItem {
            edition_id: Some(Uuid::from_u128(0xE1)),
            edition_kind: Some(PrintKind::Metal),
            ..artwork()
        };
        assert!(matches!(
            resolver().cost_key(&edition, canvas(), None),
            Err(PricingError::InvalidFormat(_))
        ));
        assert!(matches!(
            resolver().cost_key(&edition, Format::Original, None),
            Err(PricingError::InvalidFormat(_))
        ));

        let key = resolver()
            .cost_key(&edition, Format::Print(PrintKind::Metal), None)
            .unwrap()
            .unwrap();
        assert_eq!(key.kind, PrintKind::Metal);
        assert_eq!(key.size_label, "50x70");
    }

    #[test]
    fn test_print_requires_a_size() {
        let no_size = SellableItem { size_label: None, ..artwork() };
        assert!(matches!(
            resolver().cost_key(&no_size, canvas(), None),
            Err(PricingError::Validation(_))
        ));
        assert!(matches!(
            resolver().cost_key(&no_size, canvas(), Some("  ")),
            Err(PricingError::Validation(_))
        ));
    }

    #[test]
    fn test_unusable_margin_is_a_configuration_error() {
        let cost = canvas_cost();
        let profile = profile(dec!(40), dec!(100));
        let result =
            resolver().resolve_base_price(&artwork(), canvas(), Some("50x70"), Some(&cost), Some(&profile));
        assert!(matches!(result, Err(PricingError::InvalidConfiguration(_))));
    }

    #[test]
    fn test_margin_floor_values() {
        assert_eq!(margin_floor(5500, dec!(35)).unwrap(), 8462);
        assert_eq!(margin_floor(5500, dec!(0)).unwrap(), 5500);
        assert_eq!(margin_floor(0, dec!(50)).unwrap(), 0);
    }
}
