// Quote result types
//
// A quote is returned to the caller and never persisted here. Per-unit
// figures are computed first; totals are the unit figures times the
// quantity plus one shipping estimate for the whole order.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::pricing::error::PResult;
use crate::pricing::money::Money;
use crate::pricing::shipping::ShippingEstimate;
use crate::pricing::types::{CurrencyCode, Format};

/// Per-unit price breakdown, in the quote currency
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct UnitBreakdown {
    /// Pre-discount base price
    pub list_minor: i64,
    /// Total discount applied, never positive
    pub discounts_minor: i64,
    /// list + discounts
    pub net_minor: i64,
    pub vat_minor: i64,
    /// net + vat
    pub subtotal_minor: i64,
}

/// Fully itemized price quote
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Quote {
    pub item_id: Uuid,
    pub edition_id: Option<Uuid>,
    #[schema(value_type = String, example = "canvas")]
    pub format: Format,
    pub size_label: Option<String>,
    pub qty: u32,
    #[schema(value_type = String, example = "EUR")]
    pub currency: CurrencyCode,
    #[schema(value_type = String, example = "DE")]
    pub destination_country: String,
    pub unit: UnitBreakdown,
    pub list_minor: i64,
    pub discounts_minor: i64,
    pub net_minor: i64,
    pub vat_minor: i64,
    pub subtotal_minor: i64,
    /// Zero when waived
    pub shipping_minor: i64,
    /// subtotal + shipping
    pub total_minor: i64,
    pub free_shipping_applied: bool,
    /// Rules that contributed, in the order they were applied
    pub applied_rule_ids: Vec<Uuid>,
    #[schema(value_type = String, example = "19")]
    pub vat_rate_pct: Decimal,
    /// Production lead time for prints
    pub lead_time_days: Option<u32>,
    /// Rate snapshot used when the quote needed a currency conversion
    pub rates_as_of: Option<DateTime<Utc>>,
}

/// Unit figures in the quote currency, before quantity
#[derive(Debug, Clone, Copy)]
pub(crate) struct UnitFigures {
    pub list: Money,
    pub net: Money,
    pub vat: Money,
}

impl UnitFigures {
    pub fn breakdown(&self) -> PResult<UnitBreakdown> {
        let subtotal = self.net.checked_add(self.vat)?;
        Ok(UnitBreakdown {
            list_minor: self.list.amount_minor,
            discounts_minor: self.net.checked_sub(self.list)?.amount_minor,
            net_minor: self.net.amount_minor,
            vat_minor: self.vat.amount_minor,
            subtotal_minor: subtotal.amount_minor,
        })
    }

    /// Order subtotal (unit subtotal times quantity)
    pub fn order_subtotal(&self, qty: u32) -> PResult<Money> {
        self.net.checked_add(self.vat)?.times(qty)
    }
}

/// Everything the assembler needs besides the unit figures
pub(crate) struct QuoteContext {
    pub item_id: Uuid,
    pub edition_id: Option<Uuid>,
    pub format: Format,
    pub size_label: Option<String>,
    pub qty: u32,
    pub destination_country: String,
    pub applied_rule_ids: Vec<Uuid>,
    pub vat_rate_pct: Decimal,
    pub lead_time_days: Option<u32>,
    pub rates_as_of: Option<DateTime<Utc>>,
}

/// Multiply unit figures by quantity and attach shipping
pub(crate) fn assemble_quote(
    context: QuoteContext,
    unit: UnitFigures,
    shipping: ShippingEstimate,
) -> PResult<Quote> {
    let breakdown = unit.breakdown()?;
    let qty = context.qty;

    let list = unit.list.times(qty)?;
    let net = unit.net.times(qty)?;
    let vat = unit.vat.times(qty)?;
    let subtotal = net.checked_add(vat)?;
    let total = subtotal.checked_add(shipping.cost)?;

    Ok(Quote {
        item_id: context.item_id,
        edition_id: context.edition_id,
        format: context.format,
        size_label: context.size_label,
        qty,
        currency: unit.net.currency,
        destination_country: context.destination_country,
        unit: breakdown,
        list_minor: list.amount_minor,
        discounts_minor: net.checked_sub(list)?.amount_minor,
        net_minor: net.amount_minor,
        vat_minor: vat.amount_minor,
        subtotal_minor: subtotal.amount_minor,
        shipping_minor: shipping.cost.amount_minor,
        total_minor: total.amount_minor,
        free_shipping_applied: shipping.waived,
        applied_rule_ids: context.applied_rule_ids,
        vat_rate_pct: context.vat_rate_pct,
        lead_time_days: context.lead_time_days,
        rates_as_of: context.rates_as_of,
    })
}
