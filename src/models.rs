use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::pricing::{CountryCode, CurrencyCode, PResult, QuoteRequest};
use crate::validation::{
    validate_country_code, validate_currency_code, validate_format, validate_size_label,
};

/// Request body for POST /api/quotes
///
/// Codes are accepted in any case and normalized before pricing.
/// `currency` defaults to the destination's currency when omitted.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreateQuoteRequest {
    pub item_id: Uuid,

    /// Print edition, omitted for the original
    pub edition_id: Option<Uuid>,

    #[schema(example = "canvas", pattern = "original|canvas|metal|photo")]
    #[validate(custom = "validate_format")]
    pub format: String,

    /// Required for prints unless the item defines one
    #[schema(example = "50x70")]
    #[validate(custom = "validate_size_label")]
    pub size_label: Option<String>,

    #[schema(example = 2, minimum = 1, maximum = 1000)]
    #[validate(range(min = 1, max = 1000, message = "Quantity must be between 1 and 1000"))]
    pub qty: u32,

    #[schema(example = "DE")]
    #[validate(custom = "validate_country_code")]
    pub destination_country: String,

    #[schema(example = "EUR")]
    #[validate(custom = "validate_currency_code")]
    pub currency: Option<String>,
}

impl CreateQuoteRequest {
    /// Convert into the engine's request once validation has passed
    pub fn into_quote_request(self) -> PResult<QuoteRequest> {
        Ok(QuoteRequest {
            item_id: self.item_id,
            edition_id: self.edition_id,
            format: self.format.parse()?,
            size_label: self.size_label.map(|s| s.trim().to_string()),
            qty: self.qty,
            destination_country: CountryCode::parse(&self.destination_country)?,
            currency: self
                .currency
                .as_deref()
                .map(CurrencyCode::parse)
                .transpose()?,
        })
    }
}

/// Response body for GET /health
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    #[schema(example = "ok")]
    pub status: String,
    /// Base currency of the loaded rate table
    #[schema(example = "EUR")]
    pub base_currency: String,
    /// Number of quote currencies in the loaded rate table
    pub rates_loaded: usize,
    pub rates_as_of: chrono::DateTime<chrono::Utc>,
}
