// Validation utilities module
// Provides custom validation functions for quote request fields

use std::str::FromStr;

use validator::ValidationError;

use crate::pricing::{CountryCode, CurrencyCode, Format};

/// Validates an ISO 3166-1 alpha-2 country code ("DE", "us")
pub fn validate_country_code(country: &str) -> Result<(), ValidationError> {
    CountryCode::parse(country)
        .map(|_| ())
        .map_err(|_| ValidationError::new("invalid_country_code"))
}

/// Validates an ISO 4217 currency code ("EUR", "usd")
pub fn validate_currency_code(currency: &str) -> Result<(), ValidationError> {
    CurrencyCode::parse(currency)
        .map(|_| ())
        .map_err(|_| ValidationError::new("invalid_currency_code"))
}

/// Validates that format is "original" or a supported print kind
/// Valid values: "original", "canvas", "metal", "photo" (case-insensitive)
pub fn validate_format(format: &str) -> Result<(), ValidationError> {
    Format::from_str(format)
        .map(|_| ())
        .map_err(|_| ValidationError::new("invalid_format"))
}

/// Validates that a size label is not blank
pub fn validate_size_label(size_label: &str) -> Result<(), ValidationError> {
    if size_label.trim().is_empty() {
        Err(ValidationError::new("size_label_blank"))
    } else {
        Ok(())
    }
}
