// Error types for the quote pipeline
// Every stage returns PResult; the first error aborts the whole quote.

use thiserror::Error;
use uuid::Uuid;

use crate::pricing::types::{CurrencyCode, PrintKind};

/// Main error type for price quote resolution
///
/// Covers catalog lookups, cost and rate configuration problems, rule
/// validation and arithmetic failures. None of these are recovered from
/// inside the pipeline: a wrong price is worse than no price.
#[derive(Debug, Error)]
pub enum PricingError {
    /// The catalog has no item for the requested id (and edition)
    #[error("Item not found: {artwork_id}")]
    ItemNotFound {
        artwork_id: Uuid,
        edition_id: Option<Uuid>,
    },

    /// The item exists but cannot be sold right now
    #[error("Item {artwork_id} is not sellable: {reason}")]
    ItemNotSellable { artwork_id: Uuid, reason: String },

    /// No active print cost row for (kind, size label)
    #[error("No active print cost configured for {kind} / {size_label}")]
    CostNotConfigured { kind: PrintKind, size_label: String },

    /// Unknown format string, or a format the item is not offered in
    #[error("Invalid format: {0}")]
    InvalidFormat(String),

    /// Malformed currency code
    #[error("Invalid currency: {0}")]
    InvalidCurrency(String),

    /// The rate table has no entry for a currency the quote needs
    #[error("No exchange rate available for {0}")]
    MissingRate(CurrencyCode),

    /// Arithmetic was attempted between two different currencies
    #[error("Currency mismatch: {left} vs {right}")]
    CurrencyMismatch {
        left: CurrencyCode,
        right: CurrencyCode,
    },

    /// A stored pricing rule failed validation on load
    #[error("Invalid pricing rule {rule_id}: {reason}")]
    InvalidPricingRule { rule_id: Uuid, reason: String },

    /// Pricing configuration (profile, cost row or settings) is unusable
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Request-level validation failure
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Overflow or other arithmetic failure
    #[error("Calculation error: {0}")]
    Calculation(String),

    /// Database operation errors from the Postgres-backed stores
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Result type alias for pricing operations
pub type PResult<T> = Result<T, PricingError>;

impl PricingError {
    /// Machine-readable code used in HTTP error bodies
    pub fn error_code(&self) -> &'static str {
        match self {
            PricingError::ItemNotFound { .. } => "ITEM_NOT_FOUND",
            PricingError::ItemNotSellable { .. } => "ITEM_NOT_SELLABLE",
            PricingError::CostNotConfigured { .. } => "COST_NOT_CONFIGURED",
            PricingError::InvalidFormat(_) => "INVALID_FORMAT",
            PricingError::InvalidCurrency(_) => "INVALID_CURRENCY",
            PricingError::MissingRate(_) => "MISSING_RATE",
            PricingError::CurrencyMismatch { .. } => "CURRENCY_MISMATCH",
            PricingError::InvalidPricingRule { .. } => "INVALID_PRICING_RULE",
            PricingError::InvalidConfiguration(_) => "INVALID_CONFIGURATION",
            PricingError::Validation(_) => "VALIDATION_ERROR",
            PricingError::Calculation(_) => "CALCULATION_ERROR",
            PricingError::Database(_) => "DATABASE_ERROR",
        }
    }

    /// True for failures caused by server-side state rather than the request
    pub fn is_internal(&self) -> bool {
        matches!(
            self,
            PricingError::CurrencyMismatch { .. }
                | PricingError::InvalidPricingRule { .. }
                | PricingError::InvalidConfiguration(_)
                | PricingError::Calculation(_)
                | PricingError::Database(_)
        )
    }
}
