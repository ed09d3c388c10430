// Error handling module for the quote API
// Provides the HTTP error type and response conversion

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};
use utoipa::ToSchema;

use crate::pricing::PricingError;

/// Main error type for the API
/// All handlers return Result<T, ApiError>
#[derive(Debug)]
pub enum ApiError {
    /// Request body validation errors
    /// Maps to HTTP 400 Bad Request
    ValidationError(validator::ValidationErrors),

    /// Errors raised by the quote pipeline
    /// Status depends on the variant; internal causes are never exposed
    Pricing(PricingError),
}

/// Consistent error response structure
///
/// Machine-readable `error_code` plus a human-readable message.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    /// Machine-readable error code (e.g., "VALIDATION_ERROR", "ITEM_NOT_FOUND")
    pub error_code: String,

    /// Human-readable error message
    pub message: String,

    /// Optional additional details (e.g., field-level validation errors)
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<Object>)]
    pub details: Option<serde_json::Value>,

    /// ISO 8601 timestamp of when the error occurred
    pub timestamp: String,
}

impl ErrorResponse {
    fn new(error_code: &str, message: String, details: Option<serde_json::Value>) -> Self {
        Self {
            error_code: error_code.to_string(),
            message,
            details,
            timestamp: Utc::now().to_rfc3339(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_response) = self.to_error_response();
        (status, Json(error_response)).into_response()
    }
}

impl ApiError {
    /// Convert ApiError to HTTP status code and ErrorResponse
    ///
    /// Logging level follows severity: error for internal failures, warn
    /// for requests against unsellable or unconfigured items, debug for
    /// plain client mistakes.
    fn to_error_response(&self) -> (StatusCode, ErrorResponse) {
        let status = self.status_code();
        match self {
            ApiError::ValidationError(errors) => {
                debug!("Validation error: {:?}", errors);
                (
                    status,
                    ErrorResponse::new(
                        "VALIDATION_ERROR",
                        "Request validation failed".to_string(),
                        Some(serde_json::to_value(errors).unwrap_or(serde_json::json!({}))),
                    ),
                )
            }
            ApiError::Pricing(e) if e.is_internal() => {
                error!("Pricing error: {:?}", e);
                (
                    status,
                    ErrorResponse::new(
                        e.error_code(),
                        "The quote could not be computed".to_string(),
                        None,
                    ),
                )
            }
            ApiError::Pricing(e) => {
                match e {
                    PricingError::ItemNotSellable { .. }
                    | PricingError::CostNotConfigured { .. }
                    | PricingError::MissingRate(_) => warn!("Quote rejected: {}", e),
                    _ => debug!("Quote rejected: {}", e),
                }
                (status, ErrorResponse::new(e.error_code(), e.to_string(), None))
            }
        }
    }

    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::ValidationError(_) => StatusCode::BAD_REQUEST,
            ApiError::Pricing(e) => match e {
                PricingError::ItemNotFound { .. } => StatusCode::NOT_FOUND,
                PricingError::ItemNotSellable { .. } => StatusCode::CONFLICT,
                PricingError::InvalidFormat(_)
                | PricingError::InvalidCurrency(_)
                | PricingError::Validation(_) => StatusCode::BAD_REQUEST,
                PricingError::CostNotConfigured { .. } | PricingError::MissingRate(_) => {
                    StatusCode::UNPROCESSABLE_ENTITY
                }
                PricingError::CurrencyMismatch { .. }
                | PricingError::InvalidPricingRule { .. }
                | PricingError::InvalidConfiguration(_)
                | PricingError::Calculation(_)
                | PricingError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }
}

/// Convert pricing errors to ApiError
impl From<PricingError> for ApiError {
    fn from(error: PricingError) -> Self {
        ApiError::Pricing(error)
    }
}

/// Convert validator errors to ApiError
impl From<validator::ValidationErrors> for ApiError {
    fn from(errors: validator::ValidationErrors) -> Self {
        ApiError::ValidationError(errors)
    }
}
