use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::models::OperatingSystem;

/// Result type for spot analysis operations
pub type SpotResult<T> = Result<T, SpotError>;

/// Errors that can occur in the spot domain
///
/// The enum is `Clone` because a single in-flight fetch hands its outcome to
/// every caller awaiting it.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum SpotError {
    /// Bulk interruption dataset could not be fetched or failed validation
    #[error("Failed to fetch spot data after {attempts} attempts: {message}")]
    DatasetFetch { attempts: u32, message: String },

    /// Pricing endpoint failed for a reason other than "no data"
    #[error("Failed to fetch pricing data for {region} ({os}): {message}")]
    PricingFetch {
        region: String,
        os: OperatingSystem,
        message: String,
    },

    /// Pricing endpoint has nothing published for the region/OS
    #[error("No pricing data found for region: {region}, OS: {os}")]
    PricingUnavailable { region: String, os: OperatingSystem },

    /// Every requested region was skipped
    #[error("No pricing data available for any selected region ({})", regions.join(", "))]
    NoPricingDataForAnySelectedRegion { regions: Vec<String> },

    /// Requested instance type is missing from the dataset specs
    #[error("Instance type {0} not found")]
    InstanceTypeNotFound(String),

    /// Quantity was zero, negative or fractional
    #[error("Invalid quantity {0}: must be a whole number of at least 1")]
    InvalidQuantity(String),

    /// Invalid input data
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Requested resource does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl IntoResponse for SpotError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            SpotError::DatasetFetch { .. } => (StatusCode::BAD_GATEWAY, self.to_string()),
            SpotError::PricingFetch { .. } => (StatusCode::BAD_GATEWAY, self.to_string()),
            SpotError::PricingUnavailable { .. } => (StatusCode::NOT_FOUND, self.to_string()),
            SpotError::NoPricingDataForAnySelectedRegion { .. } => {
                (StatusCode::UNPROCESSABLE_ENTITY, self.to_string())
            }
            SpotError::InstanceTypeNotFound(_) => (StatusCode::BAD_REQUEST, self.to_string()),
            SpotError::InvalidQuantity(_) => (StatusCode::BAD_REQUEST, self.to_string()),
            SpotError::InvalidInput(_) => (StatusCode::BAD_REQUEST, self.to_string()),
            SpotError::NotFound(_) => (StatusCode::NOT_FOUND, self.to_string()),
            SpotError::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal error".to_string(),
            ),
        };

        let body = Json(json!({
            "error": message,
            "code": status.as_u16()
        }));

        (status, body).into_response()
    }
}
