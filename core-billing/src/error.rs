use serde_json::json;
use thiserror::Error;

use crate::types::HostError;

/// Failures detected by the bridge itself.
///
/// Codes reported by the commerce SDK are never errors; they travel inside
/// [`BillingOutcome`](crate::types::BillingOutcome).
#[derive(Error, Debug)]
pub enum BillingError {
    #[error("{operation} requires a ready billing connection")]
    ConnectionUnavailable { operation: String },

    #[error("Item {product_id} is not in the catalog cache; query product details first")]
    ItemNotFound { product_id: String },

    #[error("Replaced item {product_id} is not in the catalog cache; query product details first")]
    InvalidReplacementItem { product_id: String },

    #[error("A replacement mode was supplied without the item being replaced")]
    MissingReplacementItem,

    #[error("{operation} requires a live foreground UI context")]
    UiUnavailable { operation: String },

    #[error("{operation} was abandoned before the billing service responded")]
    OperationAbandoned { operation: String },

    #[error(transparent)]
    Runtime(#[from] core_runtime::Error),
}

impl BillingError {
    /// Error code understood by the host's method channel.
    pub fn host_code(&self) -> &'static str {
        match self {
            BillingError::ConnectionUnavailable { .. } => "UNAVAILABLE",
            BillingError::ItemNotFound { .. } => "NOT_FOUND",
            BillingError::InvalidReplacementItem { .. } => "IN_APP_PURCHASE_INVALID_OLD_SKU",
            BillingError::MissingReplacementItem => "IN_APP_PURCHASE_REQUIRE_OLD_SKU",
            BillingError::UiUnavailable { .. } => "ACTIVITY_UNAVAILABLE",
            BillingError::OperationAbandoned { .. } => "ABANDONED",
            BillingError::Runtime(_) => "UNAVAILABLE",
        }
    }

    pub fn to_host_error(&self) -> HostError {
        let details = match self {
            BillingError::ConnectionUnavailable { operation }
            | BillingError::UiUnavailable { operation }
            | BillingError::OperationAbandoned { operation } => {
                Some(json!({ "operation": operation }))
            }
            BillingError::ItemNotFound { product_id }
            | BillingError::InvalidReplacementItem { product_id } => {
                Some(json!({ "productId": product_id }))
            }
            BillingError::MissingReplacementItem | BillingError::Runtime(_) => None,
        };

        HostError {
            code: self.host_code().to_string(),
            message: self.to_string(),
            details,
        }
    }
}

pub type Result<T> = std::result::Result<T, BillingError>;

pub(crate) fn internal(message: &str) -> BillingError {
    core_runtime::Error::Internal(message.to_string()).into()
}
