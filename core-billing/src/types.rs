//! Host-facing value types.

use bridge_traits::billing::{BillingResult, ReplacementMode, ResponseCode};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::catalog::Freshness;

/// Identifies one outstanding SDK call inside the completion guard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OperationId(Uuid);

impl OperationId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for OperationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for OperationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Uniform result of every SDK-backed operation.
///
/// `code` and `message` are the SDK's own, passed through untouched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BillingOutcome<P> {
    pub code: ResponseCode,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<P>,
}

impl<P> BillingOutcome<P> {
    pub fn new(code: ResponseCode, message: impl Into<String>, payload: Option<P>) -> Self {
        Self {
            code,
            message: message.into(),
            payload,
        }
    }

    pub fn from_result(result: BillingResult, payload: Option<P>) -> Self {
        Self {
            code: result.response_code,
            message: result.debug_message,
            payload,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.code.is_ok()
    }
}

/// A request to launch the purchase UI.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseFlowRequest {
    pub product_id: String,
    pub obfuscated_account_id: Option<String>,
    pub obfuscated_profile_id: Option<String>,
    /// Subscription being replaced.
    pub old_product_id: Option<String>,
    pub replacement_mode: Option<ReplacementMode>,
    /// Purchase token of the subscription being replaced.
    pub old_purchase_token: Option<String>,
}

impl PurchaseFlowRequest {
    pub fn new(product_id: impl Into<String>) -> Self {
        Self {
            product_id: product_id.into(),
            ..Default::default()
        }
    }

    pub fn with_account(mut self, account_id: impl Into<String>) -> Self {
        self.obfuscated_account_id = Some(account_id.into());
        self
    }

    pub fn with_profile(mut self, profile_id: impl Into<String>) -> Self {
        self.obfuscated_profile_id = Some(profile_id.into());
        self
    }

    pub fn replacing(mut self, old_product_id: impl Into<String>) -> Self {
        self.old_product_id = Some(old_product_id.into());
        self
    }

    pub fn with_replacement_mode(mut self, mode: ReplacementMode) -> Self {
        self.replacement_mode = Some(mode);
        self
    }

    pub fn with_old_purchase_token(mut self, token: impl Into<String>) -> Self {
        self.old_purchase_token = Some(token.into());
        self
    }
}

/// Serializable error for the host's method channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HostError {
    pub code: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

/// Snapshot of the catalog cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogStatus {
    pub entries: usize,
    pub freshness: Freshness,
    /// Whether a re-query is warranted. Advisory only.
    pub stale: bool,
}
