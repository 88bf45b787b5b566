//! Commerce SDK Abstraction
//!
//! The contract the bridge drives the platform commerce SDK through. The SDK
//! itself is opaque: hosts ship an adapter implementing [`BillingClientFactory`]
//! and [`BillingClient`] on top of the native library (Play Billing on Android,
//! the sandbox in `bridge-sandbox` on desktop).
//!
//! # Callback model
//!
//! Every asynchronous SDK operation reports through a caller-supplied
//! [`ResponseListener`]. Listeners are invoked on threads owned by the SDK and
//! are nominally called exactly once, but adapters are allowed to call them
//! zero or several times. Consumers must not rely on the nominal contract; the
//! core wraps every listener in a completion guard.
//!
//! Only two operations are synchronous: [`BillingClient::launch_billing_flow`]
//! returns an immediate acknowledgment (the final purchase arrives later via
//! [`PurchasesUpdatedListener`]) and [`BillingClient::is_feature_supported`].
//!
//! # Example
//!
//! ```ignore
//! use bridge_traits::billing::{BillingClient, ProductKind};
//! use std::sync::Arc;
//!
//! fn print_catalog(client: &dyn BillingClient) {
//!     client.query_product_details(
//!         ProductKind::InApp,
//!         vec!["gas".to_string()],
//!         Arc::new(|result, details| {
//!             println!("{:?}: {} items", result.response_code, details.len());
//!         }),
//!     );
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use crate::{error::Result, platform::PlatformSendSync, ui::UiContext};

/// Well-known feature names accepted by [`BillingClient::is_feature_supported`].
pub mod features {
    pub const SUBSCRIPTIONS: &str = "subscriptions";
    pub const SUBSCRIPTIONS_UPDATE: &str = "subscriptionsUpdate";
    pub const PRICE_CHANGE_CONFIRMATION: &str = "priceChangeConfirmation";
    pub const IN_APP_MESSAGING: &str = "bbb";
}

/// Response codes reported by the commerce SDK.
///
/// Codes the bridge does not know are preserved verbatim in
/// [`ResponseCode::Unknown`] so hosts still see exactly what the SDK said.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "i32", into = "i32")]
pub enum ResponseCode {
    /// The request reached the maximum timeout before the service responded.
    ServiceTimeout,
    /// The requested feature is not supported on this device.
    FeatureNotSupported,
    /// The service connection was lost; the host should reconnect.
    ServiceDisconnected,
    /// Success.
    Ok,
    /// The user dismissed the flow.
    UserCanceled,
    /// Network is down or the service is temporarily unreachable.
    ServiceUnavailable,
    /// The billing API version is not supported for the requested type.
    BillingUnavailable,
    /// The requested product is not available for purchase.
    ItemUnavailable,
    /// Invalid arguments were provided to the API.
    DeveloperError,
    /// Fatal error during the API action.
    Error,
    /// The item is already owned.
    ItemAlreadyOwned,
    /// The item is not owned.
    ItemNotOwned,
    /// A code this version of the bridge does not recognise.
    Unknown(i32),
}

impl ResponseCode {
    /// The raw integer code, as the SDK reported it.
    pub fn code(&self) -> i32 {
        match self {
            ResponseCode::ServiceTimeout => -3,
            ResponseCode::FeatureNotSupported => -2,
            ResponseCode::ServiceDisconnected => -1,
            ResponseCode::Ok => 0,
            ResponseCode::UserCanceled => 1,
            ResponseCode::ServiceUnavailable => 2,
            ResponseCode::BillingUnavailable => 3,
            ResponseCode::ItemUnavailable => 4,
            ResponseCode::DeveloperError => 5,
            ResponseCode::Error => 6,
            ResponseCode::ItemAlreadyOwned => 7,
            ResponseCode::ItemNotOwned => 8,
            ResponseCode::Unknown(code) => *code,
        }
    }

    /// Maps a raw integer code onto the enum.
    pub fn from_code(code: i32) -> Self {
        match code {
            -3 => ResponseCode::ServiceTimeout,
            -2 => ResponseCode::FeatureNotSupported,
            -1 => ResponseCode::ServiceDisconnected,
            0 => ResponseCode::Ok,
            1 => ResponseCode::UserCanceled,
            2 => ResponseCode::ServiceUnavailable,
            3 => ResponseCode::BillingUnavailable,
            4 => ResponseCode::ItemUnavailable,
            5 => ResponseCode::DeveloperError,
            6 => ResponseCode::Error,
            7 => ResponseCode::ItemAlreadyOwned,
            8 => ResponseCode::ItemNotOwned,
            other => ResponseCode::Unknown(other),
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, ResponseCode::Ok)
    }

    /// Upper snake case name used in logs.
    pub fn name(&self) -> &'static str {
        match self {
            ResponseCode::ServiceTimeout => "SERVICE_TIMEOUT",
            ResponseCode::FeatureNotSupported => "FEATURE_NOT_SUPPORTED",
            ResponseCode::ServiceDisconnected => "SERVICE_DISCONNECTED",
            ResponseCode::Ok => "OK",
            ResponseCode::UserCanceled => "USER_CANCELED",
            ResponseCode::ServiceUnavailable => "SERVICE_UNAVAILABLE",
            ResponseCode::BillingUnavailable => "BILLING_UNAVAILABLE",
            ResponseCode::ItemUnavailable => "ITEM_UNAVAILABLE",
            ResponseCode::DeveloperError => "DEVELOPER_ERROR",
            ResponseCode::Error => "ERROR",
            ResponseCode::ItemAlreadyOwned => "ITEM_ALREADY_OWNED",
            ResponseCode::ItemNotOwned => "ITEM_NOT_OWNED",
            ResponseCode::Unknown(_) => "UNKNOWN",
        }
    }
}

impl From<i32> for ResponseCode {
    fn from(code: i32) -> Self {
        Self::from_code(code)
    }
}

impl From<ResponseCode> for i32 {
    fn from(code: ResponseCode) -> Self {
        code.code()
    }
}

impl fmt::Display for ResponseCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.name(), self.code())
    }
}

/// Outcome of a single SDK call: a response code plus free-form debug text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BillingResult {
    pub response_code: ResponseCode,
    pub debug_message: String,
}

impl BillingResult {
    pub fn new(response_code: ResponseCode, debug_message: impl Into<String>) -> Self {
        Self {
            response_code,
            debug_message: debug_message.into(),
        }
    }

    /// Shorthand for an `OK` result with an empty debug message.
    pub fn ok() -> Self {
        Self::new(ResponseCode::Ok, "")
    }

    pub fn is_ok(&self) -> bool {
        self.response_code.is_ok()
    }
}

/// Kind of catalog item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProductKind {
    /// One-time purchase (consumable or not).
    #[serde(rename = "inapp")]
    InApp,
    /// Recurring subscription.
    #[serde(rename = "subs")]
    Subs,
}

impl ProductKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProductKind::InApp => "inapp",
            ProductKind::Subs => "subs",
        }
    }

    /// Parses the wire identifier (`"inapp"` / `"subs"`).
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "inapp" => Some(ProductKind::InApp),
            "subs" => Some(ProductKind::Subs),
            _ => None,
        }
    }
}

impl fmt::Display for ProductKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Catalog metadata for one item, as returned by the SDK.
///
/// Everything beyond the identifier and kind is opaque to the bridge and
/// kept as the JSON document the SDK produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductDetails {
    pub product_id: String,
    pub kind: ProductKind,
    #[serde(default)]
    pub metadata: serde_json::Value,
}

impl ProductDetails {
    pub fn new(product_id: impl Into<String>, kind: ProductKind) -> Self {
        Self {
            product_id: product_id.into(),
            kind,
            metadata: serde_json::Value::Null,
        }
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }
}

/// State of a purchase as tracked by the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PurchaseState {
    Unspecified,
    Purchased,
    Pending,
}

/// An active purchase owned by the signed-in account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Purchase {
    pub purchase_token: String,
    pub product_ids: Vec<String>,
    pub purchase_state: PurchaseState,
    pub is_acknowledged: bool,
    #[serde(default)]
    pub metadata: serde_json::Value,
}

/// A historical purchase record (may be expired, cancelled or consumed).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseHistoryRecord {
    pub purchase_token: String,
    pub product_ids: Vec<String>,
    /// Purchase time in milliseconds since the Unix epoch.
    pub purchase_time: i64,
    #[serde(default)]
    pub metadata: serde_json::Value,
}

/// How value is credited when one subscription replaces another mid-cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "i32", into = "i32")]
pub enum ReplacementMode {
    /// No policy requested; the store default applies.
    UnknownReplacementMode,
    ImmediateWithTimeProration,
    ImmediateAndChargeProratedPrice,
    ImmediateWithoutProration,
    Deferred,
    ImmediateAndChargeFullPrice,
}

impl From<i32> for ReplacementMode {
    fn from(code: i32) -> Self {
        match code {
            1 => ReplacementMode::ImmediateWithTimeProration,
            2 => ReplacementMode::ImmediateAndChargeProratedPrice,
            3 => ReplacementMode::ImmediateWithoutProration,
            4 => ReplacementMode::Deferred,
            5 => ReplacementMode::ImmediateAndChargeFullPrice,
            _ => ReplacementMode::UnknownReplacementMode,
        }
    }
}

impl From<ReplacementMode> for i32 {
    fn from(mode: ReplacementMode) -> Self {
        match mode {
            ReplacementMode::UnknownReplacementMode => 0,
            ReplacementMode::ImmediateWithTimeProration => 1,
            ReplacementMode::ImmediateAndChargeProratedPrice => 2,
            ReplacementMode::ImmediateWithoutProration => 3,
            ReplacementMode::Deferred => 4,
            ReplacementMode::ImmediateAndChargeFullPrice => 5,
        }
    }
}

/// Subscription replacement parameters attached to a launch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionUpdate {
    pub old_product_id: Option<String>,
    pub old_purchase_token: String,
    pub replacement_mode: ReplacementMode,
}

/// Parameters for [`BillingClient::launch_billing_flow`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BillingFlowParams {
    pub product: ProductDetails,
    pub obfuscated_account_id: Option<String>,
    pub obfuscated_profile_id: Option<String>,
    pub subscription_update: Option<SubscriptionUpdate>,
}

/// Callback invoked by the SDK with the result of an asynchronous operation.
///
/// May be invoked from any thread, any number of times.
pub type ResponseListener<T> = Arc<dyn Fn(BillingResult, T) + Send + Sync>;

/// Receives connection lifecycle notifications for one `start_connection` call.
pub trait ConnectionStateListener: PlatformSendSync {
    /// Setup finished, successfully or not.
    fn on_setup_finished(&self, result: BillingResult);

    /// The SDK lost its service connection without being asked to.
    fn on_service_disconnected(&self);
}

/// Receives purchase updates (launch outcomes, pending purchases completing).
pub trait PurchasesUpdatedListener: PlatformSendSync {
    fn on_purchases_updated(&self, result: BillingResult, purchases: Vec<Purchase>);
}

/// A connection-scoped handle to the commerce SDK.
///
/// # Platform Support
///
/// - **Android**: Play Billing `BillingClient`
/// - **Desktop/tests**: `bridge_sandbox::SandboxBillingClient`
pub trait BillingClient: PlatformSendSync {
    /// Begins connecting to the store service.
    fn start_connection(&self, listener: Arc<dyn ConnectionStateListener>);

    /// Releases the service connection.
    fn end_connection(&self);

    /// Whether the SDK currently considers itself connected.
    fn is_ready(&self) -> bool;

    fn query_product_details(
        &self,
        kind: ProductKind,
        product_ids: Vec<String>,
        listener: ResponseListener<Vec<ProductDetails>>,
    );

    fn query_purchases(&self, kind: ProductKind, listener: ResponseListener<Vec<Purchase>>);

    fn query_purchase_history(
        &self,
        kind: ProductKind,
        listener: ResponseListener<Vec<PurchaseHistoryRecord>>,
    );

    /// Consumes a purchase; the listener payload echoes the purchase token.
    fn consume(&self, purchase_token: &str, listener: ResponseListener<String>);

    fn acknowledge(&self, purchase_token: &str, listener: ResponseListener<()>);

    /// Shows the purchase UI and returns its immediate acknowledgment.
    fn launch_billing_flow(&self, ui: &dyn UiContext, params: BillingFlowParams) -> BillingResult;

    fn launch_price_change_flow(
        &self,
        ui: &dyn UiContext,
        product: &ProductDetails,
        listener: ResponseListener<()>,
    );

    fn is_feature_supported(&self, feature: &str) -> BillingResult;
}

/// Creates SDK clients.
///
/// Called lazily on the first `start_connection`; the client is reused for
/// reconnects and released on `end_connection`.
pub trait BillingClientFactory: PlatformSendSync {
    fn create_client(
        &self,
        enable_pending_purchases: bool,
        purchases_listener: Arc<dyn PurchasesUpdatedListener>,
    ) -> Result<Arc<dyn BillingClient>>;
}
