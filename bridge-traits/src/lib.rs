//! # Host Bridge Traits
//!
//! The contract between the billing core and the platform it runs on.
//!
//! ## Traits
//!
//! ### Commerce SDK
//! - [`BillingClientFactory`](billing::BillingClientFactory) - Creates SDK clients with a purchases listener
//! - [`BillingClient`](billing::BillingClient) - Callback-based SDK operations
//!
//! ### Platform Integration
//! - [`UiContext`](ui::UiContext) - Foreground surface required to launch flows
//!
//! ### Utilities
//! - [`Clock`](time::Clock) - Time source for catalog freshness
//! - [`LoggerSink`](log::LoggerSink) - Forward structured logs to host logging
//!
//! ## Platform Requirements
//!
//! | Platform | Implementation Crate | Status |
//! |----------|---------------------|--------|
//! | Desktop / tests | `bridge-sandbox` | ✅ Available |
//! | Android  | host adapter over Play Billing | 📋 Host supplied |
//!
//! ## Thread Safety
//!
//! SDK listeners are invoked on SDK-owned threads, so every trait here
//! requires `Send + Sync` on native targets.

pub mod billing;
pub mod error;
pub mod log;
pub mod platform;
pub mod time;
pub mod ui;

pub use error::BridgeError;

pub use billing::{
    BillingClient, BillingClientFactory, BillingFlowParams, BillingResult,
    ConnectionStateListener, ProductDetails, ProductKind, Purchase, PurchaseHistoryRecord,
    PurchaseState, PurchasesUpdatedListener, ReplacementMode, ResponseCode, ResponseListener,
    SubscriptionUpdate,
};
pub use log::{ConsoleLogger, LogEntry, LogLevel, LoggerSink};
pub use platform::PlatformSendSync;
pub use time::{Clock, ManualClock, SystemClock};
pub use ui::UiContext;
