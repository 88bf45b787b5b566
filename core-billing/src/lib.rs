//! # Core Billing
//!
//! Asynchronous purchase-session bridge between a host application and a
//! callback-driven commerce SDK.
//!
//! ## Components
//!
//! - [`translator`]: SDK results to [`BillingOutcome`], with tiered logging
//! - [`catalog`]: last-known product metadata and advisory freshness
//! - [`connection`]: the connection lifecycle state machine
//! - [`completion`]: exactly-once delivery of SDK callbacks
//! - [`dispatch`]: the single task that owns all session state
//! - [`bridge`]: the host-facing [`BillingBridge`]
//!
//! SDK-reported codes are data, not errors: they come back inside
//! [`BillingOutcome`]. [`BillingError`] is reserved for failures the bridge
//! detects itself, such as a launch for an item that was never queried.

pub mod bridge;
pub mod catalog;
pub mod completion;
pub mod connection;
pub mod dispatch;
pub mod error;
pub mod translator;
pub mod types;

pub use bridge::BillingBridge;
pub use catalog::{CatalogUpdate, Freshness};
pub use completion::{Completion, CompletionGuard, Delivery};
pub use connection::ConnectionState;
pub use error::{BillingError, Result};
pub use translator::{OperationKind, ResultTier};
pub use types::{BillingOutcome, CatalogStatus, HostError, OperationId, PurchaseFlowRequest};
