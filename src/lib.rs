//! Workspace placeholder crate.
//!
//! This crate exists to expose shared feature flags that map to the individual
//! workspace crates. Host applications can depend on `billing-bridge-workspace`
//! and enable `sandbox` (scripted in-process commerce SDK) or `bridge` (bring
//! your own `BillingClientFactory`) without wiring each crate individually.

#[cfg(any(feature = "sandbox", feature = "bridge"))]
pub use core_service::*;
