//! # Sandbox Billing Bridge
//!
//! A scripted, in-memory commerce store implementing the bridge traits.
//! Desktop builds use it as the default SDK; tests use it to drive every
//! callback pattern a real store can produce.
//!
//! ## Overview
//!
//! - [`SandboxBillingFactory`] hands out clients that share one [`SandboxScript`]
//! - [`SandboxBillingClient`] answers on its own callback thread
//! - [`SandboxUi`] is a foreground surface that can be torn down on demand
//!
//! Scripts can make the store misbehave: invoke listeners several times
//! (`callback_fires > 1`), never invoke them (`callback_fires = 0`), hold
//! setup until [`SandboxBillingClient::finish_setup`] is called, or drop the
//! service connection with [`SandboxBillingClient::simulate_disconnect`].
//!
//! ## Usage
//!
//! ```ignore
//! use bridge_sandbox::{SandboxBillingFactory, SandboxOp};
//! use bridge_traits::billing::{ProductDetails, ProductKind, ResponseCode};
//!
//! let factory = SandboxBillingFactory::new();
//! factory
//!     .add_product(ProductDetails::new("gas", ProductKind::InApp))
//!     .respond_with(SandboxOp::Consume, ResponseCode::ItemNotOwned);
//! ```

mod client;
mod factory;
mod script;
mod ui;

pub use client::{CallCounts, SandboxBillingClient};
pub use factory::SandboxBillingFactory;
pub use script::{responses, SandboxOp, SandboxScript, SetupMode};
pub use ui::SandboxUi;
