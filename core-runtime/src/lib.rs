//! # Core Runtime Module
//!
//! Ambient infrastructure shared by the billing crates:
//! - Logging and tracing setup with host log forwarding
//! - Configuration with fail-fast capability checks
//! - Event bus for host-visible pushes
//!
//! ## Overview
//!
//! Nothing here knows about connection states or purchases. The billing core
//! builds on these pieces; hosts touch them through `core-service`.

pub mod config;
pub mod error;
pub mod events;
pub mod logging;

pub use error::{Error, Result};
