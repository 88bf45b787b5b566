//! # Billing Configuration
//!
//! Builder-based configuration for the billing core. The builder fails fast
//! when a required capability is missing, naming what to inject.
//!
//! ## Required Dependencies
//!
//! - `BillingClientFactory` - creates the commerce SDK client
//!
//! ## Optional Dependencies
//!
//! - `Clock` - time source for catalog freshness (default: `SystemClock`)
//! - `UiContext` - initial foreground surface; can also be attached later
//!
//! When the `sandbox` feature is enabled, `bridge_sandbox::SandboxBillingFactory`
//! is injected if no factory is provided.
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::BillingConfig;
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! let config = BillingConfig::builder()
//!     .client_factory(Arc::new(PlayBillingFactory::new(jvm)))
//!     .catalog_requery_interval(Duration::from_secs(2 * 60 * 60))
//!     .event_buffer_size(256)
//!     .build()?;
//! ```

use crate::error::{Error, Result};
use crate::events::DEFAULT_EVENT_BUFFER_SIZE;
use bridge_traits::{BillingClientFactory, Clock, SystemClock, UiContext};
use std::sync::Arc;
use std::time::Duration;

/// Catalog entries become eligible for a re-query after this long without a
/// successful response.
pub const DEFAULT_CATALOG_REQUERY_INTERVAL: Duration = Duration::from_secs(4 * 60 * 60);

pub const MAX_EVENT_BUFFER_SIZE: usize = 10_000;

#[derive(Clone)]
pub struct BillingConfig {
    pub client_factory: Arc<dyn BillingClientFactory>,

    pub clock: Arc<dyn Clock>,

    /// Advisory staleness window for the catalog cache. Never gates queries.
    pub catalog_requery_interval: Duration,

    /// Capacity of the broadcast channel behind the event bus.
    pub event_buffer_size: usize,

    pub ui_context: Option<Arc<dyn UiContext>>,
}

impl std::fmt::Debug for BillingConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BillingConfig")
            .field("client_factory", &"BillingClientFactory { ... }")
            .field("clock", &"Clock { ... }")
            .field("catalog_requery_interval", &self.catalog_requery_interval)
            .field("event_buffer_size", &self.event_buffer_size)
            .field("ui_context", &self.ui_context.as_ref().map(|ui| ui.id()))
            .finish()
    }
}

impl BillingConfig {
    pub fn builder() -> BillingConfigBuilder {
        BillingConfigBuilder::default()
    }

    pub fn validate(&self) -> Result<()> {
        if self.catalog_requery_interval.is_zero() {
            return Err(Error::Config(
                "Catalog requery interval must be greater than 0".to_string(),
            ));
        }

        if self.event_buffer_size == 0 {
            return Err(Error::Config(
                "Event buffer size must be greater than 0".to_string(),
            ));
        }

        if self.event_buffer_size > MAX_EVENT_BUFFER_SIZE {
            return Err(Error::Config(format!(
                "Event buffer size exceeds maximum of {}",
                MAX_EVENT_BUFFER_SIZE
            )));
        }

        Ok(())
    }
}

#[cfg(feature = "sandbox")]
fn provide_default_client_factory() -> Result<Arc<dyn BillingClientFactory>> {
    use bridge_sandbox::SandboxBillingFactory;

    tracing::warn!("No BillingClientFactory provided, using the sandbox store");
    let factory: Arc<dyn BillingClientFactory> = Arc::new(SandboxBillingFactory::new());
    Ok(factory)
}

#[cfg(not(feature = "sandbox"))]
fn provide_default_client_factory() -> Result<Arc<dyn BillingClientFactory>> {
    Err(Error::CapabilityMissing {
        capability: "BillingClientFactory".to_string(),
        message: "A commerce SDK client factory is required. \
                 Android: inject the Play Billing adapter. \
                 Desktop/tests: enable the 'sandbox' feature to use SandboxBillingFactory."
            .to_string(),
    })
}

#[derive(Default)]
pub struct BillingConfigBuilder {
    client_factory: Option<Arc<dyn BillingClientFactory>>,
    clock: Option<Arc<dyn Clock>>,
    catalog_requery_interval: Option<Duration>,
    event_buffer_size: Option<usize>,
    ui_context: Option<Arc<dyn UiContext>>,
}

impl BillingConfigBuilder {
    pub fn client_factory(mut self, factory: Arc<dyn BillingClientFactory>) -> Self {
        self.client_factory = Some(factory);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn catalog_requery_interval(mut self, interval: Duration) -> Self {
        self.catalog_requery_interval = Some(interval);
        self
    }

    pub fn event_buffer_size(mut self, size: usize) -> Self {
        self.event_buffer_size = Some(size);
        self
    }

    pub fn ui_context(mut self, ui: Arc<dyn UiContext>) -> Self {
        self.ui_context = Some(ui);
        self
    }

    pub fn build(self) -> Result<BillingConfig> {
        let client_factory = match self.client_factory {
            Some(factory) => factory,
            None => provide_default_client_factory()?,
        };

        let config = BillingConfig {
            client_factory,
            clock: self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
            catalog_requery_interval: self
                .catalog_requery_interval
                .unwrap_or(DEFAULT_CATALOG_REQUERY_INTERVAL),
            event_buffer_size: self.event_buffer_size.unwrap_or(DEFAULT_EVENT_BUFFER_SIZE),
            ui_context: self.ui_context,
        };

        config.validate()?;

        Ok(config)
    }
}
