//! Billing service façade and bootstrap helpers.
//!
//! This crate wires a host-provided commerce SDK factory, clock and UI
//! context into the billing core. Android hosts inject their Play Billing
//! adapter through [`BillingConfig`]; desktop builds and tests enable the
//! `sandbox` feature, which falls back to the scripted in-process store when
//! no factory is supplied.

pub mod error;

pub use error::{Result, ServiceError};

pub use bridge_traits::billing::{
    features, BillingClientFactory, ProductDetails, ProductKind, Purchase, PurchaseHistoryRecord,
    ReplacementMode, ResponseCode,
};
pub use core_billing::{
    BillingBridge, BillingError, BillingOutcome, CatalogStatus, ConnectionState, Freshness,
    HostError, PurchaseFlowRequest,
};
pub use core_runtime::config::{BillingConfig, BillingConfigBuilder};
pub use core_runtime::events::{CoreEvent, EventBus, EventStream};
pub use core_runtime::logging::{LogFormat, LoggingConfig};

#[cfg(feature = "sandbox")]
pub use bridge_sandbox::{SandboxBillingFactory, SandboxUi};

use std::sync::Arc;
use tracing::info;

/// Primary façade exposed to host applications.
#[derive(Clone)]
pub struct BillingService {
    bridge: Arc<BillingBridge>,
    events: EventBus,
    config: Arc<BillingConfig>,
}

impl BillingService {
    /// Create a service from a validated configuration. Must run on an async
    /// runtime.
    pub fn new(config: BillingConfig) -> Result<Self> {
        config.validate()?;
        let events = EventBus::new(config.event_buffer_size);
        let bridge = BillingBridge::with_event_bus(&config, events.clone())?;
        Ok(Self {
            bridge: Arc::new(bridge),
            events,
            config: Arc::new(config),
        })
    }

    /// The purchase session behind this service.
    pub fn bridge(&self) -> &BillingBridge {
        &self.bridge
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn subscribe(&self) -> EventStream {
        EventStream::new(self.events.subscribe())
    }

    pub fn config(&self) -> Arc<BillingConfig> {
        Arc::clone(&self.config)
    }

    /// Ends the billing connection and stops the session.
    pub async fn shutdown(&self) -> Result<()> {
        self.bridge.end_connection().await?;
        self.bridge.shutdown();
        info!("Billing service shut down");
        Ok(())
    }
}

impl std::fmt::Debug for BillingService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BillingService")
            .field("config", &self.config)
            .field("events", &self.events)
            .finish()
    }
}

/// Installs logging (when asked to) and builds the service.
///
/// ```no_run
/// # async fn example(config: core_service::BillingConfig) -> core_service::Result<()> {
/// use core_service::{bootstrap, LoggingConfig, ProductKind};
///
/// let service = bootstrap(config, Some(LoggingConfig::default())).await?;
/// service.bridge().start_connection(1, true).await?;
/// service
///     .bridge()
///     .query_product_details(ProductKind::InApp, vec!["gas".into()])
///     .await?;
/// # Ok(())
/// # }
/// ```
pub async fn bootstrap(
    config: BillingConfig,
    logging: Option<LoggingConfig>,
) -> Result<BillingService> {
    if let Some(logging) = logging {
        core_runtime::logging::init_logging(logging)
            .map_err(|err| ServiceError::InitializationFailed(err.to_string()))?;
    }
    let service = BillingService::new(config)?;
    info!(?service, "Billing service ready");
    Ok(service)
}

/// Bootstraps with every optional capability defaulted.
///
/// Without the `sandbox` feature this fails with
/// [`ServiceError::CapabilityMissing`], since no commerce SDK factory is
/// available.
pub async fn bootstrap_with_defaults(logging: Option<LoggingConfig>) -> Result<BillingService> {
    let config = BillingConfig::builder().build()?;
    bootstrap(config, logging).await
}
