//! # Event Bus System
//!
//! Pushes host-visible notifications out of the billing core over
//! `tokio::sync::broadcast`. Anything the host did not directly ask for
//! (connection drops, purchase updates, catalog refreshes) travels here
//! rather than through an operation's result.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────┐    emit     ┌───────────┐   subscribe   ┌────────────┐
//! │ Connection state ├────────────>│           ├──────────────>│ Host glue  │
//! └──────────────────┘             │ EventBus  │               └────────────┘
//! ┌──────────────────┐    emit     │ (broadcast│   subscribe   ┌────────────┐
//! │ Purchases update ├────────────>│  channel) ├──────────────>│ Telemetry  │
//! └──────────────────┘             └───────────┘               └────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use core_runtime::events::{ConnectionEvent, CoreEvent, EventBus};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let bus = EventBus::new(16);
//! let mut rx = bus.subscribe();
//!
//! bus.emit(CoreEvent::Connection(ConnectionEvent::Disconnected { handle: 7 }))
//!     .ok();
//!
//! let event = rx.recv().await.unwrap();
//! assert_eq!(event.description(), "Service connection lost");
//! # }
//! ```
//!
//! ## Error Handling
//!
//! - **`RecvError::Lagged(n)`**: the subscriber fell behind and missed `n`
//!   events. Non-fatal.
//! - **`RecvError::Closed`**: every sender is gone; treat as shutdown.
//!
//! `emit` fails when nobody is subscribed. Publishers in the core ignore
//! that error: a host that never subscribes simply gets no pushes.

use bridge_traits::billing::{ProductKind, Purchase};
use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::broadcast;

pub use tokio::sync::broadcast::error::{RecvError, SendError};
pub use tokio::sync::broadcast::Receiver;

pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 100;

// ============================================================================
// Core Event Types
// ============================================================================

/// Every event the billing core publishes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "payload")]
pub enum CoreEvent {
    Connection(ConnectionEvent),
    Purchase(PurchaseEvent),
    Catalog(CatalogEvent),
}

impl CoreEvent {
    pub fn description(&self) -> &str {
        match self {
            CoreEvent::Connection(e) => e.description(),
            CoreEvent::Purchase(e) => e.description(),
            CoreEvent::Catalog(e) => e.description(),
        }
    }

    pub fn severity(&self) -> EventSeverity {
        match self {
            CoreEvent::Connection(ConnectionEvent::SetupFailed { .. }) => EventSeverity::Error,
            CoreEvent::Connection(ConnectionEvent::Disconnected { .. }) => EventSeverity::Warning,
            CoreEvent::Catalog(CatalogEvent::QueryFailed { .. }) => EventSeverity::Warning,
            CoreEvent::Purchase(PurchaseEvent::PurchasesUpdated { code, .. }) if *code != 0 => {
                EventSeverity::Warning
            }
            CoreEvent::Connection(ConnectionEvent::Ready) => EventSeverity::Info,
            CoreEvent::Purchase(_) => EventSeverity::Info,
            _ => EventSeverity::Debug,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventSeverity {
    Debug,
    Info,
    Warning,
    Error,
}

// ============================================================================
// Connection Events
// ============================================================================

/// Connection lifecycle transitions.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum ConnectionEvent {
    /// Setup was issued to the SDK.
    Connecting { handle: i64 },
    Ready,
    /// Setup finished with a non-OK code; the host may retry.
    SetupFailed { code: i32, message: String },
    /// The SDK dropped the connection without being asked to. Carries the
    /// correlation handle supplied to the `start_connection` that opened it.
    Disconnected { handle: i64 },
    /// `end_connection` was called. Terminal.
    Ended,
}

impl ConnectionEvent {
    fn description(&self) -> &str {
        match self {
            ConnectionEvent::Connecting { .. } => "Connecting to billing service",
            ConnectionEvent::Ready => "Billing service ready",
            ConnectionEvent::SetupFailed { .. } => "Billing setup failed",
            ConnectionEvent::Disconnected { .. } => "Service connection lost",
            ConnectionEvent::Ended => "Billing connection ended",
        }
    }
}

// ============================================================================
// Purchase Events
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum PurchaseEvent {
    /// The SDK pushed purchase updates, typically the outcome of a launched flow.
    PurchasesUpdated {
        code: i32,
        message: String,
        purchases: Vec<Purchase>,
    },
}

impl PurchaseEvent {
    fn description(&self) -> &str {
        match self {
            PurchaseEvent::PurchasesUpdated { .. } => "Purchases updated",
        }
    }
}

// ============================================================================
// Catalog Events
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum CatalogEvent {
    /// Entries were written to the catalog cache.
    Refreshed {
        kind: ProductKind,
        product_ids: Vec<String>,
    },
    /// A catalog query finished with a non-OK code; freshness was reset.
    QueryFailed { kind: ProductKind, code: i32 },
}

impl CatalogEvent {
    fn description(&self) -> &str {
        match self {
            CatalogEvent::Refreshed { .. } => "Catalog cache refreshed",
            CatalogEvent::QueryFailed { .. } => "Catalog query failed",
        }
    }
}

// ============================================================================
// Event Bus
// ============================================================================

/// Broadcast hub for [`CoreEvent`]s. Cheap to clone.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<CoreEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Returns the number of subscribers that will see the event.
    pub fn emit(&self, event: CoreEvent) -> Result<usize, SendError<CoreEvent>> {
        self.sender.send(event)
    }

    pub fn subscribe(&self) -> Receiver<CoreEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER_SIZE)
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

// ============================================================================
// Event Stream Wrapper
// ============================================================================

type EventFilter = Box<dyn Fn(&CoreEvent) -> bool + Send + Sync>;

/// A receiver that skips events not matching an optional predicate.
pub struct EventStream {
    receiver: Receiver<CoreEvent>,
    filter: Option<EventFilter>,
}

impl EventStream {
    pub fn new(receiver: Receiver<CoreEvent>) -> Self {
        Self {
            receiver,
            filter: None,
        }
    }

    pub fn filter<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&CoreEvent) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Box::new(predicate));
        self
    }

    fn accepts(&self, event: &CoreEvent) -> bool {
        self.filter.as_ref().map_or(true, |f| f(event))
    }

    pub async fn recv(&mut self) -> Result<CoreEvent, RecvError> {
        loop {
            let event = self.receiver.recv().await?;
            if self.accepts(&event) {
                return Ok(event);
            }
        }
    }

    pub fn try_recv(&mut self) -> Option<Result<CoreEvent, RecvError>> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) if self.accepts(&event) => return Some(Ok(event)),
                Ok(_) => continue,
                Err(broadcast::error::TryRecvError::Empty) => return None,
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    return Some(Err(RecvError::Lagged(n)))
                }
                Err(broadcast::error::TryRecvError::Closed) => return Some(Err(RecvError::Closed)),
            }
        }
    }
}

impl fmt::Debug for EventStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventStream")
            .field("has_filter", &self.filter.is_some())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_traits::billing::PurchaseState;

    fn purchase(token: &str) -> Purchase {
        Purchase {
            purchase_token: token.to_string(),
            product_ids: vec!["gas".to_string()],
            purchase_state: PurchaseState::Purchased,
            is_acknowledged: false,
            metadata: serde_json::Value::Null,
        }
    }

    #[tokio::test]
    async fn test_event_emission_no_subscribers() {
        let bus = EventBus::new(10);
        assert!(bus.emit(CoreEvent::Connection(ConnectionEvent::Ready)).is_err());
    }

    #[tokio::test]
    async fn test_multiple_subscribers_receive_same_event() {
        let bus = EventBus::new(10);
        let mut sub1 = bus.subscribe();
        let mut sub2 = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 2);

        let event = CoreEvent::Connection(ConnectionEvent::Disconnected { handle: 42 });
        assert_eq!(bus.emit(event.clone()).unwrap(), 2);

        assert_eq!(sub1.recv().await.unwrap(), event);
        assert_eq!(sub2.recv().await.unwrap(), event);
    }

    #[tokio::test]
    async fn test_event_stream_with_filter() {
        let bus = EventBus::new(10);
        let mut stream = EventStream::new(bus.subscribe())
            .filter(|event| matches!(event, CoreEvent::Purchase(_)));

        bus.emit(CoreEvent::Connection(ConnectionEvent::Ready)).ok();
        let update = CoreEvent::Purchase(PurchaseEvent::PurchasesUpdated {
            code: 0,
            message: String::new(),
            purchases: vec![purchase("tok-1")],
        });
        bus.emit(update.clone()).ok();

        assert_eq!(stream.recv().await.unwrap(), update);
    }

    #[tokio::test]
    async fn test_lagged_subscriber() {
        let bus = EventBus::new(2);
        let mut sub = bus.subscribe();

        for handle in 0..5 {
            bus.emit(CoreEvent::Connection(ConnectionEvent::Connecting { handle }))
                .ok();
        }

        assert!(matches!(sub.recv().await, Err(RecvError::Lagged(_))));
        assert!(sub.recv().await.is_ok());
    }

    #[test]
    fn test_event_severity() {
        let failed = CoreEvent::Connection(ConnectionEvent::SetupFailed {
            code: 3,
            message: "billing unavailable".to_string(),
        });
        assert_eq!(failed.severity(), EventSeverity::Error);

        let dropped = CoreEvent::Connection(ConnectionEvent::Disconnected { handle: 1 });
        assert_eq!(dropped.severity(), EventSeverity::Warning);

        let canceled = CoreEvent::Purchase(PurchaseEvent::PurchasesUpdated {
            code: 1,
            message: "canceled".to_string(),
            purchases: vec![],
        });
        assert_eq!(canceled.severity(), EventSeverity::Warning);

        let ok = CoreEvent::Purchase(PurchaseEvent::PurchasesUpdated {
            code: 0,
            message: String::new(),
            purchases: vec![purchase("tok-2")],
        });
        assert_eq!(ok.severity(), EventSeverity::Info);

        let connecting = CoreEvent::Connection(ConnectionEvent::Connecting { handle: 1 });
        assert_eq!(connecting.severity(), EventSeverity::Debug);
    }

    #[test]
    fn test_event_serialization_shape() {
        let event = CoreEvent::Connection(ConnectionEvent::Disconnected { handle: 9 });
        let json = serde_json::to_value(&event).unwrap();

        assert_eq!(json["type"], "Connection");
        assert_eq!(json["payload"]["event"], "Disconnected");
        assert_eq!(json["payload"]["handle"], 9);

        let back: CoreEvent = serde_json::from_value(json).unwrap();
        assert_eq!(back, event);
    }

    #[test]
    fn test_catalog_event_serializes_kind_wire_name() {
        let event = CoreEvent::Catalog(CatalogEvent::QueryFailed {
            kind: ProductKind::Subs,
            code: 2,
        });
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["payload"]["kind"], "subs");
    }

    #[tokio::test]
    async fn test_try_recv_empty_then_event() {
        let bus = EventBus::default();
        let mut stream = EventStream::new(bus.subscribe());
        assert!(stream.try_recv().is_none());

        bus.emit(CoreEvent::Connection(ConnectionEvent::Ended)).ok();
        assert_eq!(
            stream.try_recv().unwrap().unwrap(),
            CoreEvent::Connection(ConnectionEvent::Ended)
        );
    }
}
