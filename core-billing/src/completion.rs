//! Exactly-once completion of SDK callbacks.
//!
//! Every SDK call gets a [`PendingOperation`] in an arena keyed by
//! [`OperationId`]. The first [`CompletionGuard::complete`] for an id removes
//! the entry and delivers to every sink waiting on it; the entry is gone
//! afterwards, so a second callback has nothing left to deliver to and is
//! absorbed. Absorbed callbacks are logged on the anomaly target and counted,
//! never surfaced to the host.
//!
//! Sinks are `oneshot` senders. If an entry is abandoned (the SDK released its
//! listener without ever calling it) the senders are dropped and waiters see
//! [`BillingError::OperationAbandoned`].

use core_async::sync::oneshot;
use core_runtime::logging::ANOMALY_TARGET;
use std::any::Any;
use std::collections::{HashMap, VecDeque};
use tracing::{debug, error, warn};

use crate::error::{BillingError, Result};
use crate::translator::OperationKind;
use crate::types::OperationId;

/// How many settled ids are remembered to tell duplicates from strays.
const SETTLED_HISTORY: usize = 256;

struct PendingOperation {
    kind: OperationKind,
    /// `Vec<oneshot::Sender<T>>` for the `T` the operation was registered with.
    sinks: Box<dyn Any + Send>,
}

/// What happened to a completion attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// First completion; `sinks` waiters were still listening.
    Delivered { sinks: usize },
    /// The operation had already settled.
    Duplicate,
    /// No such operation, or it settled too long ago to remember.
    Unknown,
}

/// Arena of outstanding SDK operations.
#[derive(Default)]
pub struct CompletionGuard {
    pending: HashMap<OperationId, PendingOperation>,
    settled: VecDeque<(OperationId, OperationKind)>,
    anomalies: u64,
}

impl CompletionGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new operation and returns the host-facing sink for it.
    pub fn register<T: Send + 'static>(&mut self, kind: OperationKind) -> Completion<T> {
        let id = OperationId::new();
        let (tx, rx) = oneshot::channel();
        self.pending.insert(
            id,
            PendingOperation {
                kind,
                sinks: Box::new(vec![tx]),
            },
        );
        debug!(operation_id = %id, operation = %kind, "Operation registered");
        Completion { id, kind, rx }
    }

    /// Adds another sink to a pending operation. Used when concurrent host
    /// calls share one SDK call.
    pub fn join<T: Send + 'static>(&mut self, id: OperationId) -> Option<Completion<T>> {
        let op = self.pending.get_mut(&id)?;
        let kind = op.kind;
        let sinks = (*op.sinks).downcast_mut::<Vec<oneshot::Sender<T>>>()?;
        let (tx, rx) = oneshot::channel();
        sinks.push(tx);
        Some(Completion { id, kind, rx })
    }

    pub fn is_pending(&self, id: &OperationId) -> bool {
        self.pending.contains_key(id)
    }

    pub fn kind_of(&self, id: &OperationId) -> Option<OperationKind> {
        self.pending.get(id).map(|op| op.kind)
    }

    /// Delivers `value` to every sink of `id` if it is still pending.
    pub fn complete<T: Clone + Send + 'static>(&mut self, id: OperationId, value: T) -> Delivery {
        let Some(op) = self.pending.remove(&id) else {
            return self.absorb(id);
        };
        self.remember(id, op.kind);

        let sinks = match op.sinks.downcast::<Vec<oneshot::Sender<T>>>() {
            Ok(sinks) => sinks,
            Err(_) => {
                self.anomalies += 1;
                error!(
                    target: ANOMALY_TARGET,
                    operation_id = %id,
                    operation = %op.kind,
                    "Completion payload does not match the registered operation"
                );
                return Delivery::Unknown;
            }
        };

        let delivered = sinks
            .into_iter()
            .filter_map(|tx| tx.send(value.clone()).ok())
            .count();
        if delivered == 0 {
            debug!(operation_id = %id, operation = %op.kind, "Completed with no waiters left");
        }
        Delivery::Delivered { sinks: delivered }
    }

    /// Drops the sinks of a pending operation so its waiters observe
    /// [`BillingError::OperationAbandoned`]. Returns whether anything was pending.
    pub fn abandon(&mut self, id: OperationId) -> bool {
        let Some(op) = self.pending.remove(&id) else {
            return false;
        };
        self.remember(id, op.kind);
        self.anomalies += 1;
        warn!(
            target: ANOMALY_TARGET,
            operation_id = %id,
            operation = %op.kind,
            "Billing service released its callback without answering"
        );
        true
    }

    /// Callbacks absorbed or abandoned so far.
    pub fn anomalies(&self) -> u64 {
        self.anomalies
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Records a callback for an operation that is no longer pending.
    pub fn absorb(&mut self, id: OperationId) -> Delivery {
        debug_assert!(!self.pending.contains_key(&id));
        self.anomalies += 1;
        match self.settled.iter().find(|(settled, _)| *settled == id) {
            Some((_, kind)) => {
                warn!(
                    target: ANOMALY_TARGET,
                    operation_id = %id,
                    operation = %kind,
                    "Absorbed repeated callback for a settled operation"
                );
                Delivery::Duplicate
            }
            None => {
                warn!(
                    target: ANOMALY_TARGET,
                    operation_id = %id,
                    "Absorbed callback for an unknown operation"
                );
                Delivery::Unknown
            }
        }
    }

    fn remember(&mut self, id: OperationId, kind: OperationKind) {
        if self.settled.len() == SETTLED_HISTORY {
            self.settled.pop_front();
        }
        self.settled.push_back((id, kind));
    }
}

impl std::fmt::Debug for CompletionGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompletionGuard")
            .field("pending", &self.pending.len())
            .field("anomalies", &self.anomalies)
            .finish()
    }
}

/// Host-facing end of one pending operation.
#[derive(Debug)]
pub struct Completion<T> {
    id: OperationId,
    kind: OperationKind,
    rx: oneshot::Receiver<T>,
}

impl<T> Completion<T> {
    pub fn id(&self) -> OperationId {
        self.id
    }

    pub fn kind(&self) -> OperationKind {
        self.kind
    }

    /// Waits for the single outcome of the operation.
    pub async fn wait(self) -> Result<T> {
        let Completion { kind, rx, .. } = self;
        rx.await.map_err(|_| BillingError::OperationAbandoned {
            operation: kind.name().to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[core_async::test]
    async fn test_first_completion_wins() {
        let mut guard = CompletionGuard::new();
        let completion = guard.register::<&'static str>(OperationKind::Consume);
        let id = completion.id();

        assert_eq!(guard.complete(id, "first"), Delivery::Delivered { sinks: 1 });
        assert_eq!(guard.complete(id, "second"), Delivery::Duplicate);
        assert_eq!(guard.complete(id, "third"), Delivery::Duplicate);

        assert_eq!(completion.wait().await.unwrap(), "first");
        assert_eq!(guard.anomalies(), 2);
        assert_eq!(guard.pending_count(), 0);
    }

    #[core_async::test]
    async fn test_joined_sinks_share_outcome() {
        let mut guard = CompletionGuard::new();
        let first = guard.register::<u32>(OperationKind::StartConnection);
        let second = guard.join::<u32>(first.id()).unwrap();

        assert_eq!(
            guard.complete(first.id(), 7u32),
            Delivery::Delivered { sinks: 2 }
        );
        assert_eq!(first.wait().await.unwrap(), 7);
        assert_eq!(second.wait().await.unwrap(), 7);
    }

    #[test]
    fn test_join_requires_pending_operation_of_same_type() {
        let mut guard = CompletionGuard::new();
        let completion = guard.register::<u32>(OperationKind::StartConnection);

        assert!(guard.join::<String>(completion.id()).is_none());
        guard.complete(completion.id(), 1u32);
        assert!(guard.join::<u32>(completion.id()).is_none());
    }

    #[test]
    fn test_unknown_id_is_absorbed() {
        let mut guard = CompletionGuard::new();
        assert_eq!(guard.complete(OperationId::new(), ()), Delivery::Unknown);
        assert_eq!(guard.anomalies(), 1);
    }

    #[core_async::test]
    async fn test_abandon_resolves_waiters_with_error() {
        let mut guard = CompletionGuard::new();
        let completion = guard.register::<()>(OperationKind::Acknowledge);
        let id = completion.id();

        assert!(guard.abandon(id));
        assert!(!guard.abandon(id));

        match completion.wait().await {
            Err(BillingError::OperationAbandoned { operation }) => {
                assert_eq!(operation, "acknowledge")
            }
            other => panic!("expected abandonment, got {:?}", other),
        }
        // A late callback after abandonment is a duplicate, not a crash.
        assert_eq!(guard.complete(id, ()), Delivery::Duplicate);
    }

    #[test]
    fn test_completion_after_host_stopped_listening() {
        let mut guard = CompletionGuard::new();
        let completion = guard.register::<u8>(OperationKind::QueryPurchases);
        let id = completion.id();
        drop(completion);

        assert_eq!(guard.complete(id, 1u8), Delivery::Delivered { sinks: 0 });
        assert_eq!(guard.anomalies(), 0);
    }

    #[test]
    fn test_settled_history_is_bounded() {
        let mut guard = CompletionGuard::new();
        let first = guard.register::<()>(OperationKind::Consume).id();
        guard.complete(first, ());

        for _ in 0..SETTLED_HISTORY {
            let id = guard.register::<()>(OperationKind::Consume).id();
            guard.complete(id, ());
        }

        assert_eq!(guard.complete(first, ()), Delivery::Unknown);
    }
}
