//! Host dispatch context.
//!
//! All bridge state lives inside one task. Host calls and SDK callbacks reach
//! it by posting closures over an unbounded channel, so state is only ever
//! touched from that task and never needs a lock. Posting is synchronous and
//! works from any thread, including the ones the SDK calls back on.

use core_async::runtime;
use core_async::sync::{mpsc, oneshot};
use tracing::debug;

use crate::error::{internal, Result};

type Job<S> = Box<dyn FnOnce(&mut S) + Send>;

enum Envelope<S> {
    Run(Job<S>),
    Stop,
}

/// Handle to the task that owns `S`.
pub struct HostContext<S> {
    tx: mpsc::UnboundedSender<Envelope<S>>,
}

impl<S> Clone for HostContext<S> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
        }
    }
}

impl<S: Send + 'static> HostContext<S> {
    /// Moves `state` into a new task on the current runtime.
    ///
    /// Fails when called outside a runtime.
    pub fn spawn(state: S) -> Result<Self> {
        let handle = runtime::current_handle()
            .ok_or_else(|| internal("host context needs a running async runtime"))?;
        let (tx, mut rx) = mpsc::unbounded_channel::<Envelope<S>>();
        handle.spawn(async move {
            let mut state = state;
            while let Some(envelope) = rx.recv().await {
                match envelope {
                    Envelope::Run(job) => job(&mut state),
                    Envelope::Stop => break,
                }
            }
            debug!("Host context stopped");
        });
        Ok(Self { tx })
    }

    /// Queues `job` without waiting. Returns false once the context stopped.
    pub fn post<F>(&self, job: F) -> bool
    where
        F: FnOnce(&mut S) + Send + 'static,
    {
        self.tx.send(Envelope::Run(Box::new(job))).is_ok()
    }

    /// Runs `f` on the context and waits for its result.
    pub async fn call<R, F>(&self, f: F) -> Result<R>
    where
        R: Send + 'static,
        F: FnOnce(&mut S) -> R + Send + 'static,
    {
        let (reply, rx) = oneshot::channel();
        let posted = self.post(move |state| {
            let _ = reply.send(f(state));
        });
        if !posted {
            return Err(internal("host context stopped"));
        }
        rx.await.map_err(|_| internal("host context stopped"))
    }

    pub fn stop(&self) {
        let _ = self.tx.send(Envelope::Stop);
    }

    pub fn is_running(&self) -> bool {
        !self.tx.is_closed()
    }
}
