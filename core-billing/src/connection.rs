//! Connection lifecycle.
//!
//! ```text
//! Disconnected --start--> Connecting --setup ok--> Ready
//!      ^                      |                      |
//!      +------setup failed----+                      |
//!      +------service disconnected-------------------+
//! any --end--> Ended (terminal)
//! ```
//!
//! Each setup attempt gets an epoch. Callbacks tagged with an older epoch
//! belong to a listener the machine has already moved past and are ignored.

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use core_runtime::logging::ANOMALY_TARGET;

use crate::error::{BillingError, Result};
use crate::translator::OperationKind;
use crate::types::OperationId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Ready,
    Ended,
}

/// What a `start_connection` call should do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartDecision {
    /// Issue a new setup call to the SDK, tagged with `epoch`.
    Issue { epoch: u64 },
    /// A setup call is already in flight; wait on its outcome.
    Join { setup_op: Option<OperationId> },
    AlreadyReady,
}

/// Effect of a setup-finished callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetupResolution {
    Resolved { setup_op: Option<OperationId> },
    /// From an epoch the machine no longer tracks.
    Stale,
    /// Setup for this epoch already finished.
    Duplicate,
}

/// Effect of a service-disconnected callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisconnectEffect {
    /// Tell the host. `setup_op` is set when setup was still in flight.
    Notify {
        handle: i64,
        setup_op: Option<OperationId>,
    },
    Absorbed,
}

#[derive(Debug)]
pub struct ConnectionMachine {
    state: ConnectionState,
    handle: Option<i64>,
    epoch: u64,
    setup_op: Option<OperationId>,
}

impl Default for ConnectionMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectionMachine {
    pub fn new() -> Self {
        Self {
            state: ConnectionState::Disconnected,
            handle: None,
            epoch: 0,
            setup_op: None,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn is_ready(&self) -> bool {
        self.state == ConnectionState::Ready
    }

    pub fn handle(&self) -> Option<i64> {
        self.handle
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn begin_start(&mut self, handle: i64) -> Result<StartDecision> {
        match self.state {
            ConnectionState::Ended => Err(BillingError::ConnectionUnavailable {
                operation: OperationKind::StartConnection.name().to_string(),
            }),
            ConnectionState::Ready => Ok(StartDecision::AlreadyReady),
            ConnectionState::Connecting => Ok(StartDecision::Join {
                setup_op: self.setup_op,
            }),
            ConnectionState::Disconnected => {
                self.epoch += 1;
                self.state = ConnectionState::Connecting;
                self.handle = Some(handle);
                self.setup_op = None;
                debug!(epoch = self.epoch, handle, "Connection setup starting");
                Ok(StartDecision::Issue { epoch: self.epoch })
            }
        }
    }

    /// Records the completion that waits on the in-flight setup.
    pub fn attach_setup(&mut self, op: OperationId) {
        self.setup_op = Some(op);
    }

    /// Rolls back a setup that never reached the SDK.
    pub fn setup_aborted(&mut self, epoch: u64) {
        if epoch == self.epoch && self.state == ConnectionState::Connecting {
            self.state = ConnectionState::Disconnected;
            self.setup_op = None;
        }
    }

    pub fn setup_finished(&mut self, epoch: u64, ok: bool) -> SetupResolution {
        if epoch != self.epoch {
            return SetupResolution::Stale;
        }
        if self.state != ConnectionState::Connecting {
            return SetupResolution::Duplicate;
        }

        self.state = if ok {
            info!(epoch, "Billing connection ready");
            ConnectionState::Ready
        } else {
            ConnectionState::Disconnected
        };
        SetupResolution::Resolved {
            setup_op: self.setup_op.take(),
        }
    }

    pub fn disconnected(&mut self, epoch: u64) -> DisconnectEffect {
        if epoch != self.epoch {
            warn!(
                target: ANOMALY_TARGET,
                epoch,
                current = self.epoch,
                "Disconnect from a superseded connection"
            );
            return DisconnectEffect::Absorbed;
        }

        match self.state {
            ConnectionState::Ready | ConnectionState::Connecting => {
                let setup_op = self.setup_op.take();
                self.state = ConnectionState::Disconnected;
                DisconnectEffect::Notify {
                    handle: self.handle.unwrap_or_default(),
                    setup_op,
                }
            }
            ConnectionState::Disconnected | ConnectionState::Ended => {
                warn!(
                    target: ANOMALY_TARGET,
                    state = ?self.state,
                    "Disconnect while not connected"
                );
                DisconnectEffect::Absorbed
            }
        }
    }

    /// Moves to `Ended`. Returns false when already ended.
    pub fn end(&mut self) -> bool {
        if self.state == ConnectionState::Ended {
            return false;
        }
        self.state = ConnectionState::Ended;
        self.setup_op = None;
        true
    }

    pub fn require_ready(&self, kind: OperationKind) -> Result<()> {
        if self.is_ready() {
            Ok(())
        } else {
            Err(BillingError::ConnectionUnavailable {
                operation: kind.name().to_string(),
            })
        }
    }
}
