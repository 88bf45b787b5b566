use thiserror::Error;

/// Failures raised by host adapters before any store callback is involved.
#[derive(Error, Debug)]
pub enum BridgeError {
    /// The store (or the host's SDK binding) cannot be reached at all.
    #[error("Billing capability not available: {0}")]
    NotAvailable(String),

    /// The SDK was reachable but refused to build a client.
    #[error("Billing client creation failed: {0}")]
    ClientCreation(String),
}

pub type Result<T> = std::result::Result<T, BridgeError>;
