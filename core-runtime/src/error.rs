use thiserror::Error;

/// Failures of the ambient runtime: configuration, wiring and host adapters.
#[derive(Error, Debug)]
pub enum Error {
    /// Invalid configuration value or logging setup.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A required host capability (such as the SDK client factory) was not supplied.
    #[error("Capability missing: {capability} - {message}")]
    CapabilityMissing { capability: String, message: String },

    /// Raised by a host adapter before the SDK was reached.
    #[error("Host adapter error: {0}")]
    Bridge(#[from] bridge_traits::BridgeError),

    /// The session itself is unusable, e.g. its host context has stopped.
    #[error("Internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, Error>;
