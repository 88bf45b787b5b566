use core_billing::{BillingError, HostError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Service initialization failed: {0}")]
    InitializationFailed(String),

    #[error("Capability missing: {capability} - {message}")]
    CapabilityMissing { capability: String, message: String },

    #[error("Runtime error: {0}")]
    Runtime(core_runtime::Error),

    #[error(transparent)]
    Billing(#[from] BillingError),
}

impl From<core_runtime::Error> for ServiceError {
    fn from(err: core_runtime::Error) -> Self {
        match err {
            core_runtime::Error::CapabilityMissing {
                capability,
                message,
            } => ServiceError::CapabilityMissing {
                capability,
                message,
            },
            other => ServiceError::Runtime(other),
        }
    }
}

impl ServiceError {
    /// Error payload for the host's method channel.
    pub fn to_host_error(&self) -> HostError {
        match self {
            ServiceError::Billing(err) => err.to_host_error(),
            other => HostError {
                code: "UNAVAILABLE".to_string(),
                message: other.to_string(),
                details: None,
            },
        }
    }
}

pub type Result<T> = std::result::Result<T, ServiceError>;
