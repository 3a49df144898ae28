//! Error types for the controller.
//!
//! Defines custom error types with classification for retry behavior.

use std::time::Duration;
use thiserror::Error;

/// Error type for controller operations
#[derive(Error, Debug)]
pub enum Error {
    /// Kubernetes API error
    #[error("Kubernetes API error: {0}")]
    Kube(#[from] kube::Error),

    /// Workload spec failed validation; the user has to fix it
    #[error("Validation error: {0}")]
    Validation(String),

    /// The governing service referenced by the workload does not exist
    #[error("Governing service {0} not found")]
    ServiceNotFound(String),

    /// A create raced with another writer in the same pass
    #[error("{kind} {name} already exists")]
    AlreadyExists { kind: &'static str, name: String },

    /// A bounded wait ran out of time
    #[error("Timed out: {0}")]
    Timeout(String),

    /// The reconciliation pass exceeded its deadline
    #[error("Reconciliation exceeded deadline of {0:?}")]
    DeadlineExceeded(Duration),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Check if this error indicates a not-found condition
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::Kube(kube::Error::Api(e)) if e.code == 404)
    }

    /// Check if this error indicates an already-exists condition
    pub fn is_already_exists(&self) -> bool {
        matches!(self, Error::AlreadyExists { .. })
            || matches!(self, Error::Kube(kube::Error::Api(e)) if e.code == 409 && e.reason == "AlreadyExists")
    }

    /// Check if this error should be retried
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Kube(e) => {
                // Server errors, throttling, conflicts and transport failures
                matches!(
                    e,
                    kube::Error::Api(api_err)
                        if api_err.code >= 500 || api_err.code == 429 || api_err.code == 409
                ) || matches!(e, kube::Error::Service(_))
            }
            Error::ServiceNotFound(_)
            | Error::AlreadyExists { .. }
            | Error::Timeout(_)
            | Error::DeadlineExceeded(_) => true,
            Error::Validation(_) | Error::Serialization(_) => false,
        }
    }

    /// Get the recommended requeue duration for this error
    pub fn requeue_after(&self) -> Duration {
        match self {
            // Nothing changes until the user edits the spec, and the edit
            // itself triggers a new pass.
            Error::Validation(_) => Duration::from_secs(300),
            _ if self.is_retryable() => Duration::from_secs(30),
            _ => Duration::from_secs(300),
        }
    }
}

/// Result type alias for controller operations
pub type Result<T> = std::result::Result<T, Error>;
