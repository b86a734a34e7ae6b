//! Error taxonomy for Redfish operations.

use thiserror::Error;

/// Error type for a host session. Every failure inside one session surfaces
/// as one of these at the action boundary.
#[derive(Debug, Error)]
pub enum RedfishError {
    /// Timeout or connection error talking to the controller
    #[error("failed to communicate with {0}")]
    CommunicationFailure(String),

    /// Controller answered 401
    #[error("authentication failed for {0}, verify your credentials")]
    AuthenticationFailure(String),

    /// 404, missing collection, or a capability the controller does not advertise
    #[error("unsupported operation: {0}")]
    UnsupportedOperation(String),

    /// Body was not JSON or lacked an expected field
    #[error("malformed response: {0}")]
    MalformedResponse(String),

    /// Controller returned a structured error payload
    #[error("request rejected with status {status}: {message}")]
    RequestRejected {
        status: u16,
        message: String,
        resolution: Option<String>,
    },

    /// No boot device template matched the host
    #[error("no boot device template found, last key tried: {0}")]
    TemplateNotFound(String),

    /// A retry or poll loop ran out of attempts
    #[error("{operation} did not complete after {attempts} attempts")]
    RetryBudgetExhausted { operation: String, attempts: u32 },

    /// The run was interrupted; no further requests go to this host
    #[error("run interrupted, no further requests sent to {0}")]
    Interrupted(String),
}

/// Result type for Redfish operations
pub type Result<T> = std::result::Result<T, RedfishError>;
