//! Error types for the Frappe client

use thiserror::Error;

/// Errors that can occur when talking to a Frappe server
#[derive(Error, Debug)]
pub enum Error {
    /// The response body was not the expected JSON envelope, or its payload
    /// had the wrong shape for the operation
    #[error("Malformed response (status {status}): {reason}: {body}")]
    MalformedResponse {
        /// HTTP status code of the response
        status: u16,
        /// What was wrong with the body
        reason: String,
        /// Raw body (or offending payload) for diagnostics
        body: String,
    },

    /// The server reported an execution failure through the `exc` field
    #[error("Remote execution error: {0}")]
    RemoteExecution(String),

    /// Network or connection error
    #[error("Transport error: {0}")]
    Transport(String),

    /// Request timeout
    #[error("Request timeout after {0}ms")]
    Timeout(u64),

    /// TLS/SSL error
    #[error("TLS error: {0}")]
    Tls(String),

    /// URL parsing error
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Caller input rejected before anything was sent
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Configuration could not be loaded
    #[error("Configuration error: {0}")]
    Config(String),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A sub-request of a bulk operation failed
    #[error("Partition {index} failed: {source}")]
    Partition {
        /// Index of the failed partition (window or chunk)
        index: usize,
        /// The sub-request's own error
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    pub(crate) fn partition(index: usize, source: Error) -> Self {
        Error::Partition {
            index,
            source: Box::new(source),
        }
    }

    /// Returns the underlying error, looking through bulk partition wrappers
    pub fn root(&self) -> &Error {
        match self {
            Error::Partition { source, .. } => source.root(),
            other => other,
        }
    }

    /// Returns true for failures of the underlying connection
    pub fn is_transport(&self) -> bool {
        matches!(self.root(), Error::Transport(_) | Error::Timeout(_))
    }
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, Error>;
