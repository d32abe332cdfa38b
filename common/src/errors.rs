// Error handling framework
// Transport failures and HTTP status failures are distinct variants on
// purpose: the executor retries the former and never the latter, and
// callers match on the variant to tell them apart.

use reqwest::StatusCode;
use thiserror::Error;

/// Errors raised by the RHSM client and its request executor
#[derive(Error, Debug)]
pub enum RhsmError {
    /// Client construction was attempted without a usable base URL.
    /// Fatal, never retried.
    #[error("invalid RHSM configuration: {0}")]
    Configuration(String),

    /// The network exchange itself failed (connection error, timeout).
    /// Retried by the executor up to its bound, then surfaced unchanged.
    #[error("failed to process request to RHSM: {0}")]
    Transport(#[source] reqwest::Error),

    /// The backend answered with a client/server error status.
    /// Never retried; raised by the response check one layer above the
    /// executor.
    #[error("RHSM responded with status {status} for {url}")]
    Status { status: StatusCode, url: String },

    /// The request executor dropped the request before resolving it
    /// (worker pool shut down).
    #[error("RHSM request executor is shut down")]
    ExecutorShutdown,
}

impl RhsmError {
    /// True for failures of the network exchange itself, as opposed to
    /// a received error status.
    pub fn is_transport(&self) -> bool {
        matches!(self, RhsmError::Transport(_))
    }
}

/// Errors raised by the task step runner
#[derive(Error, Debug)]
pub enum TaskError {
    /// The base `run` entry point was called without a concrete task
    /// overriding it.
    #[error("task does not define a run sequence")]
    NotImplemented,

    #[error(transparent)]
    Rhsm(#[from] RhsmError),

    #[error("{0}")]
    Failed(String),
}
