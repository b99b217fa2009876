//! Error types for salt-api operations.
//!
//! Errors are categorized so callers can tell fatal conditions (bad login,
//! transport failure, malformed responses) apart from failures the result
//! walker may downgrade to a report when `fail_on_error` is off.

use std::fmt;
use std::time::Duration;

/// Result type alias for saltkit operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Categories of saltkit errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Login failed or the login response was malformed.
    Auth,
    /// Network failure or non-2xx status from salt-api.
    Transport,
    /// Response did not have the expected `return` structure.
    Protocol,
    /// A round of the response carried no data.
    EmptyResponse,
    /// A resource explicitly reported failure.
    StateFailure,
    /// A shell command did not print its success sentinel.
    CommandExecution,
    /// An operator aborted, or did not answer, an escalation prompt.
    Escalation,
    /// Bad input supplied by the caller (credentials, request fields).
    Usage,
}

impl ErrorCategory {
    /// Whether `fail_on_error = false` turns this failure into a report.
    #[must_use]
    pub fn is_downgradable(&self) -> bool {
        matches!(self, Self::EmptyResponse | Self::StateFailure)
    }

    /// Whether this error always aborts the operation.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        !self.is_downgradable()
    }

    /// Get a user-friendly description of this error category.
    #[must_use]
    pub fn description(&self) -> &'static str {
        match self {
            Self::Auth => "Authentication failed",
            Self::Transport => "salt-api request failed",
            Self::Protocol => "Unexpected salt-api response",
            Self::EmptyResponse => "No data returned",
            Self::StateFailure => "State failed",
            Self::CommandExecution => "Command execution failed",
            Self::Escalation => "Stopped by operator",
            Self::Usage => "Invalid request",
        }
    }

    /// Get actionable advice for resolving this error category.
    #[must_use]
    pub fn advice(&self) -> &'static str {
        match self {
            Self::Auth => "Check the salt-api credentials and the eauth configuration on the master",
            Self::Transport => "Check that salt-api is reachable and the endpoint URL is correct",
            Self::Protocol => "Check the salt-api version and that the function name exists",
            Self::EmptyResponse => "Verify the target matches connected minions",
            Self::StateFailure => "Inspect the failed resource output above",
            Self::CommandExecution => "Inspect the command output for the failing node",
            Self::Escalation => "Re-run the pipeline once the failure has been investigated",
            Self::Usage => "Check the command arguments and configuration",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description())
    }
}

/// Errors that can occur while talking to salt-api or interpreting results.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The login response lacked a token.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// HTTP request failed.
    #[error("salt-api request failed: {message}")]
    Transport {
        /// Error message.
        message: String,
        /// HTTP status code if available.
        status: Option<u16>,
    },

    /// The response was null or had no `return` entry.
    #[error("invalid salt-api response: {0}")]
    Protocol(String),

    /// A round of the response produced no data.
    #[error("salt-api returned no data (round {round})")]
    EmptyResponse {
        /// Index of the empty round.
        round: usize,
    },

    /// A resource explicitly failed.
    #[error("resource {resource} failed on {node}:\n{output}")]
    StateFailure {
        /// Node identifier.
        node: String,
        /// Resource identifier.
        resource: String,
        /// Formatted resource content.
        output: String,
    },

    /// A shell command's success sentinel was missing from a node's output.
    #[error("execution of `{command}` failed on {node}, server returned: {output}")]
    CommandExecutionFailure {
        /// Node identifier.
        node: String,
        /// Command as submitted by the caller, without the sentinel.
        command: String,
        /// Raw output the node returned.
        output: String,
    },

    /// An operator chose to abort after a failure.
    #[error("aborted by operator after {resource} failed on {node}")]
    EscalationAborted {
        /// Node identifier.
        node: String,
        /// Resource identifier.
        resource: String,
    },

    /// Nobody answered the escalation prompt in time.
    #[error("no answer within {timeout:?} after {resource} failed on {node}")]
    EscalationTimedOut {
        /// Node identifier.
        node: String,
        /// Resource identifier.
        resource: String,
        /// How long the prompt waited.
        timeout: Duration,
    },

    /// Credentials could not be resolved.
    #[error("credentials unavailable: {0}")]
    Credentials(String),

    /// The request could not be built.
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl Error {
    /// Create a transport error.
    pub fn transport(message: impl Into<String>, status: Option<u16>) -> Self {
        Self::Transport {
            message: message.into(),
            status,
        }
    }

    /// Create a protocol error.
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol(message.into())
    }

    /// Get the error category.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::Auth(_) => ErrorCategory::Auth,
            Error::Transport { .. } => ErrorCategory::Transport,
            Error::Protocol(_) => ErrorCategory::Protocol,
            Error::EmptyResponse { .. } => ErrorCategory::EmptyResponse,
            Error::StateFailure { .. } => ErrorCategory::StateFailure,
            Error::CommandExecutionFailure { .. } => ErrorCategory::CommandExecution,
            Error::EscalationAborted { .. } | Error::EscalationTimedOut { .. } => {
                ErrorCategory::Escalation
            }
            Error::Credentials(_) | Error::InvalidRequest(_) => ErrorCategory::Usage,
        }
    }

    /// Whether `fail_on_error = false` may downgrade this error.
    #[must_use]
    pub fn is_downgradable(&self) -> bool {
        self.category().is_downgradable()
    }
}

impl From<ureq::Error> for Error {
    fn from(err: ureq::Error) -> Self {
        match err {
            ureq::Error::StatusCode(code) => Self::Transport {
                message: format!("HTTP {code}"),
                status: Some(code),
            },
            ureq::Error::Json(err) => Self::Protocol(err.to_string()),
            other => Self::Transport {
                message: other.to_string(),
                status: None,
            },
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Protocol(err.to_string())
    }
}
