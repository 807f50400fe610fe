//! Error taxonomy for remote operations.
//!
//! Every failure a remote tool can hit is represented by [`RemoteError`].
//! The Tool Façade never lets one of these escape as an `Err` to the
//! controller; it renders them as `ERROR (<operation>): ...` text instead.
//!
//! # Classification Strategy
//!
//! Transport libraries report connection and authentication failures as
//! free-form messages. [`classify_transport_error`] sorts them into two
//! buckets:
//!
//! 1. **Authentication Failures**: wrong passwords, rejected keys, denied
//!    access. Reported as [`RemoteError::Authentication`].
//!
//! 2. **Connection Errors**: refused, unreachable, timed out, handshake
//!    failures and anything unrecognised. Reported as [`RemoteError::Connect`].
//!
//! # Priority
//!
//! Authentication patterns take precedence. A message that mentions both a
//! timeout and a denied key is an authentication failure, because retrying
//! or waiting longer will not change the outcome.
//!
//! Neither bucket is retried here; retry policy belongs to the controller.

use std::fmt;
use std::time::Duration;

use thiserror::Error;
use tracing::debug;

/// Phase of a remote operation that ran out of time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeoutPhase {
    /// TCP connect plus SSH handshake and authentication
    Connect,
    /// Environment activation inside the interactive session
    Bootstrap,
    /// The caller's command inside the interactive session
    Command,
    /// A one-shot command channel (e.g. `mkdir -p`)
    Exec,
}

impl fmt::Display for TimeoutPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimeoutPhase::Connect => write!(f, "connect"),
            TimeoutPhase::Bootstrap => write!(f, "bootstrap"),
            TimeoutPhase::Command => write!(f, "command"),
            TimeoutPhase::Exec => write!(f, "exec"),
        }
    }
}

/// Failure of a remote operation.
#[derive(Debug, Error)]
pub enum RemoteError {
    /// Required connection parameters are absent or invalid.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The host could not be reached or the SSH handshake failed.
    #[error("connect error: {0}")]
    Connect(String),

    /// The server rejected every configured credential.
    #[error("authentication error: {0}")]
    Authentication(String),

    /// A deadline elapsed before the remote side finished.
    #[error("{phase} timed out after {}s", after.as_secs())]
    Timeout { phase: TimeoutPhase, after: Duration },

    /// The remote stream did not follow the marker/exit-status protocol.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Opening, writing to or reading from a channel failed.
    #[error("channel error: {0}")]
    Channel(String),

    /// File transfer failed on the SFTP subsystem.
    #[error("transfer error: {0}")]
    Transfer(String),

    /// Local filesystem failure.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl RemoteError {
    /// Shorthand for a timeout in the given phase.
    pub fn timeout(phase: TimeoutPhase, after: Duration) -> Self {
        RemoteError::Timeout { phase, after }
    }
}

/// Authentication failure patterns (matched case-insensitively).
///
/// These errors will never succeed by waiting or reconnecting.
const AUTH_ERRORS: &[&str] = &[
    "authentication failed",
    "password authentication failed",
    "key authentication failed",
    "agent authentication failed",
    "permission denied",
    "publickey",
    "auth fail",
    "no authentication",
    "all authentication methods failed",
    "failed to load private key",
    "no identities",
];

/// Connection failure patterns (matched case-insensitively).
const CONNECT_ERRORS: &[&str] = &[
    "connection refused",
    "connection reset",
    "connection timed out",
    "timed out",
    "timeout",
    "network is unreachable",
    "no route to host",
    "host is down",
    "temporary failure",
    "name or service not known",
    "failed to lookup address",
    "resource temporarily unavailable",
    "handshake failed",
    "failed to connect",
    "broken pipe",
];

/// Returns `true` if the message describes a credential problem.
pub(crate) fn is_authentication_error(message: &str) -> bool {
    let lower = message.to_lowercase();
    AUTH_ERRORS.iter().any(|pattern| lower.contains(pattern))
}

/// Returns `true` if the message matches a known connection failure.
pub(crate) fn is_connect_error(message: &str) -> bool {
    let lower = message.to_lowercase();
    CONNECT_ERRORS.iter().any(|pattern| lower.contains(pattern))
}

/// Classify a raw transport failure message.
///
/// Authentication patterns are checked first; everything else, including
/// unrecognised messages, is a connect error since no session exists yet.
pub(crate) fn classify_transport_error(message: impl Into<String>) -> RemoteError {
    let message = message.into();
    if is_authentication_error(&message) {
        RemoteError::Authentication(message)
    } else {
        if !is_connect_error(&message) {
            debug!("Unrecognised transport failure treated as connect error: {}", message);
        }
        RemoteError::Connect(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    mod authentication_patterns {
        use super::*;

        #[test]
        fn test_authentication_failed() {
            assert!(is_authentication_error("Authentication failed"));
            assert!(is_authentication_error("AUTHENTICATION FAILED"));
            assert!(is_authentication_error("authentication failed for user"));
        }

        #[test]
        fn test_password_and_key_failures() {
            assert!(is_authentication_error("Password authentication failed"));
            assert!(is_authentication_error(
                "Key authentication failed: invalid key"
            ));
            assert!(is_authentication_error(
                "Failed to load private key from \"/nope\": No such file"
            ));
        }

        #[test]
        fn test_permission_denied_and_publickey() {
            assert!(is_authentication_error("Permission denied (publickey)"));
            assert!(is_authentication_error("publickey rejected"));
        }

        #[test]
        fn test_agent_without_identities() {
            assert!(is_authentication_error("No identities found in SSH agent"));
        }

        #[test]
        fn test_connection_messages_are_not_auth() {
            assert!(!is_authentication_error("Connection refused"));
            assert!(!is_authentication_error("Network is unreachable"));
        }
    }

    mod connect_patterns {
        use super::*;

        #[test]
        fn test_connection_refused() {
            assert!(is_connect_error("Connection refused (os error 111)"));
        }

        #[test]
        fn test_timeouts() {
            assert!(is_connect_error("Connection timed out after 30s"));
            assert!(is_connect_error("handshake timeout"));
        }

        #[test]
        fn test_dns_failure() {
            assert!(is_connect_error(
                "failed to lookup address information: Name or service not known"
            ));
        }

        #[test]
        fn test_unrelated_message() {
            assert!(!is_connect_error("disk quota exceeded"));
        }
    }

    mod classification {
        use super::*;

        #[test]
        fn test_auth_takes_priority_over_timeout() {
            let err = classify_transport_error("timeout while publickey authentication failed");
            assert!(matches!(err, RemoteError::Authentication(_)));
        }

        #[test]
        fn test_connect_error() {
            let err = classify_transport_error("Connection refused");
            assert!(matches!(err, RemoteError::Connect(_)));
        }

        #[test]
        fn test_unknown_defaults_to_connect() {
            let err = classify_transport_error("SSH protocol error: unexpected packet");
            assert!(matches!(err, RemoteError::Connect(_)));
        }

        #[test]
        fn test_message_preserved_verbatim() {
            let err = classify_transport_error("Permission denied");
            assert_eq!(err.to_string(), "authentication error: Permission denied");
        }
    }

    mod display {
        use super::*;

        #[test]
        fn test_timeout_display() {
            let err = RemoteError::timeout(TimeoutPhase::Command, Duration::from_secs(300));
            assert_eq!(err.to_string(), "command timed out after 300s");
        }

        #[test]
        fn test_configuration_display() {
            let err = RemoteError::Configuration("REMOTE_HOST is not set".to_string());
            assert_eq!(
                err.to_string(),
                "configuration error: REMOTE_HOST is not set"
            );
        }

        #[test]
        fn test_io_from() {
            let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
            let err: RemoteError = io.into();
            assert!(matches!(err, RemoteError::Io(_)));
            assert!(err.to_string().contains("missing"));
        }

        #[test]
        fn test_phase_display() {
            assert_eq!(TimeoutPhase::Connect.to_string(), "connect");
            assert_eq!(TimeoutPhase::Bootstrap.to_string(), "bootstrap");
            assert_eq!(TimeoutPhase::Exec.to_string(), "exec");
        }
    }
}
