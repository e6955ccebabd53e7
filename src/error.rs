//! Error types for the stream load harness.
//!
//! Collaborator failures are carried as strings so the error stays `Clone`
//! and comparable regardless of which stream-client backend produced it.

use thiserror::Error;

/// Result type alias for harness operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while driving the stream client.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    /// The client environment could not be established.
    #[error("Failed to create environment: {0}")]
    Environment(String),

    /// The stream could not be declared.
    #[error("Failed to declare stream {stream}: {reason}")]
    DeclareStream {
        /// Stream name.
        stream: String,
        /// Reason reported by the client library.
        reason: String,
    },

    /// A producer handle could not be created.
    #[error("Failed to create producer {name}: {reason}")]
    ProducerCreate {
        /// Client-provided producer name.
        name: String,
        /// Reason reported by the client library.
        reason: String,
    },

    /// A consumer handle could not be created.
    #[error("Failed to create consumer {name}: {reason}")]
    ConsumerCreate {
        /// Client-provided consumer name.
        name: String,
        /// Reason reported by the client library.
        reason: String,
    },

    /// A message could not be sent.
    #[error("Send failed: {0}")]
    Send(String),

    /// A handle or the environment failed to close cleanly.
    #[error("Close failed: {0}")]
    Close(String),

    /// The handle was already closed.
    #[error("Handle already closed")]
    HandleClosed,
}

impl Error {
    /// Whether this error aborts the process at startup.
    ///
    /// Only environment construction and stream declaration are fatal;
    /// every per-message or per-handle failure is logged and skipped.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Error::Environment(_) | Error::DeclareStream { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::DeclareStream {
            stream: "orders".to_string(),
            reason: "access refused".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Failed to declare stream orders: access refused"
        );
    }

    #[test]
    fn test_environment_error_display() {
        let err = Error::Environment("connection refused".to_string());
        assert_eq!(
            err.to_string(),
            "Failed to create environment: connection refused"
        );
    }

    #[test]
    fn test_fatal_classification() {
        assert!(Error::Environment("x".into()).is_fatal());
        assert!(
            Error::DeclareStream {
                stream: "s".into(),
                reason: "r".into()
            }
            .is_fatal()
        );
        assert!(!Error::Send("x".into()).is_fatal());
        assert!(!Error::HandleClosed.is_fatal());
        assert!(
            !Error::ProducerCreate {
                name: "p".into(),
                reason: "r".into()
            }
            .is_fatal()
        );
    }

    #[test]
    fn test_error_clone() {
        let err = Error::HandleClosed;
        let cloned = err.clone();
        assert_eq!(err, cloned);
    }
}
