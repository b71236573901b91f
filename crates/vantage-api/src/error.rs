use thiserror::Error;

/// Top-level error type for the `vantage-api` crate.
///
/// Covers every failure mode of the host command protocol: connection
/// setup, authentication, request correlation, and value decoding.
/// `vantage-core` maps these into its own diagnostics.
#[derive(Debug, Error)]
pub enum Error {
    // ── Connection ──────────────────────────────────────────────────
    /// TCP connect, DNS, or handshake failure.
    #[error("Connection failed: {message}")]
    Connection { message: String },

    /// The peer closed the connection, or the client was shut down
    /// while a request was outstanding.
    #[error("Connection closed")]
    ConnectionClosed,

    /// TLS configuration or handshake error.
    #[error("TLS error: {0}")]
    Tls(String),

    /// Socket-level I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // ── Authentication ──────────────────────────────────────────────
    /// `LOGIN` was rejected by the controller.
    #[error("Authentication failed: {message}")]
    Authentication { message: String },

    // ── Requests ────────────────────────────────────────────────────
    /// No matching reply arrived within the request timeout.
    #[error("Request timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    /// The controller answered with `R:ERROR`, or a method returned a
    /// non-success return code.
    #[error("Command failed (code {code}): {message}")]
    Command { code: i32, message: String },

    /// A reply or pushed value could not be decoded into the expected type.
    #[error("Conversion error: {message}")]
    Conversion { message: String },

    /// A reply did not correlate with the outstanding request, or a line
    /// could not be framed at all.
    #[error("Protocol error: {message}")]
    Protocol { message: String },
}

impl Error {
    pub(crate) fn conversion(message: impl Into<String>) -> Self {
        Self::Conversion {
            message: message.into(),
        }
    }

    pub(crate) fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
        }
    }

    /// Returns `true` if the connection this error came from is no longer
    /// usable and must be re-established.
    pub fn is_connection(&self) -> bool {
        matches!(
            self,
            Self::Connection { .. } | Self::ConnectionClosed | Self::Io(_) | Self::Tls(_)
        )
    }

    /// Returns `true` if this is a transient error worth retrying.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Connection { .. } | Self::ConnectionClosed | Self::Timeout { .. } => true,
            Self::Io(e) => matches!(
                e.kind(),
                std::io::ErrorKind::ConnectionRefused
                    | std::io::ErrorKind::ConnectionReset
                    | std::io::ErrorKind::ConnectionAborted
                    | std::io::ErrorKind::TimedOut
                    | std::io::ErrorKind::BrokenPipe
            ),
            _ => false,
        }
    }

    /// The remote return code, if this is a command failure.
    pub fn command_code(&self) -> Option<i32> {
        match self {
            Self::Command { code, .. } => Some(*code),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connection_errors_are_transient() {
        assert!(Error::ConnectionClosed.is_transient());
        assert!(Error::Timeout { timeout_ms: 10 }.is_transient());
        assert!(
            Error::Io(std::io::Error::from(std::io::ErrorKind::ConnectionReset)).is_transient()
        );
    }

    #[test]
    fn command_errors_are_not_transient() {
        let err = Error::Command {
            code: 4,
            message: "Invalid Parameter".into(),
        };
        assert!(!err.is_transient());
        assert!(!err.is_connection());
        assert_eq!(err.command_code(), Some(4));
    }
}
