//! Error types for school-client.

use thiserror::Error;

/// Errors that can occur when talking to the school backend.
#[derive(Debug, Error)]
pub enum ClientError {
    /// HTTP request failed (network unreachable, timeout, bad body).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The server rejected the bearer credential.
    #[error("Authentication rejected: {0}")]
    Auth(String),

    /// Non-2xx application-level failure.
    #[error("Server error {status}: {message}")]
    Server { status: u16, message: String },

    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// WebSocket transport failure.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// Unexpected Socket.IO / Engine.IO traffic.
    #[error("Realtime protocol error: {0}")]
    Protocol(String),

    /// The real-time channel is not connected.
    #[error("Realtime channel not connected")]
    NotConnected,

    /// A network operation did not finish in time.
    #[error("Operation timed out")]
    Timeout,

    /// Login was refused by the backend.
    #[error("Login failed: {0}")]
    LoginFailed(String),

    /// Invalid configuration.
    #[error("Invalid configuration: {0}")]
    Config(String),
}

/// Coarse classification of a [`ClientError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Network unreachable, timeout, broken socket.
    Transport,
    /// Credential rejected by the server.
    Auth,
    /// Application-level failure reported by the server, or a response the
    /// client could not make sense of.
    Server,
    /// Local failures (decoding, configuration, protocol).
    Other,
}

impl ClientError {
    /// Classify this error.
    pub fn category(&self) -> ErrorCategory {
        match self {
            ClientError::Http(e) if e.status().is_some_and(|s| s.as_u16() == 401) => {
                ErrorCategory::Auth
            }
            ClientError::Http(e) if e.status().is_some() => ErrorCategory::Server,
            // A success status whose body does not match the expected shape.
            ClientError::Http(e) if e.is_decode() => ErrorCategory::Server,
            ClientError::Http(_)
            | ClientError::WebSocket(_)
            | ClientError::NotConnected
            | ClientError::Timeout => ErrorCategory::Transport,
            ClientError::Auth(_) | ClientError::LoginFailed(_) => ErrorCategory::Auth,
            ClientError::Server { .. } => ErrorCategory::Server,
            ClientError::Json(_) | ClientError::Protocol(_) | ClientError::Config(_) => {
                ErrorCategory::Other
            }
        }
    }

    /// Whether the server rejected the credential.
    pub fn is_auth(&self) -> bool {
        self.category() == ErrorCategory::Auth
    }

    /// Whether the failure happened below the application layer.
    pub fn is_transport(&self) -> bool {
        self.category() == ErrorCategory::Transport
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_categories() {
        assert_eq!(
            ClientError::Auth("expired".to_string()).category(),
            ErrorCategory::Auth
        );
        assert_eq!(
            ClientError::Server {
                status: 403,
                message: "Unauthorized".to_string()
            }
            .category(),
            ErrorCategory::Server
        );
        assert!(ClientError::Timeout.is_transport());
        assert!(ClientError::NotConnected.is_transport());
        assert_eq!(
            ClientError::Protocol("bad packet".to_string()).category(),
            ErrorCategory::Other
        );
    }

    #[test]
    fn test_display() {
        let err = ClientError::Server {
            status: 400,
            message: "Content is required".to_string(),
        };
        assert_eq!(err.to_string(), "Server error 400: Content is required");
    }
}
