//! Configuration types for school-client.

use std::env;
use std::time::Duration;

use crate::ClientError;

/// Default request timeout applied to every REST call and to the
/// real-time handshake.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Default Socket.IO mount path.
pub const DEFAULT_SOCKET_PATH: &str = "/socket.io";

/// Configuration for connecting to the school backend.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the backend HTTP server (e.g., "http://localhost:5000").
    pub base_url: String,
    /// Path the Socket.IO server is mounted on.
    pub socket_path: String,
    /// Timeout for a single network call.
    pub request_timeout: Duration,
}

impl ClientConfig {
    /// Create a new configuration with the given base URL.
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url: String = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            socket_path: DEFAULT_SOCKET_PATH.to_string(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    /// Create configuration from environment variables.
    ///
    /// Optional (with defaults):
    /// - `SCHOOL_API_URL` - Default: http://127.0.0.1:5000
    /// - `SCHOOL_SOCKET_PATH` - Default: /socket.io
    /// - `SCHOOL_REQUEST_TIMEOUT_SECS` - Default: 10
    pub fn from_env() -> Result<Self, ClientError> {
        let base_url =
            env::var("SCHOOL_API_URL").unwrap_or_else(|_| "http://127.0.0.1:5000".to_string());

        let timeout_secs = env::var("SCHOOL_REQUEST_TIMEOUT_SECS")
            .unwrap_or_else(|_| DEFAULT_REQUEST_TIMEOUT.as_secs().to_string())
            .parse::<u64>()
            .map_err(|e| ClientError::Config(format!("Invalid SCHOOL_REQUEST_TIMEOUT_SECS: {}", e)))?;

        let mut config = Self::new(base_url).with_request_timeout(Duration::from_secs(timeout_secs));
        if let Ok(path) = env::var("SCHOOL_SOCKET_PATH") {
            config = config.with_socket_path(path);
        }
        config.validate()?;
        Ok(config)
    }

    /// Builder method to set the Socket.IO path.
    pub fn with_socket_path(mut self, path: impl Into<String>) -> Self {
        let path: String = path.into();
        let trimmed = path.trim_end_matches('/');
        self.socket_path = if trimmed.starts_with('/') {
            trimmed.to_string()
        } else {
            format!("/{}", trimmed)
        };
        self
    }

    /// Builder method to set the request timeout.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Check that the configuration can be used.
    pub fn validate(&self) -> Result<(), ClientError> {
        if !(self.base_url.starts_with("http://") || self.base_url.starts_with("https://")) {
            return Err(ClientError::Config(format!(
                "base URL must start with http:// or https://, got {}",
                self.base_url
            )));
        }
        if self.request_timeout.is_zero() {
            return Err(ClientError::Config("request timeout must be non-zero".to_string()));
        }
        Ok(())
    }

    /// Get the login endpoint URL.
    pub fn login_url(&self) -> String {
        format!("{}/api/auth/login", self.base_url)
    }

    /// Get the logout endpoint URL.
    pub fn logout_url(&self) -> String {
        format!("{}/api/auth/logout", self.base_url)
    }

    /// Get the token verification endpoint URL.
    pub fn verify_url(&self) -> String {
        format!("{}/api/auth/verify", self.base_url)
    }

    /// Get the conversation list endpoint URL.
    pub fn conversations_url(&self) -> String {
        format!("{}/api/messaging/conversations", self.base_url)
    }

    /// Get the message history endpoint URL for a conversation.
    pub fn messages_url(&self, conversation_id: i64) -> String {
        format!("{}/{}/messages", self.conversations_url(), conversation_id)
    }

    /// Get the mark-read endpoint URL for a conversation.
    pub fn mark_read_url(&self, conversation_id: i64) -> String {
        format!("{}/{}/mark-read", self.conversations_url(), conversation_id)
    }

    /// Get the total unread count endpoint URL.
    pub fn unread_count_url(&self) -> String {
        format!("{}/api/messaging/unread-count", self.base_url)
    }

    /// Get the user search endpoint URL.
    pub fn user_search_url(&self, query: &str) -> String {
        format!(
            "{}/api/messaging/users/search?q={}",
            self.base_url,
            urlencoding::encode(query)
        )
    }

    /// Get the attendance summary endpoint URL.
    pub fn attendance_summary_url(&self) -> String {
        format!("{}/api/attendance/summary", self.base_url)
    }

    /// Get the attendance history endpoint URL.
    pub fn attendance_history_url(&self, limit: u32) -> String {
        format!("{}/api/attendance/history?limit={}", self.base_url, limit)
    }

    /// Get the meetings endpoint URL.
    pub fn meetings_url(&self) -> String {
        format!("{}/api/meetings", self.base_url)
    }

    /// Get the WebSocket URL of the Socket.IO endpoint.
    pub fn socket_url(&self) -> String {
        let ws_base = if let Some(rest) = self.base_url.strip_prefix("https://") {
            format!("wss://{}", rest)
        } else if let Some(rest) = self.base_url.strip_prefix("http://") {
            format!("ws://{}", rest)
        } else {
            self.base_url.clone()
        };
        format!("{}{}/?EIO=4&transport=websocket", ws_base, self.socket_path)
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new("http://127.0.0.1:5000")
    }
}
