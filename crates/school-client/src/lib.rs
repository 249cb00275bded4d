//! School backend client library.
//!
//! This crate provides a Rust client for the school-management backend used by
//! the mobile app. It supports:
//!
//! - Authenticating and attaching the bearer token to every REST call
//! - Conversations and messages (fetch, send, mark read)
//! - Attendance summaries and meetings
//! - Receiving push events over the Socket.IO real-time channel
//!
//! # Example
//!
//! ```no_run
//! use school_client::{ClientConfig, RealtimeConnection, SchoolClient};
//!
//! # async fn example() -> Result<(), school_client::ClientError> {
//! let client = SchoolClient::new(ClientConfig::default())?;
//! let user = client.login("instructor@example.com", "secret").await?;
//!
//! for conversation in client.conversations().await? {
//!     println!("{} ({} unread)", conversation.title, conversation.unread_count);
//! }
//!
//! // Listen for push events
//! let token = client.auth_token().await;
//! let (connection, mut events) = RealtimeConnection::connect(client.config(), token.as_ref()).await?;
//! if let Some(school_id) = user.school_id {
//!     connection.emit(school_client::OutboundEvent::JoinSchool { school_id })?;
//! }
//! while let Some(event) = events.recv().await {
//!     println!("{:?}", event);
//! }
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod realtime;
pub mod socketio;
pub mod types;

pub use client::SchoolClient;
pub use config::ClientConfig;
pub use error::{ClientError, ErrorCategory};
pub use realtime::{EventReceiver, RealtimeConnection};
pub use socketio::{Handshake, Packet};
pub use types::*;

/// Crate version.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
