//! Conversation sync cache for the school messaging surface.
//!
//! A [`MessagingSession`] owns the conversation list and each conversation's
//! message history for one signed-in user. It keeps them consistent against
//! two update sources:
//!
//! - pull: full REST snapshots ([`MessagingSession::refresh_conversations`],
//!   [`MessagingSession::load_messages`])
//! - push: `new_message` / `messages_read` events from the real-time channel
//!
//! The REST and socket sides sit behind the [`MessagingApi`] and
//! [`RealtimeConnector`] traits, implemented for the `school-client` types.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use messaging::{MessagingSession, SocketConnector};
//! use school_client::{ClientConfig, SchoolClient};
//!
//! # async fn example() -> Result<(), school_client::ClientError> {
//! let client = SchoolClient::new(ClientConfig::from_env()?)?;
//! let user = client.login("instructor@example.com", "secret").await?;
//!
//! let session = MessagingSession::start(
//!     Arc::new(client.clone()),
//!     Arc::new(SocketConnector::new(client)),
//!     user,
//! )
//! .await;
//!
//! session.refresh_conversations().await?;
//! for conversation in session.conversations() {
//!     println!("{}: {} unread", conversation.title, conversation.unread_count);
//! }
//!
//! session.end();
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod cache;
pub mod realtime;
pub mod sync;
pub mod timeline;

pub use api::MessagingApi;
pub use cache::{ConversationCache, MessageLog};
pub use realtime::{ChannelState, RealtimeConnector, RealtimeHandle, SocketConnector};
pub use sync::{MessagingSession, SyncUpdate};
pub use timeline::{chronological, group_by_day, DayGroup};

// Re-export the error type for convenience
pub use school_client::ClientError;
