//! Conversation and message types.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{User, UserRole};

/// Identifier of a conversation.
pub type ConversationId = i64;

/// Identifier of a message, unique within its conversation.
pub type MessageId = i64;

/// Identifier of a user account.
pub type UserId = i64;

/// Summary of one conversation as shown in the chat list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationSummary {
    pub id: ConversationId,

    /// Display name of the counterpart.
    #[serde(rename = "participantName", alias = "title", default = "default_title")]
    pub title: String,

    #[serde(rename = "lastMessage", alias = "last_message", default)]
    pub last_message_preview: Option<String>,

    /// Only meaningful for display and sorting.
    #[serde(rename = "lastMessageTime", alias = "updated_at", default)]
    pub last_activity_at: Option<String>,

    /// Authoritative only right after a fetch.
    #[serde(rename = "unreadCount", alias = "unread_count", default)]
    pub unread_count: u32,
}

fn default_title() -> String {
    "Chat".to_string()
}

/// A single message in a conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: MessageId,

    #[serde(alias = "conversation_id")]
    pub conversation_id: ConversationId,

    #[serde(alias = "sender_id")]
    pub sender_id: UserId,

    #[serde(default, alias = "senderType", alias = "sender_type")]
    pub sender_role: UserRole,

    #[serde(default)]
    pub content: String,

    /// Timestamp as sent by the server.
    #[serde(rename = "timestamp", alias = "created_at")]
    pub created_at: String,

    #[serde(default, alias = "is_read")]
    pub is_read: bool,
}

impl Message {
    /// Parse `created_at` into UTC.
    pub fn created_at_utc(&self) -> Option<DateTime<Utc>> {
        parse_timestamp(&self.created_at)
    }

    /// Whether `user` wrote this message.
    pub fn is_from(&self, user: &User) -> bool {
        self.sender_id == user.id && self.sender_role == user.role
    }
}

/// Parse a backend timestamp.
///
/// Accepts RFC 3339 and the naive ISO-8601 form the backend emits for UTC
/// times (`2024-05-01T08:30:00.123456`).
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S%.f"))
        .ok()
        .map(|naive| naive.and_utc())
}

/// Body of `POST /conversations/{id}/messages`.
#[derive(Debug, Clone, Serialize)]
pub struct SendMessageRequest<'a> {
    pub content: &'a str,
}

/// Result of `POST /conversations/{id}/mark-read`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MarkReadResult {
    #[serde(default)]
    pub success: bool,

    /// Number of messages flipped to read.
    #[serde(default)]
    pub updated: u32,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ConversationsResponse {
    #[serde(default)]
    pub conversations: Vec<ConversationSummary>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ConversationResponse {
    pub conversation: ConversationSummary,
}

#[derive(Debug, Deserialize)]
pub(crate) struct MessagesResponse {
    #[serde(default)]
    pub messages: Vec<Message>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct MessageResponse {
    pub message: Message,
}

#[derive(Debug, Deserialize)]
pub(crate) struct UnreadCountResponse {
    #[serde(default)]
    pub count: u64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CreateConversationRequest {
    pub participant_id: UserId,
    pub participant_type: UserRole,
}
