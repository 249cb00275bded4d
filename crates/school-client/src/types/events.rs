//! Real-time events exchanged over the Socket.IO channel.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::{ConversationId, Message, MessageId, UserId, UserRole};

/// A `new_message` push.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewMessageEvent {
    pub id: MessageId,

    #[serde(alias = "conversation_id")]
    pub conversation_id: ConversationId,

    #[serde(alias = "sender_id")]
    pub sender_id: UserId,

    #[serde(default, alias = "senderType", alias = "sender_type")]
    pub sender_role: Option<UserRole>,

    #[serde(default)]
    pub content: String,

    pub timestamp: String,

    /// "text" for chat, "meeting" when a meeting was created or updated.
    #[serde(default, rename = "type", alias = "message_type")]
    pub kind: Option<String>,
}

impl NewMessageEvent {
    /// Whether the push announces a meeting change rather than chat.
    pub fn is_meeting(&self) -> bool {
        self.kind.as_deref() == Some("meeting")
    }

    /// Convert into the message stored in a conversation's history.
    pub fn into_message(self) -> Message {
        Message {
            id: self.id,
            conversation_id: self.conversation_id,
            sender_id: self.sender_id,
            // Only staff can post, and the push omits the role for instructors.
            sender_role: self.sender_role.unwrap_or(UserRole::Instructor),
            content: self.content,
            created_at: self.timestamp,
            is_read: false,
        }
    }
}

/// A `messages_read` push.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessagesReadEvent {
    #[serde(alias = "conversation_id")]
    pub conversation_id: ConversationId,

    #[serde(default)]
    pub reader_id: Option<UserId>,

    #[serde(default)]
    pub reader_type: Option<UserRole>,

    #[serde(default)]
    pub count: u32,
}

/// A relayed `typing` indicator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypingEvent {
    pub conversation_id: ConversationId,

    pub user_id: UserId,

    #[serde(default)]
    pub is_typing: bool,
}

/// A `status` notice from the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusEvent {
    #[serde(default, alias = "msg")]
    pub message: String,

    #[serde(default, rename = "type")]
    pub kind: Option<String>,
}

/// An event received from the server.
#[derive(Debug, Clone, PartialEq)]
pub enum RealtimeEvent {
    NewMessage(NewMessageEvent),
    MessagesRead(MessagesReadEvent),
    Typing(TypingEvent),
    /// Confirmation of a `join_school`.
    Joined { room: String },
    Status(StatusEvent),
    /// Any event this client has no type for.
    Other { name: String, data: Value },
}

impl RealtimeEvent {
    /// Build an event from a Socket.IO event name and its first argument.
    pub fn from_parts(name: &str, data: Value) -> Result<Self, serde_json::Error> {
        let event = match name {
            "new_message" => RealtimeEvent::NewMessage(serde_json::from_value(data)?),
            "messages_read" => RealtimeEvent::MessagesRead(serde_json::from_value(data)?),
            "typing" => RealtimeEvent::Typing(serde_json::from_value(data)?),
            "joined" => RealtimeEvent::Joined {
                room: data
                    .get("room")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
            },
            "status" => RealtimeEvent::Status(serde_json::from_value(data)?),
            _ => RealtimeEvent::Other {
                name: name.to_string(),
                data,
            },
        };
        Ok(event)
    }

    /// Socket.IO event name.
    pub fn name(&self) -> &str {
        match self {
            RealtimeEvent::NewMessage(_) => "new_message",
            RealtimeEvent::MessagesRead(_) => "messages_read",
            RealtimeEvent::Typing(_) => "typing",
            RealtimeEvent::Joined { .. } => "joined",
            RealtimeEvent::Status(_) => "status",
            RealtimeEvent::Other { name, .. } => name.as_str(),
        }
    }
}

/// An event sent to the server.
#[derive(Debug, Clone, PartialEq)]
pub enum OutboundEvent {
    /// Subscribe to the broadcast room of an organizational scope.
    JoinSchool { school_id: i64 },
    /// Typing indicator relayed to the school room.
    Typing {
        school_id: i64,
        conversation_id: ConversationId,
        user_id: UserId,
        is_typing: bool,
    },
}

impl OutboundEvent {
    /// Socket.IO event name.
    pub fn name(&self) -> &'static str {
        match self {
            OutboundEvent::JoinSchool { .. } => "join_school",
            OutboundEvent::Typing { .. } => "typing",
        }
    }

    /// JSON argument of the event.
    pub fn payload(&self) -> Value {
        match self {
            OutboundEvent::JoinSchool { school_id } => json!({ "schoolId": school_id }),
            OutboundEvent::Typing {
                school_id,
                conversation_id,
                user_id,
                is_typing,
            } => json!({
                "schoolId": school_id,
                "conversationId": conversation_id,
                "userId": user_id,
                "isTyping": is_typing,
            }),
        }
    }
}
