//! Wire types exchanged with the school backend.

mod auth;
mod events;
mod messaging;
mod school;

pub use auth::{Contact, LoginRequest, LoginResponse, User, UserRole};
pub use events::{
    MessagesReadEvent, NewMessageEvent, OutboundEvent, RealtimeEvent, StatusEvent, TypingEvent,
};
pub use messaging::{
    parse_timestamp, ConversationId, ConversationSummary, MarkReadResult, Message, MessageId,
    SendMessageRequest, UserId,
};
pub use school::{AttendanceHistory, AttendanceItem, AttendanceSummary, Meeting, MeetingStatus};

pub(crate) use auth::UsersResponse;
pub(crate) use messaging::{
    ConversationResponse, ConversationsResponse, CreateConversationRequest, MessageResponse,
    MessagesResponse, UnreadCountResponse,
};
pub(crate) use school::MeetingsResponse;
