//! REST side of the sync cache.

use async_trait::async_trait;
use school_client::{
    ClientError, ConversationId, ConversationSummary, MarkReadResult, Message, SchoolClient,
};

/// The REST calls a [`MessagingSession`](crate::MessagingSession) pulls from.
///
/// Implemented for [`SchoolClient`]; tests substitute an in-memory double.
#[async_trait]
pub trait MessagingApi: Send + Sync {
    /// Every conversation of the current user.
    async fn fetch_conversations(&self) -> Result<Vec<ConversationSummary>, ClientError>;

    /// The history of one conversation.
    async fn fetch_messages(
        &self,
        conversation_id: ConversationId,
    ) -> Result<Vec<Message>, ClientError>;

    /// Submit a message and return the server-confirmed copy.
    async fn post_message(
        &self,
        conversation_id: ConversationId,
        content: &str,
    ) -> Result<Message, ClientError>;

    /// Mark a conversation as read by the current user.
    async fn mark_read(&self, conversation_id: ConversationId)
        -> Result<MarkReadResult, ClientError>;
}

#[async_trait]
impl MessagingApi for SchoolClient {
    async fn fetch_conversations(&self) -> Result<Vec<ConversationSummary>, ClientError> {
        self.conversations().await
    }

    async fn fetch_messages(
        &self,
        conversation_id: ConversationId,
    ) -> Result<Vec<Message>, ClientError> {
        self.messages(conversation_id).await
    }

    async fn post_message(
        &self,
        conversation_id: ConversationId,
        content: &str,
    ) -> Result<Message, ClientError> {
        self.send_message(conversation_id, content).await
    }

    async fn mark_read(
        &self,
        conversation_id: ConversationId,
    ) -> Result<MarkReadResult, ClientError> {
        SchoolClient::mark_read(self, conversation_id).await
    }
}
