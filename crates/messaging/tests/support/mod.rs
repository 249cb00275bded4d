//! In-memory doubles for the REST and real-time sides of a session.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use messaging::{RealtimeConnector, RealtimeHandle};
use parking_lot::Mutex;
use school_client::{
    ClientError, ConversationId, ConversationSummary, EventReceiver, MarkReadResult, Message,
    MessageId, OutboundEvent, RealtimeEvent, User, UserRole,
};
use tokio::sync::mpsc;

pub fn user() -> User {
    User {
        id: 12,
        username: "jane@school.test".to_string(),
        email: None,
        role: UserRole::Instructor,
        school_id: Some(4),
        first_name: "Jane".to_string(),
        last_name: "Doe".to_string(),
    }
}

/// An account outside any school, such as a platform admin.
pub fn user_without_school() -> User {
    User {
        id: 1,
        username: "admin".to_string(),
        email: None,
        role: UserRole::Admin,
        school_id: None,
        first_name: "Site".to_string(),
        last_name: "Admin".to_string(),
    }
}

pub fn summary(id: ConversationId, unread: u32) -> ConversationSummary {
    ConversationSummary {
        id,
        title: format!("Parent {}", id),
        last_message_preview: None,
        last_activity_at: None,
        unread_count: unread,
    }
}

pub fn message(id: MessageId, conversation_id: ConversationId, content: &str) -> Message {
    Message {
        id,
        conversation_id,
        sender_id: 30,
        sender_role: UserRole::Parent,
        content: content.to_string(),
        created_at: "2024-05-01T08:00:00".to_string(),
        is_read: false,
    }
}

pub fn new_message_event(id: MessageId, conversation_id: ConversationId, content: &str) -> RealtimeEvent {
    RealtimeEvent::from_parts(
        "new_message",
        serde_json::json!({
            "id": id,
            "conversationId": conversation_id,
            "senderId": 5,
            "content": content,
            "timestamp": "2024-05-01T09:15:00",
            "type": "text"
        }),
    )
    .unwrap()
}

pub fn messages_read_event(conversation_id: ConversationId) -> RealtimeEvent {
    RealtimeEvent::from_parts(
        "messages_read",
        serde_json::json!({"conversationId": conversation_id, "readerId": 30, "readerType": "parent", "count": 2}),
    )
    .unwrap()
}

fn server_error() -> ClientError {
    ClientError::Server {
        status: 500,
        message: "Internal server error".to_string(),
    }
}

type Scripted<T> = Mutex<VecDeque<(Duration, Result<T, ClientError>)>>;

/// Backend double.
///
/// Fetches answer from a script of `(delay, result)` entries when one is
/// queued, otherwise from the current server state.
#[derive(Default)]
pub struct MockApi {
    pub conversations: Mutex<Vec<ConversationSummary>>,
    pub messages: Mutex<HashMap<ConversationId, Vec<Message>>>,
    conversation_script: Scripted<Vec<ConversationSummary>>,
    message_script: Scripted<Vec<Message>>,
    pub fail_post: AtomicBool,
    pub fail_mark_read: AtomicBool,
    next_id: AtomicI64,
    pub conversation_fetches: AtomicUsize,
    pub message_fetches: AtomicUsize,
    pub mark_read_calls: AtomicUsize,
}

impl MockApi {
    pub fn new() -> Arc<Self> {
        let api = Self::default();
        api.next_id.store(100, Ordering::SeqCst);
        Arc::new(api)
    }

    pub fn set_conversations(&self, list: Vec<ConversationSummary>) {
        *self.conversations.lock() = list;
    }

    pub fn set_messages(&self, conversation_id: ConversationId, list: Vec<Message>) {
        self.messages.lock().insert(conversation_id, list);
    }

    pub fn script_conversations(&self, delay: Duration, result: Result<Vec<ConversationSummary>, ClientError>) {
        self.conversation_script.lock().push_back((delay, result));
    }

    pub fn script_messages(&self, delay: Duration, result: Result<Vec<Message>, ClientError>) {
        self.message_script.lock().push_back((delay, result));
    }

    pub fn fail_next_conversations(&self) {
        self.script_conversations(Duration::ZERO, Err(server_error()));
    }

    pub fn fail_next_messages(&self) {
        self.script_messages(Duration::ZERO, Err(ClientError::Timeout));
    }

    pub fn conversation_fetches(&self) -> usize {
        self.conversation_fetches.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl messaging::MessagingApi for MockApi {
    async fn fetch_conversations(&self) -> Result<Vec<ConversationSummary>, ClientError> {
        self.conversation_fetches.fetch_add(1, Ordering::SeqCst);
        let scripted = self.conversation_script.lock().pop_front();
        match scripted {
            Some((delay, result)) => {
                tokio::time::sleep(delay).await;
                result
            }
            None => Ok(self.conversations.lock().clone()),
        }
    }

    async fn fetch_messages(
        &self,
        conversation_id: ConversationId,
    ) -> Result<Vec<Message>, ClientError> {
        self.message_fetches.fetch_add(1, Ordering::SeqCst);
        let scripted = self.message_script.lock().pop_front();
        match scripted {
            Some((delay, result)) => {
                tokio::time::sleep(delay).await;
                result
            }
            None => Ok(self
                .messages
                .lock()
                .get(&conversation_id)
                .cloned()
                .unwrap_or_default()),
        }
    }

    async fn post_message(
        &self,
        conversation_id: ConversationId,
        content: &str,
    ) -> Result<Message, ClientError> {
        if self.fail_post.load(Ordering::SeqCst) {
            return Err(server_error());
        }
        let message = Message {
            id: self.next_id.fetch_add(1, Ordering::SeqCst),
            conversation_id,
            sender_id: user().id,
            sender_role: UserRole::Instructor,
            content: content.to_string(),
            created_at: "2024-05-01T10:00:00".to_string(),
            is_read: false,
        };
        self.messages
            .lock()
            .entry(conversation_id)
            .or_default()
            .push(message.clone());
        Ok(message)
    }

    async fn mark_read(
        &self,
        conversation_id: ConversationId,
    ) -> Result<MarkReadResult, ClientError> {
        self.mark_read_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_mark_read.load(Ordering::SeqCst) {
            return Err(ClientError::Auth("Token is invalid or expired".to_string()));
        }
        let mut updated = 0;
        for conversation in self.conversations.lock().iter_mut() {
            if conversation.id == conversation_id {
                updated = conversation.unread_count;
                conversation.unread_count = 0;
            }
        }
        Ok(MarkReadResult {
            success: true,
            updated,
        })
    }
}

struct MockHandle {
    emitted: Arc<Mutex<Vec<OutboundEvent>>>,
    connected: Arc<AtomicBool>,
}

impl RealtimeHandle for MockHandle {
    fn emit(&self, event: OutboundEvent) -> Result<(), ClientError> {
        if !self.connected.load(Ordering::SeqCst) {
            return Err(ClientError::NotConnected);
        }
        self.emitted.lock().push(event);
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn disconnect(&self) {
        self.connected.store(false, Ordering::SeqCst);
    }
}

/// Real-time double. Each connect opens a fresh in-memory channel; the test
/// pushes server events into the latest one.
#[derive(Default)]
pub struct MockConnector {
    pub fail: AtomicBool,
    connects: AtomicUsize,
    emitted: Arc<Mutex<Vec<OutboundEvent>>>,
    sender: Mutex<Option<mpsc::UnboundedSender<RealtimeEvent>>>,
    connected: Mutex<Option<Arc<AtomicBool>>>,
}

impl MockConnector {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn failing() -> Arc<Self> {
        let connector = Self::default();
        connector.fail.store(true, Ordering::SeqCst);
        Arc::new(connector)
    }

    /// Deliver a server event. Returns false if no channel is open.
    pub fn push(&self, event: RealtimeEvent) -> bool {
        match self.sender.lock().as_ref() {
            Some(sender) => sender.send(event).is_ok(),
            None => false,
        }
    }

    /// Simulate the server dropping the connection.
    pub fn close_transport(&self) {
        if let Some(flag) = self.connected.lock().as_ref() {
            flag.store(false, Ordering::SeqCst);
        }
        self.sender.lock().take();
    }

    pub fn emitted(&self) -> Vec<OutboundEvent> {
        self.emitted.lock().clone()
    }

    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    /// Whether the most recent channel is still open.
    pub fn is_open(&self) -> bool {
        self.connected
            .lock()
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::SeqCst))
    }
}

#[async_trait::async_trait]
impl RealtimeConnector for MockConnector {
    async fn connect(&self) -> Result<(Box<dyn RealtimeHandle>, EventReceiver), ClientError> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(ClientError::Protocol("connection refused".to_string()));
        }

        let (tx, rx) = mpsc::unbounded_channel();
        let connected = Arc::new(AtomicBool::new(true));
        *self.sender.lock() = Some(tx);
        *self.connected.lock() = Some(connected.clone());

        let handle = MockHandle {
            emitted: self.emitted.clone(),
            connected,
        };
        Ok((Box::new(handle), rx))
    }
}

/// Poll `condition` until it holds, failing the test after two seconds.
pub async fn eventually(what: &str, condition: impl Fn() -> bool) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while !condition() {
        if tokio::time::Instant::now() > deadline {
            panic!("timed out waiting for: {}", what);
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
