//! The messaging session: cache, REST pulls and the real-time channel.

use std::sync::{Arc, Weak};

use parking_lot::{Mutex, RwLock};
use school_client::{
    ClientError, ConversationId, ConversationSummary, EventReceiver, MarkReadResult, Message,
    OutboundEvent, RealtimeEvent, User,
};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::api::MessagingApi;
use crate::cache::ConversationCache;
use crate::realtime::{ChannelState, RealtimeConnector, RealtimeHandle};

/// Capacity of the update broadcast. Slow subscribers see `Lagged`.
const UPDATE_CAPACITY: usize = 64;

/// Change notification sent to subscribers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncUpdate {
    /// The conversation list was replaced.
    Conversations,
    /// A conversation's messages changed.
    Messages(ConversationId),
    /// The real-time channel changed state.
    Channel(ChannelState),
}

struct Channel {
    state: ChannelState,
    handle: Option<Box<dyn RealtimeHandle>>,
    pump: Option<JoinHandle<()>>,
    /// Bumped on every connect attempt and teardown.
    generation: u64,
}

impl Channel {
    /// Disconnect and forget the current handle. Returns true if the state changed.
    fn teardown(&mut self) -> bool {
        self.generation += 1;
        if let Some(handle) = self.handle.take() {
            handle.disconnect();
        }
        if let Some(pump) = self.pump.take() {
            pump.abort();
        }
        let changed = self.state != ChannelState::Disconnected;
        self.state = ChannelState::Disconnected;
        changed
    }
}

struct Shared {
    api: Arc<dyn MessagingApi>,
    connector: Arc<dyn RealtimeConnector>,
    user: User,
    cache: RwLock<ConversationCache>,
    channel: Mutex<Channel>,
    updates: broadcast::Sender<SyncUpdate>,
}

/// Messaging state of one signed-in user.
///
/// Created with [`start`](Self::start) when the user authenticates and
/// disposed with [`end`](Self::end) (or by dropping it) when the session
/// ends. Consumers read snapshots and invoke operations; they never mutate
/// the collections directly.
pub struct MessagingSession {
    shared: Arc<Shared>,
}

impl MessagingSession {
    /// Start a session with an empty cache and bring the real-time channel up.
    ///
    /// A failed connect is logged and leaves the channel disconnected; the
    /// REST operations still work and [`reconnect`](Self::reconnect) can be
    /// retried.
    pub async fn start(
        api: Arc<dyn MessagingApi>,
        connector: Arc<dyn RealtimeConnector>,
        user: User,
    ) -> Self {
        let (updates, _) = broadcast::channel(UPDATE_CAPACITY);
        let shared = Arc::new(Shared {
            api,
            connector,
            user,
            cache: RwLock::new(ConversationCache::new()),
            channel: Mutex::new(Channel {
                state: ChannelState::Disconnected,
                handle: None,
                pump: None,
                generation: 0,
            }),
            updates,
        });

        info!(
            "Messaging session started for user {} (school {:?})",
            shared.user.id, shared.user.school_id
        );
        if let Err(e) = shared.connect().await {
            warn!("Real-time channel unavailable: {}", e);
        }

        Self { shared }
    }

    /// End the session: disconnect the channel and discard all cached state.
    pub fn end(self) {
        // Drop does the work.
    }

    /// Tear down the current channel, if any, and connect again.
    pub async fn reconnect(&self) -> Result<(), ClientError> {
        self.shared.connect().await
    }

    /// Fetch all conversations and replace the local list.
    ///
    /// On error the previous list is kept and the error is returned.
    pub async fn refresh_conversations(&self) -> Result<(), ClientError> {
        self.shared.refresh_conversations().await
    }

    /// Fetch a conversation's history and replace its local entry.
    ///
    /// On error the previous entry is kept and the error is returned.
    pub async fn load_messages(&self, conversation_id: ConversationId) -> Result<(), ClientError> {
        let shared = &self.shared;
        let ticket = shared.cache.write().begin_messages_fetch(conversation_id);

        let messages = shared.api.fetch_messages(conversation_id).await?;
        let count = messages.len();

        let applied = shared
            .cache
            .write()
            .apply_messages(conversation_id, ticket, messages);
        if applied {
            debug!("Loaded {} messages for conversation {}", count, conversation_id);
            shared.notify(SyncUpdate::Messages(conversation_id));
        } else {
            debug!(
                "Discarding stale history for conversation {} (request {})",
                conversation_id, ticket
            );
        }
        Ok(())
    }

    /// Send a message and append the server-confirmed copy.
    ///
    /// Nothing is appended if the backend rejects it. The caller is
    /// responsible for not sending empty content.
    pub async fn send(
        &self,
        conversation_id: ConversationId,
        content: &str,
    ) -> Result<Message, ClientError> {
        let message = self.shared.api.post_message(conversation_id, content).await?;

        let appended = self.shared.cache.write().append(message.clone());
        if appended {
            self.shared.notify(SyncUpdate::Messages(message.conversation_id));
        } else {
            // The push for our own message won the race.
            debug!("Sent message {} already present", message.id);
        }
        Ok(message)
    }

    /// Mark a conversation as read, then refresh the conversation list.
    ///
    /// Local `is_read` flags are not touched. A failed refresh is logged, not
    /// returned.
    pub async fn mark_read(
        &self,
        conversation_id: ConversationId,
    ) -> Result<MarkReadResult, ClientError> {
        let result = self.shared.api.mark_read(conversation_id).await?;
        debug!(
            "Marked conversation {} read ({} messages)",
            conversation_id, result.updated
        );
        self.shared.refresh_quietly().await;
        Ok(result)
    }

    /// Tell the other participants whether the user is typing.
    ///
    /// Best effort: silently does nothing while the channel is not connected
    /// or the user has no school.
    pub fn emit_typing(&self, conversation_id: ConversationId, is_typing: bool) {
        let user = &self.shared.user;
        let Some(school_id) = user.school_id else {
            debug!("Typing indicator dropped: user {} has no school", user.id);
            return;
        };
        let channel = self.shared.channel.lock();
        let handle = match (&channel.state, channel.handle.as_ref()) {
            (ChannelState::Connected, Some(handle)) if handle.is_connected() => handle,
            _ => {
                debug!("Typing indicator dropped: channel {}", channel.state);
                return;
            }
        };

        let event = OutboundEvent::Typing {
            school_id,
            conversation_id,
            user_id: user.id,
            is_typing,
        };
        if let Err(e) = handle.emit(event) {
            debug!("Typing indicator dropped: {}", e);
        }
    }

    /// Apply a push event.
    ///
    /// Called by the session's pump for every event of the channel; exposed so
    /// events from another source can be fed in. The message is appended
    /// before this returns; the follow-up list refresh runs on a spawned task,
    /// so this must be called from within a Tokio runtime.
    pub fn ingest(&self, event: RealtimeEvent) {
        self.shared.ingest(event)
    }

    /// Snapshot of the conversation list.
    pub fn conversations(&self) -> Vec<ConversationSummary> {
        self.shared.cache.read().conversations().to_vec()
    }

    /// Snapshot of one conversation summary.
    pub fn conversation(&self, id: ConversationId) -> Option<ConversationSummary> {
        self.shared.cache.read().conversation(id).cloned()
    }

    /// Snapshot of a conversation's messages in arrival order.
    ///
    /// Empty if the conversation was never loaded.
    pub fn messages(&self, conversation_id: ConversationId) -> Vec<Message> {
        self.shared
            .cache
            .read()
            .messages(conversation_id)
            .map(|log| log.to_vec())
            .unwrap_or_default()
    }

    /// Unread messages over all conversations, as of the last list fetch.
    pub fn unread_total(&self) -> u64 {
        self.shared.cache.read().unread_total()
    }

    /// Receive a notification after every applied change.
    pub fn subscribe(&self) -> broadcast::Receiver<SyncUpdate> {
        self.shared.updates.subscribe()
    }

    pub fn channel_state(&self) -> ChannelState {
        self.shared.channel.lock().state
    }

    /// The signed-in user.
    pub fn user(&self) -> &User {
        &self.shared.user
    }
}

impl Drop for MessagingSession {
    fn drop(&mut self) {
        self.shared.shutdown();
    }
}

impl std::fmt::Debug for MessagingSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessagingSession")
            .field("user", &self.shared.user.id)
            .field("channel", &self.channel_state())
            .finish()
    }
}

impl Shared {
    fn notify(&self, update: SyncUpdate) {
        // No subscribers is fine.
        let _ = self.updates.send(update);
    }

    fn set_state(&self, state: ChannelState) {
        debug!("Real-time channel {}", state);
        self.notify(SyncUpdate::Channel(state));
    }

    /// Disconnected -> Connecting -> Connected, announcing the school scope
    /// (when the user has one) before any inbound event is processed.
    async fn connect(self: &Arc<Self>) -> Result<(), ClientError> {
        let generation = {
            let mut channel = self.channel.lock();
            channel.teardown();
            channel.state = ChannelState::Connecting;
            channel.generation
        };
        self.set_state(ChannelState::Connecting);

        let (handle, events) = match self.connector.connect().await {
            Ok(opened) => opened,
            Err(e) => {
                self.abandon(generation);
                return Err(e);
            }
        };

        match self.user.school_id {
            Some(school_id) => {
                if let Err(e) = handle.emit(OutboundEvent::JoinSchool { school_id }) {
                    handle.disconnect();
                    self.abandon(generation);
                    return Err(e);
                }
            }
            None => debug!("User {} has no school, not joining a room", self.user.id),
        }

        {
            let mut channel = self.channel.lock();
            if channel.generation != generation {
                drop(channel);
                debug!("Connect superseded by a newer attempt");
                handle.disconnect();
                return Ok(());
            }
            channel.state = ChannelState::Connected;
            channel.handle = Some(handle);
            channel.pump = Some(tokio::spawn(pump(Arc::downgrade(self), events, generation)));
        }

        match self.user.school_id {
            Some(school_id) => info!("Joined school {} real-time room", school_id),
            None => info!("Real-time channel connected"),
        }
        self.set_state(ChannelState::Connected);
        Ok(())
    }

    /// Return to Disconnected after a failed attempt, unless superseded.
    fn abandon(&self, generation: u64) {
        let changed = {
            let mut channel = self.channel.lock();
            channel.generation == generation && channel.teardown()
        };
        if changed {
            self.set_state(ChannelState::Disconnected);
        }
    }

    /// The transport behind `generation` closed.
    fn channel_closed(&self, generation: u64) {
        let changed = {
            let mut channel = self.channel.lock();
            if channel.generation != generation {
                return;
            }
            // Detach our own task handle so teardown does not abort it.
            channel.pump = None;
            channel.teardown()
        };
        if changed {
            info!("Real-time channel closed");
            self.set_state(ChannelState::Disconnected);
        }
    }

    fn shutdown(&self) {
        let changed = self.channel.lock().teardown();
        self.cache.write().clear();
        if changed {
            self.set_state(ChannelState::Disconnected);
        }
        info!("Messaging session for user {} ended", self.user.id);
    }

    async fn refresh_conversations(&self) -> Result<(), ClientError> {
        let ticket = self.cache.write().begin_conversations_fetch();

        let list = self.api.fetch_conversations().await?;
        let count = list.len();

        let applied = self.cache.write().apply_conversations(ticket, list);
        if applied {
            debug!("Conversation list replaced ({} conversations)", count);
            self.notify(SyncUpdate::Conversations);
        } else {
            debug!("Discarding stale conversation list (request {})", ticket);
        }
        Ok(())
    }

    /// Refresh triggered internally; failures are only logged.
    async fn refresh_quietly(&self) {
        if let Err(e) = self.refresh_conversations().await {
            warn!("Conversation refresh failed: {}", e);
        }
    }

    /// Refresh the conversation list on a separate task so the pump can move
    /// on to the next event. Each call issues its own fetch; the sequence
    /// guard in the cache keeps only the newest response.
    fn spawn_refresh(self: &Arc<Self>) {
        let shared = Arc::downgrade(self);
        tokio::spawn(async move {
            if let Some(shared) = shared.upgrade() {
                shared.refresh_quietly().await;
            }
        });
    }

    fn ingest(self: &Arc<Self>, event: RealtimeEvent) {
        match event {
            RealtimeEvent::NewMessage(push) => {
                if push.is_meeting() {
                    debug!("Meeting notice in conversation {}", push.conversation_id);
                }
                let message = push.into_message();
                let conversation_id = message.conversation_id;
                let message_id = message.id;

                let appended = self.cache.write().append(message);
                if appended {
                    debug!(
                        "Pushed message {} into conversation {}",
                        message_id, conversation_id
                    );
                    self.notify(SyncUpdate::Messages(conversation_id));
                } else {
                    debug!("Ignoring redelivered message {}", message_id);
                }
                self.spawn_refresh();
            }
            RealtimeEvent::MessagesRead(read) => {
                debug!(
                    "Conversation {} read by {:?}",
                    read.conversation_id, read.reader_id
                );
                self.spawn_refresh();
            }
            RealtimeEvent::Typing(typing) => {
                debug!(
                    "User {} typing={} in conversation {}",
                    typing.user_id, typing.is_typing, typing.conversation_id
                );
            }
            RealtimeEvent::Joined { room } => debug!("Server confirmed room {}", room),
            RealtimeEvent::Status(status) => debug!("Server status: {}", status.message),
            RealtimeEvent::Other { name, .. } => debug!("Ignoring {} event", name),
        }
    }
}

/// Feed channel events into the session, one at a time, until the transport
/// closes or the session is gone.
async fn pump(shared: Weak<Shared>, mut events: EventReceiver, generation: u64) {
    while let Some(event) = events.recv().await {
        let Some(shared) = shared.upgrade() else {
            return;
        };
        shared.ingest(event);
    }
    if let Some(shared) = shared.upgrade() {
        shared.channel_closed(generation);
    }
}
