//! In-memory state of a messaging session.
//!
//! Plain data with no locking or I/O; [`MessagingSession`](crate::MessagingSession)
//! wraps it in a lock and drives it from fetches and push events.

use std::collections::HashMap;

use indexmap::IndexMap;
use school_client::{ConversationId, ConversationSummary, Message, MessageId};

/// One conversation's messages in arrival order, keyed by id.
#[derive(Debug, Clone, Default)]
pub struct MessageLog {
    entries: IndexMap<MessageId, Message>,
}

impl MessageLog {
    /// Build a log from a fetched snapshot.
    ///
    /// A repeated id keeps its first position and the last copy.
    pub fn from_messages(messages: Vec<Message>) -> Self {
        let mut entries = IndexMap::with_capacity(messages.len());
        for message in messages {
            entries.insert(message.id, message);
        }
        Self { entries }
    }

    /// Append a message. Returns false, leaving the log unchanged, if a
    /// message with the same id is already present.
    pub fn push(&mut self, message: Message) -> bool {
        if self.entries.contains_key(&message.id) {
            return false;
        }
        self.entries.insert(message.id, message);
        true
    }

    pub fn contains(&self, id: MessageId) -> bool {
        self.entries.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Message> {
        self.entries.values()
    }

    pub fn to_vec(&self) -> Vec<Message> {
        self.entries.values().cloned().collect()
    }
}

/// Request sequence numbers for one resource.
#[derive(Debug, Clone, Copy, Default)]
struct Sequence {
    issued: u64,
    applied: u64,
}

impl Sequence {
    fn next(&mut self) -> u64 {
        self.issued += 1;
        self.issued
    }

    /// Record `ticket` as applied unless a newer response already was.
    fn accept(&mut self, ticket: u64) -> bool {
        if ticket <= self.applied {
            return false;
        }
        self.applied = ticket;
        true
    }

    /// Refuse every ticket issued so far.
    fn retire(&mut self) {
        self.applied = self.issued;
    }
}

/// Conversation list plus per-conversation message logs.
#[derive(Debug, Default)]
pub struct ConversationCache {
    conversations: Vec<ConversationSummary>,
    messages: HashMap<ConversationId, MessageLog>,
    conversations_seq: Sequence,
    messages_seq: HashMap<ConversationId, Sequence>,
}

impl ConversationCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ticket for a conversation list fetch about to be issued.
    pub fn begin_conversations_fetch(&mut self) -> u64 {
        self.conversations_seq.next()
    }

    /// Replace the conversation list with a fetch result.
    ///
    /// Returns false and drops the result if a newer fetch was applied first.
    pub fn apply_conversations(&mut self, ticket: u64, list: Vec<ConversationSummary>) -> bool {
        if !self.conversations_seq.accept(ticket) {
            return false;
        }
        self.conversations = list;
        true
    }

    /// Ticket for a history fetch of one conversation about to be issued.
    pub fn begin_messages_fetch(&mut self, conversation_id: ConversationId) -> u64 {
        self.messages_seq.entry(conversation_id).or_default().next()
    }

    /// Replace one conversation's history with a fetch result.
    ///
    /// Returns false and drops the result if a newer fetch was applied first.
    pub fn apply_messages(
        &mut self,
        conversation_id: ConversationId,
        ticket: u64,
        messages: Vec<Message>,
    ) -> bool {
        let seq = self.messages_seq.entry(conversation_id).or_default();
        if !seq.accept(ticket) {
            return false;
        }
        self.messages
            .insert(conversation_id, MessageLog::from_messages(messages));
        true
    }

    /// Append a single message to its conversation, creating the entry if the
    /// conversation has not been loaded. Returns false for a duplicate id.
    pub fn append(&mut self, message: Message) -> bool {
        self.messages
            .entry(message.conversation_id)
            .or_default()
            .push(message)
    }

    pub fn conversations(&self) -> &[ConversationSummary] {
        &self.conversations
    }

    pub fn conversation(&self, id: ConversationId) -> Option<&ConversationSummary> {
        self.conversations.iter().find(|c| c.id == id)
    }

    /// Messages of a conversation; `None` if nothing was loaded or pushed yet.
    pub fn messages(&self, conversation_id: ConversationId) -> Option<&MessageLog> {
        self.messages.get(&conversation_id)
    }

    /// Sum of unread counters over the conversation list.
    pub fn unread_total(&self) -> u64 {
        self.conversations
            .iter()
            .map(|c| u64::from(c.unread_count))
            .sum()
    }

    /// Drop all cached data. Fetches still in flight are refused when they
    /// complete.
    pub fn clear(&mut self) {
        self.conversations.clear();
        self.messages.clear();
        self.conversations_seq.retire();
        for seq in self.messages_seq.values_mut() {
            seq.retire();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use school_client::UserRole;

    fn message(id: MessageId, conversation_id: ConversationId, content: &str) -> Message {
        Message {
            id,
            conversation_id,
            sender_id: 5,
            sender_role: UserRole::Instructor,
            content: content.to_string(),
            created_at: format!("2024-05-01T08:{:02}:00", id),
            is_read: false,
        }
    }

    fn summary(id: ConversationId, unread: u32) -> ConversationSummary {
        ConversationSummary {
            id,
            title: format!("Conversation {}", id),
            last_message_preview: None,
            last_activity_at: None,
            unread_count: unread,
        }
    }

    #[test]
    fn test_log_rejects_duplicate_ids() {
        let mut log = MessageLog::default();
        assert!(log.push(message(1, 3, "a")));
        assert!(log.push(message(2, 3, "b")));
        assert!(!log.push(message(1, 3, "a again")));

        let contents: Vec<_> = log.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["a", "b"]);
    }

    #[test]
    fn test_log_keeps_arrival_order() {
        let mut log = MessageLog::default();
        log.push(message(9, 3, "late id first"));
        log.push(message(2, 3, "early id second"));
        let ids: Vec<_> = log.iter().map(|m| m.id).collect();
        assert_eq!(ids, vec![9, 2]);
    }

    #[test]
    fn test_apply_conversations_replaces_list() {
        let mut cache = ConversationCache::new();
        let t1 = cache.begin_conversations_fetch();
        assert!(cache.apply_conversations(t1, vec![summary(1, 0), summary(2, 4)]));
        assert_eq!(cache.unread_total(), 4);

        let t2 = cache.begin_conversations_fetch();
        assert!(cache.apply_conversations(t2, vec![summary(2, 0), summary(3, 1)]));
        let ids: Vec<_> = cache.conversations().iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![2, 3]);
        assert!(cache.conversation(1).is_none());
    }

    #[test]
    fn test_stale_conversation_fetch_is_discarded() {
        let mut cache = ConversationCache::new();
        let older = cache.begin_conversations_fetch();
        let newer = cache.begin_conversations_fetch();

        assert!(cache.apply_conversations(newer, vec![summary(2, 0)]));
        assert!(!cache.apply_conversations(older, vec![summary(1, 0)]));
        assert_eq!(cache.conversations()[0].id, 2);
    }

    #[test]
    fn test_message_sequences_are_per_conversation() {
        let mut cache = ConversationCache::new();
        let a = cache.begin_messages_fetch(1);
        let b = cache.begin_messages_fetch(2);
        let a2 = cache.begin_messages_fetch(1);

        assert!(cache.apply_messages(2, b, vec![message(1, 2, "x")]));
        assert!(cache.apply_messages(1, a2, vec![message(5, 1, "new")]));
        assert!(!cache.apply_messages(1, a, vec![message(4, 1, "old")]));

        assert_eq!(cache.messages(1).unwrap().to_vec()[0].content, "new");
        assert_eq!(cache.messages(2).unwrap().len(), 1);
    }

    #[test]
    fn test_append_creates_entry_for_unknown_conversation() {
        let mut cache = ConversationCache::new();
        assert!(cache.messages(42).is_none());
        assert!(cache.append(message(1, 42, "hello")));
        assert!(!cache.append(message(1, 42, "hello")));
        assert_eq!(cache.messages(42).unwrap().len(), 1);
    }

    #[test]
    fn test_clear_refuses_inflight_fetches() {
        let mut cache = ConversationCache::new();
        let t = cache.begin_conversations_fetch();
        cache.apply_conversations(t, vec![summary(1, 2)]);
        cache.append(message(1, 1, "x"));
        let pending_list = cache.begin_conversations_fetch();
        let pending_history = cache.begin_messages_fetch(1);

        cache.clear();
        assert!(cache.conversations().is_empty());
        assert!(cache.messages(1).is_none());

        assert!(!cache.apply_conversations(pending_list, vec![summary(2, 0)]));
        assert!(!cache.apply_messages(1, pending_history, vec![message(2, 1, "late")]));
        assert!(cache.conversations().is_empty());
        assert!(cache.messages(1).is_none());

        let t = cache.begin_conversations_fetch();
        assert!(cache.apply_conversations(t, vec![summary(3, 0)]));
    }
}
