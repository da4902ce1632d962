//! In-memory conversation history, keyed by conversation ID.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

/// Author of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The human participant.
    User,
    /// The bot or model.
    Assistant,
    /// Instructions injected by the application.
    System,
}

/// One entry of a conversation history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Who wrote the message.
    pub role: Role,
    /// Message text.
    pub content: String,
}

impl ChatMessage {
    /// Create a message.
    #[must_use]
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

/// Mutable history of a single conversation. Clones share the same list.
#[derive(Debug, Clone, Default)]
pub struct ConversationMemory {
    messages: Arc<RwLock<Vec<ChatMessage>>>,
}

impl ConversationMemory {
    /// Create an empty memory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a message.
    pub async fn push(&self, message: ChatMessage) {
        self.messages.write().await.push(message);
    }

    /// Snapshot of every message, oldest first.
    pub async fn get_all(&self) -> Vec<ChatMessage> {
        self.messages.read().await.clone()
    }

    /// Replace the whole history.
    pub async fn set_all(&self, messages: Vec<ChatMessage>) {
        *self.messages.write().await = messages;
    }

    /// Number of stored messages.
    pub async fn len(&self) -> usize {
        self.messages.read().await.len()
    }

    /// Whether the history is empty.
    pub async fn is_empty(&self) -> bool {
        self.messages.read().await.is_empty()
    }

    /// Remove every message.
    pub async fn clear(&self) {
        self.messages.write().await.clear();
    }
}

/// Conversation memories indexed by conversation ID.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    conversations: Arc<RwLock<HashMap<String, ConversationMemory>>>,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Memory for `conversation_id`, created on first use.
    pub async fn get_or_create(&self, conversation_id: &str) -> ConversationMemory {
        if let Some(existing) = self.conversations.read().await.get(conversation_id) {
            return existing.clone();
        }
        self.conversations
            .write()
            .await
            .entry(conversation_id.to_string())
            .or_default()
            .clone()
    }

    /// Memory for `conversation_id` if one exists.
    pub async fn get(&self, conversation_id: &str) -> Option<ConversationMemory> {
        self.conversations.read().await.get(conversation_id).cloned()
    }

    /// Drop the memory of `conversation_id`. Returns `false` if none existed.
    ///
    /// Handles obtained earlier are emptied as well.
    pub async fn remove(&self, conversation_id: &str) -> bool {
        let removed = self.conversations.write().await.remove(conversation_id);
        let Some(memory) = removed else {
            return false;
        };
        memory.clear().await;
        log::info!("removed memory for conversation {conversation_id}");
        true
    }

    /// IDs of every conversation with a memory, sorted.
    pub async fn conversation_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.conversations.read().await.keys().cloned().collect();
        ids.sort();
        ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memories_are_per_conversation() {
        let store = MemoryStore::new();
        let a = store.get_or_create("a").await;
        a.push(ChatMessage::new(Role::User, "hi")).await;
        a.push(ChatMessage::new(Role::Assistant, "hello")).await;

        let b = store.get_or_create("b").await;
        assert!(b.is_empty().await);

        let again = store.get_or_create("a").await;
        assert_eq!(again.len().await, 2);
        assert_eq!(store.conversation_ids().await, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn remove_drops_conversation() {
        let store = MemoryStore::new();
        let handle = store.get_or_create("conv").await;
        handle
            .push(ChatMessage::new(Role::User, "remember me"))
            .await;

        assert!(store.remove("conv").await);
        assert!(!store.remove("conv").await);
        assert!(!store.remove("missing").await);

        assert!(store.get("conv").await.is_none());
        assert!(store.conversation_ids().await.is_empty());
        assert!(handle.get_all().await.is_empty());
    }

    #[tokio::test]
    async fn set_all_replaces_history() {
        let memory = ConversationMemory::new();
        memory.push(ChatMessage::new(Role::User, "old")).await;
        memory
            .set_all(vec![ChatMessage::new(Role::System, "be brief")])
            .await;
        assert_eq!(
            memory.get_all().await,
            vec![ChatMessage::new(Role::System, "be brief")]
        );
    }
}
