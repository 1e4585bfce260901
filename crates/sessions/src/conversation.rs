//! Per-slot conversation store.
//!
//! Keyed by [`SlotId`], process-wide, cleared only by an explicit reset.
//! Cross-request continuity is intentional: the basin's voices accrete a
//! shared history over an exhibition run. On first access a conversation
//! is seeded with the shared persona system prompt.
//!
//! Writes are serialised by the workflow orchestrator (one request at a
//! time, one task per slot within it); the lock only makes the map
//! shareable across tasks.

use std::collections::HashMap;

use parking_lot::RwLock;

use rr_domain::chat::ChatMessage;
use rr_domain::slot::SlotId;

pub struct ConversationStore {
    system_prompt: String,
    conversations: RwLock<HashMap<SlotId, Vec<ChatMessage>>>,
}

impl ConversationStore {
    pub fn new(system_prompt: impl Into<String>) -> Self {
        Self {
            system_prompt: system_prompt.into(),
            conversations: RwLock::new(HashMap::new()),
        }
    }

    /// Append the user utterance to a slot's conversation, seeding it
    /// first if this is the slot's first access.
    pub fn append_user(&self, slot: SlotId, text: impl Into<String>) {
        let mut map = self.conversations.write();
        let convo = map
            .entry(slot)
            .or_insert_with(|| vec![ChatMessage::system(self.system_prompt.clone())]);
        convo.push(ChatMessage::user(text));
    }

    /// Append an assistant utterance to a slot's conversation.
    pub fn append_assistant(&self, slot: SlotId, text: impl Into<String>) {
        let mut map = self.conversations.write();
        let convo = map
            .entry(slot)
            .or_insert_with(|| vec![ChatMessage::system(self.system_prompt.clone())]);
        convo.push(ChatMessage::assistant(text));
    }

    /// The slot's full history, seeded if empty.
    pub fn history(&self, slot: SlotId) -> Vec<ChatMessage> {
        {
            let map = self.conversations.read();
            if let Some(convo) = map.get(&slot) {
                return convo.clone();
            }
        }
        let mut map = self.conversations.write();
        map.entry(slot)
            .or_insert_with(|| vec![ChatMessage::system(self.system_prompt.clone())])
            .clone()
    }

    /// Drop every conversation. Returns the slot ids that had one.
    pub fn reset_all(&self) -> Vec<SlotId> {
        let mut map = self.conversations.write();
        let mut cleared: Vec<SlotId> = map.keys().copied().collect();
        cleared.sort();
        map.clear();
        tracing::info!(slots = cleared.len(), "conversations reset");
        cleared
    }
}
