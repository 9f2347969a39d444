use crate::error::Result;
use crate::model::{Conversation, Message, Sender};
use crate::projector::{self, HistoryEntry};
use crate::store::StateStore;
use uuid::Uuid;

/// In-memory conversation collection plus the active pointer, backed by the
/// durable store. Every successful mutation writes the full serialized
/// collection back through the store; calls that resolve to a no-op leave the
/// store untouched.
///
/// Unknown conversation or message identities are reported as `false`/`None`
/// rather than errors; `Err` is reserved for storage failures.
pub struct ConversationRepository {
    conversations: Vec<Conversation>,
    active_id: Option<String>,
    store: StateStore,
}

impl ConversationRepository {
    /// Load the persisted collection. If conversations exist, the last one in
    /// insertion order becomes active.
    pub fn hydrate(store: StateStore) -> Result<Self> {
        let conversations = store.load_conversations()?;
        let active_id = conversations.last().map(|c| c.id.clone());
        Ok(Self {
            conversations,
            active_id,
            store,
        })
    }

    fn persist(&self) -> Result<()> {
        self.store.save_conversations(&self.conversations)
    }

    fn index_of(&self, id: &str) -> Option<usize> {
        self.conversations.iter().position(|c| c.id == id)
    }

    /// Append a fresh empty conversation and make it active.
    pub fn create_conversation(&mut self) -> Result<String> {
        let id = Uuid::new_v4().to_string();
        self.conversations.push(Conversation::new(id.clone()));
        self.active_id = Some(id.clone());
        self.persist()?;
        Ok(id)
    }

    /// Append a message to the given conversation. Unknown ids are a silent
    /// no-op and return `None`.
    pub fn append_message(
        &mut self,
        conversation_id: &str,
        sender: Sender,
        body: impl Into<String>,
    ) -> Result<Option<&Message>> {
        let Some(idx) = self.index_of(conversation_id) else {
            return Ok(None);
        };
        self.conversations[idx].push_message(sender, body);
        self.persist()?;
        Ok(self.conversations[idx].messages.last())
    }

    /// Replace the body of the message with the given sequence number,
    /// leaving its identity and timestamp untouched. Only user messages are
    /// editable; `false` if the conversation or sequence number is unknown,
    /// or the target is an agent reply.
    pub fn edit_message(
        &mut self,
        conversation_id: &str,
        seq: u64,
        new_body: impl Into<String>,
    ) -> Result<bool> {
        let Some(idx) = self.index_of(conversation_id) else {
            return Ok(false);
        };
        let Some(message) = self.conversations[idx].message_by_seq_mut(seq) else {
            return Ok(false);
        };
        if message.sender != Sender::User {
            return Ok(false);
        }
        message.body = new_body.into();
        self.persist()?;
        Ok(true)
    }

    /// Empty a conversation's message sequence.
    pub fn clear_conversation(&mut self, conversation_id: &str) -> Result<bool> {
        let Some(idx) = self.index_of(conversation_id) else {
            return Ok(false);
        };
        self.conversations[idx].clear_messages();
        self.persist()?;
        Ok(true)
    }

    /// Remove a conversation. If it was active, the last remaining
    /// conversation takes over; with nothing left a fresh empty conversation
    /// is created so there is always an active target afterwards.
    ///
    /// Confirmation is the caller's concern; this mutates unconditionally.
    pub fn remove_conversation(&mut self, conversation_id: &str) -> Result<bool> {
        let Some(idx) = self.index_of(conversation_id) else {
            return Ok(false);
        };
        let was_active = self.active_id.as_deref() == Some(conversation_id);
        self.conversations.remove(idx);

        if was_active {
            if let Some(last_id) = self.conversations.last().map(|c| c.id.clone()) {
                self.active_id = Some(last_id);
            } else {
                let id = Uuid::new_v4().to_string();
                self.conversations.push(Conversation::new(id.clone()));
                self.active_id = Some(id);
            }
        }
        self.persist()?;
        Ok(true)
    }

    /// Drop the whole collection and its persisted state.
    pub fn delete_all(&mut self) -> Result<()> {
        self.conversations.clear();
        self.active_id = None;
        self.store.clear_conversations()
    }

    /// Set a conversation's title. Titles that trim to empty are rejected
    /// silently.
    pub fn rename_conversation(&mut self, conversation_id: &str, new_title: &str) -> Result<bool> {
        if new_title.trim().is_empty() {
            return Ok(false);
        }
        let Some(idx) = self.index_of(conversation_id) else {
            return Ok(false);
        };
        self.conversations[idx].title = Some(new_title.to_string());
        self.persist()?;
        Ok(true)
    }

    /// Move the active pointer. Unknown ids leave the pointer unchanged.
    pub fn set_active(&mut self, conversation_id: &str) -> bool {
        if self.index_of(conversation_id).is_none() {
            return false;
        }
        self.active_id = Some(conversation_id.to_string());
        true
    }

    pub fn contains(&self, conversation_id: &str) -> bool {
        self.index_of(conversation_id).is_some()
    }

    pub fn conversations(&self) -> &[Conversation] {
        &self.conversations
    }

    pub fn conversation(&self, conversation_id: &str) -> Option<&Conversation> {
        self.conversations.iter().find(|c| c.id == conversation_id)
    }

    pub fn active_id(&self) -> Option<&str> {
        self.active_id.as_deref()
    }

    pub fn active_conversation(&self) -> Option<&Conversation> {
        let id = self.active_id.as_deref()?;
        self.conversation(id)
    }

    /// Recompute the history list view from current state.
    pub fn history_entries(&self) -> Vec<HistoryEntry> {
        projector::project(&self.conversations, self.active_id.as_deref())
    }
}
