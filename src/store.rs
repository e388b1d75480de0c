use thiserror::Error;

use crate::models::{Message, MessageId};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("conversation is empty")]
    Empty,

    #[error("last message is already finalized")]
    NotPending,

    #[error("placeholder {0} is no longer in the conversation")]
    PlaceholderGone(MessageId),
}

/// Ordered message log for the current session.
///
/// Append-only apart from resolving the trailing placeholder. At most one
/// pending message exists and it is always the last one; callers uphold that
/// when appending.
#[derive(Debug, Default)]
pub struct ConversationStore {
    messages: Vec<Message>,
}

impl ConversationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, message: Message) -> MessageId {
        let id = message.id;
        self.messages.push(message);
        id
    }

    /// Replaces the trailing placeholder, keeping its id.
    pub fn replace_last(&mut self, message: Message) -> Result<(), StoreError> {
        let last = self.messages.last_mut().ok_or(StoreError::Empty)?;
        if !last.pending {
            return Err(StoreError::NotPending);
        }

        let id = last.id;
        *last = Message { id, ..message };
        Ok(())
    }

    /// Replaces the placeholder identified by `id`, failing if it was cleared
    /// or already resolved.
    pub fn replace_pending(&mut self, id: MessageId, message: Message) -> Result<(), StoreError> {
        match self.messages.last() {
            Some(last) if last.id == id && last.pending => self.replace_last(message),
            _ => Err(StoreError::PlaceholderGone(id)),
        }
    }

    pub fn clear(&mut self) -> usize {
        let dropped = self.messages.len();
        self.messages.clear();
        dropped
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    pub fn pending(&self) -> Option<&Message> {
        self.messages.last().filter(|message| message.pending)
    }
}
