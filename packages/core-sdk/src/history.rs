use std::sync::Arc;

use crate::error::StorageError;
use crate::models::ChatMessage;
use crate::store::RecordStore;

/**
 * \brief Conversation log persisted as a single document.
 */
#[derive(Clone)]
pub struct HistoryStore {
    store: Arc<dyn RecordStore<ChatMessage>>,
}

impl HistoryStore {
    pub fn new(store: Arc<dyn RecordStore<ChatMessage>>) -> Self {
        Self { store }
    }

    pub fn load(&self) -> Result<Vec<ChatMessage>, StorageError> {
        self.store.load()
    }

    /**
     * \brief Replace the stored history with `history`. No merge happens here.
     */
    pub fn save(&self, history: &[ChatMessage]) -> Result<(), StorageError> {
        self.store.save(history)
    }

    pub fn append(&self, message: ChatMessage) -> Result<Vec<ChatMessage>, StorageError> {
        let mut history = self.store.load()?;
        history.push(message);
        self.store.save(&history)?;
        Ok(history)
    }

    pub fn clear(&self) -> Result<(), StorageError> {
        self.store.save(&[])
    }
}
