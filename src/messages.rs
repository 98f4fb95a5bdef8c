use std::sync::Arc;

use crate::error::StoreError;
use crate::models::Message;
use crate::repository::{Collection, IdStrategy};
use crate::storage::RecordStore;

/// Append-only chat log shared by all projects.
pub struct MessageStore {
    records: Collection<Message>,
}

impl MessageStore {
    pub fn new(store: Arc<dyn RecordStore>, ids: IdStrategy) -> Self {
        MessageStore {
            records: Collection::new(store, ids),
        }
    }

    pub fn list(&self) -> Result<Vec<Message>, StoreError> {
        self.records.list()
    }

    /// A project's channel, oldest first.
    pub fn for_project(&self, project_id: u64) -> Result<Vec<Message>, StoreError> {
        let mut messages = self.records.filter(|m| m.project_id == project_id)?;
        messages.sort_by_key(|m| m.id);
        Ok(messages)
    }

    pub fn create(&self, message: Message) -> Result<Message, StoreError> {
        self.records.insert(message)
    }
}
