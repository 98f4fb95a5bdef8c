use serde_json::{Map, Value};
use std::sync::Arc;

use crate::error::StoreError;
use crate::models::Task;
use crate::repository::{Collection, IdStrategy};
use crate::storage::RecordStore;

/// Task collection. Title, assignee and due date are required.
pub struct TaskStore {
    records: Collection<Task>,
}

impl TaskStore {
    pub fn new(store: Arc<dyn RecordStore>, ids: IdStrategy) -> Self {
        TaskStore {
            records: Collection::new(store, ids),
        }
    }

    pub fn list(&self) -> Result<Vec<Task>, StoreError> {
        self.records.list()
    }

    pub fn get(&self, id: u64) -> Result<Option<Task>, StoreError> {
        self.records.get(id)
    }

    pub fn for_project(&self, project_id: u64) -> Result<Vec<Task>, StoreError> {
        self.records.filter(|t| t.project_id == project_id)
    }

    /// Tasks assigned to a member, matched by display name.
    pub fn for_assignee(&self, name: &str) -> Result<Vec<Task>, StoreError> {
        self.records.filter(|t| t.assignee == name)
    }

    pub fn create(&self, task: Task) -> Result<Task, StoreError> {
        self.records.insert(task)
    }

    pub fn update(&self, id: u64, patch: &Map<String, Value>) -> Result<Option<Task>, StoreError> {
        self.records.update(id, patch)
    }

    /// Apply `patch` only if `check` accepts the merged task, all under the collection lock.
    pub fn update_if<E: From<StoreError>>(
        &self,
        id: u64,
        patch: &Map<String, Value>,
        check: impl FnOnce(&Task) -> Result<(), E>,
    ) -> Result<Option<Task>, E> {
        self.records
            .update_checked(|t| t.id == id, patch, |updated, _| check(updated))
    }
}
