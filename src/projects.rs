use chrono::{DateTime, Utc};
use log::info;
use serde_json::{Map, Value, json};
use std::sync::Arc;

use crate::error::StoreError;
use crate::models::Project;
use crate::repository::{Collection, IdStrategy};
use crate::storage::RecordStore;

/// Project collection.
pub struct ProjectStore {
    records: Collection<Project>,
}

impl ProjectStore {
    pub fn new(store: Arc<dyn RecordStore>, ids: IdStrategy) -> Self {
        ProjectStore {
            records: Collection::new(store, ids),
        }
    }

    /// Every stored project, expired or not.
    pub fn list(&self) -> Result<Vec<Project>, StoreError> {
        self.records.list()
    }

    /// Projects that are still open at `now`.
    ///
    /// Projects whose due date has passed, or is set but unreadable, are
    /// deleted from storage as a side effect. Projects without a due date never expire.
    pub fn list_active(&self, now: DateTime<Utc>) -> Result<Vec<Project>, StoreError> {
        let (active, expired) = self.records.retain(|p| !p.is_expired(now))?;
        if expired > 0 {
            info!("removed {} expired project(s)", expired);
        }
        Ok(active)
    }

    pub fn get(&self, id: u64) -> Result<Option<Project>, StoreError> {
        self.records.get(id)
    }

    pub fn create(&self, project: Project) -> Result<Project, StoreError> {
        self.records.insert(project)
    }

    pub fn update(
        &self,
        id: u64,
        patch: &Map<String, Value>,
    ) -> Result<Option<Project>, StoreError> {
        self.records.update(id, patch)
    }

    /// Replace the member list of a project.
    pub fn set_members(
        &self,
        id: u64,
        members: &[String],
    ) -> Result<Option<Project>, StoreError> {
        let mut patch = Map::new();
        patch.insert("groupMembers".to_string(), json!(members));
        self.update(id, &patch)
    }

    pub fn delete(&self, id: u64) -> Result<bool, StoreError> {
        self.records.delete(id)
    }
}
