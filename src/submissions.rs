use serde_json::{Map, Value};
use std::sync::Arc;

use crate::error::StoreError;
use crate::models::Submission;
use crate::repository::{Collection, IdStrategy};
use crate::storage::RecordStore;

/// Submission collection.
///
/// The store itself accepts any well-formed submission; the one-per-student
/// rule and the delete lock are applied by [`crate::workflow::Tracker`].
pub struct SubmissionStore {
    records: Collection<Submission>,
}

impl SubmissionStore {
    pub fn new(store: Arc<dyn RecordStore>, ids: IdStrategy) -> Self {
        SubmissionStore {
            records: Collection::new(store, ids),
        }
    }

    pub fn list(&self) -> Result<Vec<Submission>, StoreError> {
        self.records.list()
    }

    pub fn get(&self, id: u64) -> Result<Option<Submission>, StoreError> {
        self.records.get(id)
    }

    /// The submission a student made for a project, if any.
    pub fn find_for(
        &self,
        project_id: u64,
        student_id: &str,
    ) -> Result<Option<Submission>, StoreError> {
        self.records
            .find(|s| s.project_id == project_id && s.student_id == student_id)
    }

    pub fn create(&self, submission: Submission) -> Result<Submission, StoreError> {
        self.records.insert(submission)
    }

    /// Insert unless the student already has a submission for the project.
    ///
    /// # Errors
    /// * `StoreError::DuplicateSubmission` if one already exists
    pub fn create_unique(&self, submission: Submission) -> Result<Submission, StoreError> {
        let project_id = submission.project_id;
        let student_id = submission.student_id.clone();
        self.records.insert_checked(submission, |existing| {
            let taken = existing.iter().any(|s| {
                s.get("projectId").and_then(Value::as_u64) == Some(project_id)
                    && s.get("studentId").and_then(Value::as_str) == Some(student_id.as_str())
            });
            if taken {
                return Err(StoreError::DuplicateSubmission);
            }
            Ok(())
        })
    }

    pub fn update(
        &self,
        id: u64,
        patch: &Map<String, Value>,
    ) -> Result<Option<Submission>, StoreError> {
        self.records.update(id, patch)
    }

    pub fn delete(&self, id: u64) -> Result<bool, StoreError> {
        self.records.delete(id)
    }

    /// Delete only if `check` accepts the stored submission.
    pub fn delete_if<E: From<StoreError>>(
        &self,
        id: u64,
        check: impl FnOnce(&Submission) -> Result<(), E>,
    ) -> Result<bool, E> {
        self.records.delete_if(id, check)
    }
}
