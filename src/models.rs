use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use lazy_static::lazy_static;
use regex::Regex;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

use crate::error::StoreError;

lazy_static! {
    static ref EMAIL_REGEX: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
}

/// A typed record that lives in one named collection and is keyed by a numeric id.
///
/// Every entity carries an `extra` map so fields a client sends that are not
/// modelled here survive a read-update-write cycle untouched.
pub trait Record: Serialize + DeserializeOwned + Clone {
    /// Collection name, also the persisted key (`accounts`, `projects`, ...)
    const COLLECTION: &'static str;

    fn id(&self) -> u64;

    fn set_id(&mut self, id: u64);

    /// Check field-level rules after a create or a merged update.
    fn validate(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

fn require(value: &str, field: &str) -> Result<(), StoreError> {
    if value.trim().is_empty() {
        return Err(StoreError::Invalid(format!("{} is required", field)));
    }
    Ok(())
}

// ============ ACCOUNTS ============

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum UserType {
    Admin,
    Student,
}

impl fmt::Display for UserType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UserType::Admin => write!(f, "admin"),
            UserType::Student => write!(f, "student"),
        }
    }
}

/// A user of the tracker, either an admin (faculty) or a student.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    #[serde(default)]
    pub id: u64,

    /// Unique login key
    pub email: String,

    /// Stored and compared as plaintext
    #[serde(default)]
    pub password: String,

    pub user_type: UserType,

    #[serde(default)]
    pub full_name: String,

    #[serde(default)]
    pub profile_complete: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,

    /// Admin only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub department: Option<String>,

    /// Student only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub student_id: Option<String>,

    /// Student only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub academic_year: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_number: Option<String>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Account {
    pub fn is_admin(&self) -> bool {
        self.user_type == UserType::Admin
    }

    /// Name shown to other users: `fullName`, or the legacy `name` field.
    pub fn display_name(&self) -> &str {
        if !self.full_name.is_empty() {
            return &self.full_name;
        }
        self.extra
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or_default()
    }
}

impl Record for Account {
    const COLLECTION: &'static str = "accounts";

    fn id(&self) -> u64 {
        self.id
    }

    fn set_id(&mut self, id: u64) {
        self.id = id;
    }

    fn validate(&self) -> Result<(), StoreError> {
        if !EMAIL_REGEX.is_match(&self.email) {
            return Err(StoreError::Invalid(format!(
                "'{}' is not a valid email address",
                self.email
            )));
        }
        Ok(())
    }
}

// ============ PROJECTS ============

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Milestone {
    #[serde(default)]
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub completed: bool,
}

/// A group assignment created by an admin.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    #[serde(default)]
    pub id: u64,

    pub title: String,

    #[serde(default)]
    pub course: String,

    #[serde(default)]
    pub status: String,

    /// `YYYY-MM-DD` or an RFC 3339 timestamp
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<String>,

    /// Percentage, 0 to 100
    #[serde(default)]
    pub progress: u8,

    /// Member display names, in the order they were added
    #[serde(default)]
    pub group_members: Vec<String>,

    #[serde(default)]
    pub milestones: Vec<Milestone>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub objectives: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deliverables: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evaluation_criteria: Option<String>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Project {
    /// Parsed due date. Bare dates mean midnight UTC; blank or unparseable values give `None`.
    pub fn due_at(&self) -> Option<DateTime<Utc>> {
        let raw = self.due_date.as_deref()?.trim();
        if raw.is_empty() {
            return None;
        }
        if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
            return date.and_hms_opt(0, 0, 0).map(|dt| dt.and_utc());
        }
        if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
            return Some(dt.with_timezone(&Utc));
        }
        NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M")
            .ok()
            .map(|dt| dt.and_utc())
    }

    /// Blank or missing due dates never expire. A due date that is set but
    /// cannot be read counts as already passed.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        let is_set = self
            .due_date
            .as_deref()
            .is_some_and(|raw| !raw.trim().is_empty());
        match self.due_at() {
            Some(due) => due < now,
            None => is_set,
        }
    }

    pub fn has_member(&self, name: &str) -> bool {
        self.group_members.iter().any(|member| member == name)
    }
}

impl Record for Project {
    const COLLECTION: &'static str = "projects";

    fn id(&self) -> u64 {
        self.id
    }

    fn set_id(&mut self, id: u64) {
        self.id = id;
    }

    fn validate(&self) -> Result<(), StoreError> {
        require(&self.title, "title")?;
        if self.progress > 100 {
            return Err(StoreError::Invalid(format!(
                "progress must be between 0 and 100, got {}",
                self.progress
            )));
        }
        Ok(())
    }
}

// ============ SUBMISSIONS ============

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum SubmissionStatus {
    #[default]
    #[serde(rename = "Pending Review")]
    PendingReview,
    Accepted,
    Rejected,
    Graded,
}

impl SubmissionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubmissionStatus::PendingReview => "Pending Review",
            SubmissionStatus::Accepted => "Accepted",
            SubmissionStatus::Rejected => "Rejected",
            SubmissionStatus::Graded => "Graded",
        }
    }

    /// Pending and rejected work may be withdrawn and resubmitted.
    pub fn allows_delete(&self) -> bool {
        matches!(
            self,
            SubmissionStatus::PendingReview | SubmissionStatus::Rejected
        )
    }

    pub fn is_reviewed(&self) -> bool {
        *self != SubmissionStatus::PendingReview
    }
}

impl fmt::Display for SubmissionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A student's deliverable for one project.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Submission {
    #[serde(default)]
    pub id: u64,

    pub project_id: u64,

    #[serde(default)]
    pub project_title: String,

    #[serde(default)]
    pub course: String,

    #[serde(default)]
    pub student_name: String,

    pub student_id: String,

    #[serde(default)]
    pub submitted_date: String,

    #[serde(default)]
    pub status: SubmissionStatus,

    #[serde(default)]
    pub grade: Option<String>,

    #[serde(default)]
    pub feedback: Option<String>,

    /// Base64 `data:application/pdf` URL
    #[serde(default)]
    pub pdf_file: Option<String>,

    #[serde(default)]
    pub pdf_file_name: String,

    #[serde(default)]
    pub project_link: String,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub notes: String,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Record for Submission {
    const COLLECTION: &'static str = "submissions";

    fn id(&self) -> u64 {
        self.id
    }

    fn set_id(&mut self, id: u64) {
        self.id = id;
    }

    fn validate(&self) -> Result<(), StoreError> {
        require(&self.student_id, "studentId")
    }
}

// ============ TASKS ============

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum TaskStatus {
    #[default]
    Todo,
    #[serde(rename = "In Progress")]
    InProgress,
    Completed,
}

/// A unit of work inside a project, assigned to one member by display name.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    #[serde(default)]
    pub id: u64,

    pub project_id: u64,

    #[serde(default)]
    pub title: String,

    #[serde(default)]
    pub description: String,

    /// Account display name, not an id
    #[serde(default)]
    pub assignee: String,

    #[serde(default)]
    pub priority: Priority,

    #[serde(default)]
    pub due_date: String,

    #[serde(default)]
    pub status: TaskStatus,

    #[serde(default)]
    pub created_by: String,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Record for Task {
    const COLLECTION: &'static str = "tasks";

    fn id(&self) -> u64 {
        self.id
    }

    fn set_id(&mut self, id: u64) {
        self.id = id;
    }

    fn validate(&self) -> Result<(), StoreError> {
        require(&self.title, "title")?;
        require(&self.assignee, "assignee")?;
        require(&self.due_date, "dueDate")
    }
}

// ============ MESSAGES ============

/// A chat line in a project's channel.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    #[serde(default)]
    pub id: u64,

    pub project_id: u64,

    #[serde(default)]
    pub sender: String,

    #[serde(default)]
    pub text: String,

    #[serde(default)]
    pub timestamp: String,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Record for Message {
    const COLLECTION: &'static str = "messages";

    fn id(&self) -> u64 {
        self.id
    }

    fn set_id(&mut self, id: u64) {
        self.id = id;
    }
}
