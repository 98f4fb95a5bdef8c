use chrono::{SecondsFormat, Utc};
use log::info;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::collections::BTreeSet;
use std::sync::Arc;

use crate::accounts::AccountStore;
use crate::attachment::decode_pdf_data_url;
use crate::error::{StoreError, WorkflowError};
use crate::messages::MessageStore;
use crate::models::{
    Account, Message, Priority, Project, Submission, SubmissionStatus, Task, TaskStatus, UserType,
};
use crate::projects::ProjectStore;
use crate::repository::IdStrategy;
use crate::storage::RecordStore;
use crate::submissions::SubmissionStore;
use crate::tasks::TaskStore;

/// What a student fills in when handing in work.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SubmissionDraft {
    pub project_link: String,
    pub description: String,
    pub notes: String,
    /// Base64 `data:application/pdf` URL
    pub pdf_file: Option<String>,
    pub pdf_file_name: String,
}

/// An admin's verdict on a submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Review {
    pub status: SubmissionStatus,
    #[serde(default)]
    pub grade: Option<String>,
    #[serde(default)]
    pub feedback: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TaskDraft {
    pub title: String,
    pub description: String,
    /// Defaults to the creator when blank
    pub assignee: String,
    pub priority: Priority,
    pub due_date: String,
    pub status: TaskStatus,
}

/// One project as a student sees it on their dashboard.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectCard {
    pub project: Project,
    pub submission: Option<Submission>,
    pub can_delete_submission: bool,
    pub tasks_completed: usize,
    pub tasks_total: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentOverview {
    pub projects: Vec<ProjectCard>,
    pub my_tasks: Vec<Task>,
    pub completed_tasks: usize,
    pub pending_tasks: usize,
    /// Distinct member names across all projects
    pub team_members: usize,
}

/// All five stores plus the rules for who may change what.
///
/// The stores only check that records are well formed. Ownership rules
/// (one submission per student and project, the delete lock on reviewed work,
/// admin-only grading, channel membership) are applied here.
pub struct Tracker {
    pub accounts: AccountStore,
    pub projects: ProjectStore,
    pub submissions: SubmissionStore,
    pub tasks: TaskStore,
    pub messages: MessageStore,
}

fn require_admin(actor: &Account) -> Result<(), WorkflowError> {
    if !actor.is_admin() {
        return Err(WorkflowError::Forbidden("only admins may do this"));
    }
    Ok(())
}

fn require_student(actor: &Account) -> Result<(), WorkflowError> {
    if actor.user_type != UserType::Student {
        return Err(WorkflowError::Forbidden("only students may do this"));
    }
    Ok(())
}

fn non_blank(value: &str, field: &'static str) -> Result<String, WorkflowError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(WorkflowError::MissingField(field));
    }
    Ok(trimmed.to_string())
}

fn student_id_of(actor: &Account) -> Result<&str, WorkflowError> {
    actor
        .student_id
        .as_deref()
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .ok_or(WorkflowError::MissingField("studentId"))
}

impl Tracker {
    pub fn new(store: Arc<dyn RecordStore>, ids: IdStrategy) -> Self {
        Tracker {
            accounts: AccountStore::new(store.clone(), ids),
            projects: ProjectStore::new(store.clone(), ids),
            submissions: SubmissionStore::new(store.clone(), ids),
            tasks: TaskStore::new(store.clone(), ids),
            messages: MessageStore::new(store, ids),
        }
    }

    /// Build the tracker and seed the default accounts on first run.
    pub fn open(store: Arc<dyn RecordStore>, ids: IdStrategy) -> Result<Self, StoreError> {
        let tracker = Self::new(store, ids);
        tracker.accounts.seed_defaults()?;
        Ok(tracker)
    }

    // ============ ACCOUNTS ============

    /// Self-registration. The profile still has to be completed afterwards.
    pub fn register(
        &self,
        user_type: UserType,
        mut account: Account,
    ) -> Result<Account, WorkflowError> {
        account.user_type = user_type;
        account.profile_complete = false;
        let created = self.accounts.create(account)?;
        info!("registered {} account {}", created.user_type, created.email);
        Ok(created)
    }

    pub fn login(&self, email: &str, password: &str) -> Result<Account, WorkflowError> {
        self.accounts
            .authenticate(email.trim(), password)?
            .ok_or(WorkflowError::InvalidCredentials)
    }

    /// Merge profile details and mark the profile complete.
    ///
    /// The average grade starts out empty; only admins set it later.
    pub fn complete_profile(
        &self,
        email: &str,
        profile: &Map<String, Value>,
    ) -> Result<Account, WorkflowError> {
        let mut patch = profile.clone();
        patch.remove("userType");
        patch.insert("profileComplete".to_string(), json!(true));
        patch.insert("averageGrade".to_string(), Value::Null);
        self.accounts
            .update(email, &patch)?
            .ok_or(WorkflowError::NotFound("account"))
    }

    /// Profile edits. The account type cannot be changed this way.
    pub fn update_profile(
        &self,
        email: &str,
        patch: &Map<String, Value>,
    ) -> Result<Account, WorkflowError> {
        let mut patch = patch.clone();
        patch.remove("userType");
        self.accounts
            .update(email, &patch)?
            .ok_or(WorkflowError::NotFound("account"))
    }

    /// Admin-driven creation of a ready-to-use student account.
    pub fn create_student_account(
        &self,
        actor: &Account,
        mut account: Account,
    ) -> Result<Account, WorkflowError> {
        require_admin(actor)?;
        account.user_type = UserType::Student;
        account.profile_complete = true;
        Ok(self.accounts.create(account)?)
    }

    // ============ PROJECTS ============

    pub fn create_project(&self, actor: &Account, project: Project) -> Result<Project, WorkflowError> {
        require_admin(actor)?;
        let created = self.projects.create(project)?;
        info!("{} created project {} '{}'", actor.email, created.id, created.title);
        Ok(created)
    }

    pub fn update_project(
        &self,
        actor: &Account,
        id: u64,
        patch: &Map<String, Value>,
    ) -> Result<Project, WorkflowError> {
        require_admin(actor)?;
        self.projects
            .update(id, patch)?
            .ok_or(WorkflowError::NotFound("project"))
    }

    pub fn delete_project(&self, actor: &Account, id: u64) -> Result<bool, WorkflowError> {
        require_admin(actor)?;
        Ok(self.projects.delete(id)?)
    }

    /// Any signed-in user may edit a group's member list.
    pub fn update_members(
        &self,
        _actor: &Account,
        project_id: u64,
        members: &[String],
    ) -> Result<Project, WorkflowError> {
        self.projects
            .set_members(project_id, members)?
            .ok_or(WorkflowError::NotFound("project"))
    }

    // ============ SUBMISSIONS ============

    /// Hand in work for a project
    ///
    /// # Arguments
    /// * `actor` - The submitting student
    /// * `project_id` - Project the work belongs to
    /// * `draft` - PDF, description and optional link/notes
    ///
    /// # Returns
    /// * `Result<Submission, WorkflowError>` - The stored submission, pending review
    ///
    /// # Errors
    /// * `Forbidden` if the actor is not a student
    /// * `MissingField` if the student has no student id, or the PDF or description is missing
    /// * `InvalidAttachment` if the PDF cannot be decoded
    /// * `AlreadySubmitted` if the student already has a submission for the project
    pub fn submit_work(
        &self,
        actor: &Account,
        project_id: u64,
        draft: SubmissionDraft,
    ) -> Result<Submission, WorkflowError> {
        require_student(actor)?;
        let student_id = student_id_of(actor)?.to_string();
        let project = self
            .projects
            .get(project_id)?
            .ok_or(WorkflowError::NotFound("project"))?;

        let pdf_file = draft
            .pdf_file
            .as_deref()
            .map(str::trim)
            .filter(|pdf| !pdf.is_empty())
            .ok_or(WorkflowError::MissingField("pdfFile"))?;
        let pdf_bytes = decode_pdf_data_url(pdf_file)?;
        let description = non_blank(&draft.description, "description")?;

        let submission = Submission {
            id: 0,
            project_id,
            project_title: project.title,
            course: project.course,
            student_name: actor.display_name().to_string(),
            student_id,
            submitted_date: Utc::now().format("%Y-%m-%d").to_string(),
            status: SubmissionStatus::PendingReview,
            grade: None,
            feedback: None,
            pdf_file: Some(pdf_file.to_string()),
            pdf_file_name: draft.pdf_file_name.trim().to_string(),
            project_link: draft.project_link.trim().to_string(),
            description,
            notes: draft.notes.trim().to_string(),
            extra: Map::new(),
        };

        match self.submissions.create_unique(submission) {
            Ok(stored) => {
                info!(
                    "student {} submitted {} byte(s) for project {}",
                    stored.student_id,
                    pdf_bytes.len(),
                    project_id
                );
                Ok(stored)
            }
            Err(StoreError::DuplicateSubmission) => Err(WorkflowError::AlreadySubmitted),
            Err(e) => Err(e.into()),
        }
    }

    /// Withdraw a submission. Only pending or rejected work can be withdrawn.
    pub fn delete_submission(&self, actor: &Account, id: u64) -> Result<(), WorkflowError> {
        require_student(actor)?;
        let student_id = student_id_of(actor)?;

        let deleted = self.submissions.delete_if(id, |submission| {
            if submission.student_id != student_id {
                return Err(WorkflowError::Forbidden(
                    "only the submitting student may delete a submission",
                ));
            }
            if !submission.status.allows_delete() {
                return Err(WorkflowError::SubmissionLocked(submission.status));
            }
            Ok(())
        })?;

        if !deleted {
            return Err(WorkflowError::NotFound("submission"));
        }
        Ok(())
    }

    /// Accept, reject or grade a submission.
    pub fn review_submission(
        &self,
        actor: &Account,
        id: u64,
        review: Review,
    ) -> Result<Submission, WorkflowError> {
        require_admin(actor)?;
        if !review.status.is_reviewed() {
            return Err(WorkflowError::InvalidStatusChange(review.status));
        }

        let mut patch = Map::new();
        patch.insert("status".to_string(), json!(review.status));
        if let Some(grade) = review.grade {
            patch.insert("grade".to_string(), json!(grade));
        }
        if let Some(feedback) = review.feedback {
            patch.insert("feedback".to_string(), json!(feedback));
        }

        let updated = self
            .submissions
            .update(id, &patch)?
            .ok_or(WorkflowError::NotFound("submission"))?;
        info!("{} marked submission {} as {}", actor.email, id, updated.status);
        Ok(updated)
    }

    // ============ TASKS ============

    pub fn create_task(
        &self,
        actor: &Account,
        project_id: u64,
        draft: TaskDraft,
    ) -> Result<Task, WorkflowError> {
        if self.projects.get(project_id)?.is_none() {
            return Err(WorkflowError::NotFound("project"));
        }

        let title = non_blank(&draft.title, "title")?;
        let assignee = if draft.assignee.trim().is_empty() {
            non_blank(actor.display_name(), "assignee")?
        } else {
            draft.assignee.trim().to_string()
        };
        let due_date = non_blank(&draft.due_date, "dueDate")?;

        let task = Task {
            id: 0,
            project_id,
            title,
            description: draft.description.trim().to_string(),
            assignee,
            priority: draft.priority,
            due_date,
            status: draft.status,
            created_by: actor.display_name().to_string(),
            extra: Map::new(),
        };
        Ok(self.tasks.create(task)?)
    }

    /// Only the assignee or an admin may move a task.
    pub fn update_task_status(
        &self,
        actor: &Account,
        task_id: u64,
        status: TaskStatus,
    ) -> Result<Task, WorkflowError> {
        let mut patch = Map::new();
        patch.insert("status".to_string(), json!(status));
        self.tasks
            .update_if(task_id, &patch, |task| {
                if !actor.is_admin() && task.assignee != actor.display_name() {
                    return Err(WorkflowError::Forbidden(
                        "only the assignee or an admin may change a task",
                    ));
                }
                Ok(())
            })?
            .ok_or(WorkflowError::NotFound("task"))
    }

    // ============ MESSAGES ============

    fn channel_project(&self, actor: &Account, project_id: u64) -> Result<Project, WorkflowError> {
        let project = self
            .projects
            .get(project_id)?
            .ok_or(WorkflowError::NotFound("project"))?;
        if !actor.is_admin() && !project.has_member(actor.display_name()) {
            return Err(WorkflowError::Forbidden(
                "only group members and admins may use this channel",
            ));
        }
        Ok(project)
    }

    pub fn post_message(
        &self,
        actor: &Account,
        project_id: u64,
        text: &str,
    ) -> Result<Message, WorkflowError> {
        self.channel_project(actor, project_id)?;
        let message = Message {
            id: 0,
            project_id,
            sender: actor.display_name().to_string(),
            text: non_blank(text, "text")?,
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            extra: Map::new(),
        };
        Ok(self.messages.create(message)?)
    }

    pub fn project_messages(
        &self,
        actor: &Account,
        project_id: u64,
    ) -> Result<Vec<Message>, WorkflowError> {
        self.channel_project(actor, project_id)?;
        Ok(self.messages.for_project(project_id)?)
    }

    // ============ DASHBOARD ============

    /// Everything the student dashboard shows for one student.
    pub fn student_overview(&self, actor: &Account) -> Result<StudentOverview, WorkflowError> {
        require_student(actor)?;
        let student_id = actor.student_id.as_deref().unwrap_or_default();
        let name = actor.display_name();

        let projects = self.projects.list()?;
        let submissions = self.submissions.list()?;
        let tasks = self.tasks.list()?;

        let team_members = projects
            .iter()
            .flat_map(|p| p.group_members.iter())
            .collect::<BTreeSet<_>>()
            .len();

        let cards = projects
            .into_iter()
            .map(|project| {
                let submission = submissions
                    .iter()
                    .find(|s| {
                        s.project_id == project.id
                            && !student_id.is_empty()
                            && s.student_id == student_id
                    })
                    .cloned();
                let project_tasks: Vec<&Task> =
                    tasks.iter().filter(|t| t.project_id == project.id).collect();
                ProjectCard {
                    can_delete_submission: submission
                        .as_ref()
                        .is_some_and(|s| s.status.allows_delete()),
                    tasks_completed: project_tasks
                        .iter()
                        .filter(|t| t.status == TaskStatus::Completed)
                        .count(),
                    tasks_total: project_tasks.len(),
                    submission,
                    project,
                }
            })
            .collect();

        let my_tasks: Vec<Task> = tasks.into_iter().filter(|t| t.assignee == name).collect();
        let completed_tasks = my_tasks
            .iter()
            .filter(|t| t.status == TaskStatus::Completed)
            .count();

        Ok(StudentOverview {
            projects: cards,
            pending_tasks: my_tasks.len() - completed_tasks,
            completed_tasks,
            my_tasks,
            team_members,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attachment::encode_pdf_data_url;
    use crate::repository::decode;
    use crate::storage::SqliteStore;

    fn tracker() -> Tracker {
        Tracker::open(Arc::new(SqliteStore::in_memory().unwrap()), IdStrategy::Sequential).unwrap()
    }

    fn admin(t: &Tracker) -> Account {
        t.login("ramcharan123@gmail.com", "1234").unwrap()
    }

    fn seeded_student(t: &Tracker) -> Account {
        t.login("2400030525@kluniversity.in", "12345").unwrap()
    }

    fn project(t: &Tracker, members: &[&str]) -> Project {
        let draft = decode(json!({
            "title": "Library system",
            "course": "FEDF",
            "status": "In Progress",
            "dueDate": "2099-12-31",
            "groupMembers": members
        }))
        .unwrap();
        t.create_project(&admin(t), draft).unwrap()
    }

    fn draft() -> SubmissionDraft {
        SubmissionDraft {
            description: "  final report ".to_string(),
            pdf_file: Some(encode_pdf_data_url(b"%PDF-1.7 body")),
            pdf_file_name: "report.pdf".to_string(),
            ..SubmissionDraft::default()
        }
    }

    #[test]
    fn test_open_seeds_once() {
        let store: Arc<dyn RecordStore> = Arc::new(SqliteStore::in_memory().unwrap());
        Tracker::open(store.clone(), IdStrategy::Sequential).unwrap();
        let t = Tracker::open(store, IdStrategy::Sequential).unwrap();
        assert_eq!(t.accounts.list().unwrap().len(), 4);
    }

    #[test]
    fn test_login() {
        let t = tracker();
        assert!(admin(&t).is_admin());
        assert!(matches!(
            t.login("ramcharan123@gmail.com", "nope"),
            Err(WorkflowError::InvalidCredentials)
        ));
    }

    #[test]
    fn test_register_and_complete_profile() {
        let t = tracker();
        let account = decode(json!({"email": "new@x.com", "password": "pw", "userType": "admin"}))
            .unwrap();
        let created = t.register(UserType::Student, account).unwrap();
        assert_eq!(created.user_type, UserType::Student);
        assert!(!created.profile_complete);

        let profile = json!({"fullName": "New Kid", "studentId": "S-9", "userType": "admin"});
        let done = t
            .complete_profile("new@x.com", profile.as_object().unwrap())
            .unwrap();
        assert!(done.profile_complete);
        assert_eq!(done.user_type, UserType::Student);
        assert_eq!(done.extra.get("averageGrade"), Some(&Value::Null));

        assert!(matches!(
            t.complete_profile("ghost@x.com", profile.as_object().unwrap()),
            Err(WorkflowError::NotFound(_))
        ));
    }

    #[test]
    fn test_only_admins_manage_projects() {
        let t = tracker();
        let student = seeded_student(&t);
        let draft: Project = decode(json!({"title": "x"})).unwrap();
        assert!(matches!(
            t.create_project(&student, draft),
            Err(WorkflowError::Forbidden(_))
        ));

        let created = project(&t, &[]);
        assert!(matches!(
            t.delete_project(&student, created.id),
            Err(WorkflowError::Forbidden(_))
        ));
        assert!(t.delete_project(&admin(&t), created.id).unwrap());
    }

    #[test]
    fn test_admin_creates_student_account() {
        let t = tracker();
        let account: Account =
            decode(json!({"email": "bulk@x.com", "password": "p", "userType": "admin"})).unwrap();
        assert!(t.create_student_account(&seeded_student(&t), account.clone()).is_err());

        let created = t.create_student_account(&admin(&t), account).unwrap();
        assert_eq!(created.user_type, UserType::Student);
        assert!(created.profile_complete);
    }

    #[test]
    fn test_second_submission_is_blocked() {
        let t = tracker();
        let student = seeded_student(&t);
        let p = project(&t, &["John Doe"]);

        let first = t.submit_work(&student, p.id, draft()).unwrap();
        assert_eq!(first.description, "final report");
        assert_eq!(first.student_name, "John Doe");
        assert_eq!(first.project_title, "Library system");

        assert!(matches!(
            t.submit_work(&student, p.id, draft()),
            Err(WorkflowError::AlreadySubmitted)
        ));
        assert_eq!(t.submissions.list().unwrap().len(), 1);
    }

    #[test]
    fn test_submission_requires_pdf_and_description() {
        let t = tracker();
        let student = seeded_student(&t);
        let p = project(&t, &[]);

        let no_pdf = SubmissionDraft {
            pdf_file: None,
            ..draft()
        };
        assert!(matches!(
            t.submit_work(&student, p.id, no_pdf),
            Err(WorkflowError::MissingField("pdfFile"))
        ));

        let not_pdf = SubmissionDraft {
            pdf_file: Some("data:text/plain;base64,aGVsbG8=".to_string()),
            ..draft()
        };
        assert!(matches!(
            t.submit_work(&student, p.id, not_pdf),
            Err(WorkflowError::InvalidAttachment(_))
        ));

        let blank = SubmissionDraft {
            description: "   ".to_string(),
            ..draft()
        };
        assert!(matches!(
            t.submit_work(&student, p.id, blank),
            Err(WorkflowError::MissingField("description"))
        ));

        assert!(matches!(
            t.submit_work(&admin(&t), p.id, draft()),
            Err(WorkflowError::Forbidden(_))
        ));
        assert!(matches!(
            t.submit_work(&student, 999, draft()),
            Err(WorkflowError::NotFound("project"))
        ));
    }

    #[test]
    fn test_delete_rules() {
        let t = tracker();
        let student = seeded_student(&t);
        let admin = admin(&t);
        let p = project(&t, &[]);
        let submission = t.submit_work(&student, p.id, draft()).unwrap();

        // Someone else's work
        let mut other = student.clone();
        other.student_id = Some("999".to_string());
        assert!(matches!(
            t.delete_submission(&other, submission.id),
            Err(WorkflowError::Forbidden(_))
        ));

        for status in [SubmissionStatus::Accepted, SubmissionStatus::Graded] {
            let review = Review {
                status,
                grade: None,
                feedback: None,
            };
            t.review_submission(&admin, submission.id, review).unwrap();
            assert!(matches!(
                t.delete_submission(&student, submission.id),
                Err(WorkflowError::SubmissionLocked(s)) if s == status
            ));
        }

        let review = Review {
            status: SubmissionStatus::Rejected,
            grade: None,
            feedback: Some("Missing diagrams".to_string()),
        };
        t.review_submission(&admin, submission.id, review).unwrap();
        t.delete_submission(&student, submission.id).unwrap();
        assert!(t.submissions.list().unwrap().is_empty());

        // Resubmitting after a withdrawal is allowed
        t.submit_work(&student, p.id, draft()).unwrap();
        assert!(matches!(
            t.delete_submission(&student, 12345),
            Err(WorkflowError::NotFound(_))
        ));
    }

    #[test]
    fn test_review_rules() {
        let t = tracker();
        let student = seeded_student(&t);
        let p = project(&t, &[]);
        let submission = t.submit_work(&student, p.id, draft()).unwrap();

        let graded = Review {
            status: SubmissionStatus::Graded,
            grade: Some("B+".to_string()),
            feedback: None,
        };
        assert!(matches!(
            t.review_submission(&student, submission.id, graded.clone()),
            Err(WorkflowError::Forbidden(_))
        ));

        let back_to_pending = Review {
            status: SubmissionStatus::PendingReview,
            grade: None,
            feedback: None,
        };
        assert!(matches!(
            t.review_submission(&admin(&t), submission.id, back_to_pending),
            Err(WorkflowError::InvalidStatusChange(_))
        ));

        let once = t.review_submission(&admin(&t), submission.id, graded.clone()).unwrap();
        let twice = t.review_submission(&admin(&t), submission.id, graded).unwrap();
        assert_eq!(once, twice);
        assert_eq!(twice.grade.as_deref(), Some("B+"));
    }

    #[test]
    fn test_task_rules() {
        let t = tracker();
        let student = seeded_student(&t);
        let p = project(&t, &["John Doe", "Ann"]);

        let missing_title = TaskDraft {
            due_date: "2099-01-01".to_string(),
            ..TaskDraft::default()
        };
        assert!(matches!(
            t.create_task(&student, p.id, missing_title),
            Err(WorkflowError::MissingField("title"))
        ));

        let mine = t
            .create_task(
                &student,
                p.id,
                TaskDraft {
                    title: "Schema".to_string(),
                    due_date: "2099-01-01".to_string(),
                    ..TaskDraft::default()
                },
            )
            .unwrap();
        assert_eq!(mine.assignee, "John Doe");
        assert_eq!(mine.created_by, "John Doe");
        assert_eq!(mine.status, TaskStatus::Todo);

        let anns = t
            .create_task(
                &student,
                p.id,
                TaskDraft {
                    title: "UI".to_string(),
                    assignee: "Ann".to_string(),
                    due_date: "2099-01-01".to_string(),
                    ..TaskDraft::default()
                },
            )
            .unwrap();

        let done = t
            .update_task_status(&student, mine.id, TaskStatus::Completed)
            .unwrap();
        assert_eq!(done.status, TaskStatus::Completed);
        assert!(matches!(
            t.update_task_status(&student, anns.id, TaskStatus::Completed),
            Err(WorkflowError::Forbidden(_))
        ));
        t.update_task_status(&admin(&t), anns.id, TaskStatus::InProgress)
            .unwrap();
    }

    #[test]
    fn test_message_channel_membership() {
        let t = tracker();
        let student = seeded_student(&t);
        let member_project = project(&t, &["John Doe"]);
        let other_project = project(&t, &["Ann"]);

        let posted = t
            .post_message(&student, member_project.id, " hello team ")
            .unwrap();
        assert_eq!(posted.text, "hello team");
        assert_eq!(posted.sender, "John Doe");

        assert!(matches!(
            t.post_message(&student, other_project.id, "hi"),
            Err(WorkflowError::Forbidden(_))
        ));
        assert!(matches!(
            t.post_message(&student, member_project.id, "  "),
            Err(WorkflowError::MissingField("text"))
        ));

        t.post_message(&admin(&t), other_project.id, "admin note")
            .unwrap();
        assert_eq!(
            t.project_messages(&student, member_project.id).unwrap().len(),
            1
        );
        assert!(t.project_messages(&student, other_project.id).is_err());
    }

    #[test]
    fn test_update_members() {
        let t = tracker();
        let student = seeded_student(&t);
        let p = project(&t, &["John Doe"]);
        let members = vec!["John Doe".to_string(), "Priya".to_string()];
        let updated = t.update_members(&student, p.id, &members).unwrap();
        assert_eq!(updated.group_members, members);
        assert!(t.update_members(&student, 404, &members).is_err());
    }

    #[test]
    fn test_student_overview_counts() {
        let t = tracker();
        let student = seeded_student(&t);
        let first = project(&t, &["John Doe", "Ann"]);
        let _second = project(&t, &["Ann", "Bo"]);

        for (title, assignee) in [("a", "John Doe"), ("b", "John Doe"), ("c", "Ann")] {
            t.create_task(
                &student,
                first.id,
                TaskDraft {
                    title: title.to_string(),
                    assignee: assignee.to_string(),
                    due_date: "2099-01-01".to_string(),
                    ..TaskDraft::default()
                },
            )
            .unwrap();
        }
        let my_first = t.tasks.for_assignee("John Doe").unwrap()[0].id;
        t.update_task_status(&student, my_first, TaskStatus::Completed)
            .unwrap();
        t.submit_work(&student, first.id, draft()).unwrap();

        let overview = t.student_overview(&student).unwrap();
        assert_eq!(overview.projects.len(), 2);
        assert_eq!(overview.my_tasks.len(), 2);
        assert_eq!(overview.completed_tasks, 1);
        assert_eq!(overview.pending_tasks, 1);
        assert_eq!(overview.team_members, 3);

        let card = &overview.projects[0];
        assert_eq!(card.tasks_total, 3);
        assert_eq!(card.tasks_completed, 1);
        assert!(card.submission.is_some());
        assert!(card.can_delete_submission);
        assert!(overview.projects[1].submission.is_none());
    }
}
