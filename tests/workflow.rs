use serde_json::{Value, json};
use std::sync::Arc;

use tracker::attachment::encode_pdf_data_url;
use tracker::repository::{IdStrategy, decode};
use tracker::storage::{JsonFileStore, RecordStore};
use tracker::workflow::{Review, SubmissionDraft};
use tracker::{Account, SubmissionStatus, Tracker, UserType, WorkflowError};

fn open(dir: &std::path::Path) -> Tracker {
    let store: Arc<dyn RecordStore> = Arc::new(JsonFileStore::open(dir).unwrap());
    Tracker::open(store, IdStrategy::Sequential).unwrap()
}

#[test]
fn test_student_submission_is_graded_and_locked() {
    let dir = tempfile::tempdir().unwrap();
    let tracker = open(dir.path());

    // Register and set up the profile
    let account: Account =
        decode(json!({"email": "a@x.com", "password": "1", "userType": "student"})).unwrap();
    tracker.register(UserType::Student, account).unwrap();
    let profile = json!({"fullName": "Ann Lee", "studentId": "S-100", "academicYear": "2"});
    tracker
        .complete_profile("a@x.com", profile.as_object().unwrap())
        .unwrap();
    let student = tracker.login("a@x.com", "1").unwrap();
    assert!(student.profile_complete);

    // Admin creates the project
    let admin = tracker.login("anilpagadala583@gmail.com", "1234").unwrap();
    let project = tracker
        .create_project(
            &admin,
            decode(json!({
                "title": "Compiler",
                "course": "CS301",
                "dueDate": "2999-06-30",
                "groupMembers": ["Ann Lee"]
            }))
            .unwrap(),
        )
        .unwrap();

    // Student hands in a PDF with a description
    let draft = SubmissionDraft {
        description: "Lexer and parser".to_string(),
        pdf_file: Some(encode_pdf_data_url(b"%PDF-1.5\n%%EOF")),
        pdf_file_name: "compiler.pdf".to_string(),
        ..SubmissionDraft::default()
    };
    let submission = tracker.submit_work(&student, project.id, draft.clone()).unwrap();
    assert_eq!(submission.status, SubmissionStatus::PendingReview);
    assert_eq!(submission.course, "CS301");

    // A second submission for the same project is blocked
    assert!(matches!(
        tracker.submit_work(&student, project.id, draft),
        Err(WorkflowError::AlreadySubmitted)
    ));

    // Admin grades it
    tracker
        .review_submission(
            &admin,
            submission.id,
            Review {
                status: SubmissionStatus::Graded,
                grade: Some("A".to_string()),
                feedback: Some("Solid work".to_string()),
            },
        )
        .unwrap();

    // The student's view shows the grade and no delete option
    let overview = tracker.student_overview(&student).unwrap();
    let card = overview
        .projects
        .iter()
        .find(|card| card.project.id == project.id)
        .unwrap();
    let graded = card.submission.as_ref().unwrap();
    assert_eq!(graded.grade.as_deref(), Some("A"));
    assert_eq!(graded.feedback.as_deref(), Some("Solid work"));
    assert!(!card.can_delete_submission);

    assert!(matches!(
        tracker.delete_submission(&student, submission.id),
        Err(WorkflowError::SubmissionLocked(SubmissionStatus::Graded))
    ));
    assert_eq!(tracker.submissions.list().unwrap().len(), 1);
}

#[test]
fn test_state_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    {
        let tracker = open(dir.path());
        let admin = tracker.login("ramcharan123@gmail.com", "1234").unwrap();
        tracker
            .create_project(&admin, decode(json!({"title": "Persisted"})).unwrap())
            .unwrap();
    }

    let tracker = open(dir.path());
    assert_eq!(tracker.accounts.list().unwrap().len(), 4);
    assert_eq!(tracker.projects.list().unwrap()[0].title, "Persisted");

    let raw: Value = serde_json::from_str(
        &std::fs::read_to_string(dir.path().join("accounts.json")).unwrap(),
    )
    .unwrap();
    assert_eq!(raw[0]["email"], "ramcharan123@gmail.com");
}
