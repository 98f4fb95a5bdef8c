use thiserror::Error;

use crate::models::SubmissionStatus;

/// Errors raised by the record stores and typed collections.
#[derive(Debug, Error)]
pub enum StoreError {
    /// An account with the same email is already registered
    #[error("Email already exists")]
    DuplicateEmail,

    /// The student already has a submission for this project
    #[error("a submission for this project already exists")]
    DuplicateSubmission,

    /// A record failed validation or could not be decoded into its type
    #[error("invalid record: {0}")]
    Invalid(String),

    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("storage encoding error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Errors raised while decoding an embedded PDF attachment.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AttachmentError {
    #[error("attachment is not a base64 PDF data URL")]
    NotPdfDataUrl,

    #[error("attachment payload is not valid base64: {0}")]
    Base64(String),

    #[error("attachment does not start with a PDF header")]
    MissingPdfHeader,
}

/// Errors raised by the workflow rules that govern who may change what.
#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("forbidden: {0}")]
    Forbidden(&'static str),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("missing required field: {0}")]
    MissingField(&'static str),

    #[error("a submission for this project already exists")]
    AlreadySubmitted,

    #[error("a submission with status '{0}' can no longer be deleted")]
    SubmissionLocked(SubmissionStatus),

    #[error("a reviewed submission cannot be moved back to '{0}'")]
    InvalidStatusChange(SubmissionStatus),

    #[error(transparent)]
    InvalidAttachment(#[from] AttachmentError),

    #[error(transparent)]
    Store(#[from] StoreError),
}
