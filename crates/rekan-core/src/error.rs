//! Error types for the exam engine.
//!
//! `StoreError` represents failures talking to an external collaborator. It is
//! defined here so the gatekeeper can classify failures for retry decisions
//! without string matching. `SubmissionError` is what `finalize` reports to the
//! caller; every variant maps onto an [`ErrorKind`].

use thiserror::Error;

use crate::model::Level;

/// The user-facing failure taxonomy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    MissingIdentity,
    DuplicateSubmission,
    LicenseNotFound,
    LicenseLevelMismatch,
    QuotaExceeded,
    StorageUnavailable,
    MalformedAnswerKey,
}

/// Errors that can occur when talking to a question, result, or license store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The store could not be reached.
    #[error("store unreachable: {0}")]
    Unreachable(String),

    /// The request timed out.
    #[error("store request timed out after {0}s")]
    Timeout(u64),

    /// The store rejected the request.
    #[error("store rejected request (HTTP {status}): {message}")]
    Rejected { status: u16, message: String },

    /// The store answered with data we could not decode.
    #[error("failed to decode store response: {0}")]
    Decode(String),

    /// Local persistence (file store) failed.
    #[error("storage I/O error: {0}")]
    Io(String),
}

impl StoreError {
    /// Returns `true` if retrying the same request may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            StoreError::Unreachable(_) | StoreError::Timeout(_) | StoreError::Io(_) => true,
            StoreError::Rejected { status, .. } => *status >= 500 || *status == 429,
            StoreError::Decode(_) => false,
        }
    }
}

/// Reasons `finalize` refuses a submission.
#[derive(Debug, Error)]
pub enum SubmissionError {
    /// Student name or class code is blank after trimming.
    #[error("missing identity: {field} must not be blank")]
    MissingIdentity { field: &'static str },

    /// This student already completed this subject and package under this license.
    #[error("{student_name} ({class_code}) already submitted {exam}")]
    DuplicateSubmission {
        student_name: String,
        class_code: String,
        exam: String,
    },

    /// The license code does not exist.
    #[error("license not found: {0}")]
    LicenseNotFound(String),

    /// The license exists but was issued for another level.
    #[error("license {code} is for {actual}, not {expected}")]
    LicenseLevelMismatch {
        code: String,
        expected: Level,
        actual: Level,
    },

    /// Every seat of the license is taken.
    #[error("license {code} has no seats left ({total_quota} used)")]
    QuotaExceeded { code: String, total_quota: u32 },

    /// A collaborator failed at some step.
    #[error("storage unavailable: {0}")]
    StorageUnavailable(#[from] StoreError),
}

impl SubmissionError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SubmissionError::MissingIdentity { .. } => ErrorKind::MissingIdentity,
            SubmissionError::DuplicateSubmission { .. } => ErrorKind::DuplicateSubmission,
            SubmissionError::LicenseNotFound(_) => ErrorKind::LicenseNotFound,
            SubmissionError::LicenseLevelMismatch { .. } => ErrorKind::LicenseLevelMismatch,
            SubmissionError::QuotaExceeded { .. } => ErrorKind::QuotaExceeded,
            SubmissionError::StorageUnavailable(_) => ErrorKind::StorageUnavailable,
        }
    }

    /// Storage failures are safe to retry; everything else needs different input.
    pub fn is_retryable(&self) -> bool {
        matches!(self, SubmissionError::StorageUnavailable(_))
    }
}

/// Rejected raw input to the answer store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AnswerError {
    #[error("no question at index {0}")]
    UnknownQuestion(usize),

    #[error("answer input must not be empty")]
    EmptyInput,

    /// TRUE_FALSE_SET input is not a `statementKey:TRUE|FALSE` token.
    #[error("invalid statement token '{0}', expected KEY:TRUE or KEY:FALSE")]
    InvalidStatementToken(String),

    /// The option or statement key is not part of the question.
    #[error("question has no option '{0}'")]
    UnknownOption(String),
}

/// An answer key that does not parse for its question type.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AnswerKeyError {
    #[error("answer key is empty")]
    Empty,

    #[error("malformed pair '{0}', expected KEY:VALUE")]
    MalformedPair(String),

    #[error("invalid verdict '{0}', expected TRUE or FALSE")]
    InvalidVerdict(String),

    #[error("invalid weight '{0}'")]
    InvalidWeight(String),

    #[error("key '{0}' appears more than once")]
    DuplicateKey(String),
}
