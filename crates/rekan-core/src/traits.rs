//! Collaborator contracts for question, result, and license storage.
//!
//! These async traits are implemented by the `rekan-store` crate. Every call
//! is one round trip; the engine does no retrying of its own.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::model::{ExamKey, LicenseQuota, Question, ResultQuery, SeatKey, SubmissionRecord};

// ---------------------------------------------------------------------------
// Question store
// ---------------------------------------------------------------------------

/// Source of question packages.
#[async_trait]
pub trait QuestionStore: Send + Sync {
    /// Human-readable backend name (e.g. "rest").
    fn name(&self) -> &str;

    /// Ordered questions for one exam. An empty list means "not yet authored".
    async fn fetch_questions(&self, exam: &ExamKey) -> Result<Vec<Question>, StoreError>;
}

// ---------------------------------------------------------------------------
// Result store
// ---------------------------------------------------------------------------

/// Outcome of a conditional insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InsertOutcome {
    Inserted,
    /// A record for the same student, class, license, subject and package already exists.
    Duplicate,
}

/// Append-only store of submission records.
#[async_trait]
pub trait ResultStore: Send + Sync {
    /// Prior records matching `query`. Names match case-insensitively.
    async fn find_results(&self, query: &ResultQuery)
        -> Result<Vec<SubmissionRecord>, StoreError>;

    /// Insert `record` unless one already exists for its student and exam.
    async fn insert_result(&self, record: &SubmissionRecord)
        -> Result<InsertOutcome, StoreError>;

    /// Every record of one class under one license, for reporting.
    async fn class_results(
        &self,
        license_code: &str,
        class_code: &str,
    ) -> Result<Vec<SubmissionRecord>, StoreError>;
}

// ---------------------------------------------------------------------------
// License store
// ---------------------------------------------------------------------------

/// Outcome of an atomic seat claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "status")]
pub enum SeatClaim {
    /// A new seat was taken; `used_count` is the value after the increment.
    Claimed { used_count: u32, total_quota: u32 },
    /// This seat was taken before; nothing changed.
    AlreadyHeld { used_count: u32, total_quota: u32 },
    /// No seats left; nothing changed.
    Exhausted { total_quota: u32 },
    NotFound,
}

/// License quota storage.
///
/// `claim_seat` must be a single atomic operation: it increments `used_count`
/// only while it is below `total_quota`, and only once per seat.
#[async_trait]
pub trait LicenseStore: Send + Sync {
    async fn read_license(&self, code: &str) -> Result<Option<LicenseQuota>, StoreError>;

    async fn claim_seat(&self, code: &str, seat: &SeatKey) -> Result<SeatClaim, StoreError>;
}

/// The three collaborators a session needs, usually backed by one store.
#[derive(Clone)]
pub struct Stores {
    pub questions: Arc<dyn QuestionStore>,
    pub results: Arc<dyn ResultStore>,
    pub licenses: Arc<dyn LicenseStore>,
}

impl Stores {
    /// Use one backend for all three roles.
    pub fn from_backend<B>(backend: Arc<B>) -> Self
    where
        B: QuestionStore + ResultStore + LicenseStore + 'static,
    {
        Self {
            questions: backend.clone(),
            results: backend.clone(),
            licenses: backend,
        }
    }

    pub fn name(&self) -> &str {
        self.questions.name()
    }
}

impl std::fmt::Debug for Stores {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Stores")
            .field("backend", &self.name())
            .finish()
    }
}
