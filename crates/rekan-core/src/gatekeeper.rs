//! Submission gatekeeper.
//!
//! Turns a computed session result into exactly one persisted
//! [`SubmissionRecord`], consuming at most one license seat per student.
//!
//! States: `Idle -> Validating -> CheckingDuplicate -> CheckingQuota ->
//! IncrementingQuota -> Persisting -> Done`, with `Failed` reachable from
//! every step. The two quota states are skipped for returning students.
//!
//! Concurrency: the seat claim is one atomic, seat-idempotent store
//! operation and the result insert is conditional. Two racing finalize calls
//! for one student and exam therefore persist at most one record and take at
//! most one seat, and a retry after a failed insert reuses the seat it
//! already holds.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::SubmissionError;
use crate::model::{
    normalize_code, ExamKey, Level, LicenseQuota, ResultQuery, SeatKey, StudentIdentity,
    SubmissionRecord,
};
use crate::scoring::ScoreSummary;
use crate::traits::{InsertOutcome, LicenseStore, ResultStore, SeatClaim, Stores};

/// Where a finalize call currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionState {
    Idle,
    Validating,
    CheckingDuplicate,
    CheckingQuota,
    IncrementingQuota,
    Persisting,
    Done,
    Failed,
}

impl fmt::Display for SubmissionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SubmissionState::Idle => "idle",
            SubmissionState::Validating => "validating identity",
            SubmissionState::CheckingDuplicate => "checking previous submissions",
            SubmissionState::CheckingQuota => "checking license quota",
            SubmissionState::IncrementingQuota => "claiming license seat",
            SubmissionState::Persisting => "saving result",
            SubmissionState::Done => "done",
            SubmissionState::Failed => "failed",
        };
        write!(f, "{s}")
    }
}

/// Observer of gatekeeper transitions.
pub trait SubmissionObserver: Send + Sync {
    fn on_state(&self, state: SubmissionState);
    fn on_done(&self, finalized: &FinalizedSubmission);
    fn on_failed(&self, error: &SubmissionError);
}

/// Observer that ignores everything.
pub struct NoopObserver;

impl SubmissionObserver for NoopObserver {
    fn on_state(&self, _: SubmissionState) {}
    fn on_done(&self, _: &FinalizedSubmission) {}
    fn on_failed(&self, _: &SubmissionError) {}
}

/// Score fields of a finished session, ready to be persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComputedResult {
    pub exam: ExamKey,
    /// Shared by every finalize attempt of one session.
    pub attempt_token: Uuid,
    pub score_percent: u32,
    pub earned_score: u32,
    pub max_score: u32,
    pub correct_count: u32,
    pub question_count: u32,
    pub elapsed_seconds: u32,
    #[serde(default)]
    pub topic_weakness: BTreeMap<String, Vec<usize>>,
}

impl ComputedResult {
    pub fn from_summary(
        exam: ExamKey,
        summary: &ScoreSummary,
        elapsed_seconds: u32,
        attempt_token: Uuid,
    ) -> Self {
        Self {
            exam,
            attempt_token,
            score_percent: summary.score_percent,
            earned_score: summary.earned_score,
            max_score: summary.max_score,
            correct_count: summary.correct_count,
            question_count: summary.question_count,
            elapsed_seconds,
            topic_weakness: summary.topic_weakness.clone(),
        }
    }
}

/// Whether the student already had results under the license.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StudentStatus {
    New,
    Returning,
}

/// What a successful finalize returns for display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinalizedSubmission {
    pub record: SubmissionRecord,
    pub student_status: StudentStatus,
    /// The seat claim, for new students.
    pub seat: Option<SeatClaim>,
}

/// Validates and persists submissions against the result and license stores.
#[derive(Clone)]
pub struct Gatekeeper {
    results: Arc<dyn ResultStore>,
    licenses: Arc<dyn LicenseStore>,
}

impl Gatekeeper {
    pub fn new(results: Arc<dyn ResultStore>, licenses: Arc<dyn LicenseStore>) -> Self {
        Self { results, licenses }
    }

    pub fn from_stores(stores: &Stores) -> Self {
        Self::new(Arc::clone(&stores.results), Arc::clone(&stores.licenses))
    }

    /// Check that a license exists and belongs to `level`.
    pub async fn activate(&self, code: &str, level: Level) -> Result<LicenseQuota, SubmissionError> {
        let code = normalize_code(code);
        if code.is_empty() {
            return Err(SubmissionError::LicenseNotFound(code));
        }
        let license = self
            .licenses
            .read_license(&code)
            .await?
            .ok_or_else(|| SubmissionError::LicenseNotFound(code.clone()))?;
        check_level(&license, level)?;
        tracing::info!(
            license = %license.code,
            %level,
            remaining = license.remaining(),
            "license activated"
        );
        Ok(license)
    }

    /// Finalize without observing transitions.
    pub async fn finalize(
        &self,
        license_code: &str,
        identity: &StudentIdentity,
        result: &ComputedResult,
    ) -> Result<FinalizedSubmission, SubmissionError> {
        self.finalize_with(license_code, identity, result, &NoopObserver)
            .await
    }

    /// Run the full finalize sequence, reporting each state to `observer`.
    pub async fn finalize_with(
        &self,
        license_code: &str,
        identity: &StudentIdentity,
        result: &ComputedResult,
        observer: &dyn SubmissionObserver,
    ) -> Result<FinalizedSubmission, SubmissionError> {
        match self.run(license_code, identity, result, observer).await {
            Ok(finalized) => {
                observer.on_state(SubmissionState::Done);
                observer.on_done(&finalized);
                tracing::info!(
                    student = %finalized.record.student_name,
                    class = %finalized.record.class_code,
                    exam = %result.exam,
                    score = finalized.record.score_percent,
                    "submission finalized"
                );
                Ok(finalized)
            }
            Err(e) => {
                observer.on_state(SubmissionState::Failed);
                observer.on_failed(&e);
                if e.is_retryable() {
                    tracing::warn!(exam = %result.exam, "submission failed, retry possible: {e}");
                } else {
                    tracing::info!(exam = %result.exam, "submission refused: {e}");
                }
                Err(e)
            }
        }
    }

    async fn run(
        &self,
        license_code: &str,
        identity: &StudentIdentity,
        result: &ComputedResult,
        observer: &dyn SubmissionObserver,
    ) -> Result<FinalizedSubmission, SubmissionError> {
        observer.on_state(SubmissionState::Validating);
        let identity = identity.normalized();
        if identity.student_name.is_empty() {
            return Err(SubmissionError::MissingIdentity {
                field: "student_name",
            });
        }
        if identity.class_code.is_empty() {
            return Err(SubmissionError::MissingIdentity {
                field: "class_code",
            });
        }
        let license_code = normalize_code(license_code);
        if license_code.is_empty() {
            return Err(SubmissionError::LicenseNotFound(license_code));
        }

        observer.on_state(SubmissionState::CheckingDuplicate);
        let exam_query = ResultQuery::for_exam(&license_code, &identity, result.exam);
        let student_query = ResultQuery::for_student(&license_code, &identity);
        let (same_exam, any_exam) = futures::future::try_join(
            self.results.find_results(&exam_query),
            self.results.find_results(&student_query),
        )
        .await?;

        if !same_exam.is_empty() {
            return Err(duplicate(&identity, result.exam));
        }

        let (student_status, seat) = if any_exam.is_empty() {
            observer.on_state(SubmissionState::CheckingQuota);
            let license = self
                .licenses
                .read_license(&license_code)
                .await?
                .ok_or_else(|| SubmissionError::LicenseNotFound(license_code.clone()))?;
            check_level(&license, result.exam.level)?;

            observer.on_state(SubmissionState::IncrementingQuota);
            let seat_key = SeatKey::new(&license_code, &identity);
            let claim = self.licenses.claim_seat(&license_code, &seat_key).await?;
            match claim {
                SeatClaim::Claimed { used_count, total_quota } => {
                    tracing::debug!(license = %license_code, used_count, total_quota, "seat claimed");
                }
                SeatClaim::AlreadyHeld { .. } => {
                    tracing::debug!(license = %license_code, "seat already held, not counted again");
                }
                SeatClaim::Exhausted { total_quota } => {
                    return Err(SubmissionError::QuotaExceeded {
                        code: license_code,
                        total_quota,
                    });
                }
                SeatClaim::NotFound => return Err(SubmissionError::LicenseNotFound(license_code)),
            }
            (StudentStatus::New, Some(claim))
        } else {
            (StudentStatus::Returning, None)
        };

        observer.on_state(SubmissionState::Persisting);
        let record = SubmissionRecord {
            id: Uuid::new_v4(),
            attempt_token: result.attempt_token,
            license_code,
            student_name: identity.student_name.clone(),
            class_code: identity.class_code.clone(),
            level: result.exam.level,
            package_number: result.exam.package_number,
            subject: result.exam.subject,
            score_percent: result.score_percent,
            earned_score: result.earned_score,
            max_score: result.max_score,
            correct_count: result.correct_count,
            question_count: result.question_count,
            elapsed_seconds: result.elapsed_seconds,
            topic_weakness: result.topic_weakness.clone(),
            submitted_at: chrono::Utc::now(),
        };

        match self.results.insert_result(&record).await? {
            InsertOutcome::Inserted => Ok(FinalizedSubmission {
                record,
                student_status,
                seat,
            }),
            // Lost a race against a concurrent finalize for the same exam.
            InsertOutcome::Duplicate => Err(duplicate(&identity, result.exam)),
        }
    }
}

fn duplicate(identity: &StudentIdentity, exam: ExamKey) -> SubmissionError {
    SubmissionError::DuplicateSubmission {
        student_name: identity.student_name.clone(),
        class_code: identity.class_code.clone(),
        exam: exam.to_string(),
    }
}

fn check_level(license: &LicenseQuota, level: Level) -> Result<(), SubmissionError> {
    match license.level {
        Some(actual) if actual != level => Err(SubmissionError::LicenseLevelMismatch {
            code: license.code.clone(),
            expected: level,
            actual,
        }),
        _ => Ok(()),
    }
}
