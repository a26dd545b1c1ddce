//! In-memory store for tests and offline runs.
//!
//! All three contracts share one lock, so a seat claim or a conditional
//! insert is a single critical section.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use rekan_core::error::StoreError;
use rekan_core::model::{
    normalize_code, ExamKey, LicenseQuota, Question, ResultQuery, SeatKey, StudentIdentity,
    SubmissionRecord,
};
use rekan_core::traits::{InsertOutcome, LicenseStore, QuestionStore, ResultStore, SeatClaim};

/// Store operations that can be made to fail on purpose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Operation {
    FetchQuestions,
    FindResults,
    InsertResult,
    ReadLicense,
    ClaimSeat,
}

#[derive(Debug, Default)]
struct State {
    questions: Vec<Question>,
    records: Vec<SubmissionRecord>,
    licenses: BTreeMap<String, LicenseQuota>,
    seats: BTreeSet<SeatKey>,
    /// Remaining injected failures per operation.
    failures: BTreeMap<Operation, u32>,
}

/// A store that keeps everything in memory.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    state: Mutex<State>,
    claim_calls: AtomicU32,
    insert_calls: AtomicU32,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn add_questions(&self, questions: impl IntoIterator<Item = Question>) {
        self.state().questions.extend(questions);
    }

    pub fn add_license(&self, license: LicenseQuota) {
        let mut license = license;
        license.code = normalize_code(&license.code);
        self.state().licenses.insert(license.code.clone(), license);
    }

    pub fn license(&self, code: &str) -> Option<LicenseQuota> {
        self.state().licenses.get(&normalize_code(code)).cloned()
    }

    pub fn records(&self) -> Vec<SubmissionRecord> {
        self.state().records.clone()
    }

    /// Make the next `times` calls of `op` fail with `StoreError::Unreachable`.
    pub fn fail_next(&self, op: Operation, times: u32) {
        self.state().failures.insert(op, times);
    }

    pub fn claim_calls(&self) -> u32 {
        self.claim_calls.load(Ordering::Relaxed)
    }

    pub fn insert_calls(&self) -> u32 {
        self.insert_calls.load(Ordering::Relaxed)
    }

    fn check_failure(state: &mut State, op: Operation) -> Result<(), StoreError> {
        match state.failures.get_mut(&op) {
            Some(remaining) if *remaining > 0 => {
                *remaining -= 1;
                Err(StoreError::Unreachable(format!("injected failure in {op:?}")))
            }
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl QuestionStore for InMemoryStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn fetch_questions(&self, exam: &ExamKey) -> Result<Vec<Question>, StoreError> {
        let mut state = self.state();
        Self::check_failure(&mut state, Operation::FetchQuestions)?;
        Ok(state
            .questions
            .iter()
            .filter(|q| {
                q.level == exam.level
                    && q.subject == exam.subject
                    && q.package_number == exam.package_number
            })
            .cloned()
            .collect())
    }
}

#[async_trait]
impl ResultStore for InMemoryStore {
    async fn find_results(
        &self,
        query: &ResultQuery,
    ) -> Result<Vec<SubmissionRecord>, StoreError> {
        let mut state = self.state();
        Self::check_failure(&mut state, Operation::FindResults)?;
        Ok(state
            .records
            .iter()
            .filter(|r| r.matches(query))
            .cloned()
            .collect())
    }

    async fn insert_result(&self, record: &SubmissionRecord) -> Result<InsertOutcome, StoreError> {
        self.insert_calls.fetch_add(1, Ordering::Relaxed);
        let mut state = self.state();
        Self::check_failure(&mut state, Operation::InsertResult)?;

        let query = ResultQuery::for_exam(
            &record.license_code,
            &StudentIdentity::new(&record.student_name, &record.class_code),
            record.exam_key(),
        );
        if state.records.iter().any(|r| r.matches(&query)) {
            return Ok(InsertOutcome::Duplicate);
        }
        state.records.push(record.clone());
        Ok(InsertOutcome::Inserted)
    }

    async fn class_results(
        &self,
        license_code: &str,
        class_code: &str,
    ) -> Result<Vec<SubmissionRecord>, StoreError> {
        let license_code = normalize_code(license_code);
        let class_code = normalize_code(class_code);
        Ok(self
            .state()
            .records
            .iter()
            .filter(|r| {
                normalize_code(&r.license_code) == license_code
                    && normalize_code(&r.class_code) == class_code
            })
            .cloned()
            .collect())
    }
}

#[async_trait]
impl LicenseStore for InMemoryStore {
    async fn read_license(&self, code: &str) -> Result<Option<LicenseQuota>, StoreError> {
        let mut state = self.state();
        Self::check_failure(&mut state, Operation::ReadLicense)?;
        Ok(state.licenses.get(&normalize_code(code)).cloned())
    }

    async fn claim_seat(&self, code: &str, seat: &SeatKey) -> Result<SeatClaim, StoreError> {
        self.claim_calls.fetch_add(1, Ordering::Relaxed);
        let mut guard = self.state();
        Self::check_failure(&mut guard, Operation::ClaimSeat)?;
        let state = &mut *guard;
        Ok(claim_in(&mut state.licenses, &mut state.seats, code, seat))
    }
}

/// Seat claim over plain collections. Shared with the file store.
pub(crate) fn claim_in(
    licenses: &mut BTreeMap<String, LicenseQuota>,
    seats: &mut BTreeSet<SeatKey>,
    code: &str,
    seat: &SeatKey,
) -> SeatClaim {
    let Some(license) = licenses.get_mut(&normalize_code(code)) else {
        return SeatClaim::NotFound;
    };
    if seats.contains(seat) {
        return SeatClaim::AlreadyHeld {
            used_count: license.used_count,
            total_quota: license.total_quota,
        };
    }
    if license.is_exhausted() {
        return SeatClaim::Exhausted {
            total_quota: license.total_quota,
        };
    }
    license.used_count += 1;
    seats.insert(seat.clone());
    tracing::debug!(
        license = %license.code,
        used = license.used_count,
        total = license.total_quota,
        "seat claimed"
    );
    SeatClaim::Claimed {
        used_count: license.used_count,
        total_quota: license.total_quota,
    }
}
