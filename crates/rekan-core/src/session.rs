//! One student's exam session: questions, answers, navigation, timer, and
//! the finalize guard.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::answers::{check_input, AnswerStore};
use crate::error::{AnswerError, StoreError, SubmissionError};
use crate::gatekeeper::{
    ComputedResult, FinalizedSubmission, Gatekeeper, NoopObserver, SubmissionObserver,
};
use crate::model::{ExamKey, Question, StudentIdentity};
use crate::navigation::Navigator;
use crate::scoring::{score_session, ScoreSummary};
use crate::timer::{self, Countdown, SessionTimer, SharedTimer};
use crate::traits::QuestionStore;

/// Grid status of one question. Earlier variants win.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuestionStatus {
    Current,
    Answered,
    Flagged,
    Untouched,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Progress {
    pub total: usize,
    pub answered: usize,
    pub unanswered: usize,
    pub flagged: usize,
}

#[derive(Debug)]
pub struct ExamSession {
    exam: ExamKey,
    questions: Vec<Question>,
    answers: AnswerStore,
    navigator: Navigator,
    timer: SharedTimer,
    attempt_token: Uuid,
    finalized: Option<FinalizedSubmission>,
}

impl ExamSession {
    /// A fresh session with the default budget for the exam's kind.
    pub fn new(exam: ExamKey, questions: Vec<Question>) -> Self {
        Self::with_timer(exam, questions, SessionTimer::for_kind(exam.kind()))
    }

    pub fn with_timer(exam: ExamKey, questions: Vec<Question>, timer: SessionTimer) -> Self {
        let navigator = Navigator::new(questions.len());
        Self {
            exam,
            questions,
            answers: AnswerStore::new(),
            navigator,
            timer: timer::shared(timer),
            attempt_token: Uuid::new_v4(),
            finalized: None,
        }
    }

    /// Fetch the exam's questions and open a session on them.
    pub async fn load(store: &dyn QuestionStore, exam: ExamKey) -> Result<Self, StoreError> {
        let questions = store.fetch_questions(&exam).await?;
        if questions.is_empty() {
            tracing::info!(%exam, "no questions authored for this exam yet");
        } else {
            tracing::debug!(%exam, count = questions.len(), "questions loaded");
        }
        Ok(Self::new(exam, questions))
    }

    pub fn exam(&self) -> ExamKey {
        self.exam
    }

    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    /// Nothing authored for this exam; show an empty state.
    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }

    pub fn question(&self, index: usize) -> Option<&Question> {
        self.questions.get(index)
    }

    pub fn current_question(&self) -> Option<&Question> {
        self.questions.get(self.navigator.current())
    }

    pub fn answers(&self) -> &AnswerStore {
        &self.answers
    }

    pub fn navigator(&self) -> &Navigator {
        &self.navigator
    }

    pub fn navigator_mut(&mut self) -> &mut Navigator {
        &mut self.navigator
    }

    pub fn attempt_token(&self) -> Uuid {
        self.attempt_token
    }

    /// Apply a raw input to question `index`, interpreted by its type.
    pub fn set_answer(&mut self, index: usize, raw: &str) -> Result<(), AnswerError> {
        let question = self
            .questions
            .get(index)
            .ok_or(AnswerError::UnknownQuestion(index))?;
        check_input(question, raw)?;
        self.answers.set_answer(index, question.question_type, raw)
    }

    pub fn answer_current(&mut self, raw: &str) -> Result<(), AnswerError> {
        self.set_answer(self.navigator.current(), raw)
    }

    pub fn is_answered(&self, index: usize) -> bool {
        self.questions
            .get(index)
            .is_some_and(|q| self.answers.is_answered(index, q))
    }

    pub fn question_status(&self, index: usize) -> QuestionStatus {
        if index == self.navigator.current() {
            QuestionStatus::Current
        } else if self.is_answered(index) {
            QuestionStatus::Answered
        } else if self.navigator.is_flagged(index) {
            QuestionStatus::Flagged
        } else {
            QuestionStatus::Untouched
        }
    }

    pub fn progress(&self) -> Progress {
        let answered = self.answers.answered_count(&self.questions);
        Progress {
            total: self.questions.len(),
            answered,
            unanswered: self.questions.len() - answered,
            flagged: self.navigator.flagged_count(),
        }
    }

    pub fn timer(&self) -> SessionTimer {
        timer::snapshot(&self.timer)
    }

    /// Start the once-per-second countdown on this session's timer.
    pub fn start_countdown(&self) -> Countdown {
        Countdown::spawn(self.timer.clone())
    }

    pub fn score(&self) -> ScoreSummary {
        score_session(&self.questions, &self.answers)
    }

    /// Score fields plus elapsed time, as handed to the gatekeeper.
    pub fn computed_result(&self) -> ComputedResult {
        let summary = self.score();
        ComputedResult::from_summary(
            self.exam,
            &summary,
            self.timer().elapsed_secs(),
            self.attempt_token,
        )
    }

    pub fn finalized(&self) -> Option<&FinalizedSubmission> {
        self.finalized.as_ref()
    }

    pub async fn submit(
        &mut self,
        gatekeeper: &Gatekeeper,
        license_code: &str,
        identity: &StudentIdentity,
    ) -> Result<FinalizedSubmission, SubmissionError> {
        self.submit_with(gatekeeper, license_code, identity, &NoopObserver)
            .await
    }

    /// Finalize once. After success the cached result is returned without
    /// touching storage; after a failure the same attempt token is retried.
    pub async fn submit_with(
        &mut self,
        gatekeeper: &Gatekeeper,
        license_code: &str,
        identity: &StudentIdentity,
        observer: &dyn SubmissionObserver,
    ) -> Result<FinalizedSubmission, SubmissionError> {
        if let Some(done) = &self.finalized {
            return Ok(done.clone());
        }
        let computed = self.computed_result();
        let finalized = gatekeeper
            .finalize_with(license_code, identity, &computed, observer)
            .await?;
        self.finalized = Some(finalized.clone());
        Ok(finalized)
    }
}
