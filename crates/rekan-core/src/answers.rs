//! The answer store: per-question answers keyed by 0-based question index.
//!
//! An entry exists only once the student interacted with the question;
//! absence always means "unanswered".

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::answer_key::Verdict;
use crate::error::AnswerError;
use crate::model::{Question, QuestionType};

/// An answer, shaped by the type of the question it belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Answer {
    SingleChoice(String),
    MultiChoice(BTreeSet<String>),
    TrueFalseSet(BTreeMap<String, Verdict>),
    Likert(String),
}

impl Answer {
    /// Completeness as shown in the navigation grid and used by scoring.
    pub fn is_complete(&self, question: &Question) -> bool {
        match self {
            Answer::SingleChoice(v) | Answer::Likert(v) => !v.is_empty(),
            Answer::MultiChoice(set) => !set.is_empty(),
            Answer::TrueFalseSet(map) => {
                question.statement_count() > 0
                    && question.options.iter().all(|s| map.contains_key(&s.key))
            }
        }
    }
}

/// Parse a `statementKey:TRUE|FALSE` input token.
pub fn parse_statement_token(raw: &str) -> Result<(String, Verdict), AnswerError> {
    let invalid = || AnswerError::InvalidStatementToken(raw.to_string());
    let (key, value) = raw.split_once(':').ok_or_else(invalid)?;
    let key = key.trim();
    if key.is_empty() {
        return Err(invalid());
    }
    let verdict = value.parse::<Verdict>().map_err(|_| invalid())?;
    Ok((key.to_string(), verdict))
}

/// Reject input that names an option or statement the question does not have.
///
/// Choice questions authored without options accept any key; a TRUE_FALSE_SET
/// question always checks against its statements.
pub fn check_input(question: &Question, raw: &str) -> Result<(), AnswerError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(AnswerError::EmptyInput);
    }
    let key = match question.question_type {
        QuestionType::TrueFalseSet => parse_statement_token(raw)?.0,
        _ if question.options.is_empty() => return Ok(()),
        _ => raw.to_string(),
    };
    if question.has_option(&key) {
        Ok(())
    } else {
        Err(AnswerError::UnknownOption(key))
    }
}

/// In-memory map from question index to answer.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnswerStore {
    entries: BTreeMap<usize, Answer>,
}

impl AnswerStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one raw input to the entry at `index`, interpreted by `question_type`.
    ///
    /// - SINGLE_CHOICE / LIKERT: overwrite.
    /// - MULTI_CHOICE: toggle the option; removing the last one leaves an empty set.
    /// - TRUE_FALSE_SET: merge a `statementKey:TRUE|FALSE` token into the map.
    pub fn set_answer(
        &mut self,
        index: usize,
        question_type: QuestionType,
        raw: &str,
    ) -> Result<(), AnswerError> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(AnswerError::EmptyInput);
        }

        match question_type {
            QuestionType::SingleChoice => {
                self.entries
                    .insert(index, Answer::SingleChoice(raw.to_string()));
            }
            QuestionType::Likert => {
                self.entries.insert(index, Answer::Likert(raw.to_string()));
            }
            QuestionType::MultiChoice => {
                let entry = self
                    .entries
                    .entry(index)
                    .or_insert_with(|| Answer::MultiChoice(BTreeSet::new()));
                if !matches!(entry, Answer::MultiChoice(_)) {
                    *entry = Answer::MultiChoice(BTreeSet::new());
                }
                if let Answer::MultiChoice(set) = entry {
                    if !set.remove(raw) {
                        set.insert(raw.to_string());
                    }
                }
            }
            QuestionType::TrueFalseSet => {
                let (key, verdict) = parse_statement_token(raw)?;
                let entry = self
                    .entries
                    .entry(index)
                    .or_insert_with(|| Answer::TrueFalseSet(BTreeMap::new()));
                if !matches!(entry, Answer::TrueFalseSet(_)) {
                    *entry = Answer::TrueFalseSet(BTreeMap::new());
                }
                if let Answer::TrueFalseSet(map) = entry {
                    map.insert(key, verdict);
                }
            }
        }

        tracing::trace!(index, %question_type, "answer updated");
        Ok(())
    }

    pub fn get(&self, index: usize) -> Option<&Answer> {
        self.entries.get(&index)
    }

    /// Whether the question at `index` counts as answered.
    pub fn is_answered(&self, index: usize, question: &Question) -> bool {
        self.entries
            .get(&index)
            .is_some_and(|answer| answer.is_complete(question))
    }

    /// Number of questions in `questions` that count as answered.
    pub fn answered_count(&self, questions: &[Question]) -> usize {
        questions
            .iter()
            .enumerate()
            .filter(|(i, q)| self.is_answered(*i, q))
            .count()
    }

    /// Number of indices the student touched at all.
    pub fn touched_count(&self) -> usize {
        self.entries.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, &Answer)> {
        self.entries.iter().map(|(i, a)| (*i, a))
    }
}
