//! Session scoring and per-topic weakness analysis.
//!
//! Scoring is a pure function over the ordered question list and the answer
//! store. Graded questions (SINGLE_CHOICE, MULTI_CHOICE, TRUE_FALSE_SET) are
//! all-or-nothing; LIKERT questions contribute a weight instead and never
//! appear in correct counts or weakness analysis.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::answer_key::{AnswerKey, MAX_LIKERT_WEIGHT};
use crate::answers::{Answer, AnswerStore};
use crate::error::ErrorKind;
use crate::model::Question;

/// Ratio at which a topic counts as a strength rather than a weakness.
pub const STRENGTH_THRESHOLD: f64 = 0.8;

/// How the session percentage is computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScoringMode {
    /// `correct / questions`; LIKERT questions stay in the denominator.
    Graded,
    /// `summed weight / (questions x MAX_LIKERT_WEIGHT)`, for LIKERT-dominated sessions.
    Weighted,
}

/// How one question was judged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "outcome")]
pub enum Outcome {
    Correct,
    Incorrect,
    /// No complete answer; scored as incorrect.
    Unanswered,
    /// LIKERT contribution.
    Weighted { weight: u32 },
}

impl Outcome {
    pub fn is_miss(&self) -> bool {
        matches!(self, Outcome::Incorrect | Outcome::Unanswered)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionResult {
    /// 1-based question number as shown to the student.
    pub number: usize,
    pub question_id: String,
    pub topic: String,
    #[serde(flatten)]
    pub outcome: Outcome,
}

/// Non-fatal problem found while scoring; bad content never aborts a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoringWarning {
    pub number: usize,
    pub question_id: String,
    pub message: String,
}

impl ScoringWarning {
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::MalformedAnswerKey
    }
}

/// Earned versus possible points within one topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TopicScore {
    pub earned: u32,
    pub possible: u32,
}

impl TopicScore {
    pub fn ratio(&self) -> f64 {
        if self.possible == 0 {
            0.0
        } else {
            self.earned as f64 / self.possible as f64
        }
    }

    pub fn percent(&self) -> u32 {
        percent(self.earned, self.possible)
    }

    pub fn is_strength(&self) -> bool {
        self.possible > 0 && self.ratio() >= STRENGTH_THRESHOLD
    }
}

/// Everything the scoring engine derives from one session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreSummary {
    pub mode: ScoringMode,
    pub score_percent: u32,
    pub correct_count: u32,
    pub graded_count: u32,
    pub question_count: u32,
    pub earned_score: u32,
    pub max_score: u32,
    /// Topic -> ascending 1-based numbers of missed graded questions.
    pub topic_weakness: BTreeMap<String, Vec<usize>>,
    pub topics: BTreeMap<String, TopicScore>,
    pub questions: Vec<QuestionResult>,
    #[serde(default)]
    pub warnings: Vec<ScoringWarning>,
}

impl ScoreSummary {
    pub fn strengths(&self) -> Vec<&str> {
        self.topics
            .iter()
            .filter(|(_, s)| s.is_strength())
            .map(|(t, _)| t.as_str())
            .collect()
    }

    pub fn weaknesses(&self) -> Vec<&str> {
        self.topics
            .iter()
            .filter(|(_, s)| s.possible > 0 && !s.is_strength())
            .map(|(t, _)| t.as_str())
            .collect()
    }

    pub fn predicate(&self) -> Predicate {
        Predicate::from_percent(self.score_percent)
    }

    pub fn band(&self) -> ScoreBand {
        ScoreBand::from_percent(self.score_percent)
    }
}

/// `round(numerator / denominator * 100)`, rounding halves up; 0 when the denominator is 0.
pub fn percent(numerator: u32, denominator: u32) -> u32 {
    if denominator == 0 {
        return 0;
    }
    let n = numerator as u64;
    let d = denominator as u64;
    ((n * 200 + d) / (2 * d)) as u32
}

/// Score a session.
pub fn score_session(questions: &[Question], answers: &AnswerStore) -> ScoreSummary {
    let mut correct_count = 0u32;
    let mut graded_count = 0u32;
    let mut likert_count = 0u32;
    let mut earned_weight = 0u32;
    let mut topic_weakness: BTreeMap<String, Vec<usize>> = BTreeMap::new();
    let mut topics: BTreeMap<String, TopicScore> = BTreeMap::new();
    let mut results = Vec::with_capacity(questions.len());
    let mut warnings = Vec::new();

    for (index, question) in questions.iter().enumerate() {
        let number = index + 1;
        let topic = question.topic_or_general().to_string();
        let answer = answers.get(index);

        let outcome = match AnswerKey::parse(question.question_type, &question.answer_key) {
            Ok(key) => judge(question, &key, answer, &mut |message| {
                warnings.push(ScoringWarning {
                    number,
                    question_id: question.id.clone(),
                    message,
                })
            }),
            Err(e) => {
                tracing::warn!(
                    question = %question.id,
                    number,
                    "malformed answer key: {e}"
                );
                warnings.push(ScoringWarning {
                    number,
                    question_id: question.id.clone(),
                    message: format!("malformed answer key '{}': {e}", question.answer_key),
                });
                if question.question_type.is_graded() {
                    // A key that does not parse can never be matched.
                    if answer.is_some_and(|a| a.is_complete(question)) {
                        Outcome::Incorrect
                    } else {
                        Outcome::Unanswered
                    }
                } else {
                    Outcome::Weighted { weight: 0 }
                }
            }
        };

        let entry = topics.entry(topic.clone()).or_default();
        match outcome {
            Outcome::Weighted { weight } => {
                likert_count += 1;
                earned_weight += weight;
                entry.earned += weight;
                entry.possible += MAX_LIKERT_WEIGHT;
            }
            Outcome::Correct => {
                graded_count += 1;
                correct_count += 1;
                entry.earned += 1;
                entry.possible += 1;
            }
            Outcome::Incorrect | Outcome::Unanswered => {
                graded_count += 1;
                entry.possible += 1;
                topic_weakness.entry(topic.clone()).or_default().push(number);
            }
        }

        results.push(QuestionResult {
            number,
            question_id: question.id.clone(),
            topic,
            outcome,
        });
    }

    let question_count = questions.len() as u32;
    let mode = if likert_count * 2 > question_count {
        ScoringMode::Weighted
    } else {
        ScoringMode::Graded
    };

    let (earned_score, max_score) = match mode {
        ScoringMode::Weighted => (earned_weight, question_count * MAX_LIKERT_WEIGHT),
        ScoringMode::Graded => (correct_count, question_count),
    };

    ScoreSummary {
        mode,
        score_percent: percent(earned_score, max_score),
        correct_count,
        graded_count,
        question_count,
        earned_score,
        max_score,
        topic_weakness,
        topics,
        questions: results,
        warnings,
    }
}

fn judge(
    question: &Question,
    key: &AnswerKey,
    answer: Option<&Answer>,
    warn: &mut dyn FnMut(String),
) -> Outcome {
    let complete = answer.filter(|a| a.is_complete(question));

    match (key, complete) {
        (AnswerKey::Likert(weights), answer) => {
            let chosen = match answer {
                Some(Answer::Likert(option)) | Some(Answer::SingleChoice(option)) => {
                    Some(option.as_str())
                }
                _ => None,
            };
            let weight = chosen
                .and_then(|option| weights.get(option).copied())
                .unwrap_or(0);
            if weight > MAX_LIKERT_WEIGHT {
                warn(format!(
                    "weight {weight} exceeds maximum {MAX_LIKERT_WEIGHT}, capped"
                ));
                Outcome::Weighted {
                    weight: MAX_LIKERT_WEIGHT,
                }
            } else {
                Outcome::Weighted { weight }
            }
        }
        (_, None) => Outcome::Unanswered,
        (AnswerKey::Single(expected), Some(Answer::SingleChoice(given))) => {
            verdict(given == expected)
        }
        (AnswerKey::Multi(expected), Some(Answer::MultiChoice(given))) => {
            // Both sets are ordered; a non-empty key and a complete answer are guaranteed here.
            verdict(!given.is_empty() && given == expected)
        }
        (AnswerKey::TrueFalse(expected), Some(Answer::TrueFalseSet(given))) => {
            verdict(
                given.len() == expected.len()
                    && expected.iter().all(|(k, v)| given.get(k) == Some(v)),
            )
        }
        // Answer shape does not fit the question type.
        (_, Some(_)) => Outcome::Incorrect,
    }
}

fn verdict(correct: bool) -> Outcome {
    if correct {
        Outcome::Correct
    } else {
        Outcome::Incorrect
    }
}

/// Survey result label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Predicate {
    VeryGood,
    Good,
    Fair,
    NeedsGuidance,
}

impl Predicate {
    pub fn from_percent(percent: u32) -> Self {
        match percent {
            85.. => Predicate::VeryGood,
            70..=84 => Predicate::Good,
            55..=69 => Predicate::Fair,
            _ => Predicate::NeedsGuidance,
        }
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Predicate::VeryGood => write!(f, "Sangat Baik"),
            Predicate::Good => write!(f, "Baik"),
            Predicate::Fair => write!(f, "Cukup"),
            Predicate::NeedsGuidance => write!(f, "Perlu Bimbingan"),
        }
    }
}

/// Assessment score band used on the class dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScoreBand {
    High,
    Medium,
    Low,
}

impl ScoreBand {
    pub fn from_percent(percent: u32) -> Self {
        match percent {
            70.. => ScoreBand::High,
            50..=69 => ScoreBand::Medium,
            _ => ScoreBand::Low,
        }
    }
}
