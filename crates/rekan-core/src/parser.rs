//! TOML question-bank and answer-sheet parser.
//!
//! Loads question banks from TOML files and directories, validates them,
//! and parses answer sheets that replay raw inputs into a session.

use std::collections::HashSet;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::answer_key::{AnswerKey, MAX_LIKERT_WEIGHT};
use crate::error::AnswerError;
use crate::model::{ExamKey, Level, Question, QuestionOption, QuestionType, Subject};
use crate::session::ExamSession;
use crate::timer::SessionTimer;

/// A parsed question bank: one package of one subject at one level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionBank {
    pub exam: ExamKey,
    #[serde(default)]
    pub title: Option<String>,
    pub questions: Vec<Question>,
}

/// Intermediate TOML structure for parsing bank files.
#[derive(Debug, Deserialize)]
struct TomlBankFile {
    bank: TomlBankHeader,
    #[serde(default)]
    questions: Vec<TomlQuestion>,
}

#[derive(Debug, Deserialize)]
struct TomlBankHeader {
    level: String,
    subject: String,
    #[serde(default = "default_package")]
    package: u32,
    #[serde(default)]
    title: Option<String>,
}

fn default_package() -> u32 {
    1
}

#[derive(Debug, Deserialize)]
struct TomlQuestion {
    #[serde(default)]
    id: Option<String>,
    #[serde(rename = "type")]
    question_type: String,
    text: String,
    #[serde(default)]
    image_url: Option<String>,
    #[serde(default)]
    options: Vec<TomlOption>,
    answer_key: String,
    #[serde(default)]
    topic: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TomlOption {
    key: String,
    label: String,
}

/// Parse a single TOML file into a `QuestionBank`.
pub fn parse_question_bank(path: &Path) -> Result<QuestionBank> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read question bank: {}", path.display()))?;

    parse_question_bank_str(&content, path)
}

/// Parse a TOML string into a `QuestionBank` (useful for testing).
pub fn parse_question_bank_str(content: &str, source_path: &Path) -> Result<QuestionBank> {
    let parsed: TomlBankFile = toml::from_str(content)
        .with_context(|| format!("failed to parse TOML: {}", source_path.display()))?;

    let level: Level = parsed
        .bank
        .level
        .parse()
        .map_err(|e: String| anyhow::anyhow!("{}", e))?;
    let subject: Subject = parsed
        .bank
        .subject
        .parse()
        .map_err(|e: String| anyhow::anyhow!("{}", e))?;
    let exam = ExamKey::new(level, parsed.bank.package, subject);

    let questions = parsed
        .questions
        .into_iter()
        .enumerate()
        .map(|(i, q)| {
            let question_type: QuestionType = q
                .question_type
                .parse()
                .map_err(|e: String| anyhow::anyhow!("question {}: {}", i + 1, e))?;
            let id = q.id.unwrap_or_else(|| {
                format!(
                    "{}-{}-{}-{:02}",
                    level.to_string().to_lowercase(),
                    subject,
                    exam.package_number,
                    i + 1
                )
            });
            Ok(Question {
                id,
                level,
                subject,
                package_number: exam.package_number,
                question_type,
                body_text: q.text,
                image_url: q.image_url,
                options: q
                    .options
                    .into_iter()
                    .map(|o| QuestionOption {
                        key: o.key,
                        label: o.label,
                    })
                    .collect(),
                answer_key: q.answer_key,
                topic: q.topic.filter(|t| !t.trim().is_empty()),
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(QuestionBank {
        exam,
        title: parsed.bank.title,
        questions,
    })
}

/// Recursively load all `.toml` question banks from a directory.
pub fn load_bank_directory(dir: &Path) -> Result<Vec<QuestionBank>> {
    let mut banks = Vec::new();

    if !dir.is_dir() {
        anyhow::bail!("not a directory: {}", dir.display());
    }

    for entry in std::fs::read_dir(dir)
        .with_context(|| format!("failed to read directory: {}", dir.display()))?
    {
        let entry = entry?;
        let path = entry.path();

        if path.is_dir() {
            banks.extend(load_bank_directory(&path)?);
        } else if path.extension().is_some_and(|ext| ext == "toml") {
            match parse_question_bank(&path) {
                Ok(bank) => banks.push(bank),
                Err(e) => {
                    tracing::warn!("skipping {}: {:#}", path.display(), e);
                }
            }
        }
    }

    banks.sort_by_key(|b| b.exam);
    Ok(banks)
}

/// Load a single bank file or every bank in a directory.
pub fn load_banks(path: &Path) -> Result<Vec<QuestionBank>> {
    if path.is_dir() {
        load_bank_directory(path)
    } else {
        Ok(vec![parse_question_bank(path)?])
    }
}

/// A warning from question-bank validation.
#[derive(Debug, Clone)]
pub struct ValidationWarning {
    /// The question ID (if applicable).
    pub question_id: Option<String>,
    /// Warning message.
    pub message: String,
}

impl ValidationWarning {
    fn question(q: &Question, message: impl Into<String>) -> Self {
        Self {
            question_id: Some(q.id.clone()),
            message: message.into(),
        }
    }
}

/// Validate a question bank for common authoring mistakes.
pub fn validate_question_bank(bank: &QuestionBank) -> Vec<ValidationWarning> {
    let mut warnings = Vec::new();

    let expected = bank.exam.subject.standard_question_count();
    if bank.questions.len() != expected {
        warnings.push(ValidationWarning {
            question_id: None,
            message: format!(
                "{} has {} questions, expected {expected}",
                bank.exam,
                bank.questions.len()
            ),
        });
    }

    let mut seen_ids = HashSet::new();
    for q in &bank.questions {
        if !seen_ids.insert(&q.id) {
            warnings.push(ValidationWarning::question(
                q,
                format!("duplicate question ID: {}", q.id),
            ));
        }

        if q.body_text.trim().is_empty() {
            warnings.push(ValidationWarning::question(q, "question text is empty"));
        }

        if q.options.is_empty() {
            warnings.push(ValidationWarning::question(q, "question has no options"));
            continue;
        }

        let key = match AnswerKey::parse(q.question_type, &q.answer_key) {
            Ok(key) => key,
            Err(e) => {
                warnings.push(ValidationWarning::question(
                    q,
                    format!("answer key '{}' does not parse: {e}", q.answer_key),
                ));
                continue;
            }
        };

        for referenced in key.referenced_keys() {
            if !q.has_option(referenced) {
                warnings.push(ValidationWarning::question(
                    q,
                    format!("answer key references unknown option '{referenced}'"),
                ));
            }
        }

        match &key {
            AnswerKey::TrueFalse(map) if map.len() != q.statement_count() => {
                warnings.push(ValidationWarning::question(
                    q,
                    format!(
                        "answer key covers {} statements but question has {}",
                        map.len(),
                        q.statement_count()
                    ),
                ));
            }
            AnswerKey::Likert(weights) => {
                if let Some((option, weight)) =
                    weights.iter().find(|(_, w)| **w > MAX_LIKERT_WEIGHT)
                {
                    warnings.push(ValidationWarning::question(
                        q,
                        format!(
                            "option '{option}' weight {weight} exceeds maximum {MAX_LIKERT_WEIGHT}"
                        ),
                    ));
                }
            }
            _ => {}
        }
    }

    if bank.exam.kind() != crate::model::SessionKind::Survey
        && bank
            .questions
            .iter()
            .any(|q| q.question_type == QuestionType::Likert)
    {
        warnings.push(ValidationWarning {
            question_id: None,
            message: format!("{} is an assessment but contains LIKERT questions", bank.exam),
        });
    }

    warnings
}

/// Recorded raw inputs for one session, replayed through the answer store.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnswerSheet {
    /// Timer value at submission; the full budget was used when absent.
    #[serde(default)]
    pub remaining_seconds: Option<u32>,
    #[serde(default, rename = "input")]
    pub inputs: Vec<AnswerInput>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnswerInput {
    /// 0-based question index.
    pub index: usize,
    pub value: String,
}

impl AnswerSheet {
    /// Session timer implied by the sheet for the given exam.
    pub fn timer(&self, exam: ExamKey) -> SessionTimer {
        self.timer_with_budget(exam.kind().default_budget_secs())
    }

    pub fn timer_with_budget(&self, budget_secs: u32) -> SessionTimer {
        SessionTimer::resumed(budget_secs, self.remaining_seconds.unwrap_or(0))
    }

    /// Open a session on `bank` and replay every input in order.
    pub fn replay(&self, bank: &QuestionBank) -> Result<ExamSession, AnswerError> {
        self.replay_with_budget(bank, bank.exam.kind().default_budget_secs())
    }

    /// Like [`AnswerSheet::replay`], with a configured time budget.
    pub fn replay_with_budget(
        &self,
        bank: &QuestionBank,
        budget_secs: u32,
    ) -> Result<ExamSession, AnswerError> {
        let mut session = ExamSession::with_timer(
            bank.exam,
            bank.questions.clone(),
            self.timer_with_budget(budget_secs),
        );
        for input in &self.inputs {
            session.set_answer(input.index, &input.value)?;
        }
        Ok(session)
    }
}

/// Parse an answer sheet file.
pub fn parse_answer_sheet(path: &Path) -> Result<AnswerSheet> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read answer sheet: {}", path.display()))?;
    toml::from_str(&content)
        .with_context(|| format!("failed to parse TOML: {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    const VALID_TOML: &str = r#"
[bank]
level = "SD"
subject = "matematika"
package = 1
title = "Paket 1"

[[questions]]
id = "sd-mtk-1-01"
type = "PG_BIASA"
text = "Hasil dari 1/2 + 1/4 adalah ..."
topic = "Pecahan"
answer_key = "C"
options = [
    { key = "A", label = "1/6" },
    { key = "B", label = "2/6" },
    { key = "C", label = "3/4" },
    { key = "D", label = "2/4" },
]

[[questions]]
type = "BENAR_SALAH"
text = "Tentukan benar atau salah."
topic = "Bilangan"
answer_key = "A:TRUE,B:FALSE"
options = [
    { key = "A", label = "12 habis dibagi 3" },
    { key = "B", label = "7 adalah bilangan genap" },
]
"#;

    #[test]
    fn parse_valid_toml() {
        let bank = parse_question_bank_str(VALID_TOML, &PathBuf::from("test.toml")).unwrap();
        assert_eq!(bank.exam, ExamKey::new(Level::Sd, 1, Subject::Matematika));
        assert_eq!(bank.questions.len(), 2);
        assert_eq!(bank.questions[0].question_type, QuestionType::SingleChoice);
        assert_eq!(bank.questions[1].question_type, QuestionType::TrueFalseSet);
        assert_eq!(bank.questions[1].id, "sd-matematika-1-02");
        assert_eq!(bank.questions[1].statement_count(), 2);
    }

    #[test]
    fn validate_reports_count_and_key_problems() {
        let toml = r#"
[bank]
level = "SMP"
subject = "bahasa-indonesia"

[[questions]]
id = "q1"
type = "MULTI_CHOICE"
text = "Pilih dua."
answer_key = "A,E"
options = [{ key = "A", label = "a" }, { key = "B", label = "b" }]

[[questions]]
id = "q1"
type = "TRUE_FALSE_SET"
text = " "
answer_key = "A:TRUE"
options = [{ key = "A", label = "a" }, { key = "B", label = "b" }]

[[questions]]
id = "q3"
type = "SINGLE_CHOICE"
text = "Tanpa opsi"
answer_key = "A"
"#;
        let bank = parse_question_bank_str(toml, &PathBuf::from("test.toml")).unwrap();
        let warnings = validate_question_bank(&bank);
        let has = |needle: &str| warnings.iter().any(|w| w.message.contains(needle));
        assert!(has("expected 30"));
        assert!(has("unknown option 'E'"));
        assert!(has("duplicate question ID"));
        assert!(has("text is empty"));
        assert!(has("covers 1 statements but question has 2"));
        assert!(has("no options"));
    }

    #[test]
    fn validate_likert_weights() {
        let toml = r#"
[bank]
level = "SD"
subject = "karakter"

[[questions]]
id = "k1"
type = "SKALA"
text = "Saya membantu teman."
answer_key = "A:5,B:3"
options = [{ key = "A", label = "Selalu" }, { key = "B", label = "Kadang" }]

[[questions]]
id = "k2"
type = "LIKERT"
text = "Saya jujur."
answer_key = "A=4"
options = [{ key = "A", label = "Selalu" }]
"#;
        let bank = parse_question_bank_str(toml, &PathBuf::from("test.toml")).unwrap();
        let warnings = validate_question_bank(&bank);
        assert!(warnings.iter().any(|w| w.message.contains("exceeds maximum")));
        assert!(warnings
            .iter()
            .any(|w| w.question_id.as_deref() == Some("k2") && w.message.contains("does not parse")));
    }

    #[test]
    fn parse_unknown_type_fails() {
        let toml = r#"
[bank]
level = "SD"
subject = "matematika"

[[questions]]
type = "ESSAY"
text = "?"
answer_key = ""
"#;
        let result = parse_question_bank_str(toml, &PathBuf::from("bad.toml"));
        assert!(result.is_err());
    }

    #[test]
    fn parse_malformed_toml() {
        let bad = "this is not [valid toml }{";
        let result = parse_question_bank_str(bad, &PathBuf::from("bad.toml"));
        assert!(result.is_err());
    }

    #[test]
    fn load_directory_skips_bad_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("good.toml"), VALID_TOML).unwrap();
        std::fs::write(dir.path().join("bad.toml"), "[bank").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let banks = load_bank_directory(dir.path()).unwrap();
        assert_eq!(banks.len(), 1);
        assert_eq!(banks[0].title.as_deref(), Some("Paket 1"));
        assert_eq!(
            banks[0],
            parse_question_bank_str(VALID_TOML, &PathBuf::from("good.toml")).unwrap()
        );
    }

    #[test]
    fn answer_sheet_replays_inputs() {
        let bank = parse_question_bank_str(VALID_TOML, &PathBuf::from("test.toml")).unwrap();
        let sheet: AnswerSheet = toml::from_str(
            r#"
remaining_seconds = 3000

[[input]]
index = 0
value = "C"

[[input]]
index = 1
value = "A:TRUE"

[[input]]
index = 1
value = "B:FALSE"
"#,
        )
        .unwrap();

        let session = sheet.replay(&bank).unwrap();
        assert_eq!(session.timer().elapsed_secs(), 600);
        let summary = session.score();
        assert_eq!(summary.correct_count, 2);
        assert_eq!(summary.score_percent, 100);
    }

    #[test]
    fn answer_sheet_rejects_out_of_range_index() {
        let bank = parse_question_bank_str(VALID_TOML, &PathBuf::from("test.toml")).unwrap();
        let sheet = AnswerSheet {
            remaining_seconds: None,
            inputs: vec![AnswerInput {
                index: 9,
                value: "A".into(),
            }],
        };
        assert_eq!(
            sheet.replay(&bank).unwrap_err(),
            AnswerError::UnknownQuestion(9)
        );
        assert_eq!(sheet.timer(bank.exam).elapsed_secs(), 3600);
    }
}
