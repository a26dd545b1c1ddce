//! Core data model types for rekan.
//!
//! These are the fundamental types the exam engine works with: questions as
//! fetched from the question bank, the identifiers of an exam (level, package,
//! subject), and the records persisted after a finalized submission.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Time budget for academic ability tests.
pub const ASSESSMENT_BUDGET_SECS: u32 = 60 * 60;

/// Time budget for character and learning-environment surveys.
pub const SURVEY_BUDGET_SECS: u32 = 30 * 60;

/// School level a question, license, or session belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Level {
    /// Primary school (SD / MI).
    #[serde(rename = "SD", alias = "sd")]
    Sd,
    /// Junior secondary school (SMP / MTs).
    #[serde(rename = "SMP", alias = "smp")]
    Smp,
}

impl Level {
    /// Human-readable label as printed on the exam pages.
    pub fn label(&self) -> &'static str {
        match self {
            Level::Sd => "SD / MI",
            Level::Smp => "SMP / MTs",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Level::Sd => write!(f, "SD"),
            Level::Smp => write!(f, "SMP"),
        }
    }
}

impl FromStr for Level {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "sd" | "mi" | "sd/mi" | "sd / mi" => Ok(Level::Sd),
            "smp" | "mts" | "smp/mts" | "smp / mts" => Ok(Level::Smp),
            other => Err(format!("unknown level: {other}")),
        }
    }
}

/// Whether a session is a scored test or a weighted survey.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionKind {
    Assessment,
    Survey,
}

impl SessionKind {
    /// Fixed countdown budget for this kind of session.
    pub fn default_budget_secs(&self) -> u32 {
        match self {
            SessionKind::Assessment => ASSESSMENT_BUDGET_SECS,
            SessionKind::Survey => SURVEY_BUDGET_SECS,
        }
    }
}

/// The assessable areas offered per package.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Subject {
    Matematika,
    BahasaIndonesia,
    Karakter,
    Sulingjar,
}

impl Subject {
    pub const ALL: [Subject; 4] = [
        Subject::Matematika,
        Subject::BahasaIndonesia,
        Subject::Karakter,
        Subject::Sulingjar,
    ];

    pub fn kind(&self) -> SessionKind {
        match self {
            Subject::Matematika | Subject::BahasaIndonesia => SessionKind::Assessment,
            Subject::Karakter | Subject::Sulingjar => SessionKind::Survey,
        }
    }

    /// Number of questions a complete package carries for this subject.
    pub fn standard_question_count(&self) -> usize {
        match self.kind() {
            SessionKind::Assessment => 30,
            SessionKind::Survey => 20,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Subject::Matematika => "Matematika",
            Subject::BahasaIndonesia => "Bahasa Indonesia",
            Subject::Karakter => "Survei Karakter",
            Subject::Sulingjar => "Survei Lingkungan Belajar",
        }
    }
}

impl fmt::Display for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Subject::Matematika => write!(f, "matematika"),
            Subject::BahasaIndonesia => write!(f, "bahasa-indonesia"),
            Subject::Karakter => write!(f, "karakter"),
            Subject::Sulingjar => write!(f, "sulingjar"),
        }
    }
}

impl FromStr for Subject {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace(['_', ' '], "-");
        match normalized.as_str() {
            "matematika" | "mtk" => Ok(Subject::Matematika),
            "bahasa-indonesia" | "bahasa" | "b.-indonesia" | "bindo" => {
                Ok(Subject::BahasaIndonesia)
            }
            "karakter" | "survei-karakter" => Ok(Subject::Karakter),
            "sulingjar" | "survei-lingkungan-belajar" => Ok(Subject::Sulingjar),
            other => Err(format!("unknown subject: {other}")),
        }
    }
}

/// Identifies one exam: a numbered package of one subject at one level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ExamKey {
    pub level: Level,
    pub package_number: u32,
    pub subject: Subject,
}

impl ExamKey {
    pub fn new(level: Level, package_number: u32, subject: Subject) -> Self {
        Self {
            level,
            package_number,
            subject,
        }
    }

    pub fn kind(&self) -> SessionKind {
        self.subject.kind()
    }
}

impl fmt::Display for ExamKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/paket-{}/{}",
            self.level, self.package_number, self.subject
        )
    }
}

/// Structural type of a question; determines the shape of its answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QuestionType {
    #[serde(alias = "PG_BIASA")]
    SingleChoice,
    #[serde(alias = "PG_KOMPLEKS")]
    MultiChoice,
    #[serde(alias = "BENAR_SALAH")]
    TrueFalseSet,
    #[serde(alias = "SKALA")]
    Likert,
}

impl QuestionType {
    /// Whether questions of this type are judged correct or incorrect.
    pub fn is_graded(&self) -> bool {
        !matches!(self, QuestionType::Likert)
    }
}

impl fmt::Display for QuestionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QuestionType::SingleChoice => write!(f, "SINGLE_CHOICE"),
            QuestionType::MultiChoice => write!(f, "MULTI_CHOICE"),
            QuestionType::TrueFalseSet => write!(f, "TRUE_FALSE_SET"),
            QuestionType::Likert => write!(f, "LIKERT"),
        }
    }
}

impl FromStr for QuestionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().replace([' ', '-'], "_").as_str() {
            "SINGLE_CHOICE" | "PG_BIASA" => Ok(QuestionType::SingleChoice),
            "MULTI_CHOICE" | "PG_KOMPLEKS" => Ok(QuestionType::MultiChoice),
            "TRUE_FALSE_SET" | "BENAR_SALAH" => Ok(QuestionType::TrueFalseSet),
            "LIKERT" | "SKALA" => Ok(QuestionType::Likert),
            other => Err(format!("unknown question type: {other}")),
        }
    }
}

/// A selectable option, or for TRUE_FALSE_SET questions, a statement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionOption {
    pub key: String,
    pub label: String,
}

/// A question record as returned by the question store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    pub id: String,
    pub level: Level,
    pub subject: Subject,
    pub package_number: u32,
    pub question_type: QuestionType,
    pub body_text: String,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub options: Vec<QuestionOption>,
    /// Type-specific key: `A`, `A,C`, `A:TRUE,B:FALSE`, or `A:4,B:3,...`.
    pub answer_key: String,
    #[serde(default)]
    pub topic: Option<String>,
}

impl Question {
    /// Number of statements of a TRUE_FALSE_SET question.
    pub fn statement_count(&self) -> usize {
        self.options.len()
    }

    pub fn has_option(&self, key: &str) -> bool {
        self.options.iter().any(|o| o.key == key)
    }

    /// Topic label, with blank or missing topics folded into [`GENERAL_TOPIC`].
    pub fn topic_or_general(&self) -> &str {
        match self.topic.as_deref().map(str::trim) {
            Some(t) if !t.is_empty() => t,
            _ => GENERAL_TOPIC,
        }
    }
}

/// Sentinel topic for questions without one.
pub const GENERAL_TOPIC: &str = "general";

/// Who is submitting, as typed on the result form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudentIdentity {
    pub student_name: String,
    pub class_code: String,
}

impl StudentIdentity {
    pub fn new(student_name: impl Into<String>, class_code: impl Into<String>) -> Self {
        Self {
            student_name: student_name.into(),
            class_code: class_code.into(),
        }
    }

    /// Trimmed name with inner whitespace collapsed, and an upper-cased class code.
    pub fn normalized(&self) -> StudentIdentity {
        StudentIdentity {
            student_name: collapse_whitespace(&self.student_name),
            class_code: normalize_code(&self.class_code),
        }
    }
}

/// Upper-cases and trims a license or class code.
pub fn normalize_code(code: &str) -> String {
    code.trim().to_uppercase()
}

pub(crate) fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Compares two student names the way result lookups do.
pub fn same_student_name(a: &str, b: &str) -> bool {
    collapse_whitespace(a).to_lowercase() == collapse_whitespace(b).to_lowercase()
}

/// A shared access code with a finite number of student seats.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LicenseQuota {
    pub code: String,
    #[serde(default)]
    pub level: Option<Level>,
    pub total_quota: u32,
    pub used_count: u32,
}

impl LicenseQuota {
    pub fn remaining(&self) -> u32 {
        self.total_quota.saturating_sub(self.used_count)
    }

    pub fn is_exhausted(&self) -> bool {
        self.used_count >= self.total_quota
    }
}

/// One student's seat under a license. Claiming is idempotent per seat.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SeatKey {
    pub license_code: String,
    pub class_code: String,
    /// Lower-cased, whitespace-collapsed student name.
    pub student_key: String,
}

impl SeatKey {
    pub fn new(license_code: &str, identity: &StudentIdentity) -> Self {
        let identity = identity.normalized();
        Self {
            license_code: normalize_code(license_code),
            class_code: identity.class_code,
            student_key: identity.student_name.to_lowercase(),
        }
    }
}

/// The durable output of a successful finalize. Never mutated after insertion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmissionRecord {
    pub id: Uuid,
    /// Client-generated token shared by every retry of one session's finalize.
    pub attempt_token: Uuid,
    pub license_code: String,
    pub student_name: String,
    pub class_code: String,
    pub level: Level,
    pub package_number: u32,
    pub subject: Subject,
    pub score_percent: u32,
    /// Correct count for assessments, summed LIKERT weight for surveys.
    pub earned_score: u32,
    /// Graded question count for assessments, `questions x max weight` for surveys.
    pub max_score: u32,
    pub correct_count: u32,
    pub question_count: u32,
    pub elapsed_seconds: u32,
    #[serde(default)]
    pub topic_weakness: BTreeMap<String, Vec<usize>>,
    pub submitted_at: DateTime<Utc>,
}

impl SubmissionRecord {
    pub fn exam_key(&self) -> ExamKey {
        ExamKey::new(self.level, self.package_number, self.subject)
    }

    pub fn matches(&self, query: &ResultQuery) -> bool {
        if !same_student_name(&self.student_name, &query.student_name)
            || normalize_code(&self.class_code) != normalize_code(&query.class_code)
            || normalize_code(&self.license_code) != normalize_code(&query.license_code)
        {
            return false;
        }
        match &query.exam {
            Some(exam) => {
                self.subject == exam.subject && self.package_number == exam.package_number
            }
            None => true,
        }
    }
}

/// Lookup for prior submissions. Without `exam` it matches any subject/package.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultQuery {
    pub student_name: String,
    pub class_code: String,
    pub license_code: String,
    #[serde(default)]
    pub exam: Option<ExamKey>,
}

impl ResultQuery {
    /// Any prior record for this student under this license.
    pub fn for_student(license_code: &str, identity: &StudentIdentity) -> Self {
        let identity = identity.normalized();
        Self {
            student_name: identity.student_name,
            class_code: identity.class_code,
            license_code: normalize_code(license_code),
            exam: None,
        }
    }

    /// A prior record for this exact subject and package.
    pub fn for_exam(license_code: &str, identity: &StudentIdentity, exam: ExamKey) -> Self {
        Self {
            exam: Some(exam),
            ..Self::for_student(license_code, identity)
        }
    }
}
