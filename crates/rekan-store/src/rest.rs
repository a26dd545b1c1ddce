//! REST store speaking the PostgREST dialect of the hosted database.
//!
//! Tables: `tka_bank_soal` (questions), `tka_hasil_ujian` (results),
//! `tka_lisensi` (licenses). Seat claims go through the
//! `klaim_kursi_lisensi` database function so the check and the increment
//! happen in one transaction on the server.
//!
//! Result rows carry `kunci_siswa`, the lower-cased whitespace-collapsed
//! student name. The results table needs a unique index on
//! `(kode_lisensi, kode_kelas, kunci_siswa, mapel, paket)` so concurrent
//! submits that differ only in name casing still conflict.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Url;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::instrument;
use uuid::Uuid;

use rekan_core::error::StoreError;
use rekan_core::model::{
    ExamKey, Level, LicenseQuota, Question, QuestionOption, QuestionType, ResultQuery, SeatKey,
    StudentIdentity, Subject, SubmissionRecord,
};
use rekan_core::traits::{InsertOutcome, LicenseStore, QuestionStore, ResultStore, SeatClaim};

use crate::error::{from_reqwest, rejected};

pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

const QUESTIONS_TABLE: &str = "tka_bank_soal";
const RESULTS_TABLE: &str = "tka_hasil_ujian";
const LICENSES_TABLE: &str = "tka_lisensi";
const CLAIM_FUNCTION: &str = "klaim_kursi_lisensi";
const RESULT_CONFLICT_COLUMNS: &str = "kode_lisensi,kode_kelas,kunci_siswa,mapel,paket";

/// PostgREST-backed store.
pub struct RestStore {
    base_url: Url,
    api_key: String,
    timeout_secs: u64,
    client: reqwest::Client,
}

impl std::fmt::Debug for RestStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RestStore")
            .field("base_url", &self.base_url.as_str())
            .field("api_key", &"***")
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl RestStore {
    pub fn new(base_url: &str, api_key: &str, timeout_secs: u64) -> Result<Self, StoreError> {
        let trimmed = base_url.trim_end_matches('/');
        let base_url = Url::parse(&format!("{trimmed}/rest/v1/"))
            .map_err(|e| StoreError::Unreachable(format!("invalid base url {base_url}: {e}")))?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| StoreError::Unreachable(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            base_url,
            api_key: api_key.to_string(),
            timeout_secs,
            client,
        })
    }

    fn endpoint(&self, path: &str, params: &[(&str, String)]) -> Result<Url, StoreError> {
        let mut url = self
            .base_url
            .join(path)
            .map_err(|e| StoreError::Unreachable(format!("invalid endpoint {path}: {e}")))?;
        if !params.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in params {
                pairs.append_pair(key, value);
            }
        }
        Ok(url)
    }

    fn authorized(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        request
            .header("apikey", &self.api_key)
            .header("Authorization", format!("Bearer {}", self.api_key))
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<reqwest::Response, StoreError> {
        let response = self
            .authorized(request)
            .send()
            .await
            .map_err(|e| from_reqwest(e, self.base_url.as_str(), self.timeout_secs))?;
        if !response.status().is_success() {
            return Err(rejected(response).await);
        }
        Ok(response)
    }

    async fn decode<T: DeserializeOwned>(&self, response: reqwest::Response) -> Result<T, StoreError> {
        response
            .json()
            .await
            .map_err(|e| from_reqwest(e, self.base_url.as_str(), self.timeout_secs))
    }

    async fn get_rows<T: DeserializeOwned>(
        &self,
        table: &str,
        params: &[(&str, String)],
    ) -> Result<Vec<T>, StoreError> {
        let url = self.endpoint(table, params)?;
        let response = self.send(self.client.get(url)).await?;
        self.decode(response).await
    }
}

/// Escape LIKE wildcards so `ilike` acts as case-insensitive equality.
fn escape_like(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

fn eq(value: impl std::fmt::Display) -> String {
    format!("eq.{value}")
}

// ---------------------------------------------------------------------------
// Row types
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct QuestionRow {
    id: serde_json::Value,
    jenjang: String,
    mapel: String,
    paket: u32,
    tipe: String,
    teks: String,
    #[serde(default)]
    image_url: Option<String>,
    #[serde(default)]
    opsi: Option<Vec<OptionRow>>,
    kunci: String,
    #[serde(default)]
    topik: Option<String>,
}

#[derive(Deserialize)]
struct OptionRow {
    key: String,
    label: String,
}

impl QuestionRow {
    fn into_question(self) -> Result<Question, String> {
        let id = match self.id {
            serde_json::Value::String(s) => s,
            other => other.to_string(),
        };
        Ok(Question {
            level: self.jenjang.parse()?,
            subject: self.mapel.parse()?,
            package_number: self.paket,
            question_type: self
                .tipe
                .parse::<QuestionType>()
                .map_err(|e| format!("question {id}: {e}"))?,
            body_text: self.teks,
            image_url: self.image_url.filter(|u| !u.trim().is_empty()),
            options: self
                .opsi
                .unwrap_or_default()
                .into_iter()
                .map(|o| QuestionOption {
                    key: o.key,
                    label: o.label,
                })
                .collect(),
            answer_key: self.kunci,
            topic: self.topik.filter(|t| !t.trim().is_empty()),
            id,
        })
    }
}

#[derive(Serialize, Deserialize)]
struct ResultRow {
    id: Uuid,
    attempt_token: Uuid,
    kode_lisensi: String,
    nama_siswa: String,
    /// Case-folded name; part of the conflict key.
    #[serde(default)]
    kunci_siswa: String,
    kode_kelas: String,
    jenjang: String,
    paket: u32,
    mapel: String,
    skor_total: u32,
    skor_diperoleh: u32,
    skor_maksimal: u32,
    jumlah_benar: u32,
    jumlah_soal: u32,
    waktu_pengerjaan: u32,
    #[serde(default)]
    analisis_topik: BTreeMap<String, Vec<usize>>,
    created_at: DateTime<Utc>,
}

impl From<&SubmissionRecord> for ResultRow {
    fn from(r: &SubmissionRecord) -> Self {
        Self {
            id: r.id,
            attempt_token: r.attempt_token,
            kode_lisensi: r.license_code.clone(),
            nama_siswa: r.student_name.clone(),
            kunci_siswa: SeatKey::new(
                &r.license_code,
                &StudentIdentity::new(&r.student_name, &r.class_code),
            )
            .student_key,
            kode_kelas: r.class_code.clone(),
            jenjang: r.level.to_string(),
            paket: r.package_number,
            mapel: r.subject.to_string(),
            skor_total: r.score_percent,
            skor_diperoleh: r.earned_score,
            skor_maksimal: r.max_score,
            jumlah_benar: r.correct_count,
            jumlah_soal: r.question_count,
            waktu_pengerjaan: r.elapsed_seconds,
            analisis_topik: r.topic_weakness.clone(),
            created_at: r.submitted_at,
        }
    }
}

impl ResultRow {
    fn into_record(self) -> Result<SubmissionRecord, String> {
        Ok(SubmissionRecord {
            id: self.id,
            attempt_token: self.attempt_token,
            license_code: self.kode_lisensi,
            student_name: self.nama_siswa,
            class_code: self.kode_kelas,
            level: self.jenjang.parse::<Level>()?,
            package_number: self.paket,
            subject: self.mapel.parse::<Subject>()?,
            score_percent: self.skor_total,
            earned_score: self.skor_diperoleh,
            max_score: self.skor_maksimal,
            correct_count: self.jumlah_benar,
            question_count: self.jumlah_soal,
            elapsed_seconds: self.waktu_pengerjaan,
            topic_weakness: self.analisis_topik,
            submitted_at: self.created_at,
        })
    }
}

fn into_records(rows: Vec<ResultRow>) -> Result<Vec<SubmissionRecord>, StoreError> {
    rows.into_iter()
        .map(|r| r.into_record().map_err(StoreError::Decode))
        .collect()
}

#[derive(Deserialize)]
struct LicenseRow {
    kode: String,
    #[serde(default)]
    jenjang: Option<String>,
    kuota: u32,
    #[serde(default)]
    terpakai: u32,
}

#[derive(Serialize)]
struct ClaimArgs<'a> {
    p_kode: &'a str,
    p_kelas: &'a str,
    p_siswa: &'a str,
}

#[derive(Deserialize)]
struct ClaimRow {
    status: String,
    #[serde(default)]
    terpakai: u32,
    #[serde(default)]
    kuota: u32,
}

// ---------------------------------------------------------------------------
// Trait implementations
// ---------------------------------------------------------------------------

#[async_trait]
impl QuestionStore for RestStore {
    fn name(&self) -> &str {
        "rest"
    }

    #[instrument(skip(self), fields(exam = %exam))]
    async fn fetch_questions(&self, exam: &ExamKey) -> Result<Vec<Question>, StoreError> {
        let rows: Vec<QuestionRow> = self
            .get_rows(
                QUESTIONS_TABLE,
                &[
                    ("select", "*".into()),
                    ("jenjang", eq(exam.level)),
                    ("mapel", eq(exam.subject)),
                    ("paket", eq(exam.package_number)),
                    ("order", "id.asc".into()),
                ],
            )
            .await?;

        let mut questions = Vec::with_capacity(rows.len());
        for row in rows {
            match row.into_question() {
                Ok(q) => questions.push(q),
                Err(e) => tracing::warn!("skipping question row: {e}"),
            }
        }
        Ok(questions)
    }
}

#[async_trait]
impl ResultStore for RestStore {
    #[instrument(skip(self, query), fields(class = %query.class_code))]
    async fn find_results(
        &self,
        query: &ResultQuery,
    ) -> Result<Vec<SubmissionRecord>, StoreError> {
        let mut params = vec![
            ("select", "*".to_string()),
            ("nama_siswa", format!("ilike.{}", escape_like(&query.student_name))),
            ("kode_kelas", eq(&query.class_code)),
            ("kode_lisensi", eq(&query.license_code)),
        ];
        if let Some(exam) = &query.exam {
            params.push(("mapel", eq(exam.subject)));
            params.push(("paket", eq(exam.package_number)));
        }
        params.push(("order", "created_at.desc".into()));

        let rows: Vec<ResultRow> = self.get_rows(RESULTS_TABLE, &params).await?;
        Ok(into_records(rows)?
            .into_iter()
            .filter(|r| r.matches(query))
            .collect())
    }

    #[instrument(skip(self, record), fields(exam = %record.exam_key()))]
    async fn insert_result(&self, record: &SubmissionRecord) -> Result<InsertOutcome, StoreError> {
        let url = self.endpoint(
            RESULTS_TABLE,
            &[("on_conflict", RESULT_CONFLICT_COLUMNS.to_string())],
        )?;
        let request = self
            .client
            .post(url)
            .header("Prefer", "resolution=ignore-duplicates,return=representation")
            .json(&[ResultRow::from(record)]);

        let response = match self.send(request).await {
            Ok(response) => response,
            Err(StoreError::Rejected { status: 409, .. }) => return Ok(InsertOutcome::Duplicate),
            Err(e) => return Err(e),
        };

        let inserted: Vec<serde_json::Value> = self.decode(response).await?;
        if inserted.is_empty() {
            Ok(InsertOutcome::Duplicate)
        } else {
            Ok(InsertOutcome::Inserted)
        }
    }

    #[instrument(skip(self))]
    async fn class_results(
        &self,
        license_code: &str,
        class_code: &str,
    ) -> Result<Vec<SubmissionRecord>, StoreError> {
        let rows: Vec<ResultRow> = self
            .get_rows(
                RESULTS_TABLE,
                &[
                    ("select", "*".into()),
                    ("kode_lisensi", eq(rekan_core::model::normalize_code(license_code))),
                    ("kode_kelas", eq(rekan_core::model::normalize_code(class_code))),
                    ("order", "created_at.desc".into()),
                ],
            )
            .await?;
        into_records(rows)
    }
}

#[async_trait]
impl LicenseStore for RestStore {
    #[instrument(skip(self))]
    async fn read_license(&self, code: &str) -> Result<Option<LicenseQuota>, StoreError> {
        let rows: Vec<LicenseRow> = self
            .get_rows(
                LICENSES_TABLE,
                &[
                    ("select", "kode,jenjang,kuota,terpakai".into()),
                    ("kode", eq(code)),
                ],
            )
            .await?;

        let Some(row) = rows.into_iter().next() else {
            return Ok(None);
        };
        let level = match row.jenjang.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(raw) => Some(raw.parse::<Level>().map_err(StoreError::Decode)?),
        };
        Ok(Some(LicenseQuota {
            code: row.kode,
            level,
            total_quota: row.kuota,
            used_count: row.terpakai,
        }))
    }

    #[instrument(skip(self, seat), fields(class = %seat.class_code))]
    async fn claim_seat(&self, code: &str, seat: &SeatKey) -> Result<SeatClaim, StoreError> {
        let url = self.endpoint(&format!("rpc/{CLAIM_FUNCTION}"), &[])?;
        let args = ClaimArgs {
            p_kode: code,
            p_kelas: &seat.class_code,
            p_siswa: &seat.student_key,
        };
        let response = self.send(self.client.post(url).json(&args)).await?;
        let row: ClaimRow = self.decode(response).await?;

        match row.status.as_str() {
            "claimed" => Ok(SeatClaim::Claimed {
                used_count: row.terpakai,
                total_quota: row.kuota,
            }),
            "already_held" => Ok(SeatClaim::AlreadyHeld {
                used_count: row.terpakai,
                total_quota: row.kuota,
            }),
            "exhausted" => Ok(SeatClaim::Exhausted {
                total_quota: row.kuota,
            }),
            "not_found" => Ok(SeatClaim::NotFound),
            other => Err(StoreError::Decode(format!("unknown claim status: {other}"))),
        }
    }
}
