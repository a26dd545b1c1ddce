//! File-backed store for single-machine deployments.
//!
//! Layout under `data_dir`:
//!
//! ```text
//! store.json      licenses, claimed seats, submission records
//! store.lock      exclusive lock held across every load, modify, write
//! banks/          question bank TOML files
//! ```
//!
//! Several `rekan` processes may share one data directory, so every
//! operation takes an OS file lock on `store.lock` (shared for reads,
//! exclusive for writes) on a blocking thread. Writes replace `store.json`
//! through a temp file in the same directory.

use std::collections::{BTreeMap, BTreeSet};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use rekan_core::error::StoreError;
use rekan_core::model::{
    normalize_code, ExamKey, LicenseQuota, Question, ResultQuery, SeatKey, StudentIdentity,
    SubmissionRecord,
};
use rekan_core::parser::load_bank_directory;
use rekan_core::traits::{InsertOutcome, LicenseStore, QuestionStore, ResultStore, SeatClaim};

use crate::error::{from_io, from_json};
use crate::memory::claim_in;

const STORE_FILE: &str = "store.json";
const LOCK_FILE: &str = "store.lock";
const BANKS_DIR: &str = "banks";

#[derive(Debug, Default, Serialize, Deserialize)]
struct StoreData {
    #[serde(default)]
    licenses: BTreeMap<String, LicenseQuota>,
    #[serde(default)]
    seats: BTreeSet<SeatKey>,
    #[serde(default)]
    results: Vec<SubmissionRecord>,
}

/// JSON file store rooted at a data directory.
#[derive(Debug, Clone)]
pub struct FileStore {
    data_dir: PathBuf,
}

impl FileStore {
    /// Open (and create if needed) a store at `data_dir`.
    pub fn open(data_dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let data_dir = data_dir.into();
        std::fs::create_dir_all(data_dir.join(BANKS_DIR)).map_err(from_io)?;
        Ok(Self { data_dir })
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn banks_dir(&self) -> PathBuf {
        self.data_dir.join(BANKS_DIR)
    }

    /// Add or replace a license.
    pub async fn put_license(&self, license: LicenseQuota) -> Result<(), StoreError> {
        self.update(move |data| {
            let mut license = license;
            license.code = normalize_code(&license.code);
            data.licenses.insert(license.code.clone(), license);
            ((), true)
        })
        .await
    }

    /// Run `read` on a snapshot of the store under a shared lock.
    async fn read<T, F>(&self, read: F) -> Result<T, StoreError>
    where
        F: FnOnce(StoreData) -> T + Send + 'static,
        T: Send + 'static,
    {
        let data_dir = self.data_dir.clone();
        run_blocking(move || {
            let lock = fd_lock::RwLock::new(open_lock_file(&data_dir)?);
            let _guard = lock.read().map_err(from_io)?;
            Ok(read(load(&data_dir)?))
        })
        .await
    }

    /// Load, apply `change`, and write back when it reports a modification,
    /// all under the exclusive lock.
    async fn update<T, F>(&self, change: F) -> Result<T, StoreError>
    where
        F: FnOnce(&mut StoreData) -> (T, bool) + Send + 'static,
        T: Send + 'static,
    {
        let data_dir = self.data_dir.clone();
        run_blocking(move || {
            let mut lock = fd_lock::RwLock::new(open_lock_file(&data_dir)?);
            let _guard = lock.write().map_err(from_io)?;
            let mut data = load(&data_dir)?;
            let (out, modified) = change(&mut data);
            if modified {
                save(&data_dir, &data)?;
            }
            Ok(out)
        })
        .await
    }
}

async fn run_blocking<T, F>(task: F) -> Result<T, StoreError>
where
    F: FnOnce() -> Result<T, StoreError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(task)
        .await
        .map_err(|e| StoreError::Io(format!("store task failed: {e}")))?
}

fn open_lock_file(data_dir: &Path) -> Result<File, StoreError> {
    OpenOptions::new()
        .create(true)
        .truncate(false)
        .read(true)
        .write(true)
        .open(data_dir.join(LOCK_FILE))
        .map_err(from_io)
}

fn load(data_dir: &Path) -> Result<StoreData, StoreError> {
    let path = data_dir.join(STORE_FILE);
    if !path.exists() {
        return Ok(StoreData::default());
    }
    let content = std::fs::read_to_string(&path).map_err(from_io)?;
    serde_json::from_str(&content).map_err(from_json)
}

fn save(data_dir: &Path, data: &StoreData) -> Result<(), StoreError> {
    let json = serde_json::to_string_pretty(data).map_err(from_json)?;
    let mut tmp = tempfile::NamedTempFile::new_in(data_dir).map_err(from_io)?;
    tmp.write_all(json.as_bytes()).map_err(from_io)?;
    tmp.persist(data_dir.join(STORE_FILE))
        .map_err(|e| from_io(e.error))?;
    Ok(())
}

#[async_trait]
impl QuestionStore for FileStore {
    fn name(&self) -> &str {
        "file"
    }

    async fn fetch_questions(&self, exam: &ExamKey) -> Result<Vec<Question>, StoreError> {
        let dir = self.banks_dir();
        let exam = *exam;
        run_blocking(move || {
            if !dir.is_dir() {
                return Ok(Vec::new());
            }
            let banks =
                load_bank_directory(&dir).map_err(|e| StoreError::Io(format!("{e:#}")))?;
            Ok(banks
                .into_iter()
                .filter(|b| b.exam == exam)
                .flat_map(|b| b.questions)
                .collect())
        })
        .await
    }
}

#[async_trait]
impl ResultStore for FileStore {
    async fn find_results(
        &self,
        query: &ResultQuery,
    ) -> Result<Vec<SubmissionRecord>, StoreError> {
        let query = query.clone();
        self.read(move |data| {
            data.results
                .into_iter()
                .filter(|r| r.matches(&query))
                .collect()
        })
        .await
    }

    async fn insert_result(&self, record: &SubmissionRecord) -> Result<InsertOutcome, StoreError> {
        let record = record.clone();
        self.update(move |data| {
            let query = ResultQuery::for_exam(
                &record.license_code,
                &StudentIdentity::new(&record.student_name, &record.class_code),
                record.exam_key(),
            );
            if data.results.iter().any(|r| r.matches(&query)) {
                return (InsertOutcome::Duplicate, false);
            }
            data.results.push(record);
            (InsertOutcome::Inserted, true)
        })
        .await
    }

    async fn class_results(
        &self,
        license_code: &str,
        class_code: &str,
    ) -> Result<Vec<SubmissionRecord>, StoreError> {
        let license_code = normalize_code(license_code);
        let class_code = normalize_code(class_code);
        self.read(move |data| {
            data.results
                .into_iter()
                .filter(|r| {
                    normalize_code(&r.license_code) == license_code
                        && normalize_code(&r.class_code) == class_code
                })
                .collect()
        })
        .await
    }
}

#[async_trait]
impl LicenseStore for FileStore {
    async fn read_license(&self, code: &str) -> Result<Option<LicenseQuota>, StoreError> {
        let code = normalize_code(code);
        self.read(move |mut data| data.licenses.remove(&code)).await
    }

    async fn claim_seat(&self, code: &str, seat: &SeatKey) -> Result<SeatClaim, StoreError> {
        let code = code.to_string();
        let seat = seat.clone();
        self.update(move |data| {
            let StoreData {
                licenses, seats, ..
            } = data;
            let claim = claim_in(licenses, seats, &code, &seat);
            let claimed = matches!(claim, SeatClaim::Claimed { .. });
            (claim, claimed)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use chrono::Utc;
    use rekan_core::model::{Level, Subject};
    use uuid::Uuid;

    const BANK: &str = r#"
[bank]
level = "SD"
subject = "matematika"
package = 2

[[questions]]
type = "PG_BIASA"
text = "2 + 2 = ?"
answer_key = "B"
options = [{ key = "A", label = "3" }, { key = "B", label = "4" }]
"#;

    fn record(name: &str, subject: Subject) -> SubmissionRecord {
        SubmissionRecord {
            id: Uuid::new_v4(),
            attempt_token: Uuid::new_v4(),
            license_code: "SKS-01".into(),
            student_name: name.into(),
            class_code: "SKS4".into(),
            level: Level::Sd,
            package_number: 1,
            subject,
            score_percent: 70,
            earned_score: 21,
            max_score: 30,
            correct_count: 21,
            question_count: 30,
            elapsed_seconds: 1500,
            topic_weakness: Default::default(),
            submitted_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn state_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = FileStore::open(dir.path()).unwrap();
            store
                .put_license(LicenseQuota {
                    code: "sks-01".into(),
                    level: Some(Level::Sd),
                    total_quota: 3,
                    used_count: 0,
                })
                .await
                .unwrap();
            let seat = SeatKey::new("SKS-01", &StudentIdentity::new("Raisa", "SKS4"));
            store.claim_seat("SKS-01", &seat).await.unwrap();
            store
                .insert_result(&record("Raisa", Subject::Matematika))
                .await
                .unwrap();
        }

        let store = FileStore::open(dir.path()).unwrap();
        let license = store.read_license("SKS-01").await.unwrap().unwrap();
        assert_eq!(license.used_count, 1);
        let seat = SeatKey::new("SKS-01", &StudentIdentity::new("raisa", "sks4"));
        assert!(matches!(
            store.claim_seat("SKS-01", &seat).await.unwrap(),
            SeatClaim::AlreadyHeld { used_count: 1, .. }
        ));
        assert_eq!(store.class_results("sks-01", "sks4").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn duplicate_insert_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path()).unwrap();

        let first = store
            .insert_result(&record("Raisa", Subject::Matematika))
            .await
            .unwrap();
        let second = store
            .insert_result(&record("  RAISA ", Subject::Matematika))
            .await
            .unwrap();
        let other = store
            .insert_result(&record("Raisa", Subject::Karakter))
            .await
            .unwrap();

        assert_eq!(first, InsertOutcome::Inserted);
        assert_eq!(second, InsertOutcome::Duplicate);
        assert_eq!(other, InsertOutcome::Inserted);
    }

    #[tokio::test]
    async fn concurrent_claims_respect_quota() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(FileStore::open(dir.path()).unwrap());
        store
            .put_license(LicenseQuota {
                code: "SKS-01".into(),
                level: None,
                total_quota: 3,
                used_count: 0,
            })
            .await
            .unwrap();

        let claims = futures::future::join_all((0..10).map(|i| {
            let store = Arc::clone(&store);
            async move {
                let seat = SeatKey::new("SKS-01", &StudentIdentity::new(format!("Siswa {i}"), "SKS4"));
                store.claim_seat("SKS-01", &seat).await.unwrap()
            }
        }))
        .await;

        let claimed = claims
            .iter()
            .filter(|c| matches!(c, SeatClaim::Claimed { .. }))
            .count();
        assert_eq!(claimed, 3);
        assert_eq!(
            store.read_license("SKS-01").await.unwrap().unwrap().used_count,
            3
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn separate_handles_share_one_quota() {
        let dir = tempfile::tempdir().unwrap();
        let first = Arc::new(FileStore::open(dir.path()).unwrap());
        let second = Arc::new(FileStore::open(dir.path()).unwrap());
        first
            .put_license(LicenseQuota {
                code: "SKS-01".into(),
                level: None,
                total_quota: 25,
                used_count: 0,
            })
            .await
            .unwrap();

        let tasks: Vec<_> = (0..60)
            .map(|i| {
                let store = if i % 2 == 0 {
                    Arc::clone(&first)
                } else {
                    Arc::clone(&second)
                };
                tokio::spawn(async move {
                    let seat =
                        SeatKey::new("SKS-01", &StudentIdentity::new(format!("Siswa {i}"), "SKS4"));
                    store.claim_seat("SKS-01", &seat).await.unwrap()
                })
            })
            .collect();

        let mut claimed = 0;
        for task in tasks {
            match task.await.unwrap() {
                SeatClaim::Claimed { .. } => claimed += 1,
                other => assert!(matches!(other, SeatClaim::Exhausted { .. }), "{other:?}"),
            }
        }

        assert_eq!(claimed, 25);
        let reopened = FileStore::open(dir.path()).unwrap();
        let license = reopened.read_license("SKS-01").await.unwrap().unwrap();
        assert_eq!(license.used_count, 25);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn separate_handles_keep_every_insert() {
        let dir = tempfile::tempdir().unwrap();
        let first = Arc::new(FileStore::open(dir.path()).unwrap());
        let second = Arc::new(FileStore::open(dir.path()).unwrap());

        let tasks: Vec<_> = (0..40)
            .map(|i| {
                let store = if i % 2 == 0 {
                    Arc::clone(&first)
                } else {
                    Arc::clone(&second)
                };
                tokio::spawn(async move {
                    store
                        .insert_result(&record(&format!("Siswa {}", i % 20), Subject::Matematika))
                        .await
                        .unwrap()
                })
            })
            .collect();

        let mut inserted = 0;
        for task in tasks {
            if task.await.unwrap() == InsertOutcome::Inserted {
                inserted += 1;
            }
        }

        assert_eq!(inserted, 20);
        assert_eq!(second.class_results("SKS-01", "SKS4").await.unwrap().len(), 20);
    }

    #[tokio::test]
    async fn questions_come_from_bank_directory() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path()).unwrap();
        std::fs::write(store.banks_dir().join("mtk-2.toml"), BANK).unwrap();

        let found = store
            .fetch_questions(&ExamKey::new(Level::Sd, 2, Subject::Matematika))
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, "sd-matematika-2-01");

        let none = store
            .fetch_questions(&ExamKey::new(Level::Sd, 1, Subject::Matematika))
            .await
            .unwrap();
        assert!(none.is_empty());
    }

    #[tokio::test]
    async fn corrupt_store_file_is_decode_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path()).unwrap();
        std::fs::write(dir.path().join(STORE_FILE), "{not json").unwrap();

        let err = store.read_license("SKS-01").await.unwrap_err();
        assert!(matches!(err, StoreError::Decode(_)));
        assert!(!err.is_transient());
    }
}
