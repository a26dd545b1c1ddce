//! End-to-end pipeline tests over the sample banks.
//!
//! These run the full path (bank file -> answer replay -> scoring ->
//! gatekeeper -> store -> class report) against the file store.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use rekan_core::error::ErrorKind;
use rekan_core::gatekeeper::{Gatekeeper, StudentStatus};
use rekan_core::model::{Level, LicenseQuota, StudentIdentity};
use rekan_core::parser::{parse_answer_sheet, parse_question_bank, AnswerSheet, QuestionBank};
use rekan_core::report::ClassReport;
use rekan_core::scoring::ScoringMode;
use rekan_core::traits::{LicenseStore, ResultStore, Stores};
use rekan_store::FileStore;

fn repo_file(relative: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("../..")
        .join(relative)
}

fn math() -> (QuestionBank, AnswerSheet) {
    (
        parse_question_bank(&repo_file("question-banks/sd-matematika-1.toml")).unwrap(),
        parse_answer_sheet(&repo_file("answer-sheets/sd-matematika-1.toml")).unwrap(),
    )
}

fn survey() -> (QuestionBank, AnswerSheet) {
    (
        parse_question_bank(&repo_file("question-banks/sd-karakter-1.toml")).unwrap(),
        parse_answer_sheet(&repo_file("answer-sheets/sd-karakter-1.toml")).unwrap(),
    )
}

async fn file_store(seats: u32) -> (tempfile::TempDir, Arc<FileStore>) {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(FileStore::open(dir.path()).unwrap());
    store
        .put_license(LicenseQuota {
            code: "SKS-01".into(),
            level: Some(Level::Sd),
            total_quota: seats,
            used_count: 0,
        })
        .await
        .unwrap();
    (dir, store)
}

#[test]
fn sample_sessions_score_as_expected() {
    let (bank, sheet) = math();
    let session = sheet.replay(&bank).unwrap();
    let summary = session.score();
    assert_eq!(summary.mode, ScoringMode::Graded);
    assert_eq!(summary.score_percent, 80);
    assert_eq!(summary.topic_weakness["Pecahan"], vec![8, 9, 13]);
    assert_eq!(session.timer().elapsed_secs(), 2340);
    assert_eq!(session.progress().unanswered, 1);

    let (bank, sheet) = survey();
    let summary = sheet.replay(&bank).unwrap().score();
    assert_eq!(summary.mode, ScoringMode::Weighted);
    assert_eq!(summary.score_percent, 90);
    assert_eq!(summary.max_score, 80);
    assert!(summary.topic_weakness.is_empty());
}

#[tokio::test]
async fn full_pipeline_against_file_store() {
    let (_dir, store) = file_store(2).await;
    let gatekeeper = Gatekeeper::from_stores(&Stores::from_backend(store.clone()));

    let (bank, sheet) = math();
    let mut session = sheet.replay(&bank).unwrap();
    let first = session
        .submit(&gatekeeper, "sks-01", &StudentIdentity::new("Raisa", "sks4"))
        .await
        .unwrap();
    assert_eq!(first.student_status, StudentStatus::New);

    // Submitting the same session again returns the cached result.
    let again = session
        .submit(&gatekeeper, "sks-01", &StudentIdentity::new("Raisa", "sks4"))
        .await
        .unwrap();
    assert_eq!(again.record.id, first.record.id);

    let (survey_bank, survey_sheet) = survey();
    let mut survey_session = survey_sheet.replay(&survey_bank).unwrap();
    let returning = survey_session
        .submit(&gatekeeper, "SKS-01", &StudentIdentity::new("raisa", "SKS4"))
        .await
        .unwrap();
    assert_eq!(returning.student_status, StudentStatus::Returning);
    assert!(returning.seat.is_none());

    let mut second_student = sheet.replay(&bank).unwrap();
    second_student
        .submit(&gatekeeper, "SKS-01", &StudentIdentity::new("Bima", "SKS4"))
        .await
        .unwrap();

    let mut third_student = sheet.replay(&bank).unwrap();
    let err = third_student
        .submit(&gatekeeper, "SKS-01", &StudentIdentity::new("Citra", "SKS4"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::QuotaExceeded);

    let license = store.read_license("SKS-01").await.unwrap().unwrap();
    assert_eq!(license.used_count, 2);

    let records = store.class_results("SKS-01", "SKS4").await.unwrap();
    let report = ClassReport::build("SKS-01", "SKS4", records);
    assert_eq!(report.stats.student_count, 2);
    assert_eq!(report.stats.submission_count, 3);
    assert_eq!(report.stats.leaderboard.len(), 2);
    assert_eq!(report.student("RAISA").total_attempts, 2);
}

#[tokio::test]
async fn concurrent_students_share_last_seats() {
    let (_dir, store) = file_store(3).await;
    let gatekeeper = Gatekeeper::from_stores(&Stores::from_backend(store.clone()));
    let (bank, sheet) = math();

    let mut handles = Vec::new();
    for i in 0..8 {
        let gatekeeper = gatekeeper.clone();
        let mut session = sheet.replay(&bank).unwrap();
        handles.push(tokio::spawn(async move {
            session
                .submit(
                    &gatekeeper,
                    "SKS-01",
                    &StudentIdentity::new(format!("Siswa {i}"), "SKS4"),
                )
                .await
        }));
    }

    let mut accepted = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => accepted += 1,
            Err(e) => assert_eq!(e.kind(), ErrorKind::QuotaExceeded),
        }
    }

    assert_eq!(accepted, 3);
    let license = store.read_license("SKS-01").await.unwrap().unwrap();
    assert_eq!(license.used_count, 3);
    assert_eq!(store.class_results("SKS-01", "SKS4").await.unwrap().len(), 3);
}
