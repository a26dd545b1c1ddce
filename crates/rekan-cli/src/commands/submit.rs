//! The `rekan submit` command.

use std::path::PathBuf;

use anyhow::Result;

use rekan_core::error::SubmissionError;
use rekan_core::gatekeeper::{
    FinalizedSubmission, Gatekeeper, StudentStatus, SubmissionObserver, SubmissionState,
};
use rekan_core::model::StudentIdentity;
use rekan_core::traits::SeatClaim;
use rekan_core::timer::format_clock;
use rekan_store::config::{create_store, load_config_from};

use super::score::{load_session, print_summary};

/// Console submission observer.
struct ConsoleObserver;

impl SubmissionObserver for ConsoleObserver {
    fn on_state(&self, state: SubmissionState) {
        eprintln!("  {state}...");
    }

    fn on_done(&self, finalized: &FinalizedSubmission) {
        eprintln!("  Saved result {}", finalized.record.id);
    }

    fn on_failed(&self, error: &SubmissionError) {
        eprintln!("  FAILED: {error}");
    }
}

pub async fn execute(
    bank_path: PathBuf,
    answers_path: PathBuf,
    student: String,
    class: String,
    license: String,
    config_path: Option<PathBuf>,
) -> Result<()> {
    let config = load_config_from(config_path.as_deref())?;
    let (bank, mut session) = load_session(&bank_path, &answers_path, &config.exam)?;

    let stores = create_store(&config.store)?;
    tracing::debug!(store = stores.name(), exam = %bank.exam, "store opened for submission");
    let gatekeeper = Gatekeeper::from_stores(&stores);
    let identity = StudentIdentity::new(student, class);

    eprintln!(
        "Submitting {} for {} ({}) via {} store",
        bank.exam,
        identity.student_name.trim(),
        identity.class_code.trim(),
        stores.name()
    );

    let finalized = session
        .submit_with(&gatekeeper, &license, &identity, &ConsoleObserver)
        .await
        .map_err(|e| {
            if e.is_retryable() {
                anyhow::anyhow!("{e} (safe to retry)")
            } else {
                anyhow::Error::new(e)
            }
        })?;

    let record = &finalized.record;
    match finalized.student_status {
        StudentStatus::New => println!("New student {} in class {}", record.student_name, record.class_code),
        StudentStatus::Returning => println!(
            "Returning student {} in class {}",
            record.student_name, record.class_code
        ),
    }
    match finalized.seat {
        Some(SeatClaim::Claimed {
            used_count,
            total_quota,
        })
        | Some(SeatClaim::AlreadyHeld {
            used_count,
            total_quota,
        }) => println!("License {}: {used_count} of {total_quota} seats used", record.license_code),
        _ => {}
    }
    println!(
        "Time used: {}",
        format_clock(record.elapsed_seconds)
    );
    print_summary(&session.score(), bank.exam.kind());

    Ok(())
}
