//! The `rekan score` command.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use rekan_core::model::SessionKind;
use rekan_core::parser::{parse_answer_sheet, parse_question_bank, QuestionBank};
use rekan_core::scoring::{ScoreSummary, ScoringMode};
use rekan_core::session::ExamSession;
use rekan_core::timer::format_clock;
use rekan_store::config::{load_config_from, ExamConfig};

/// Replay an answer sheet on a bank, using the configured time budget.
pub(crate) fn load_session(
    bank_path: &Path,
    answers_path: &Path,
    exam: &ExamConfig,
) -> Result<(QuestionBank, ExamSession)> {
    let bank = parse_question_bank(bank_path)?;
    let sheet = parse_answer_sheet(answers_path)?;
    let budget = exam.budget_secs(bank.exam.kind());
    let session = sheet
        .replay_with_budget(&bank, budget)
        .with_context(|| format!("invalid answer in {}", answers_path.display()))?;
    Ok((bank, session))
}

pub fn execute(
    bank_path: PathBuf,
    answers_path: PathBuf,
    format: String,
    config_path: Option<PathBuf>,
) -> Result<()> {
    let config = load_config_from(config_path.as_deref())?;
    let (bank, session) = load_session(&bank_path, &answers_path, &config.exam)?;
    let summary = session.score();

    match format.as_str() {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        _ => {
            let timer = session.timer();
            println!(
                "{} {} paket {}: {} questions",
                bank.exam.level.label(),
                bank.exam.subject.label(),
                bank.exam.package_number,
                summary.question_count
            );
            println!(
                "Time used: {} of {}",
                format_clock(timer.elapsed_secs()),
                format_clock(timer.budget_secs())
            );
            print_summary(&summary, bank.exam.kind());
        }
    }

    Ok(())
}

pub(crate) fn print_summary(summary: &ScoreSummary, kind: SessionKind) {
    use comfy_table::{Cell, Table};

    match (kind, summary.mode) {
        (SessionKind::Survey, _) | (_, ScoringMode::Weighted) => {
            println!(
                "Score: {}% ({} of {} points) - {}",
                summary.score_percent,
                summary.earned_score,
                summary.max_score,
                summary.predicate()
            );
        }
        _ => {
            println!(
                "Score: {}% ({} of {} correct, band {:?})",
                summary.score_percent, summary.correct_count, summary.question_count, summary.band()
            );
        }
    }

    if !summary.topics.is_empty() {
        let mut table = Table::new();
        table.set_header(vec!["Topic", "Earned", "Possible", "Score", "Status"]);
        for (topic, score) in &summary.topics {
            let status = if score.is_strength() {
                "strength"
            } else {
                "weakness"
            };
            table.add_row(vec![
                Cell::new(topic),
                Cell::new(score.earned),
                Cell::new(score.possible),
                Cell::new(format!("{}%", score.percent())),
                Cell::new(status),
            ]);
        }
        println!("\n{table}");
    }

    if !summary.topic_weakness.is_empty() {
        println!("\nMissed questions by topic:");
        for (topic, numbers) in &summary.topic_weakness {
            let numbers: Vec<String> = numbers.iter().map(|n| n.to_string()).collect();
            println!("  {topic}: {}", numbers.join(", "));
        }
    }

    for w in &summary.warnings {
        println!("  [{}] WARNING: question {}: {}", w.question_id, w.number, w.message);
    }
}
