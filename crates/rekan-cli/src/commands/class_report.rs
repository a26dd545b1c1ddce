//! The `rekan class-report` command.

use std::path::PathBuf;

use anyhow::{Context, Result};

use rekan_core::report::ClassReport;
use rekan_core::timer::format_clock;
use rekan_store::config::{create_store, load_config_from};

pub async fn execute(
    class: String,
    license: String,
    format: String,
    output: Option<PathBuf>,
    config_path: Option<PathBuf>,
) -> Result<()> {
    let config = load_config_from(config_path.as_deref())?;
    let stores = create_store(&config.store)?;
    tracing::debug!(store = stores.name(), %class, %license, "loading class results");

    let records = stores
        .results
        .class_results(&license, &class)
        .await
        .context("failed to load class results")?;
    let report = ClassReport::build(&license, &class, records);
    tracing::info!(
        students = report.stats.student_count,
        submissions = report.stats.submission_count,
        "class report built"
    );

    if let Some(path) = &output {
        report.save_json(path)?;
        eprintln!("Report saved to: {}", path.display());
    }

    match format.as_str() {
        "json" => println!("{}", serde_json::to_string_pretty(&report)?),
        _ => print_report(&report),
    }

    Ok(())
}

fn print_report(report: &ClassReport) {
    use comfy_table::{Cell, Table};

    let stats = &report.stats;
    println!(
        "Class {} (license {}): {} students, {} submissions",
        report.class_code, report.license_code, stats.student_count, stats.submission_count
    );
    if stats.submission_count == 0 {
        println!("No submissions yet.");
        return;
    }
    println!(
        "Assessment average {:.1}%, highest {}%",
        stats.average_score, stats.highest_score
    );

    let mut subjects = Table::new();
    subjects.set_header(vec!["Subject", "Submissions", "Average", "Highest"]);
    for s in &stats.per_subject {
        subjects.add_row(vec![
            Cell::new(s.subject.label()),
            Cell::new(s.submissions),
            Cell::new(format!("{:.1}%", s.average_score)),
            Cell::new(format!("{}%", s.highest_score)),
        ]);
    }
    println!("\n{subjects}");

    if !stats.leaderboard.is_empty() {
        let mut board = Table::new();
        board.set_header(vec!["Rank", "Student", "Best", "Time", "Attempts", "Band"]);
        for entry in &stats.leaderboard {
            board.add_row(vec![
                Cell::new(entry.rank),
                Cell::new(&entry.student_name),
                Cell::new(format!("{}%", entry.best_score)),
                Cell::new(format_clock(entry.best_elapsed_seconds)),
                Cell::new(entry.attempts),
                Cell::new(format!("{:?}", entry.band)),
            ]);
        }
        println!("\n{board}");
    }

    if !stats.topic_misses.is_empty() {
        let mut topics = Table::new();
        topics.set_header(vec!["Topic", "Misses", "Students"]);
        for miss in &stats.topic_misses {
            topics.add_row(vec![
                Cell::new(&miss.topic),
                Cell::new(miss.misses),
                Cell::new(miss.students),
            ]);
        }
        println!("\n{topics}");
    }
}
