//! Class and student statistics over stored submission records.
//!
//! Overall averages and the leaderboard cover assessment subjects only;
//! survey percentages sit on a different scale and are reported per subject.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::model::{collapse_whitespace, SessionKind, Subject, SubmissionRecord};
use crate::scoring::ScoreBand;

/// Aggregates for one subject.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubjectStats {
    pub subject: Subject,
    pub submissions: usize,
    pub average_score: f64,
    pub highest_score: u32,
}

/// One row of the class leaderboard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    /// Competition rank: ties share a rank and the next rank is skipped.
    pub rank: usize,
    pub student_name: String,
    pub best_score: u32,
    /// Elapsed seconds of the fastest attempt at `best_score`.
    pub best_elapsed_seconds: u32,
    pub attempts: usize,
    pub band: ScoreBand,
}

/// How often a topic was missed across the class.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicMiss {
    pub topic: String,
    pub misses: usize,
    /// Distinct students with at least one miss in this topic.
    pub students: usize,
}

/// Dashboard data for one class under one license.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassStats {
    pub student_count: usize,
    pub submission_count: usize,
    pub average_score: f64,
    pub highest_score: u32,
    pub per_subject: Vec<SubjectStats>,
    pub leaderboard: Vec<LeaderboardEntry>,
    pub topic_misses: Vec<TopicMiss>,
}

/// One student's history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudentProgress {
    pub student_name: String,
    pub total_attempts: usize,
    pub average_score: f64,
    pub highest_score: u32,
}

fn student_key(name: &str) -> String {
    collapse_whitespace(name).to_lowercase()
}

fn is_assessment(record: &SubmissionRecord) -> bool {
    record.subject.kind() == SessionKind::Assessment
}

fn average(scores: impl Iterator<Item = u32>) -> f64 {
    let (sum, count) = scores.fold((0u64, 0u64), |(s, c), x| (s + x as u64, c + 1));
    if count == 0 {
        0.0
    } else {
        sum as f64 / count as f64
    }
}

/// Compute dashboard statistics for a set of records.
pub fn compute_class_stats(records: &[SubmissionRecord]) -> ClassStats {
    let students: BTreeSet<String> = records
        .iter()
        .map(|r| student_key(&r.student_name))
        .collect();

    let per_subject = Subject::ALL
        .iter()
        .filter_map(|&subject| {
            let scores: Vec<u32> = records
                .iter()
                .filter(|r| r.subject == subject)
                .map(|r| r.score_percent)
                .collect();
            if scores.is_empty() {
                return None;
            }
            Some(SubjectStats {
                subject,
                submissions: scores.len(),
                average_score: average(scores.iter().copied()),
                highest_score: scores.iter().copied().max().unwrap_or(0),
            })
        })
        .collect();

    ClassStats {
        student_count: students.len(),
        submission_count: records.len(),
        average_score: average(
            records
                .iter()
                .filter(|r| is_assessment(r))
                .map(|r| r.score_percent),
        ),
        highest_score: records
            .iter()
            .filter(|r| is_assessment(r))
            .map(|r| r.score_percent)
            .max()
            .unwrap_or(0),
        per_subject,
        leaderboard: leaderboard(records),
        topic_misses: topic_misses(records),
    }
}

/// Rank students by best assessment score, then shorter time, then name.
pub fn leaderboard(records: &[SubmissionRecord]) -> Vec<LeaderboardEntry> {
    let mut best: BTreeMap<String, LeaderboardEntry> = BTreeMap::new();

    for r in records.iter().filter(|r| is_assessment(r)) {
        let entry = best
            .entry(student_key(&r.student_name))
            .or_insert_with(|| LeaderboardEntry {
                rank: 0,
                student_name: r.student_name.clone(),
                best_score: r.score_percent,
                best_elapsed_seconds: r.elapsed_seconds,
                attempts: 0,
                band: ScoreBand::from_percent(r.score_percent),
            });
        entry.attempts += 1;
        if r.score_percent > entry.best_score
            || (r.score_percent == entry.best_score
                && r.elapsed_seconds < entry.best_elapsed_seconds)
        {
            entry.best_score = r.score_percent;
            entry.best_elapsed_seconds = r.elapsed_seconds;
            entry.band = ScoreBand::from_percent(r.score_percent);
        }
    }

    let mut rows: Vec<LeaderboardEntry> = best.into_values().collect();
    rows.sort_by(|a, b| {
        b.best_score
            .cmp(&a.best_score)
            .then(a.best_elapsed_seconds.cmp(&b.best_elapsed_seconds))
            .then_with(|| a.student_name.to_lowercase().cmp(&b.student_name.to_lowercase()))
    });

    let mut previous: Option<(u32, u32)> = None;
    let mut rank = 0;
    for (position, row) in rows.iter_mut().enumerate() {
        let key = (row.best_score, row.best_elapsed_seconds);
        if previous != Some(key) {
            rank = position + 1;
            previous = Some(key);
        }
        row.rank = rank;
    }
    rows
}

/// Topics ordered by how often they were missed, most first.
pub fn topic_misses(records: &[SubmissionRecord]) -> Vec<TopicMiss> {
    let mut tally: BTreeMap<&str, (usize, BTreeSet<String>)> = BTreeMap::new();
    for r in records {
        for (topic, numbers) in &r.topic_weakness {
            if numbers.is_empty() {
                continue;
            }
            let (misses, students) = tally.entry(topic.as_str()).or_default();
            *misses += numbers.len();
            students.insert(student_key(&r.student_name));
        }
    }

    let mut rows: Vec<TopicMiss> = tally
        .into_iter()
        .map(|(topic, (misses, students))| TopicMiss {
            topic: topic.to_string(),
            misses,
            students: students.len(),
        })
        .collect();
    rows.sort_by(|a, b| b.misses.cmp(&a.misses).then_with(|| a.topic.cmp(&b.topic)));
    rows
}

/// Attempts, average and best score for one student (name matched case-insensitively).
pub fn student_progress(records: &[SubmissionRecord], student_name: &str) -> StudentProgress {
    let key = student_key(student_name);
    let mine: Vec<&SubmissionRecord> = records
        .iter()
        .filter(|r| student_key(&r.student_name) == key)
        .collect();

    StudentProgress {
        student_name: mine
            .first()
            .map(|r| r.student_name.clone())
            .unwrap_or_else(|| collapse_whitespace(student_name)),
        total_attempts: mine.len(),
        average_score: average(mine.iter().map(|r| r.score_percent)),
        highest_score: mine.iter().map(|r| r.score_percent).max().unwrap_or(0),
    }
}
