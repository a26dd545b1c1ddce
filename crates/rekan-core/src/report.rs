//! Class report types with JSON persistence.

use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::model::{normalize_code, SubmissionRecord};
use crate::statistics::{compute_class_stats, student_progress, ClassStats, StudentProgress};

/// A snapshot of one class's results under one license.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassReport {
    /// Unique report identifier.
    pub id: Uuid,
    /// When the report was created.
    pub created_at: DateTime<Utc>,
    pub license_code: String,
    pub class_code: String,
    /// Dashboard aggregates.
    pub stats: ClassStats,
    /// The records the aggregates were computed from, newest first.
    pub records: Vec<SubmissionRecord>,
}

impl ClassReport {
    pub fn build(license_code: &str, class_code: &str, mut records: Vec<SubmissionRecord>) -> Self {
        records.sort_by(|a, b| b.submitted_at.cmp(&a.submitted_at));
        Self {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            license_code: normalize_code(license_code),
            class_code: normalize_code(class_code),
            stats: compute_class_stats(&records),
            records,
        }
    }

    /// Progress of one student in this class.
    pub fn student(&self, student_name: &str) -> StudentProgress {
        student_progress(&self.records, student_name)
    }

    /// Save the report as JSON to a file.
    pub fn save_json(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).context("failed to serialize report")?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, json)
            .with_context(|| format!("failed to write report to {}", path.display()))?;
        Ok(())
    }

    /// Load a report from a JSON file.
    pub fn load_json(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read report from {}", path.display()))?;
        let report: ClassReport =
            serde_json::from_str(&content).context("failed to parse report JSON")?;
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::model::{Level, Subject};

    fn record(name: &str, score: u32, minutes_ago: i64) -> SubmissionRecord {
        SubmissionRecord {
            id: Uuid::new_v4(),
            attempt_token: Uuid::new_v4(),
            license_code: "SKS-01".into(),
            student_name: name.into(),
            class_code: "SKS4".into(),
            level: Level::Sd,
            package_number: 1,
            subject: Subject::Matematika,
            score_percent: score,
            earned_score: score * 30 / 100,
            max_score: 30,
            correct_count: score * 30 / 100,
            question_count: 30,
            elapsed_seconds: 1800,
            topic_weakness: BTreeMap::from([("Pecahan".to_string(), vec![3, 9])]),
            submitted_at: Utc::now() - chrono::Duration::minutes(minutes_ago),
        }
    }

    #[test]
    fn build_sorts_newest_first() {
        let report = ClassReport::build(
            "sks-01",
            "sks4",
            vec![record("Raisa", 80, 30), record("Bima", 60, 5)],
        );
        assert_eq!(report.class_code, "SKS4");
        assert_eq!(report.records[0].student_name, "Bima");
        assert_eq!(report.stats.student_count, 2);
        assert_eq!(report.student("raisa").highest_score, 80);
    }

    #[test]
    fn json_roundtrip() {
        let report = ClassReport::build("SKS-01", "SKS4", vec![record("Raisa", 80, 1)]);
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reports/sks4.json");

        report.save_json(&path).unwrap();
        let loaded = ClassReport::load_json(&path).unwrap();

        assert_eq!(loaded.id, report.id);
        assert_eq!(loaded.records.len(), 1);
        assert_eq!(loaded.stats.leaderboard[0].student_name, "Raisa");
        assert_eq!(loaded.stats.topic_misses[0].misses, 2);
    }
}
