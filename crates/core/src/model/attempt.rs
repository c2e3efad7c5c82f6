use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::ids::{AttemptId, SubjectId};
use crate::scoring::ScoreReport;

/// Immutable summary of one submitted session, appended to the attempt log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttemptRecord {
    pub subject_id: SubjectId,
    pub subject_name: String,
    pub score: u32,
    pub total_questions: u32,
    pub percentage: f64,
    pub passed: bool,
    pub time_taken_secs: u32,
    pub attempted_at: DateTime<Utc>,
}

impl AttemptRecord {
    /// Builds the record for a finished session.
    ///
    /// `time_taken_secs` is `initial_duration - time_left`, floored at zero.
    #[must_use]
    pub fn from_submission(
        subject_id: SubjectId,
        subject_name: impl Into<String>,
        report: &ScoreReport,
        initial_duration_secs: u32,
        time_left_secs: u32,
        attempted_at: DateTime<Utc>,
    ) -> Self {
        Self {
            subject_id,
            subject_name: subject_name.into(),
            score: report.score,
            total_questions: report.total,
            percentage: report.percentage,
            passed: report.passed,
            time_taken_secs: initial_duration_secs.saturating_sub(time_left_secs),
            attempted_at,
        }
    }
}

/// A logged attempt together with its storage id.
#[derive(Debug, Clone, PartialEq)]
pub struct AttemptRow {
    pub id: AttemptId,
    pub record: AttemptRecord,
}

impl AttemptRow {
    #[must_use]
    pub fn new(id: AttemptId, record: AttemptRecord) -> Self {
        Self { id, record }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::fixed_now;

    fn report() -> ScoreReport {
        ScoreReport {
            score: 1,
            total: 2,
            percentage: 50.0,
            passed: false,
            incorrect: 1,
            unanswered: 0,
            review: Vec::new(),
        }
    }

    #[test]
    fn time_taken_is_floored_at_zero() {
        let record = AttemptRecord::from_submission(
            SubjectId::new("s"),
            "S",
            &report(),
            100,
            120,
            fixed_now(),
        );
        assert_eq!(record.time_taken_secs, 0);
    }

    #[test]
    fn copies_score_fields() {
        let record =
            AttemptRecord::from_submission(SubjectId::new("s"), "S", &report(), 600, 420, fixed_now());
        assert_eq!(record.score, 1);
        assert_eq!(record.total_questions, 2);
        assert!(!record.passed);
        assert_eq!(record.time_taken_secs, 180);
    }
}
