use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use quiz_core::model::{AttemptId, AttemptRow, SubjectId};
use storage::repository::{AttemptLog, StorageError};

use crate::error::HistoryError;

/// Number of attempts shown by default in the history list.
pub const DEFAULT_HISTORY_LIMIT: u32 = 50;

/// Number of recent attempts folded into statistics.
pub const DEFAULT_STATS_WINDOW: u32 = 1_000;

/// Aggregates for one subject.
#[derive(Debug, Clone, PartialEq)]
pub struct SubjectStats {
    pub subject_id: SubjectId,
    /// Name recorded by the most recent attempt.
    pub subject_name: String,
    pub attempts: u32,
    pub passed: u32,
    pub best_percentage: f64,
    pub average_percentage: f64,
    pub last_percentage: f64,
    pub last_attempted_at: DateTime<Utc>,
}

/// Aggregates across every subject.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GlobalStats {
    pub attempts: u32,
    pub passed: u32,
    pub subjects_attempted: u32,
    /// Share of passed attempts, 0..=100.
    pub pass_rate: f64,
    pub average_percentage: f64,
}

/// Read and prune the attempt log.
#[derive(Clone)]
pub struct AttemptHistoryService {
    attempts: Arc<dyn AttemptLog>,
    stats_window: u32,
}

impl AttemptHistoryService {
    #[must_use]
    pub fn new(attempts: Arc<dyn AttemptLog>) -> Self {
        Self {
            attempts,
            stats_window: DEFAULT_STATS_WINDOW,
        }
    }

    #[must_use]
    pub fn with_stats_window(mut self, window: u32) -> Self {
        self.stats_window = window.max(1);
        self
    }

    /// Most recent attempts, newest first.
    ///
    /// # Errors
    ///
    /// Returns `HistoryError::Storage` if the log cannot be read.
    pub async fn list_recent(&self, limit: u32) -> Result<Vec<AttemptRow>, HistoryError> {
        Ok(self.attempts.list_attempts(limit).await?)
    }

    /// # Errors
    ///
    /// Returns `HistoryError::NotFound` if no attempt has this id.
    pub async fn delete_attempt(&self, id: AttemptId) -> Result<(), HistoryError> {
        match self.attempts.delete_attempt(id).await {
            Ok(()) => Ok(()),
            Err(StorageError::NotFound) => Err(HistoryError::NotFound),
            Err(e) => Err(e.into()),
        }
    }

    /// Remove every attempt of a subject, returning how many were deleted.
    ///
    /// # Errors
    ///
    /// Returns `HistoryError::Storage` on write failures.
    pub async fn clear_subject(&self, subject_id: &SubjectId) -> Result<u64, HistoryError> {
        let removed = self.attempts.delete_subject_attempts(subject_id).await?;
        tracing::info!(subject = %subject_id, removed, "cleared subject history");
        Ok(removed)
    }

    /// Per-subject aggregates, most recently attempted subject first.
    ///
    /// # Errors
    ///
    /// Returns `HistoryError::Storage` if the log cannot be read.
    pub async fn subject_stats(&self) -> Result<Vec<SubjectStats>, HistoryError> {
        let rows = self.attempts.list_attempts(self.stats_window).await?;
        Ok(summarize_subjects(&rows))
    }

    /// # Errors
    ///
    /// Returns `HistoryError::Storage` if the log cannot be read.
    pub async fn global_stats(&self) -> Result<GlobalStats, HistoryError> {
        let rows = self.attempts.list_attempts(self.stats_window).await?;
        Ok(summarize_global(&rows))
    }
}

/// Fold attempts into per-subject aggregates. Input order does not matter.
#[must_use]
pub fn summarize_subjects(rows: &[AttemptRow]) -> Vec<SubjectStats> {
    let mut by_subject: HashMap<&SubjectId, SubjectStats> = HashMap::new();
    let mut sums: HashMap<&SubjectId, f64> = HashMap::new();

    for row in rows {
        let record = &row.record;
        *sums.entry(&record.subject_id).or_default() += record.percentage;
        let stats = by_subject
            .entry(&record.subject_id)
            .or_insert_with(|| SubjectStats {
                subject_id: record.subject_id.clone(),
                subject_name: record.subject_name.clone(),
                attempts: 0,
                passed: 0,
                best_percentage: record.percentage,
                average_percentage: 0.0,
                last_percentage: record.percentage,
                last_attempted_at: record.attempted_at,
            });
        stats.attempts += 1;
        stats.passed += u32::from(record.passed);
        stats.best_percentage = stats.best_percentage.max(record.percentage);
        if record.attempted_at > stats.last_attempted_at {
            stats.last_attempted_at = record.attempted_at;
            stats.last_percentage = record.percentage;
            stats.subject_name.clone_from(&record.subject_name);
        }
    }

    let mut out: Vec<SubjectStats> = by_subject
        .into_iter()
        .map(|(id, mut stats)| {
            let sum = sums.get(id).copied().unwrap_or_default();
            stats.average_percentage = sum / f64::from(stats.attempts);
            stats
        })
        .collect();
    out.sort_by(|a, b| {
        b.last_attempted_at
            .cmp(&a.last_attempted_at)
            .then_with(|| a.subject_id.cmp(&b.subject_id))
    });
    out
}

#[must_use]
pub fn summarize_global(rows: &[AttemptRow]) -> GlobalStats {
    if rows.is_empty() {
        return GlobalStats::default();
    }
    let attempts = u32::try_from(rows.len()).unwrap_or(u32::MAX);
    let passed = u32::try_from(rows.iter().filter(|row| row.record.passed).count())
        .unwrap_or(u32::MAX);
    let sum: f64 = rows.iter().map(|row| row.record.percentage).sum();
    let subjects_attempted = rows
        .iter()
        .map(|row| &row.record.subject_id)
        .collect::<std::collections::HashSet<_>>()
        .len();

    GlobalStats {
        attempts,
        passed,
        subjects_attempted: u32::try_from(subjects_attempted).unwrap_or(u32::MAX),
        pass_rate: f64::from(passed) * 100.0 / f64::from(attempts),
        average_percentage: sum / f64::from(attempts),
    }
}
