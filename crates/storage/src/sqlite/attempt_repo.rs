use quiz_core::model::{AttemptId, AttemptRecord, AttemptRow, SubjectId};

use super::SqliteRepository;
use super::mapping::attempt_from_row;
use crate::repository::{AttemptLog, StorageError};

#[async_trait::async_trait]
impl AttemptLog for SqliteRepository {
    async fn append_attempt(&self, record: &AttemptRecord) -> Result<AttemptId, StorageError> {
        let res = sqlx::query(
            r"
                INSERT INTO attempt_history (
                    subject_id, subject_name, score, total_questions,
                    percentage, passed, time_taken, attempted_at
                )
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            ",
        )
        .bind(record.subject_id.as_str())
        .bind(record.subject_name.as_str())
        .bind(i64::from(record.score))
        .bind(i64::from(record.total_questions))
        .bind(record.percentage)
        .bind(record.passed)
        .bind(i64::from(record.time_taken_secs))
        .bind(record.attempted_at)
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        Ok(AttemptId::new(res.last_insert_rowid()))
    }

    async fn list_attempts(&self, limit: u32) -> Result<Vec<AttemptRow>, StorageError> {
        let rows = sqlx::query(
            r"
                SELECT
                    id, subject_id, subject_name, score, total_questions,
                    percentage, passed, time_taken, attempted_at
                FROM attempt_history
                ORDER BY attempted_at DESC, id DESC
                LIMIT ?1
            ",
        )
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            out.push(attempt_from_row(&row)?);
        }
        Ok(out)
    }

    async fn delete_attempt(&self, id: AttemptId) -> Result<(), StorageError> {
        let res = sqlx::query("DELETE FROM attempt_history WHERE id = ?1")
            .bind(id.value())
            .execute(&self.pool)
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        if res.rows_affected() == 0 {
            return Err(StorageError::NotFound);
        }
        Ok(())
    }

    async fn delete_subject_attempts(&self, subject_id: &SubjectId) -> Result<u64, StorageError> {
        let res = sqlx::query("DELETE FROM attempt_history WHERE subject_id = ?1")
            .bind(subject_id.as_str())
            .execute(&self.pool)
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        Ok(res.rows_affected())
    }
}
