use quiz_core::model::Subject;

use super::SqliteRepository;
use super::mapping::subject_from_row;
use crate::repository::{StorageError, SubjectCatalog};

#[async_trait::async_trait]
impl SubjectCatalog for SqliteRepository {
    async fn list_subjects(&self) -> Result<Vec<Subject>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT id, name, is_active, display_order, duration, passing_score
            FROM subjects
            ORDER BY display_order ASC, id ASC
            ",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        let mut subjects = Vec::with_capacity(rows.len());
        for row in rows {
            subjects.push(subject_from_row(&row)?);
        }
        Ok(subjects)
    }

    async fn upsert_subject(&self, subject: &Subject) -> Result<(), StorageError> {
        sqlx::query(
            r"
            INSERT INTO subjects (id, name, is_active, display_order, duration, passing_score)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                is_active = excluded.is_active,
                display_order = excluded.display_order,
                duration = excluded.duration,
                passing_score = excluded.passing_score
            ",
        )
        .bind(subject.id().as_str())
        .bind(subject.name())
        .bind(subject.is_active())
        .bind(subject.display_order())
        .bind(i64::from(subject.duration_secs()))
        .bind(i64::from(subject.passing_score()))
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        Ok(())
    }
}
