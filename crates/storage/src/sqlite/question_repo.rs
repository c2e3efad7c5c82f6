use quiz_core::model::{Question, SubjectId};

use super::SqliteRepository;
use super::mapping::{question_from_row, question_id_to_i64, ser};
use crate::repository::{QuestionStore, StorageError};

#[async_trait::async_trait]
impl QuestionStore for SqliteRepository {
    async fn list_questions(&self, subject_id: &SubjectId) -> Result<Vec<Question>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT id, question, options, correct_answer, topic
            FROM questions
            WHERE subject_id = ?1
            ORDER BY id ASC
            ",
        )
        .bind(subject_id.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        let mut questions = Vec::with_capacity(rows.len());
        for row in rows {
            questions.push(question_from_row(&row)?);
        }
        Ok(questions)
    }

    async fn upsert_question(
        &self,
        subject_id: &SubjectId,
        question: &Question,
    ) -> Result<(), StorageError> {
        let options = serde_json::to_string(question.options()).map_err(ser)?;

        sqlx::query(
            r"
            INSERT INTO questions (id, subject_id, question, options, correct_answer, topic)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ON CONFLICT(subject_id, id) DO UPDATE SET
                question = excluded.question,
                options = excluded.options,
                correct_answer = excluded.correct_answer,
                topic = excluded.topic
            ",
        )
        .bind(question_id_to_i64(question.id())?)
        .bind(subject_id.as_str())
        .bind(question.text())
        .bind(options)
        .bind(i64::from(question.correct_answer()))
        .bind(question.topic())
        .execute(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(db) if db.is_foreign_key_violation() => StorageError::NotFound,
            other => StorageError::Connection(other.to_string()),
        })?;

        Ok(())
    }
}
