//! Validated decoding of database rows into domain entities.
//!
//! Rows that fail validation surface as `StorageError::Serialization` so the
//! session layer only ever sees well-formed subjects and questions.

use chrono::{DateTime, Utc};
use quiz_core::model::{
    AttemptId, AttemptRecord, AttemptRow, Question, QuestionId, Subject, SubjectId,
};
use sqlx::Row;
use sqlx::sqlite::SqliteRow;

use crate::repository::StorageError;

pub(crate) fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

fn u32_from_i64(field: &'static str, v: i64) -> Result<u32, StorageError> {
    u32::try_from(v).map_err(|_| StorageError::Serialization(format!("invalid {field}: {v}")))
}

pub(crate) fn question_id_to_i64(id: QuestionId) -> Result<i64, StorageError> {
    i64::try_from(id.value()).map_err(|_| StorageError::Serialization("question id overflow".into()))
}

pub(crate) fn subject_from_row(row: &SqliteRow) -> Result<Subject, StorageError> {
    let id: String = row.try_get("id").map_err(ser)?;
    let name: String = row.try_get("name").map_err(ser)?;
    let active: bool = row.try_get("is_active").map_err(ser)?;
    let display_order: i64 = row.try_get("display_order").map_err(ser)?;
    let duration = u32_from_i64("duration", row.try_get::<i64, _>("duration").map_err(ser)?)?;
    let passing_score = u32_from_i64(
        "passing_score",
        row.try_get::<i64, _>("passing_score").map_err(ser)?,
    )?;

    Subject::new(
        SubjectId::new(id),
        name,
        duration,
        passing_score,
        active,
        display_order,
    )
    .map_err(ser)
}

pub(crate) fn question_from_row(row: &SqliteRow) -> Result<Question, StorageError> {
    let id: i64 = row.try_get("id").map_err(ser)?;
    let id = u64::try_from(id)
        .map_err(|_| StorageError::Serialization(format!("invalid question id: {id}")))?;
    let text: String = row.try_get("question").map_err(ser)?;
    let options_json: String = row.try_get("options").map_err(ser)?;
    let options: Vec<String> = serde_json::from_str(&options_json).map_err(ser)?;
    let correct = u32_from_i64(
        "correct_answer",
        row.try_get::<i64, _>("correct_answer").map_err(ser)?,
    )?;
    let topic: Option<String> = row.try_get("topic").map_err(ser)?;

    Question::new(QuestionId::new(id), text, options, correct, topic).map_err(ser)
}

pub(crate) fn attempt_from_row(row: &SqliteRow) -> Result<AttemptRow, StorageError> {
    let id: i64 = row.try_get("id").map_err(ser)?;
    let subject_id: String = row.try_get("subject_id").map_err(ser)?;
    let subject_name: String = row.try_get("subject_name").map_err(ser)?;
    let score = u32_from_i64("score", row.try_get::<i64, _>("score").map_err(ser)?)?;
    let total_questions = u32_from_i64(
        "total_questions",
        row.try_get::<i64, _>("total_questions").map_err(ser)?,
    )?;
    let percentage: f64 = row.try_get("percentage").map_err(ser)?;
    let passed: bool = row.try_get("passed").map_err(ser)?;
    let time_taken_secs =
        u32_from_i64("time_taken", row.try_get::<i64, _>("time_taken").map_err(ser)?)?;
    let attempted_at: DateTime<Utc> = row.try_get("attempted_at").map_err(ser)?;

    Ok(AttemptRow::new(
        AttemptId::new(id),
        AttemptRecord {
            subject_id: SubjectId::new(subject_id),
            subject_name,
            score,
            total_questions,
            percentage,
            passed,
            time_taken_secs,
            attempted_at,
        },
    ))
}
