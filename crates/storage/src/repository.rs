use async_trait::async_trait;
use quiz_core::model::{
    AttemptId, AttemptRecord, AttemptRow, Question, QuestionId, Subject, SubjectId,
};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("conflict")]
    Conflict,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("io error: {0}")]
    Io(String),
}

/// Catalog of selectable subjects.
#[async_trait]
pub trait SubjectCatalog: Send + Sync {
    /// List all subjects ordered by display order, then id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the catalog cannot be read or a row is malformed.
    async fn list_subjects(&self) -> Result<Vec<Subject>, StorageError>;

    /// Persist or update a subject.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the subject cannot be stored.
    async fn upsert_subject(&self, subject: &Subject) -> Result<(), StorageError>;
}

/// Question bank keyed by subject.
#[async_trait]
pub trait QuestionStore: Send + Sync {
    /// Fetch the questions of a subject ordered by question id ascending.
    ///
    /// An unknown subject yields an empty list.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on read failures or malformed rows.
    async fn list_questions(&self, subject_id: &SubjectId) -> Result<Vec<Question>, StorageError>;

    /// Persist or update a question under a subject.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the question cannot be stored.
    async fn upsert_question(
        &self,
        subject_id: &SubjectId,
        question: &Question,
    ) -> Result<(), StorageError>;
}

/// Append-only log of completed attempts.
#[async_trait]
pub trait AttemptLog: Send + Sync {
    /// Append a completed attempt and return its id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the record cannot be stored.
    async fn append_attempt(&self, record: &AttemptRecord) -> Result<AttemptId, StorageError>;

    /// List the most recent attempts, newest first.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on read failures.
    async fn list_attempts(&self, limit: u32) -> Result<Vec<AttemptRow>, StorageError>;

    /// Delete one attempt.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if no attempt has this id.
    async fn delete_attempt(&self, id: AttemptId) -> Result<(), StorageError>;

    /// Delete every attempt for a subject and return how many were removed.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on write failures.
    async fn delete_subject_attempts(&self, subject_id: &SubjectId) -> Result<u64, StorageError>;
}

/// Simple in-memory repository implementation for testing and prototyping.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    subjects: Arc<Mutex<BTreeMap<SubjectId, Subject>>>,
    questions: Arc<Mutex<HashMap<SubjectId, BTreeMap<QuestionId, Question>>>>,
    attempts: Arc<Mutex<Vec<AttemptRow>>>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned<E: ToString>(e: E) -> StorageError {
    StorageError::Connection(e.to_string())
}

#[async_trait]
impl SubjectCatalog for InMemoryRepository {
    async fn list_subjects(&self) -> Result<Vec<Subject>, StorageError> {
        let guard = self.subjects.lock().map_err(poisoned)?;
        let mut subjects: Vec<Subject> = guard.values().cloned().collect();
        subjects.sort_by(|a, b| {
            a.display_order()
                .cmp(&b.display_order())
                .then_with(|| a.id().cmp(b.id()))
        });
        Ok(subjects)
    }

    async fn upsert_subject(&self, subject: &Subject) -> Result<(), StorageError> {
        let mut guard = self.subjects.lock().map_err(poisoned)?;
        guard.insert(subject.id().clone(), subject.clone());
        Ok(())
    }
}

#[async_trait]
impl QuestionStore for InMemoryRepository {
    async fn list_questions(&self, subject_id: &SubjectId) -> Result<Vec<Question>, StorageError> {
        let guard = self.questions.lock().map_err(poisoned)?;
        Ok(guard
            .get(subject_id)
            .map(|bank| bank.values().cloned().collect())
            .unwrap_or_default())
    }

    async fn upsert_question(
        &self,
        subject_id: &SubjectId,
        question: &Question,
    ) -> Result<(), StorageError> {
        let mut guard = self.questions.lock().map_err(poisoned)?;
        guard
            .entry(subject_id.clone())
            .or_default()
            .insert(question.id(), question.clone());
        Ok(())
    }
}

#[async_trait]
impl AttemptLog for InMemoryRepository {
    async fn append_attempt(&self, record: &AttemptRecord) -> Result<AttemptId, StorageError> {
        let mut guard = self.attempts.lock().map_err(poisoned)?;
        let next = guard.iter().map(|row| row.id.value()).max().unwrap_or(0) + 1;
        let id = AttemptId::new(next);
        guard.push(AttemptRow::new(id, record.clone()));
        Ok(id)
    }

    async fn list_attempts(&self, limit: u32) -> Result<Vec<AttemptRow>, StorageError> {
        let guard = self.attempts.lock().map_err(poisoned)?;
        let mut rows = guard.clone();
        rows.sort_by(|a, b| {
            b.record
                .attempted_at
                .cmp(&a.record.attempted_at)
                .then_with(|| b.id.cmp(&a.id))
        });
        rows.truncate(usize::try_from(limit).unwrap_or(usize::MAX));
        Ok(rows)
    }

    async fn delete_attempt(&self, id: AttemptId) -> Result<(), StorageError> {
        let mut guard = self.attempts.lock().map_err(poisoned)?;
        let before = guard.len();
        guard.retain(|row| row.id != id);
        if guard.len() == before {
            return Err(StorageError::NotFound);
        }
        Ok(())
    }

    async fn delete_subject_attempts(&self, subject_id: &SubjectId) -> Result<u64, StorageError> {
        let mut guard = self.attempts.lock().map_err(poisoned)?;
        let before = guard.len();
        guard.retain(|row| &row.record.subject_id != subject_id);
        Ok(u64::try_from(before - guard.len()).unwrap_or(u64::MAX))
    }
}

/// Aggregates the remote collaborators behind trait objects for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub subjects: Arc<dyn SubjectCatalog>,
    pub questions: Arc<dyn QuestionStore>,
    pub attempts: Arc<dyn AttemptLog>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        let repo = InMemoryRepository::new();
        let subjects: Arc<dyn SubjectCatalog> = Arc::new(repo.clone());
        let questions: Arc<dyn QuestionStore> = Arc::new(repo.clone());
        let attempts: Arc<dyn AttemptLog> = Arc::new(repo);
        Self {
            subjects,
            questions,
            attempts,
        }
    }
}
