//! Shared error types for the services crate.

use thiserror::Error;

use quiz_core::model::{QuestionSetError, SubjectId};
use storage::repository::StorageError;
use storage::sqlite::SqliteInitError;

/// Errors emitted by the session loader and orchestrator.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SessionError {
    #[error("No questions found for this subject")]
    NoQuestions,
    #[error("unknown subject: {0}")]
    UnknownSubject(SubjectId),
    #[error(transparent)]
    QuestionSet(#[from] QuestionSetError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by `AttemptHistoryService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum HistoryError {
    #[error("attempt not found")]
    NotFound,
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by `AdminSettingsService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AdminError {
    #[error("admin access is not configured")]
    Disabled,
    #[error("admin authentication required")]
    Unauthenticated,
    #[error("failed to encode visibility overrides: {0}")]
    Encode(#[from] serde_json::Error),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted while bootstrapping app services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AppServicesError {
    #[error(transparent)]
    Sqlite(#[from] SqliteInitError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error("failed to prepare state directory: {0}")]
    StateDir(#[from] std::io::Error),
}
