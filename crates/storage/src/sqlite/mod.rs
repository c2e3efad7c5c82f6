use std::sync::Arc;
use std::time::Duration;

use sqlx::{SqlitePool, sqlite::SqlitePoolOptions};
use thiserror::Error;

use crate::repository::{AttemptLog, QuestionStore, Storage, SubjectCatalog};

mod attempt_repo;
mod mapping;
mod migrate;
mod question_repo;
mod subject_repo;

#[derive(Clone)]
pub struct SqliteRepository {
    pool: SqlitePool,
}

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SqliteInitError {
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

impl SqliteRepository {
    /// Open a small pool over the quiz database.
    ///
    /// Each connection enables `foreign_keys`, so deleting a subject cascades
    /// to its questions, and waits up to five seconds on a locked database
    /// (`busy_timeout`), since the seed tool and a running quiz may write the
    /// attempt log at the same time.
    ///
    /// # Errors
    ///
    /// Returns `SqliteInitError` if no connection can be opened or either
    /// pragma is rejected.
    pub async fn connect(database_url: &str) -> Result<Self, SqliteInitError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(5))
            .after_connect(|conn, _meta| {
                Box::pin(async move {
                    sqlx::query("PRAGMA foreign_keys = ON;")
                        .execute(&mut *conn)
                        .await?;
                    sqlx::query("PRAGMA busy_timeout = 5000;")
                        .execute(&mut *conn)
                        .await?;
                    Ok(())
                })
            })
            .connect(database_url)
            .await?;
        Ok(Self { pool })
    }

    #[must_use]
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Create tables if they do not exist.
    ///
    /// # Errors
    ///
    /// Returns `SqliteInitError` if migration queries fail.
    pub async fn migrate(&self) -> Result<(), SqliteInitError> {
        migrate::run_migrations(&self.pool).await
    }
}

impl Storage {
    /// Build a `Storage` backed by `SQLite`.
    ///
    /// # Errors
    ///
    /// Returns `SqliteInitError` if connection or migrations cannot be
    /// completed.
    pub async fn sqlite(database_url: &str) -> Result<Self, SqliteInitError> {
        let repo = SqliteRepository::connect(database_url).await?;
        repo.migrate().await?;
        let subjects: Arc<dyn SubjectCatalog> = Arc::new(repo.clone());
        let questions: Arc<dyn QuestionStore> = Arc::new(repo.clone());
        let attempts: Arc<dyn AttemptLog> = Arc::new(repo);
        Ok(Self {
            subjects,
            questions,
            attempts,
        })
    }
}
