use thiserror::Error;

use crate::model::ids::SubjectId;

/// Passing threshold applied when a subject does not carry its own.
pub const DEFAULT_PASSING_SCORE: u8 = 90;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SubjectError {
    #[error("subject id cannot be empty")]
    EmptyId,

    #[error("subject name cannot be empty")]
    EmptyName,

    #[error("subject duration must be > 0 seconds")]
    InvalidDuration,

    #[error("passing score must be between 0 and 100, got {0}")]
    InvalidPassingScore(u32),
}

//
// ─── SUBJECT ───────────────────────────────────────────────────────────────────
//

/// A selectable quiz with its own time limit and passing threshold.
///
/// Immutable once loaded from the catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subject {
    id: SubjectId,
    name: String,
    duration_secs: u32,
    passing_score: u8,
    active: bool,
    display_order: i64,
}

impl Subject {
    /// Creates a validated subject.
    ///
    /// # Errors
    ///
    /// Returns `SubjectError` if the id or name is blank, the duration is zero,
    /// or the passing score exceeds 100.
    pub fn new(
        id: SubjectId,
        name: impl Into<String>,
        duration_secs: u32,
        passing_score: u32,
        active: bool,
        display_order: i64,
    ) -> Result<Self, SubjectError> {
        if id.as_str().trim().is_empty() {
            return Err(SubjectError::EmptyId);
        }
        let name = name.into();
        if name.trim().is_empty() {
            return Err(SubjectError::EmptyName);
        }
        if duration_secs == 0 {
            return Err(SubjectError::InvalidDuration);
        }
        let passing_score = u8::try_from(passing_score)
            .ok()
            .filter(|score| *score <= 100)
            .ok_or(SubjectError::InvalidPassingScore(passing_score))?;

        Ok(Self {
            id,
            name,
            duration_secs,
            passing_score,
            active,
            display_order,
        })
    }

    /// Active subject with the default passing score and display order 0.
    ///
    /// # Errors
    ///
    /// Same as [`Subject::new`].
    pub fn with_defaults(
        id: SubjectId,
        name: impl Into<String>,
        duration_secs: u32,
    ) -> Result<Self, SubjectError> {
        Self::new(
            id,
            name,
            duration_secs,
            u32::from(DEFAULT_PASSING_SCORE),
            true,
            0,
        )
    }

    #[must_use]
    pub fn id(&self) -> &SubjectId {
        &self.id
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn duration_secs(&self) -> u32 {
        self.duration_secs
    }

    /// Passing threshold in percent.
    #[must_use]
    pub fn passing_score(&self) -> u8 {
        self.passing_score
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active
    }

    #[must_use]
    pub fn display_order(&self) -> i64 {
        self.display_order
    }
}
