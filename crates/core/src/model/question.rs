use std::collections::HashSet;

use thiserror::Error;

use crate::model::ids::QuestionId;
use crate::model::subject::Subject;

/// Every question offers exactly this many options.
pub const OPTION_COUNT: usize = 4;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum QuestionError {
    #[error("question text cannot be empty")]
    EmptyText,

    #[error("question must have exactly 4 options, got {0}")]
    WrongOptionCount(usize),

    #[error("correct answer index {0} is out of range")]
    InvalidCorrectAnswer(u32),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum QuestionSetError {
    #[error("question set has no questions")]
    Empty,

    #[error("duplicate question id {0}")]
    DuplicateId(QuestionId),
}

//
// ─── QUESTION ──────────────────────────────────────────────────────────────────
//

/// A single multiple-choice question.
///
/// `text` and options may embed limited markup or math notation; rendering is
/// left to the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Question {
    id: QuestionId,
    text: String,
    options: [String; OPTION_COUNT],
    correct_answer: u8,
    topic: Option<String>,
}

impl Question {
    /// Creates a validated question.
    ///
    /// # Errors
    ///
    /// Returns `QuestionError` if the text is blank, the option count is not
    /// [`OPTION_COUNT`], or `correct_answer` does not index an option.
    pub fn new(
        id: QuestionId,
        text: impl Into<String>,
        options: Vec<String>,
        correct_answer: u32,
        topic: Option<String>,
    ) -> Result<Self, QuestionError> {
        let text = text.into();
        if text.trim().is_empty() {
            return Err(QuestionError::EmptyText);
        }
        let len = options.len();
        let options: [String; OPTION_COUNT] = options
            .try_into()
            .map_err(|_| QuestionError::WrongOptionCount(len))?;
        let correct_answer = u8::try_from(correct_answer)
            .ok()
            .filter(|idx| usize::from(*idx) < OPTION_COUNT)
            .ok_or(QuestionError::InvalidCorrectAnswer(correct_answer))?;
        let topic = topic.filter(|t| !t.trim().is_empty());

        Ok(Self {
            id,
            text,
            options,
            correct_answer,
            topic,
        })
    }

    #[must_use]
    pub fn id(&self) -> QuestionId {
        self.id
    }

    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    #[must_use]
    pub fn options(&self) -> &[String; OPTION_COUNT] {
        &self.options
    }

    #[must_use]
    pub fn correct_answer(&self) -> u8 {
        self.correct_answer
    }

    #[must_use]
    pub fn topic(&self) -> Option<&str> {
        self.topic.as_deref()
    }

    #[must_use]
    pub fn is_correct(&self, option: u8) -> bool {
        self.correct_answer == option
    }
}

//
// ─── QUESTION SET ──────────────────────────────────────────────────────────────
//

/// Ordered questions plus the metadata loaded for one subject.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestionSet {
    title: String,
    duration_secs: u32,
    passing_score: u8,
    questions: Vec<Question>,
}

impl QuestionSet {
    /// Creates a question set, preserving question order.
    ///
    /// # Errors
    ///
    /// Returns `QuestionSetError::Empty` without questions and
    /// `QuestionSetError::DuplicateId` when two questions share an id.
    pub fn new(
        title: impl Into<String>,
        duration_secs: u32,
        passing_score: u8,
        questions: Vec<Question>,
    ) -> Result<Self, QuestionSetError> {
        if questions.is_empty() {
            return Err(QuestionSetError::Empty);
        }
        let mut seen = HashSet::with_capacity(questions.len());
        for question in &questions {
            if !seen.insert(question.id()) {
                return Err(QuestionSetError::DuplicateId(question.id()));
            }
        }

        Ok(Self {
            title: title.into(),
            duration_secs,
            passing_score: passing_score.min(100),
            questions,
        })
    }

    /// Builds the set for a subject, taking title, duration and threshold from it.
    ///
    /// # Errors
    ///
    /// Same as [`QuestionSet::new`].
    pub fn for_subject(subject: &Subject, questions: Vec<Question>) -> Result<Self, QuestionSetError> {
        Self::new(
            subject.name(),
            subject.duration_secs(),
            subject.passing_score(),
            questions,
        )
    }

    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    #[must_use]
    pub fn duration_secs(&self) -> u32 {
        self.duration_secs
    }

    #[must_use]
    pub fn passing_score(&self) -> u8 {
        self.passing_score
    }

    #[must_use]
    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    /// Number of questions; never zero.
    #[must_use]
    pub fn len(&self) -> usize {
        self.questions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }

    #[must_use]
    pub fn last_index(&self) -> usize {
        self.questions.len().saturating_sub(1)
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Question> {
        self.questions.get(index)
    }

    #[must_use]
    pub fn find(&self, id: QuestionId) -> Option<&Question> {
        self.questions.iter().find(|q| q.id() == id)
    }

    #[must_use]
    pub fn contains(&self, id: QuestionId) -> bool {
        self.find(id).is_some()
    }
}
