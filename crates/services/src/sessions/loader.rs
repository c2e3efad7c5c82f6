use std::sync::Arc;

use quiz_core::model::{QuestionSet, Subject};
use storage::repository::QuestionStore;

use crate::error::SessionError;

/// Fetches the question set of a subject from the question store.
#[derive(Clone)]
pub struct QuestionLoader {
    questions: Arc<dyn QuestionStore>,
}

impl QuestionLoader {
    #[must_use]
    pub fn new(questions: Arc<dyn QuestionStore>) -> Self {
        Self { questions }
    }

    /// Load the subject's questions and wrap them with the subject's title,
    /// duration and passing score.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::NoQuestions` when the subject has no questions,
    /// or `SessionError::Storage` when the store cannot be read.
    pub async fn load(&self, subject: &Subject) -> Result<QuestionSet, SessionError> {
        let questions = self.questions.list_questions(subject.id()).await?;
        if questions.is_empty() {
            return Err(SessionError::NoQuestions);
        }
        Ok(QuestionSet::for_subject(subject, questions)?)
    }
}
