use thiserror::Error;

use crate::model::{QuestionError, QuestionSetError, SubjectError};

/// Validation failures raised while building domain entities.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Subject(#[from] SubjectError),
    #[error(transparent)]
    Question(#[from] QuestionError),
    #[error(transparent)]
    QuestionSet(#[from] QuestionSetError),
}
