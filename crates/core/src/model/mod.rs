mod answers;
mod attempt;
mod ids;
mod question;
mod snapshot;
mod subject;

pub use answers::AnswerMap;
pub use attempt::{AttemptRecord, AttemptRow};
pub use ids::{AttemptId, QuestionId, SubjectId};
pub use question::{OPTION_COUNT, Question, QuestionError, QuestionSet, QuestionSetError};
pub use snapshot::PersistedSnapshot;
pub use subject::{DEFAULT_PASSING_SCORE, Subject, SubjectError};
