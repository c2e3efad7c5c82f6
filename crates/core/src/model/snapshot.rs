use serde::{Deserialize, Serialize};

use crate::model::answers::AnswerMap;
use crate::model::ids::SubjectId;

/// Subset of an in-progress session written to local persistence for resume.
///
/// Field names match the JSON layout stored under the session slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedSnapshot {
    pub subject_id: SubjectId,
    pub subject_name: String,
    #[serde(rename = "currentQuestion")]
    pub current_question_index: usize,
    pub answers: AnswerMap,
    #[serde(rename = "timeLeft")]
    pub time_left_secs: u32,
    pub test_started: bool,
}
