use quiz_core::scoring::format_time;
use quiz_core::session::{SessionPhase, SessionState};

/// Aggregated view of session progress, useful for UI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionProgress {
    pub phase: SessionPhase,
    pub total: usize,
    pub answered: usize,
    pub unanswered: usize,
    /// Zero-based position of the displayed question.
    pub current_index: usize,
    pub time_left_secs: u32,
}

impl SessionProgress {
    /// Snapshot the counters of `state`. Without a question set every count is zero.
    #[must_use]
    pub fn from_state(state: &SessionState) -> Self {
        let total = state.question_set().map_or(0, |set| set.len());
        let answered = state.question_set().map_or(0, |set| {
            set.questions()
                .iter()
                .filter(|q| state.answers().is_answered(q.id()))
                .count()
        });
        Self {
            phase: state.phase(),
            total,
            answered,
            unanswered: total - answered,
            current_index: state.current_question_index(),
            time_left_secs: state.time_left_secs(),
        }
    }

    /// Countdown formatted as `MM:SS`.
    #[must_use]
    pub fn clock(&self) -> String {
        format_time(self.time_left_secs)
    }

    /// One-based position label such as `3 / 10`.
    #[must_use]
    pub fn position(&self) -> String {
        if self.total == 0 {
            return "0 / 0".to_string();
        }
        format!("{} / {}", self.current_index + 1, self.total)
    }
}
