//! Test-session reducer.
//!
//! `SessionState::reduce` is a pure transition function: it never performs I/O
//! and never fails. Side effects (timer, persistence, fetching, attempt logging)
//! live in the services layer and react to the state it produces.

use crate::model::{AnswerMap, OPTION_COUNT, Question, QuestionId, QuestionSet, Subject};

/// Coarse lifecycle position derived from the state flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    NoSubject,
    Loading,
    Error,
    Ready,
    InProgress,
    Submitted,
}

/// Partial state replayed by `SessionAction::Restore`.
///
/// `None` fields leave the current value untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionPatch {
    pub test_started: Option<bool>,
    pub current_question_index: Option<usize>,
    pub answers: Option<AnswerMap>,
    pub time_left_secs: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionAction {
    SelectSubject(Subject),
    LoadStart,
    LoadSuccess(QuestionSet),
    LoadError(String),
    StartTest,
    Answer { question: QuestionId, option: u8 },
    GoToQuestion(usize),
    NextQuestion,
    PrevQuestion,
    Tick,
    Submit { score: u32 },
    Restart,
    BackToHome,
    Restore(SessionPatch),
}

/// Single source of truth for one quiz session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionState {
    selected_subject: Option<Subject>,
    question_set: Option<QuestionSet>,
    loading: bool,
    error: Option<String>,
    test_started: bool,
    current_question_index: usize,
    answers: AnswerMap,
    time_left_secs: u32,
    test_submitted: bool,
    score: u32,
}

impl SessionState {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies `action` and returns the next state.
    #[must_use]
    pub fn reduce(self, action: SessionAction) -> Self {
        match action {
            SessionAction::SelectSubject(subject) => Self {
                selected_subject: Some(subject),
                loading: true,
                ..Self::default()
            },

            SessionAction::LoadStart => Self {
                loading: true,
                error: None,
                ..self
            },

            SessionAction::LoadSuccess(set) => Self {
                loading: false,
                time_left_secs: set.duration_secs(),
                question_set: Some(set),
                ..self
            },

            SessionAction::LoadError(message) => Self {
                loading: false,
                error: Some(message),
                ..self
            },

            SessionAction::StartTest => {
                if self.question_set.is_none() || self.test_submitted {
                    return self;
                }
                Self {
                    test_started: true,
                    ..self
                }
            }

            SessionAction::Answer { question, option } => self.answer(question, option),

            SessionAction::GoToQuestion(index) => {
                let in_range = self
                    .question_set
                    .as_ref()
                    .is_some_and(|set| index < set.len());
                if !in_range {
                    return self;
                }
                Self {
                    current_question_index: index,
                    ..self
                }
            }

            SessionAction::NextQuestion => {
                let Some(last) = self.question_set.as_ref().map(QuestionSet::last_index) else {
                    return self;
                };
                let next = (self.current_question_index + 1).min(last);
                Self {
                    current_question_index: next,
                    ..self
                }
            }

            SessionAction::PrevQuestion => Self {
                current_question_index: self.current_question_index.saturating_sub(1),
                ..self
            },

            SessionAction::Tick => Self {
                time_left_secs: self.time_left_secs.saturating_sub(1),
                ..self
            },

            SessionAction::Submit { score } => {
                if !self.test_started || self.test_submitted {
                    return self;
                }
                Self {
                    test_submitted: true,
                    score,
                    ..self
                }
            }

            SessionAction::Restart => {
                let time_left_secs = self
                    .question_set
                    .as_ref()
                    .map_or(0, QuestionSet::duration_secs);
                Self {
                    test_started: false,
                    current_question_index: 0,
                    answers: AnswerMap::new(),
                    time_left_secs,
                    test_submitted: false,
                    score: 0,
                    ..self
                }
            }

            SessionAction::BackToHome => Self::default(),

            SessionAction::Restore(patch) => Self {
                test_started: patch.test_started.unwrap_or(self.test_started),
                current_question_index: patch
                    .current_question_index
                    .unwrap_or(self.current_question_index),
                time_left_secs: patch.time_left_secs.unwrap_or(self.time_left_secs),
                answers: patch.answers.unwrap_or(self.answers),
                ..self
            },
        }
    }

    /// In-place variant of [`SessionState::reduce`].
    pub fn apply(&mut self, action: SessionAction) {
        *self = std::mem::take(self).reduce(action);
    }

    fn answer(mut self, question: QuestionId, option: u8) -> Self {
        if self.test_submitted || usize::from(option) >= OPTION_COUNT {
            return self;
        }
        let known = self
            .question_set
            .as_ref()
            .is_some_and(|set| set.contains(question));
        if known {
            self.answers.toggle(question, option);
        }
        self
    }

    #[must_use]
    pub fn phase(&self) -> SessionPhase {
        if self.selected_subject.is_none() {
            SessionPhase::NoSubject
        } else if self.loading {
            SessionPhase::Loading
        } else if self.error.is_some() {
            SessionPhase::Error
        } else if self.question_set.is_none() {
            SessionPhase::Loading
        } else if !self.test_started {
            SessionPhase::Ready
        } else if !self.test_submitted {
            SessionPhase::InProgress
        } else {
            SessionPhase::Submitted
        }
    }

    /// True while the countdown should run.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.test_started && !self.test_submitted
    }

    #[must_use]
    pub fn selected_subject(&self) -> Option<&Subject> {
        self.selected_subject.as_ref()
    }

    #[must_use]
    pub fn question_set(&self) -> Option<&QuestionSet> {
        self.question_set.as_ref()
    }

    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.loading
    }

    #[must_use]
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    #[must_use]
    pub fn test_started(&self) -> bool {
        self.test_started
    }

    #[must_use]
    pub fn current_question_index(&self) -> usize {
        self.current_question_index
    }

    #[must_use]
    pub fn current_question(&self) -> Option<&Question> {
        self.question_set
            .as_ref()
            .and_then(|set| set.get(self.current_question_index))
    }

    #[must_use]
    pub fn answers(&self) -> &AnswerMap {
        &self.answers
    }

    #[must_use]
    pub fn time_left_secs(&self) -> u32 {
        self.time_left_secs
    }

    #[must_use]
    pub fn test_submitted(&self) -> bool {
        self.test_submitted
    }

    #[must_use]
    pub fn score(&self) -> u32 {
        self.score
    }
}
