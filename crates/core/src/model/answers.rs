use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::model::ids::QuestionId;
use crate::model::question::QuestionSet;

/// Selected option per answered question.
///
/// A missing key means the question is unanswered. Each question holds at most
/// one selection; see [`AnswerMap::toggle`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AnswerMap(BTreeMap<QuestionId, u8>);

impl AnswerMap {
    #[must_use]
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Applies the toggle rule.
    ///
    /// Picking the option that is already selected clears the selection,
    /// picking any other option replaces it.
    pub fn toggle(&mut self, question: QuestionId, option: u8) {
        if self.0.get(&question) == Some(&option) {
            self.0.remove(&question);
        } else {
            self.0.insert(question, option);
        }
    }

    #[must_use]
    pub fn get(&self, question: QuestionId) -> Option<u8> {
        self.0.get(&question).copied()
    }

    #[must_use]
    pub fn is_answered(&self, question: QuestionId) -> bool {
        self.0.contains_key(&question)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (QuestionId, u8)> + '_ {
        self.0.iter().map(|(id, option)| (*id, *option))
    }

    /// Drops selections for questions outside `set` or options it cannot hold.
    pub fn retain_known(&mut self, set: &QuestionSet) {
        self.0.retain(|id, option| {
            set.find(*id)
                .is_some_and(|q| usize::from(*option) < q.options().len())
        });
    }
}

impl FromIterator<(QuestionId, u8)> for AnswerMap {
    fn from_iter<T: IntoIterator<Item = (QuestionId, u8)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}
