//! Scoring and post-submission review.

use crate::model::{AnswerMap, QuestionId, QuestionSet};

/// Counts questions whose selected option equals the correct one.
///
/// Unanswered questions never count.
#[must_use]
pub fn score_answers(set: &QuestionSet, answers: &AnswerMap) -> u32 {
    let correct = set
        .questions()
        .iter()
        .filter(|q| answers.get(q.id()) == Some(q.correct_answer()))
        .count();
    u32::try_from(correct).unwrap_or(u32::MAX)
}

/// `100 * score / total`; zero for an empty total.
#[must_use]
pub fn percentage(score: u32, total: u32) -> f64 {
    if total == 0 {
        return 0.0;
    }
    f64::from(score) * 100.0 / f64::from(total)
}

#[must_use]
pub fn is_passing(percentage: f64, passing_score: u8) -> bool {
    percentage >= f64::from(passing_score)
}

/// A question the user did not get right, for the review list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReviewItem {
    /// Position in the question set.
    pub index: usize,
    pub question_id: QuestionId,
    pub selected: Option<u8>,
    pub correct: u8,
}

/// Result summary shown after submission.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreReport {
    pub score: u32,
    pub total: u32,
    pub percentage: f64,
    pub passed: bool,
    pub incorrect: u32,
    pub unanswered: u32,
    pub review: Vec<ReviewItem>,
}

impl ScoreReport {
    /// Scores `answers` against `set` using the set's passing threshold.
    #[must_use]
    pub fn evaluate(set: &QuestionSet, answers: &AnswerMap) -> Self {
        let score = score_answers(set, answers);
        Self::with_score(set, answers, score)
    }

    /// Builds the report for an already-fixed score.
    #[must_use]
    pub fn with_score(set: &QuestionSet, answers: &AnswerMap, score: u32) -> Self {
        let total = u32::try_from(set.len()).unwrap_or(u32::MAX);
        let pct = percentage(score, total);

        let mut unanswered = 0_u32;
        let mut review = Vec::new();
        for (index, question) in set.questions().iter().enumerate() {
            let selected = answers.get(question.id());
            if selected.is_none() {
                unanswered = unanswered.saturating_add(1);
            }
            if selected != Some(question.correct_answer()) {
                review.push(ReviewItem {
                    index,
                    question_id: question.id(),
                    selected,
                    correct: question.correct_answer(),
                });
            }
        }

        Self {
            score,
            total,
            percentage: pct,
            passed: is_passing(pct, set.passing_score()),
            incorrect: total.saturating_sub(score).saturating_sub(unanswered),
            unanswered,
            review,
        }
    }

    /// Percentage rounded to a whole number for display.
    #[must_use]
    pub fn rounded_percentage(&self) -> u32 {
        // Bounded to [0, 100] by construction.
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let rounded = self.percentage.round() as u32;
        rounded
    }
}

/// Formats seconds as `MM:SS` for the countdown.
#[must_use]
pub fn format_time(secs: u32) -> String {
    format!("{:02}:{:02}", secs / 60, secs % 60)
}
