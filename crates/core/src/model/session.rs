use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::model::ids::LessonId;
use crate::model::score::PronunciationScore;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SessionSummaryError {
    #[error("completed_at is before started_at")]
    InvalidTimeRange,

    #[error("cannot summarize a session without questions")]
    NoQuestions,
}

/// Terminal result recorded for one question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QuestionOutcome {
    MultipleChoice { chosen: usize, is_correct: bool },
    Speaking(PronunciationScore),
    /// Speaking question given up after the retry budget ran out.
    Skipped,
}

impl QuestionOutcome {
    /// Whether this outcome counts towards the learner's score.
    #[must_use]
    pub fn is_success(&self) -> bool {
        match self {
            QuestionOutcome::MultipleChoice { is_correct, .. } => *is_correct,
            QuestionOutcome::Speaking(score) => score.passed(),
            QuestionOutcome::Skipped => false,
        }
    }
}

/// Multiple-choice tally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ChoiceTally {
    pub correct: u32,
    pub total: u32,
}

/// Speaking tally. `skipped` questions are part of `total`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SpeakingTally {
    pub passed: u32,
    pub skipped: u32,
    pub total: u32,
}

/// Aggregate summary for a completed quiz session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSummary {
    lesson_id: LessonId,
    started_at: DateTime<Utc>,
    completed_at: DateTime<Utc>,
    total_questions: u32,
    multiple_choice: ChoiceTally,
    speaking: SpeakingTally,
}

impl SessionSummary {
    /// Build a summary from the terminal outcomes of every question.
    ///
    /// # Errors
    ///
    /// Returns `SessionSummaryError::InvalidTimeRange` if `completed_at` is before `started_at`.
    /// Returns `SessionSummaryError::NoQuestions` if `outcomes` is empty.
    pub fn from_outcomes(
        lesson_id: LessonId,
        started_at: DateTime<Utc>,
        completed_at: DateTime<Utc>,
        outcomes: &[QuestionOutcome],
    ) -> Result<Self, SessionSummaryError> {
        if completed_at < started_at {
            return Err(SessionSummaryError::InvalidTimeRange);
        }
        if outcomes.is_empty() {
            return Err(SessionSummaryError::NoQuestions);
        }

        let mut multiple_choice = ChoiceTally::default();
        let mut speaking = SpeakingTally::default();

        for outcome in outcomes {
            match outcome {
                QuestionOutcome::MultipleChoice { is_correct, .. } => {
                    multiple_choice.total = multiple_choice.total.saturating_add(1);
                    if *is_correct {
                        multiple_choice.correct = multiple_choice.correct.saturating_add(1);
                    }
                }
                QuestionOutcome::Speaking(score) => {
                    speaking.total = speaking.total.saturating_add(1);
                    if score.passed() {
                        speaking.passed = speaking.passed.saturating_add(1);
                    }
                }
                QuestionOutcome::Skipped => {
                    speaking.total = speaking.total.saturating_add(1);
                    speaking.skipped = speaking.skipped.saturating_add(1);
                }
            }
        }

        Ok(Self {
            lesson_id,
            started_at,
            completed_at,
            total_questions: multiple_choice.total.saturating_add(speaking.total),
            multiple_choice,
            speaking,
        })
    }

    #[must_use]
    pub fn lesson_id(&self) -> LessonId {
        self.lesson_id
    }

    #[must_use]
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    #[must_use]
    pub fn completed_at(&self) -> DateTime<Utc> {
        self.completed_at
    }

    #[must_use]
    pub fn total_questions(&self) -> u32 {
        self.total_questions
    }

    #[must_use]
    pub fn multiple_choice(&self) -> ChoiceTally {
        self.multiple_choice
    }

    #[must_use]
    pub fn speaking(&self) -> SpeakingTally {
        self.speaking
    }
}
