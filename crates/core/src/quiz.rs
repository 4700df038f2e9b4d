//! Quiz session state machine.
//!
//! A `QuizSession` walks a learner through one lesson's questions in order.
//! It is synchronous and owns no I/O: speaking questions are evaluated by
//! handing out an [`EvaluationTicket`] and later applying the evaluator's
//! outcome against that ticket. Tickets that no longer match the in-flight
//! attempt are rejected, which is how late results from a torn-down screen
//! are discarded.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::model::{
    EvaluationFailure, Lesson, LessonId, PronunciationScore, Question, QuestionKind,
    QuestionOutcome, SessionId, SessionSummary, SessionSummaryError,
};

/// Number of retries a speaking question allows after failed evaluations.
pub const MAX_RETRIES: u32 = 3;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum QuizError {
    #[error("lesson {0} has no questions")]
    InvalidLesson(LessonId),

    #[error("current question is {actual:?}, not {expected:?}")]
    WrongQuestionKind {
        expected: QuestionKind,
        actual: QuestionKind,
    },

    #[error("question {0} is already answered")]
    AlreadyAnswered(usize),

    #[error("option {chosen} does not exist, question has {len} options")]
    InvalidOption { chosen: usize, len: usize },

    #[error("an evaluation is already in flight for this question")]
    EvaluationInFlight,

    #[error("last attempt failed; call retry before recording again")]
    RetryRequired,

    #[error("nothing to retry: the current attempt has not failed")]
    NoFailedAttempt,

    #[error("retry limit of {} reached for this question", MAX_RETRIES)]
    MaxRetriesExceeded,

    #[error("question can only be skipped after the retry limit is reached ({remaining} retries left)")]
    CannotSkip { remaining: u32 },

    #[error("evaluation failed: {0}")]
    Evaluation(EvaluationFailure),

    #[error("evaluation result no longer applies to this session")]
    StaleEvaluation,

    #[error("question {0} has no result yet")]
    NotAnswered(usize),

    #[error("session is not completed")]
    NotCompleted,

    #[error("session is closed")]
    SessionClosed,

    #[error(transparent)]
    Summary(#[from] SessionSummaryError),
}

//
// ─── STATE ─────────────────────────────────────────────────────────────────────
//

/// Proof that an evaluation was started for a particular attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EvaluationTicket {
    session: SessionId,
    question_index: usize,
    attempt: u64,
}

impl EvaluationTicket {
    #[must_use]
    pub fn session_id(&self) -> SessionId {
        self.session
    }

    #[must_use]
    pub fn question_index(&self) -> usize {
        self.question_index
    }

    #[must_use]
    pub fn attempt(&self) -> u64 {
        self.attempt
    }
}

/// What the evaluator needs to score the current speaking question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingEvaluation {
    pub ticket: EvaluationTicket,
    /// Japanese phrase the learner should have pronounced.
    pub expected_phrase: String,
}

/// Transient state of the current question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QuestionState {
    /// Waiting for an answer or a recording.
    Ready,
    Evaluating(EvaluationTicket),
    /// Last evaluation failed; `retry` clears it.
    Failed(EvaluationFailure),
    /// A terminal outcome is recorded; `advance` moves on.
    Answered,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    InProgress,
    Completed,
    Abandoned,
}

/// Result of `advance`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Advance {
    Next { index: usize },
    Completed(SessionSummary),
}

/// Immutable view handed to the presentation layer after each mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuizSnapshot {
    pub session_id: SessionId,
    pub lesson_id: LessonId,
    pub current_index: usize,
    pub total_questions: usize,
    pub question_kind: QuestionKind,
    pub state: QuestionState,
    pub outcome: Option<QuestionOutcome>,
    pub retry_count: u32,
    pub answered: usize,
    pub phase: SessionPhase,
}

//
// ─── SESSION ───────────────────────────────────────────────────────────────────
//

/// One learner's attempt at a lesson's full quiz sequence.
#[derive(Debug, Clone)]
pub struct QuizSession {
    id: SessionId,
    lesson: Arc<Lesson>,
    current: usize,
    outcomes: Vec<Option<QuestionOutcome>>,
    state: QuestionState,
    retry_count: u32,
    attempts: u64,
    phase: SessionPhase,
    started_at: DateTime<Utc>,
    summary: Option<SessionSummary>,
}

impl QuizSession {
    /// Start a session at the first question of `lesson`.
    ///
    /// # Errors
    ///
    /// Returns `QuizError::InvalidLesson` if the lesson has no questions.
    pub fn start(lesson: Arc<Lesson>, started_at: DateTime<Utc>) -> Result<Self, QuizError> {
        let total = lesson.quizzes().len();
        if total == 0 {
            return Err(QuizError::InvalidLesson(lesson.id()));
        }
        Ok(Self {
            id: SessionId::generate(),
            lesson,
            current: 0,
            outcomes: vec![None; total],
            state: QuestionState::Ready,
            retry_count: 0,
            attempts: 0,
            phase: SessionPhase::InProgress,
            started_at,
            summary: None,
        })
    }

    #[must_use]
    pub fn id(&self) -> SessionId {
        self.id
    }

    #[must_use]
    pub fn lesson(&self) -> &Arc<Lesson> {
        &self.lesson
    }

    #[must_use]
    pub fn lesson_id(&self) -> LessonId {
        self.lesson.id()
    }

    #[must_use]
    pub fn current_index(&self) -> usize {
        self.current
    }

    #[must_use]
    pub fn total_questions(&self) -> usize {
        self.outcomes.len()
    }

    #[must_use]
    pub fn is_last_question(&self) -> bool {
        self.current + 1 == self.outcomes.len()
    }

    #[must_use]
    pub fn current_question(&self) -> &Question {
        // `current` is kept below `outcomes.len()`, which equals the question count
        &self.lesson.quizzes()[self.current]
    }

    #[must_use]
    pub fn state(&self) -> &QuestionState {
        &self.state
    }

    #[must_use]
    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    #[must_use]
    pub fn retry_count(&self) -> u32 {
        self.retry_count
    }

    #[must_use]
    pub fn remaining_retries(&self) -> u32 {
        MAX_RETRIES.saturating_sub(self.retry_count)
    }

    #[must_use]
    pub fn outcomes(&self) -> &[Option<QuestionOutcome>] {
        &self.outcomes
    }

    #[must_use]
    pub fn current_outcome(&self) -> Option<&QuestionOutcome> {
        self.outcomes[self.current].as_ref()
    }

    #[must_use]
    pub fn answered_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_some()).count()
    }

    #[must_use]
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.phase == SessionPhase::Completed
    }

    #[must_use]
    pub fn snapshot(&self) -> QuizSnapshot {
        QuizSnapshot {
            session_id: self.id,
            lesson_id: self.lesson.id(),
            current_index: self.current,
            total_questions: self.outcomes.len(),
            question_kind: self.current_question().kind(),
            state: self.state.clone(),
            outcome: self.current_outcome().cloned(),
            retry_count: self.retry_count,
            answered: self.answered_count(),
            phase: self.phase,
        }
    }

    /// Answer the current multiple-choice question. Returns whether it was correct.
    ///
    /// # Errors
    ///
    /// Returns `QuizError::AlreadyAnswered` if the question has a result (state unchanged),
    /// `QuizError::WrongQuestionKind` on a speaking question and
    /// `QuizError::InvalidOption` if `chosen` is out of range.
    pub fn submit_multiple_choice(&mut self, chosen: usize) -> Result<bool, QuizError> {
        self.ensure_open()?;
        let Question::MultipleChoice {
            options,
            correct_index,
            ..
        } = self.current_question()
        else {
            return Err(self.wrong_kind(QuestionKind::MultipleChoice));
        };
        if self.outcomes[self.current].is_some() {
            return Err(QuizError::AlreadyAnswered(self.current));
        }
        if chosen >= options.len() {
            return Err(QuizError::InvalidOption {
                chosen,
                len: options.len(),
            });
        }

        let is_correct = chosen == *correct_index;
        self.outcomes[self.current] = Some(QuestionOutcome::MultipleChoice { chosen, is_correct });
        self.state = QuestionState::Answered;
        Ok(is_correct)
    }

    /// Mark the current speaking question as being evaluated.
    ///
    /// # Errors
    ///
    /// Returns `QuizError::WrongQuestionKind`, `QuizError::AlreadyAnswered`,
    /// `QuizError::EvaluationInFlight` or `QuizError::RetryRequired` when a
    /// recording is not acceptable right now.
    pub fn begin_evaluation(&mut self) -> Result<PendingEvaluation, QuizError> {
        self.ensure_open()?;
        let expected_phrase = self.speaking_answer()?.to_owned();
        match &self.state {
            QuestionState::Ready => {}
            QuestionState::Evaluating(_) => return Err(QuizError::EvaluationInFlight),
            QuestionState::Failed(_) => return Err(QuizError::RetryRequired),
            QuestionState::Answered => return Err(QuizError::AlreadyAnswered(self.current)),
        }

        self.attempts += 1;
        let ticket = EvaluationTicket {
            session: self.id,
            question_index: self.current,
            attempt: self.attempts,
        };
        self.state = QuestionState::Evaluating(ticket);
        Ok(PendingEvaluation {
            ticket,
            expected_phrase,
        })
    }

    /// Apply the evaluator's outcome for `ticket`.
    ///
    /// On success the score becomes the question's result. On failure the
    /// question moves to `Failed` and the failure is returned; nothing advances.
    ///
    /// # Errors
    ///
    /// Returns `QuizError::StaleEvaluation` (without touching state) if the ticket
    /// does not match the in-flight attempt, or `QuizError::Evaluation` carrying
    /// the evaluator's failure.
    pub fn apply_evaluation(
        &mut self,
        ticket: EvaluationTicket,
        outcome: Result<PronunciationScore, EvaluationFailure>,
    ) -> Result<PronunciationScore, QuizError> {
        if self.phase != SessionPhase::InProgress
            || ticket.session != self.id
            || ticket.question_index != self.current
            || self.state != QuestionState::Evaluating(ticket)
        {
            return Err(QuizError::StaleEvaluation);
        }

        match outcome {
            Ok(score) => {
                self.outcomes[self.current] = Some(QuestionOutcome::Speaking(score.clone()));
                self.state = QuestionState::Answered;
                Ok(score)
            }
            Err(failure) => {
                self.state = QuestionState::Failed(failure.clone());
                Err(QuizError::Evaluation(failure))
            }
        }
    }

    /// Give up on the in-flight attempt `ticket` without a result.
    ///
    /// The question moves to `Failed(EvaluationFailure::Cancelled)`, so it can
    /// be retried like any other failed attempt.
    ///
    /// # Errors
    ///
    /// Returns `QuizError::StaleEvaluation` (without touching state) if the ticket
    /// does not match the in-flight attempt.
    pub fn cancel_evaluation(&mut self, ticket: EvaluationTicket) -> Result<(), QuizError> {
        if self.phase != SessionPhase::InProgress || self.state != QuestionState::Evaluating(ticket)
        {
            return Err(QuizError::StaleEvaluation);
        }
        self.state = QuestionState::Failed(EvaluationFailure::Cancelled);
        Ok(())
    }

    /// Spend one retry on the current speaking question and clear its failure.
    ///
    /// Returns the number of retries left.
    ///
    /// # Errors
    ///
    /// Returns `QuizError::NoFailedAttempt` unless the last attempt failed, and
    /// `QuizError::MaxRetriesExceeded` once `MAX_RETRIES` retries are spent.
    pub fn retry(&mut self) -> Result<u32, QuizError> {
        self.ensure_open()?;
        self.speaking_answer()?;
        match self.state {
            QuestionState::Answered => return Err(QuizError::AlreadyAnswered(self.current)),
            QuestionState::Evaluating(_) => return Err(QuizError::EvaluationInFlight),
            QuestionState::Ready => return Err(QuizError::NoFailedAttempt),
            QuestionState::Failed(_) => {}
        }
        if self.retry_count >= MAX_RETRIES {
            return Err(QuizError::MaxRetriesExceeded);
        }
        self.retry_count += 1;
        self.state = QuestionState::Ready;
        Ok(self.remaining_retries())
    }

    /// Give up on the current speaking question after its retry budget is spent.
    ///
    /// # Errors
    ///
    /// Returns `QuizError::CannotSkip` while retries remain or the last attempt
    /// did not fail.
    pub fn skip(&mut self) -> Result<(), QuizError> {
        self.ensure_open()?;
        self.speaking_answer()?;
        match self.state {
            QuestionState::Answered => Err(QuizError::AlreadyAnswered(self.current)),
            QuestionState::Evaluating(_) => Err(QuizError::EvaluationInFlight),
            QuestionState::Failed(_) if self.retry_count >= MAX_RETRIES => {
                self.outcomes[self.current] = Some(QuestionOutcome::Skipped);
                self.state = QuestionState::Answered;
                Ok(())
            }
            QuestionState::Ready | QuestionState::Failed(_) => Err(QuizError::CannotSkip {
                remaining: self.remaining_retries(),
            }),
        }
    }

    /// Move past the current question once it has a result.
    ///
    /// On the last question this completes the session and returns its summary.
    ///
    /// # Errors
    ///
    /// Returns `QuizError::NotAnswered` if the current question has no result.
    pub fn advance(&mut self, now: DateTime<Utc>) -> Result<Advance, QuizError> {
        self.ensure_open()?;
        if self.outcomes[self.current].is_none() {
            return Err(QuizError::NotAnswered(self.current));
        }

        if self.is_last_question() {
            let outcomes: Vec<QuestionOutcome> = self.outcomes.iter().flatten().cloned().collect();
            let summary =
                SessionSummary::from_outcomes(self.lesson.id(), self.started_at, now, &outcomes)?;
            self.phase = SessionPhase::Completed;
            self.summary = Some(summary.clone());
            return Ok(Advance::Completed(summary));
        }

        self.current += 1;
        self.state = QuestionState::Ready;
        self.retry_count = 0;
        Ok(Advance::Next {
            index: self.current,
        })
    }

    /// Summary of a completed session.
    ///
    /// # Errors
    ///
    /// Returns `QuizError::NotCompleted` before the last `advance`.
    pub fn summarize(&self) -> Result<&SessionSummary, QuizError> {
        self.summary.as_ref().ok_or(QuizError::NotCompleted)
    }

    /// Tear the session down. Outstanding tickets become stale.
    pub fn abandon(&mut self) {
        if self.phase == SessionPhase::InProgress {
            self.phase = SessionPhase::Abandoned;
        }
    }

    fn ensure_open(&self) -> Result<(), QuizError> {
        match self.phase {
            SessionPhase::InProgress => Ok(()),
            SessionPhase::Completed | SessionPhase::Abandoned => Err(QuizError::SessionClosed),
        }
    }

    fn speaking_answer(&self) -> Result<&str, QuizError> {
        match self.current_question() {
            Question::Speaking { answer, .. } => Ok(&answer.ja),
            Question::MultipleChoice { .. } => Err(self.wrong_kind(QuestionKind::Speaking)),
        }
    }

    fn wrong_kind(&self, expected: QuestionKind) -> QuizError {
        QuizError::WrongQuestionKind {
            expected,
            actual: self.current_question().kind(),
        }
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
