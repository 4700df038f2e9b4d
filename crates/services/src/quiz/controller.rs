use std::sync::{Arc, Weak};
use std::time::Duration;

use phrase_core::Clock;
use phrase_core::model::{AudioHandle, EvaluationFailure, Language, PronunciationScore};
use phrase_core::quiz::{Advance, EvaluationTicket, QuizError, QuizSession, QuizSnapshot};
use tokio::sync::watch;

use super::settings::QuizSettings;
use crate::error::QuizServiceError;
use crate::evaluation::{PronunciationEvaluator, RecordingGate, evaluate_with_timeout};
use crate::progress_service::ProgressService;

/// Drives one quiz session and publishes a snapshot after every change.
///
/// Speaking questions can be scored inline with [`submit_recording`], or in
/// two halves: [`begin_recording`] hands out a [`DetachedEvaluation`] that
/// runs without borrowing the controller, and [`apply`] folds its report
/// back in. Reports for an attempt that is no longer current are dropped.
///
/// An attempt whose evaluation or report is dropped before `apply` (a
/// cancelled future, an aborted task) is treated as cancelled: the next call
/// into the controller moves the question to
/// `Failed(EvaluationFailure::Cancelled)`, from where it can be retried.
///
/// [`submit_recording`]: QuizController::submit_recording
/// [`begin_recording`]: QuizController::begin_recording
/// [`apply`]: QuizController::apply
pub struct QuizController {
    session: QuizSession,
    evaluator: Arc<dyn PronunciationEvaluator>,
    gate: Arc<dyn RecordingGate>,
    progress: ProgressService,
    clock: Clock,
    settings: QuizSettings,
    updates: watch::Sender<QuizSnapshot>,
    in_flight: Option<InFlight>,
}

/// The attempt currently out for evaluation and the lease its evaluation holds.
struct InFlight {
    ticket: EvaluationTicket,
    lease: Weak<()>,
}

impl QuizController {
    pub(crate) fn new(
        session: QuizSession,
        evaluator: Arc<dyn PronunciationEvaluator>,
        gate: Arc<dyn RecordingGate>,
        progress: ProgressService,
        clock: Clock,
        settings: QuizSettings,
    ) -> Self {
        let (updates, _rx) = watch::channel(session.snapshot());
        Self {
            session,
            evaluator,
            gate,
            progress,
            clock,
            settings,
            updates,
            in_flight: None,
        }
    }

    /// Receiver for the snapshot published after each mutation.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<QuizSnapshot> {
        self.updates.subscribe()
    }

    #[must_use]
    pub fn snapshot(&self) -> QuizSnapshot {
        self.session.snapshot()
    }

    #[must_use]
    pub fn session(&self) -> &QuizSession {
        &self.session
    }

    /// Language used for questions and feedback comments.
    #[must_use]
    pub fn language(&self) -> Language {
        self.progress.language()
    }

    /// Answer the current multiple-choice question.
    ///
    /// # Errors
    ///
    /// Returns `QuizServiceError::Quiz` if the answer is not acceptable right now.
    pub fn submit_multiple_choice(&mut self, chosen: usize) -> Result<bool, QuizServiceError> {
        self.reap_dropped_evaluation();
        let is_correct = self.session.submit_multiple_choice(chosen)?;
        tracing::debug!(
            session = %self.session.id(),
            question = self.session.current_index(),
            chosen,
            is_correct,
            "choice submitted"
        );
        self.publish();
        Ok(is_correct)
    }

    /// Check recording preconditions and open an evaluation attempt.
    ///
    /// # Errors
    ///
    /// Returns `QuizServiceError::Precondition` when the device cannot record
    /// (no retry is spent), or `QuizServiceError::Quiz` when the current
    /// question does not accept a recording.
    pub async fn begin_recording(&mut self) -> Result<DetachedEvaluation, QuizServiceError> {
        self.reap_dropped_evaluation();
        if let Err(failure) = self.gate.check().await {
            tracing::info!(session = %self.session.id(), "recording blocked: {failure}");
            return Err(failure.into());
        }
        let pending = self.session.begin_evaluation()?;
        tracing::debug!(
            session = %self.session.id(),
            question = pending.ticket.question_index(),
            attempt = pending.ticket.attempt(),
            "evaluation started"
        );
        self.publish();
        let lease = Arc::new(());
        self.in_flight = Some(InFlight {
            ticket: pending.ticket,
            lease: Arc::downgrade(&lease),
        });
        Ok(DetachedEvaluation {
            lease,
            ticket: pending.ticket,
            expected_phrase: pending.expected_phrase,
            language: self.progress.language(),
            evaluator: Arc::clone(&self.evaluator),
            timeout: self.settings.evaluation_timeout,
        })
    }

    /// Fold an evaluation report back into the session.
    ///
    /// # Errors
    ///
    /// Returns `QuizError::StaleEvaluation` for reports that no longer apply
    /// (nothing changes), or `QuizError::Evaluation` when the attempt failed and
    /// the question now waits for `retry`.
    pub fn apply(&mut self, report: EvaluationReport) -> Result<PronunciationScore, QuizServiceError> {
        if self
            .in_flight
            .as_ref()
            .is_some_and(|in_flight| in_flight.ticket == report.ticket)
        {
            self.in_flight = None;
        }
        let result = self.session.apply_evaluation(report.ticket, report.outcome);
        match &result {
            Err(QuizError::StaleEvaluation) => {
                tracing::debug!(
                    session = %self.session.id(),
                    attempt = report.ticket.attempt(),
                    "discarding stale evaluation result"
                );
            }
            Ok(score) => tracing::info!(
                session = %self.session.id(),
                question = self.session.current_index(),
                overall = score.overall(),
                passed = score.passed(),
                "speaking answer scored"
            ),
            Err(err) => tracing::info!(
                session = %self.session.id(),
                question = self.session.current_index(),
                retries_left = self.session.remaining_retries(),
                "evaluation failed: {err}"
            ),
        }
        if !matches!(result, Err(QuizError::StaleEvaluation)) {
            self.publish();
        }
        result.map_err(Into::into)
    }

    /// Record, score and apply in one step.
    ///
    /// # Errors
    ///
    /// See [`QuizController::begin_recording`] and [`QuizController::apply`].
    pub async fn submit_recording(
        &mut self,
        audio: &AudioHandle,
    ) -> Result<PronunciationScore, QuizServiceError> {
        let evaluation = self.begin_recording().await?;
        tracing::debug!(session = %self.session.id(), audio = audio.uri(), "recording submitted");
        let report = evaluation.run(audio).await;
        self.apply(report)
    }

    /// Give up on the attempt currently being evaluated.
    ///
    /// The question moves to `Failed(EvaluationFailure::Cancelled)`; a report
    /// for the cancelled attempt that arrives later is discarded.
    ///
    /// # Errors
    ///
    /// Returns `QuizError::StaleEvaluation` when no evaluation is in flight.
    pub fn cancel_evaluation(&mut self) -> Result<(), QuizServiceError> {
        let in_flight = self
            .in_flight
            .take()
            .ok_or(QuizServiceError::Quiz(QuizError::StaleEvaluation))?;
        self.session.cancel_evaluation(in_flight.ticket)?;
        tracing::info!(
            session = %self.session.id(),
            attempt = in_flight.ticket.attempt(),
            "evaluation cancelled"
        );
        self.publish();
        Ok(())
    }

    /// Clear a failed attempt so the question can be recorded again.
    ///
    /// # Errors
    ///
    /// Returns `QuizError::MaxRetriesExceeded` once the budget is spent.
    pub fn retry(&mut self) -> Result<u32, QuizServiceError> {
        self.reap_dropped_evaluation();
        let remaining = self.session.retry()?;
        tracing::debug!(session = %self.session.id(), remaining, "retry");
        self.publish();
        Ok(remaining)
    }

    /// Give up on a speaking question whose retries are exhausted.
    ///
    /// # Errors
    ///
    /// Returns `QuizError::CannotSkip` while retries remain.
    pub fn skip(&mut self) -> Result<(), QuizServiceError> {
        self.reap_dropped_evaluation();
        self.session.skip()?;
        tracing::info!(
            session = %self.session.id(),
            question = self.session.current_index(),
            "speaking question skipped"
        );
        self.publish();
        Ok(())
    }

    /// Move to the next question, or finish the lesson on the last one.
    ///
    /// Finishing marks the lesson complete in progress. A failed progress
    /// write is logged and does not undo the completion.
    ///
    /// # Errors
    ///
    /// Returns `QuizError::NotAnswered` if the current question has no result.
    pub async fn advance(&mut self) -> Result<Advance, QuizServiceError> {
        self.reap_dropped_evaluation();
        let step = self.session.advance(self.clock.now())?;
        self.publish();
        match &step {
            Advance::Next { index } => {
                tracing::debug!(session = %self.session.id(), index, "next question");
            }
            Advance::Completed(summary) => {
                tracing::info!(
                    session = %self.session.id(),
                    lesson = %summary.lesson_id(),
                    correct = summary.multiple_choice().correct,
                    passed = summary.speaking().passed,
                    "lesson finished"
                );
                if let Err(err) = self.progress.mark_lesson_complete(summary.lesson_id()).await {
                    tracing::warn!(lesson = %summary.lesson_id(), "completion not saved: {err}");
                }
            }
        }
        Ok(step)
    }

    /// Tear the session down; outstanding evaluations will be discarded.
    pub fn abandon(&mut self) {
        if self.session.is_completed() {
            return;
        }
        self.in_flight = None;
        self.session.abandon();
        tracing::debug!(session = %self.session.id(), "session abandoned");
        self.publish();
    }

    /// Cancel the in-flight attempt if nothing can report its result anymore.
    fn reap_dropped_evaluation(&mut self) {
        let Some(in_flight) = self.in_flight.take_if(|f| f.lease.strong_count() == 0) else {
            return;
        };
        if self.session.cancel_evaluation(in_flight.ticket).is_ok() {
            tracing::info!(
                session = %self.session.id(),
                attempt = in_flight.ticket.attempt(),
                "evaluation dropped before its result was applied"
            );
            self.publish();
        }
    }

    fn publish(&self) {
        self.updates.send_replace(self.session.snapshot());
    }
}

/// An evaluation attempt that can run after the controller has moved on.
pub struct DetachedEvaluation {
    lease: Arc<()>,
    ticket: EvaluationTicket,
    expected_phrase: String,
    language: Language,
    evaluator: Arc<dyn PronunciationEvaluator>,
    timeout: Duration,
}

impl DetachedEvaluation {
    #[must_use]
    pub fn ticket(&self) -> EvaluationTicket {
        self.ticket
    }

    #[must_use]
    pub fn expected_phrase(&self) -> &str {
        &self.expected_phrase
    }

    /// Score `audio`, bounded by the configured timeout.
    pub async fn run(self, audio: &AudioHandle) -> EvaluationReport {
        let outcome = evaluate_with_timeout(
            &self.evaluator,
            audio,
            &self.expected_phrase,
            self.language,
            self.timeout,
        )
        .await;
        EvaluationReport {
            ticket: self.ticket,
            outcome,
            _lease: self.lease,
        }
    }
}

/// Outcome of a [`DetachedEvaluation`], tagged with the attempt it belongs to.
///
/// Dropping a report without applying it cancels the attempt.
#[derive(Debug, Clone)]
pub struct EvaluationReport {
    pub ticket: EvaluationTicket,
    pub outcome: Result<PronunciationScore, EvaluationFailure>,
    _lease: Arc<()>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluation::{AlwaysReady, MockEvaluator};
    use phrase_core::model::{BilingualText, Lesson, LessonId, Question};
    use phrase_core::quiz::{QuestionState, SessionPhase};
    use phrase_core::time::fixed_clock;
    use storage::Storage;

    fn text(s: &str) -> BilingualText {
        BilingualText::new(s, s).unwrap()
    }

    fn lesson() -> Arc<Lesson> {
        Arc::new(Lesson::new(
            LessonId::new(4),
            text("Numbers"),
            Vec::new(),
            vec![
                Question::MultipleChoice {
                    question: text("one?"),
                    options: vec![text("いち"), text("に")],
                    correct_index: 0,
                },
                Question::Speaking {
                    prompt: text("Say three"),
                    answer: text("さん"),
                },
            ],
        ))
    }

    async fn controller() -> QuizController {
        controller_with(MockEvaluator::seeded(3)).await
    }

    async fn controller_with(evaluator: MockEvaluator) -> QuizController {
        let progress = ProgressService::initialize(Storage::in_memory().progress()).await;
        let session = QuizSession::start(lesson(), fixed_clock().now()).unwrap();
        QuizController::new(
            session,
            Arc::new(evaluator),
            Arc::new(AlwaysReady),
            progress,
            fixed_clock(),
            QuizSettings::default(),
        )
    }

    #[tokio::test]
    async fn each_mutation_publishes_a_snapshot() {
        let mut quiz = controller().await;
        let mut rx = quiz.subscribe();

        quiz.submit_multiple_choice(0).unwrap();
        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow_and_update().state, QuestionState::Answered);

        quiz.advance().await.unwrap();
        assert_eq!(rx.borrow_and_update().current_index, 1);

        let evaluation = quiz.begin_recording().await.unwrap();
        assert!(matches!(
            rx.borrow_and_update().state,
            QuestionState::Evaluating(_)
        ));
        assert_eq!(evaluation.expected_phrase(), "さん");
    }

    #[tokio::test]
    async fn stale_report_publishes_nothing() {
        let mut quiz = controller().await;
        quiz.submit_multiple_choice(1).unwrap();
        quiz.advance().await.unwrap();
        let evaluation = quiz.begin_recording().await.unwrap();
        quiz.abandon();
        let mut rx = quiz.subscribe();

        let report = evaluation.run(&AudioHandle::new("file:///late.m4a")).await;
        let err = quiz.apply(report).unwrap_err();

        assert!(matches!(err, QuizServiceError::Quiz(QuizError::StaleEvaluation)));
        assert!(!rx.has_changed().unwrap());
        assert_eq!(quiz.snapshot().phase, SessionPhase::Abandoned);
        assert_eq!(quiz.snapshot().answered, 1);
    }

    #[tokio::test]
    async fn finishing_marks_lesson_complete() {
        let mut quiz = controller().await;
        quiz.submit_multiple_choice(0).unwrap();
        quiz.advance().await.unwrap();
        quiz.submit_recording(&AudioHandle::new("file:///san.m4a"))
            .await
            .unwrap();

        let Advance::Completed(summary) = quiz.advance().await.unwrap() else {
            panic!("expected completion");
        };

        assert_eq!(summary.total_questions(), 2);
        assert!(quiz.progress.is_completed(LessonId::new(4)));
    }

    async fn on_speaking_question(evaluator: MockEvaluator) -> QuizController {
        let mut quiz = controller_with(evaluator).await;
        quiz.submit_multiple_choice(0).unwrap();
        quiz.advance().await.unwrap();
        quiz
    }

    #[tokio::test]
    async fn dropped_recording_future_can_be_retried() {
        let mut quiz = on_speaking_question(MockEvaluator::new(Duration::from_secs(5))).await;

        let audio = AudioHandle::new("file:///slow.m4a");
        let outcome =
            tokio::time::timeout(Duration::from_millis(20), quiz.submit_recording(&audio)).await;
        assert!(outcome.is_err());
        assert!(matches!(quiz.snapshot().state, QuestionState::Evaluating(_)));

        assert_eq!(quiz.retry().unwrap(), 2);
        assert_eq!(quiz.snapshot().state, QuestionState::Ready);
        let evaluation = quiz.begin_recording().await.unwrap();
        assert_eq!(evaluation.ticket().attempt(), 2);
    }

    #[tokio::test]
    async fn unrun_evaluation_counts_as_cancelled() {
        let mut quiz = on_speaking_question(MockEvaluator::seeded(5)).await;
        drop(quiz.begin_recording().await.unwrap());
        let mut rx = quiz.subscribe();

        assert!(matches!(
            quiz.skip().unwrap_err(),
            QuizServiceError::Quiz(QuizError::CannotSkip { remaining: 3 })
        ));
        assert_eq!(
            rx.borrow_and_update().state,
            QuestionState::Failed(EvaluationFailure::Cancelled)
        );
        assert_eq!(quiz.retry().unwrap(), 2);
    }

    #[tokio::test]
    async fn unapplied_report_counts_as_cancelled() {
        let mut quiz = on_speaking_question(MockEvaluator::seeded(5)).await;
        let evaluation = quiz.begin_recording().await.unwrap();
        let report = evaluation.run(&AudioHandle::new("file:///a.m4a")).await;
        drop(report);

        assert!(matches!(
            quiz.advance().await.unwrap_err(),
            QuizServiceError::Quiz(QuizError::NotAnswered(1))
        ));
        assert_eq!(
            quiz.snapshot().state,
            QuestionState::Failed(EvaluationFailure::Cancelled)
        );
    }

    #[tokio::test]
    async fn explicit_cancel_discards_the_late_report() {
        let mut quiz = on_speaking_question(MockEvaluator::seeded(5)).await;
        let evaluation = quiz.begin_recording().await.unwrap();

        quiz.cancel_evaluation().unwrap();
        let report = evaluation.run(&AudioHandle::new("file:///late.m4a")).await;

        assert!(matches!(
            quiz.apply(report).unwrap_err(),
            QuizServiceError::Quiz(QuizError::StaleEvaluation)
        ));
        assert_eq!(
            quiz.snapshot().state,
            QuestionState::Failed(EvaluationFailure::Cancelled)
        );
        assert!(quiz.cancel_evaluation().is_err());
    }

    #[tokio::test]
    async fn live_detached_evaluation_is_not_cancelled() {
        let mut quiz = on_speaking_question(MockEvaluator::seeded(5)).await;
        let evaluation = quiz.begin_recording().await.unwrap();

        assert!(matches!(
            quiz.retry().unwrap_err(),
            QuizServiceError::Quiz(QuizError::EvaluationInFlight)
        ));
        let report = evaluation.run(&AudioHandle::new("file:///a.m4a")).await;
        quiz.apply(report).unwrap();
        assert_eq!(quiz.snapshot().state, QuestionState::Answered);
    }
}
