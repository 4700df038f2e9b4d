use std::sync::Arc;

use phrase_core::Clock;
use phrase_core::model::LessonId;
use phrase_core::quiz::QuizSession;

use super::controller::QuizController;
use super::settings::QuizSettings;
use crate::catalog::LessonCatalog;
use crate::error::QuizServiceError;
use crate::evaluation::{PronunciationEvaluator, RecordingGate};
use crate::progress_service::ProgressService;

/// Starts quiz sessions over the lesson catalog.
#[derive(Clone)]
pub struct QuizService {
    clock: Clock,
    catalog: Arc<LessonCatalog>,
    evaluator: Arc<dyn PronunciationEvaluator>,
    gate: Arc<dyn RecordingGate>,
    progress: ProgressService,
    settings: QuizSettings,
}

impl QuizService {
    #[must_use]
    pub fn new(
        clock: Clock,
        catalog: Arc<LessonCatalog>,
        evaluator: Arc<dyn PronunciationEvaluator>,
        gate: Arc<dyn RecordingGate>,
        progress: ProgressService,
    ) -> Self {
        Self {
            clock,
            catalog,
            evaluator,
            gate,
            progress,
            settings: QuizSettings::default(),
        }
    }

    #[must_use]
    pub fn with_settings(mut self, settings: QuizSettings) -> Self {
        self.settings = settings;
        self
    }

    #[must_use]
    pub fn settings(&self) -> QuizSettings {
        self.settings
    }

    /// Start a fresh session at the first question of `lesson_id`.
    ///
    /// # Errors
    ///
    /// Returns `QuizServiceError::UnknownLesson` for ids outside the catalog and
    /// `QuizError::InvalidLesson` for lessons without questions.
    pub fn start(&self, lesson_id: LessonId) -> Result<QuizController, QuizServiceError> {
        let lesson = self
            .catalog
            .get(lesson_id)
            .ok_or(QuizServiceError::UnknownLesson(lesson_id))?;
        let session = QuizSession::start(lesson, self.clock.now())?;
        tracing::info!(
            session = %session.id(),
            lesson = %lesson_id,
            questions = session.total_questions(),
            "quiz started"
        );
        Ok(QuizController::new(
            session,
            Arc::clone(&self.evaluator),
            Arc::clone(&self.gate),
            self.progress.clone(),
            self.clock,
            self.settings,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluation::{AlwaysReady, MockEvaluator};
    use phrase_core::quiz::QuizError;
    use phrase_core::time::fixed_clock;
    use storage::Storage;

    async fn service(json: &str) -> QuizService {
        let progress = ProgressService::initialize(Storage::in_memory().progress()).await;
        QuizService::new(
            fixed_clock(),
            Arc::new(LessonCatalog::from_json(json).unwrap()),
            Arc::new(MockEvaluator::seeded(0)),
            Arc::new(AlwaysReady),
            progress,
        )
    }

    #[tokio::test]
    async fn unknown_lesson_is_rejected() {
        let quiz = service("[]").await;
        let err = quiz.start(LessonId::new(12)).err().unwrap();
        assert!(matches!(err, QuizServiceError::UnknownLesson(id) if id == LessonId::new(12)));
    }

    #[tokio::test]
    async fn lesson_without_questions_cannot_start() {
        let quiz =
            service(r#"[{"id":2,"title":{"ja":"空","en":"Empty"},"phrases":[],"quizzes":[]}]"#)
                .await;
        let err = quiz.start(LessonId::new(2)).err().unwrap();
        assert!(matches!(err, QuizServiceError::Quiz(QuizError::InvalidLesson(_))));
    }

    #[tokio::test]
    async fn each_start_is_a_new_session() {
        let quiz = service(
            r#"[{"id":1,"title":{"ja":"挨拶","en":"Greetings"},"phrases":[],"quizzes":[
                {"type":"speaking","prompt":{"ja":"言って","en":"Say"},
                 "answer":{"ja":"はい","en":"Yes"}}]}]"#,
        )
        .await;
        let first = quiz.start(LessonId::new(1)).unwrap();
        let second = quiz.start(LessonId::new(1)).unwrap();
        assert_ne!(first.snapshot().session_id, second.snapshot().session_id);
        assert_eq!(second.snapshot().current_index, 0);
    }
}
