use std::sync::Arc;

use storage::Storage;

use crate::catalog::LessonCatalog;
use crate::error::AppServicesError;
use crate::evaluation::{AlwaysReady, MockEvaluator, PronunciationEvaluator, RecordingGate};
use crate::progress_service::ProgressService;
use crate::quiz::{QuizService, QuizSettings};
use crate::Clock;

/// Assembles app-facing services over one storage backend.
#[derive(Clone)]
pub struct AppServices {
    catalog: Arc<LessonCatalog>,
    progress: ProgressService,
    quiz: Arc<QuizService>,
}

impl AppServices {
    /// Build services backed by `SQLite` storage and the stub evaluator.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError` if storage initialization fails or the
    /// bundled lessons are malformed.
    pub async fn new_sqlite(
        db_url: &str,
        clock: Clock,
        settings: QuizSettings,
    ) -> Result<Self, AppServicesError> {
        let storage = Storage::sqlite(db_url).await?;
        tracing::info!(db_url, "sqlite storage ready");
        Self::with_stub_evaluator(storage, clock, settings).await
    }

    /// Build services over volatile in-memory storage.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError` if the bundled lessons are malformed.
    pub async fn in_memory(clock: Clock, settings: QuizSettings) -> Result<Self, AppServicesError> {
        Self::with_stub_evaluator(Storage::in_memory(), clock, settings).await
    }

    async fn with_stub_evaluator(
        storage: Storage,
        clock: Clock,
        settings: QuizSettings,
    ) -> Result<Self, AppServicesError> {
        let evaluator: Arc<dyn PronunciationEvaluator> =
            Arc::new(MockEvaluator::new(settings.evaluator_delay));
        let gate: Arc<dyn RecordingGate> = Arc::new(AlwaysReady);
        let catalog = LessonCatalog::bundled()?;
        Ok(Self::assemble(storage, catalog, clock, settings, evaluator, gate).await)
    }

    /// Wire services from explicit parts.
    pub async fn assemble(
        storage: Storage,
        catalog: LessonCatalog,
        clock: Clock,
        settings: QuizSettings,
        evaluator: Arc<dyn PronunciationEvaluator>,
        gate: Arc<dyn RecordingGate>,
    ) -> Self {
        let catalog = Arc::new(catalog);
        let progress = ProgressService::initialize(storage.progress()).await;
        let quiz = Arc::new(
            QuizService::new(
                clock,
                Arc::clone(&catalog),
                evaluator,
                gate,
                progress.clone(),
            )
            .with_settings(settings),
        );
        tracing::debug!(lessons = catalog.len(), "app services assembled");
        Self {
            catalog,
            progress,
            quiz,
        }
    }

    #[must_use]
    pub fn catalog(&self) -> Arc<LessonCatalog> {
        Arc::clone(&self.catalog)
    }

    #[must_use]
    pub fn progress(&self) -> ProgressService {
        self.progress.clone()
    }

    #[must_use]
    pub fn quiz(&self) -> Arc<QuizService> {
        Arc::clone(&self.quiz)
    }
}
