//! Shared error types for the services crate.

use thiserror::Error;

use phrase_core::model::{LessonError, LessonId};
use phrase_core::quiz::QuizError;
use storage::repository::StorageError;
use storage::sqlite::SqliteInitError;

use crate::evaluation::PreconditionFailure;

/// Errors emitted while loading the lesson catalog.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CatalogError {
    #[error("lesson dataset is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Lesson(#[from] LessonError),
    #[error("lesson id {0} appears more than once")]
    DuplicateId(LessonId),
}

/// Errors emitted by the quiz controller and `QuizService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum QuizServiceError {
    #[error("lesson {0} does not exist")]
    UnknownLesson(LessonId),
    /// Reported before recording; does not consume a retry.
    #[error(transparent)]
    Precondition(#[from] PreconditionFailure),
    #[error(transparent)]
    Quiz(#[from] QuizError),
}

impl QuizServiceError {
    /// True for evaluation failures the learner can recover from with `retry`.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, QuizServiceError::Quiz(QuizError::Evaluation(_)))
    }
}

/// Errors emitted by `ProgressService`.
///
/// In-memory progress is already updated when one of these is returned.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ProgressError {
    #[error("progress was not persisted: {0}")]
    Storage(#[from] StorageError),
}

/// Errors emitted while bootstrapping app services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AppServicesError {
    #[error(transparent)]
    Sqlite(#[from] SqliteInitError),
    #[error(transparent)]
    Catalog(#[from] CatalogError),
}
