#![forbid(unsafe_code)]

pub mod app_services;
pub mod catalog;
pub mod error;
pub mod evaluation;
pub mod progress_service;
pub mod quiz;

pub use phrase_core::Clock;

pub use app_services::AppServices;
pub use catalog::LessonCatalog;
pub use error::{AppServicesError, CatalogError, ProgressError, QuizServiceError};
pub use evaluation::{
    AlwaysReady, DeviceGate, MockEvaluator, PreconditionFailure, PronunciationEvaluator,
    RecordingGate,
};
pub use progress_service::ProgressService;
pub use quiz::{DetachedEvaluation, EvaluationReport, QuizController, QuizService, QuizSettings};
