mod controller;
mod settings;
mod workflow;

pub use controller::{DetachedEvaluation, EvaluationReport, QuizController};
pub use settings::QuizSettings;
pub use workflow::QuizService;
