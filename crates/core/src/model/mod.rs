mod ids;
mod lesson;
mod progress;
mod score;
mod session;
mod text;

pub use ids::{LessonId, ParseIdError, SessionId};
pub use lesson::{Lesson, LessonError, Question, QuestionKind};
pub use progress::AppProgress;
pub use score::{
    AudioHandle, EvaluationFailure, FeedbackTier, MAX_SCORE, PronunciationScore,
    SPEAKING_PASS_THRESHOLD, ScoreError,
};
pub use session::{
    ChoiceTally, QuestionOutcome, SessionSummary, SessionSummaryError, SpeakingTally,
};
pub use text::{BilingualText, Language, PhrasePair, TextError};
