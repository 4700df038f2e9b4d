//! Pronunciation evaluation: the scorer contract, a stub scorer and the
//! recording preconditions checked before anything is recorded.

mod gate;
mod mock;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use phrase_core::model::{AudioHandle, EvaluationFailure, Language, PronunciationScore};

pub use gate::{AlwaysReady, DeviceGate, PreconditionFailure, RecordingGate};
pub use mock::MockEvaluator;

/// Scores a recording against the phrase the learner was asked to say.
///
/// One result per call. Callers only rely on the result shape: axes in
/// `[0, 100]`, `overall` derived from accuracy and fluency, a non-empty comment
/// in `language`.
#[async_trait]
pub trait PronunciationEvaluator: Send + Sync {
    async fn evaluate(
        &self,
        audio: &AudioHandle,
        expected_phrase: &str,
        language: Language,
    ) -> Result<PronunciationScore, EvaluationFailure>;
}

/// Run `evaluator` with an upper bound on how long it may take.
///
/// Running out of time is reported as `EvaluationFailure::TimedOut`.
pub async fn evaluate_with_timeout(
    evaluator: &Arc<dyn PronunciationEvaluator>,
    audio: &AudioHandle,
    expected_phrase: &str,
    language: Language,
    limit: Duration,
) -> Result<PronunciationScore, EvaluationFailure> {
    match tokio::time::timeout(limit, evaluator.evaluate(audio, expected_phrase, language)).await
    {
        Ok(outcome) => outcome,
        Err(_elapsed) => Err(EvaluationFailure::TimedOut {
            after_ms: u64::try_from(limit.as_millis()).unwrap_or(u64::MAX),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Sleepy;

    #[async_trait]
    impl PronunciationEvaluator for Sleepy {
        async fn evaluate(
            &self,
            _audio: &AudioHandle,
            _expected_phrase: &str,
            language: Language,
        ) -> Result<PronunciationScore, EvaluationFailure> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            PronunciationScore::graded(90, 90, language)
                .map_err(|e| EvaluationFailure::Service(e.to_string()))
        }
    }

    #[tokio::test]
    async fn slow_evaluator_times_out() {
        let evaluator: Arc<dyn PronunciationEvaluator> = Arc::new(Sleepy);
        let outcome = evaluate_with_timeout(
            &evaluator,
            &AudioHandle::new("file:///a.m4a"),
            "はい",
            Language::En,
            Duration::from_millis(20),
        )
        .await;
        assert_eq!(outcome, Err(EvaluationFailure::TimedOut { after_ms: 20 }));
    }

    #[tokio::test]
    async fn fast_evaluator_passes_through() {
        let evaluator: Arc<dyn PronunciationEvaluator> = Arc::new(MockEvaluator::seeded(7));
        let score = evaluate_with_timeout(
            &evaluator,
            &AudioHandle::new("file:///a.m4a"),
            "はい",
            Language::En,
            Duration::from_secs(1),
        )
        .await
        .unwrap();
        assert!(score.accuracy() >= 30);
    }
}
