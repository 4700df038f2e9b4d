use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use phrase_core::model::{AudioHandle, EvaluationFailure, Language, MAX_SCORE, PronunciationScore};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::PronunciationEvaluator;

/// Lowest score the stub ever hands out on either axis.
const MIN_STUB_SCORE: i64 = 30;

/// Placeholder scorer: random scores centred on the phrase length.
///
/// Each character of the expected phrase adds ten points to the centre of the
/// range, so short phrases tend to score low and long ones saturate at 100.
pub struct MockEvaluator {
    rng: Mutex<StdRng>,
    delay: Duration,
}

impl MockEvaluator {
    #[must_use]
    pub fn new(delay: Duration) -> Self {
        Self {
            rng: Mutex::new(StdRng::from_os_rng()),
            delay,
        }
    }

    /// Deterministic scorer without artificial delay.
    #[must_use]
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
            delay: Duration::ZERO,
        }
    }

    fn draw(&self, expected_phrase: &str) -> Result<(u8, u8), EvaluationFailure> {
        let chars = i64::try_from(expected_phrase.chars().count()).unwrap_or(i64::MAX / 20);
        let centre = chars.saturating_mul(10);
        let mut rng = self
            .rng
            .lock()
            .map_err(|e| EvaluationFailure::Service(e.to_string()))?;
        let accuracy = rng.random_range(centre.saturating_sub(10)..=centre.saturating_add(10));
        let fluency = rng.random_range(centre.saturating_sub(5)..=centre.saturating_add(15));
        Ok((clamp_score(accuracy), clamp_score(fluency)))
    }
}

impl Default for MockEvaluator {
    fn default() -> Self {
        Self::new(Duration::ZERO)
    }
}

fn clamp_score(raw: i64) -> u8 {
    let clamped = raw.clamp(MIN_STUB_SCORE, i64::from(MAX_SCORE));
    u8::try_from(clamped).unwrap_or(MAX_SCORE)
}

#[async_trait]
impl PronunciationEvaluator for MockEvaluator {
    async fn evaluate(
        &self,
        audio: &AudioHandle,
        expected_phrase: &str,
        language: Language,
    ) -> Result<PronunciationScore, EvaluationFailure> {
        if audio.is_empty() {
            return Err(EvaluationFailure::EmptyRecording);
        }
        let (accuracy, fluency) = self.draw(expected_phrase)?;
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        PronunciationScore::graded(accuracy, fluency, language)
            .map_err(|e| EvaluationFailure::Service(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use phrase_core::model::FeedbackTier;

    fn audio() -> AudioHandle {
        AudioHandle::new("file:///recording.m4a")
    }

    #[tokio::test]
    async fn scores_stay_in_range_with_derived_overall() {
        let evaluator = MockEvaluator::seeded(42);
        let phrases = ["", "は", "こんにちは", "よろしくおねがいします", "ありがとうございますありがとうございます"];
        for phrase in phrases {
            for _ in 0..50 {
                let score = evaluator.evaluate(&audio(), phrase, Language::En).await.unwrap();
                assert!((30..=100).contains(&score.accuracy()));
                assert!((30..=100).contains(&score.fluency()));
                let mean = (f64::from(score.accuracy()) + f64::from(score.fluency())) / 2.0;
                assert_eq!(f64::from(score.overall()), mean.round());
                assert_eq!(score.comment(), score.tier().message(Language::En));
            }
        }
    }

    #[tokio::test]
    async fn long_phrases_saturate() {
        let evaluator = MockEvaluator::seeded(1);
        let score = evaluator
            .evaluate(&audio(), "よろしくおねがいします", Language::Ja)
            .await
            .unwrap();
        assert_eq!(score.overall(), 100);
        assert_eq!(score.tier(), FeedbackTier::Excellent);
    }

    #[tokio::test]
    async fn empty_recording_is_a_failure() {
        let evaluator = MockEvaluator::seeded(1);
        let err = evaluator
            .evaluate(&AudioHandle::new(""), "はい", Language::En)
            .await
            .unwrap_err();
        assert_eq!(err, EvaluationFailure::EmptyRecording);
    }

    #[test]
    fn clamp_bounds() {
        assert_eq!(clamp_score(-5), 30);
        assert_eq!(clamp_score(64), 64);
        assert_eq!(clamp_score(250), 100);
    }
}
