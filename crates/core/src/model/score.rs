use serde::Serialize;
use thiserror::Error;

use crate::model::text::Language;

/// Minimum overall score that counts a speaking question as passed.
pub const SPEAKING_PASS_THRESHOLD: u8 = 70;

/// Upper bound of every score axis.
pub const MAX_SCORE: u8 = 100;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ScoreError {
    #[error("{axis} score {value} is above {}", MAX_SCORE)]
    OutOfRange { axis: &'static str, value: u8 },

    #[error("score comment must not be empty")]
    EmptyComment,
}

/// Opaque reference to a finished recording (a file URI on device).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AudioHandle(String);

impl AudioHandle {
    #[must_use]
    pub fn new(uri: impl Into<String>) -> Self {
        Self(uri.into())
    }

    #[must_use]
    pub fn uri(&self) -> &str {
        &self.0
    }

    /// True when the recorder produced nothing usable.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

/// Why a pronunciation evaluation attempt did not produce a score.
///
/// All variants are recoverable through a retry.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum EvaluationFailure {
    #[error("the recording is empty")]
    EmptyRecording,

    #[error("evaluation timed out after {after_ms} ms")]
    TimedOut { after_ms: u64 },

    #[error("evaluation service error: {0}")]
    Service(String),

    #[error("evaluation was cancelled before it finished")]
    Cancelled,
}

//
// ─── FEEDBACK ──────────────────────────────────────────────────────────────────
//

/// Comment ladder applied to the overall score.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedbackTier {
    /// 90 and above.
    Excellent,
    /// 70 to 89.
    Good,
    /// 50 to 69.
    Fair,
    /// Below 50.
    NeedsWork,
}

impl FeedbackTier {
    #[must_use]
    pub fn for_overall(overall: u8) -> Self {
        match overall {
            90.. => FeedbackTier::Excellent,
            70..=89 => FeedbackTier::Good,
            50..=69 => FeedbackTier::Fair,
            _ => FeedbackTier::NeedsWork,
        }
    }

    #[must_use]
    pub fn message(self, language: Language) -> &'static str {
        match (self, language) {
            (FeedbackTier::Excellent, Language::En) => "Excellent! Your pronunciation is very natural.",
            (FeedbackTier::Excellent, Language::Ja) => "素晴らしい！とても自然な発音です。",
            (FeedbackTier::Good, Language::En) => "Good job! Just a little more polish.",
            (FeedbackTier::Good, Language::Ja) => "よくできました！あと少しで完璧です。",
            (FeedbackTier::Fair, Language::En) => "Not bad. Try to speak more smoothly.",
            (FeedbackTier::Fair, Language::Ja) => "まずまずです。もう少し滑らかに話してみましょう。",
            (FeedbackTier::NeedsWork, Language::En) => "Keep practicing! Listen to the phrase and try again.",
            (FeedbackTier::NeedsWork, Language::Ja) => "練習を続けましょう！フレーズを聞いてもう一度。",
        }
    }
}

//
// ─── SCORE ─────────────────────────────────────────────────────────────────────
//

/// Three-axis result of evaluating one recording.
///
/// `overall` is always derived from the other two axes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PronunciationScore {
    accuracy: u8,
    fluency: u8,
    overall: u8,
    comment: String,
}

impl PronunciationScore {
    /// Build a score with an explicit comment.
    ///
    /// # Errors
    ///
    /// Returns `ScoreError` if an axis exceeds 100 or the comment is blank.
    pub fn new(accuracy: u8, fluency: u8, comment: impl Into<String>) -> Result<Self, ScoreError> {
        if accuracy > MAX_SCORE {
            return Err(ScoreError::OutOfRange {
                axis: "accuracy",
                value: accuracy,
            });
        }
        if fluency > MAX_SCORE {
            return Err(ScoreError::OutOfRange {
                axis: "fluency",
                value: fluency,
            });
        }
        let comment = comment.into();
        if comment.trim().is_empty() {
            return Err(ScoreError::EmptyComment);
        }
        Ok(Self {
            accuracy,
            fluency,
            overall: overall_of(accuracy, fluency),
            comment,
        })
    }

    /// Build a score whose comment comes from the feedback ladder.
    ///
    /// # Errors
    ///
    /// Returns `ScoreError::OutOfRange` if an axis exceeds 100.
    pub fn graded(accuracy: u8, fluency: u8, language: Language) -> Result<Self, ScoreError> {
        let tier = FeedbackTier::for_overall(overall_of(accuracy, fluency));
        Self::new(accuracy, fluency, tier.message(language))
    }

    #[must_use]
    pub fn accuracy(&self) -> u8 {
        self.accuracy
    }

    #[must_use]
    pub fn fluency(&self) -> u8 {
        self.fluency
    }

    #[must_use]
    pub fn overall(&self) -> u8 {
        self.overall
    }

    #[must_use]
    pub fn comment(&self) -> &str {
        &self.comment
    }

    #[must_use]
    pub fn tier(&self) -> FeedbackTier {
        FeedbackTier::for_overall(self.overall)
    }

    #[must_use]
    pub fn passed(&self) -> bool {
        self.overall >= SPEAKING_PASS_THRESHOLD
    }
}

/// Rounded mean of two axes, halves rounding up.
fn overall_of(accuracy: u8, fluency: u8) -> u8 {
    let sum = u16::from(accuracy) + u16::from(fluency);
    // both inputs are <= 100 so the mean fits in u8
    u8::try_from(sum.div_ceil(2)).unwrap_or(MAX_SCORE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overall_is_rounded_mean() {
        let score = PronunciationScore::new(80, 91, "ok").unwrap();
        assert_eq!(score.overall(), 86);
        let score = PronunciationScore::new(80, 90, "ok").unwrap();
        assert_eq!(score.overall(), 85);
    }

    #[test]
    fn pass_threshold_is_seventy() {
        assert!(PronunciationScore::new(70, 70, "ok").unwrap().passed());
        assert!(PronunciationScore::new(85, 85, "ok").unwrap().passed());
        assert!(!PronunciationScore::new(65, 65, "ok").unwrap().passed());
        // 69.5 rounds up to 70
        assert!(PronunciationScore::new(69, 70, "ok").unwrap().passed());
    }

    #[test]
    fn axis_above_hundred_is_rejected() {
        let err = PronunciationScore::new(101, 50, "ok").unwrap_err();
        assert_eq!(
            err,
            ScoreError::OutOfRange {
                axis: "accuracy",
                value: 101
            }
        );
        assert_eq!(
            PronunciationScore::new(50, 50, "  ").unwrap_err(),
            ScoreError::EmptyComment
        );
    }

    #[test]
    fn ladder_cut_points() {
        assert_eq!(FeedbackTier::for_overall(100), FeedbackTier::Excellent);
        assert_eq!(FeedbackTier::for_overall(90), FeedbackTier::Excellent);
        assert_eq!(FeedbackTier::for_overall(89), FeedbackTier::Good);
        assert_eq!(FeedbackTier::for_overall(70), FeedbackTier::Good);
        assert_eq!(FeedbackTier::for_overall(69), FeedbackTier::Fair);
        assert_eq!(FeedbackTier::for_overall(50), FeedbackTier::Fair);
        assert_eq!(FeedbackTier::for_overall(49), FeedbackTier::NeedsWork);
    }

    #[test]
    fn graded_score_uses_localized_comment() {
        let score = PronunciationScore::graded(95, 93, Language::Ja).unwrap();
        assert_eq!(score.tier(), FeedbackTier::Excellent);
        assert_eq!(score.comment(), FeedbackTier::Excellent.message(Language::Ja));
    }

    #[test]
    fn blank_audio_handle_is_empty() {
        assert!(AudioHandle::new("").is_empty());
        let take = AudioHandle::new("file:///rec.m4a");
        assert!(!take.is_empty());
        assert_eq!(take.uri(), "file:///rec.m4a");
    }
}
