use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::ids::LessonId;
use crate::model::text::{BilingualText, PhrasePair, TextError};

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

/// Content bugs detected while validating bundled lesson data.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum LessonError {
    #[error("lesson {lesson}: question {question} needs at least two options, found {found}")]
    TooFewOptions {
        lesson: LessonId,
        question: usize,
        found: usize,
    },

    #[error("lesson {lesson}: question {question} has correct index {index} but {len} options")]
    CorrectIndexOutOfRange {
        lesson: LessonId,
        question: usize,
        index: usize,
        len: usize,
    },

    #[error("lesson {lesson}: phrase {phrase} is blank")]
    BlankPhrase { lesson: LessonId, phrase: usize },

    #[error("lesson {lesson}: {source}")]
    Text {
        lesson: LessonId,
        #[source]
        source: TextError,
    },
}

//
// ─── QUESTION ──────────────────────────────────────────────────────────────────
//

/// Kind of a quiz question, without its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuestionKind {
    MultipleChoice,
    Speaking,
}

/// One quiz item of a lesson.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Question {
    #[serde(rename = "multiple-choice")]
    MultipleChoice {
        question: BilingualText,
        options: Vec<BilingualText>,
        #[serde(rename = "correctIndex")]
        correct_index: usize,
    },
    #[serde(rename = "speaking")]
    Speaking {
        prompt: BilingualText,
        /// The phrase the learner has to pronounce.
        answer: BilingualText,
    },
}

impl Question {
    #[must_use]
    pub fn kind(&self) -> QuestionKind {
        match self {
            Question::MultipleChoice { .. } => QuestionKind::MultipleChoice,
            Question::Speaking { .. } => QuestionKind::Speaking,
        }
    }

    /// Text shown above the answer area.
    #[must_use]
    pub fn prompt(&self) -> &BilingualText {
        match self {
            Question::MultipleChoice { question, .. } => question,
            Question::Speaking { prompt, .. } => prompt,
        }
    }

    fn validate(&self, lesson: LessonId, index: usize) -> Result<(), LessonError> {
        let text_err = |source| LessonError::Text { lesson, source };
        match self {
            Question::MultipleChoice {
                question,
                options,
                correct_index,
            } => {
                question.validate().map_err(text_err)?;
                if options.len() < 2 {
                    return Err(LessonError::TooFewOptions {
                        lesson,
                        question: index,
                        found: options.len(),
                    });
                }
                if *correct_index >= options.len() {
                    return Err(LessonError::CorrectIndexOutOfRange {
                        lesson,
                        question: index,
                        index: *correct_index,
                        len: options.len(),
                    });
                }
                for option in options {
                    option.validate().map_err(text_err)?;
                }
                Ok(())
            }
            Question::Speaking { prompt, answer } => {
                prompt.validate().map_err(text_err)?;
                answer.validate().map_err(text_err)
            }
        }
    }
}

//
// ─── LESSON ────────────────────────────────────────────────────────────────────
//

/// A bundle of phrases and the quiz that checks them.
///
/// Lessons are immutable once loaded; sessions borrow them through an `Arc`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lesson {
    id: LessonId,
    title: BilingualText,
    phrases: Vec<PhrasePair>,
    quizzes: Vec<Question>,
}

impl Lesson {
    #[must_use]
    pub fn new(
        id: LessonId,
        title: BilingualText,
        phrases: Vec<PhrasePair>,
        quizzes: Vec<Question>,
    ) -> Self {
        Self {
            id,
            title,
            phrases,
            quizzes,
        }
    }

    /// Check the content invariants of this lesson.
    ///
    /// A lesson without questions is valid content; it just cannot be quizzed.
    ///
    /// # Errors
    ///
    /// Returns the first `LessonError` found.
    pub fn validate(&self) -> Result<(), LessonError> {
        self.title.validate().map_err(|source| LessonError::Text {
            lesson: self.id,
            source,
        })?;
        for (index, phrase) in self.phrases.iter().enumerate() {
            if phrase.ja.trim().is_empty() || phrase.en.trim().is_empty() {
                return Err(LessonError::BlankPhrase {
                    lesson: self.id,
                    phrase: index,
                });
            }
        }
        for (index, question) in self.quizzes.iter().enumerate() {
            question.validate(self.id, index)?;
        }
        Ok(())
    }

    #[must_use]
    pub fn id(&self) -> LessonId {
        self.id
    }

    #[must_use]
    pub fn title(&self) -> &BilingualText {
        &self.title
    }

    #[must_use]
    pub fn phrases(&self) -> &[PhrasePair] {
        &self.phrases
    }

    #[must_use]
    pub fn quizzes(&self) -> &[Question] {
        &self.quizzes
    }

    #[must_use]
    pub fn question(&self, index: usize) -> Option<&Question> {
        self.quizzes.get(index)
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
