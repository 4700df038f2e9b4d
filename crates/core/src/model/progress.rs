use std::collections::BTreeSet;

use crate::model::ids::LessonId;
use crate::model::text::Language;

/// Process-wide learner progress: chosen UI language and finished lessons.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AppProgress {
    language: Language,
    completed: BTreeSet<LessonId>,
}

impl AppProgress {
    #[must_use]
    pub fn new(language: Language, completed: impl IntoIterator<Item = LessonId>) -> Self {
        Self {
            language,
            completed: completed.into_iter().collect(),
        }
    }

    #[must_use]
    pub fn language(&self) -> Language {
        self.language
    }

    pub fn set_language(&mut self, language: Language) {
        self.language = language;
    }

    #[must_use]
    pub fn completed(&self) -> &BTreeSet<LessonId> {
        &self.completed
    }

    #[must_use]
    pub fn is_completed(&self, id: LessonId) -> bool {
        self.completed.contains(&id)
    }

    /// Record a finished lesson. Returns `false` if it was already recorded.
    pub fn mark_completed(&mut self, id: LessonId) -> bool {
        self.completed.insert(id)
    }
}
