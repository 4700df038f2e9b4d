use std::collections::HashMap;
use std::sync::Arc;

use phrase_core::model::{Lesson, LessonId};

use crate::error::CatalogError;

const BUNDLED_LESSONS: &str = include_str!("../assets/lessons.json");

/// Read-only collection of lessons, loaded once at startup.
#[derive(Debug, Clone)]
pub struct LessonCatalog {
    lessons: Vec<Arc<Lesson>>,
    by_id: HashMap<LessonId, usize>,
}

impl LessonCatalog {
    /// Load the dataset compiled into the binary.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError` if the bundled data is malformed.
    pub fn bundled() -> Result<Self, CatalogError> {
        Self::from_json(BUNDLED_LESSONS)
    }

    /// Parse and validate a JSON array of lessons.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError` on invalid JSON, invalid content or duplicate ids.
    pub fn from_json(json: &str) -> Result<Self, CatalogError> {
        let lessons: Vec<Lesson> = serde_json::from_str(json)?;
        Self::from_lessons(lessons)
    }

    /// Validate lessons and index them by id, keeping their order.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError` on invalid content or duplicate ids.
    pub fn from_lessons(lessons: Vec<Lesson>) -> Result<Self, CatalogError> {
        let mut by_id = HashMap::with_capacity(lessons.len());
        let mut stored = Vec::with_capacity(lessons.len());
        for lesson in lessons {
            lesson.validate()?;
            if by_id.insert(lesson.id(), stored.len()).is_some() {
                return Err(CatalogError::DuplicateId(lesson.id()));
            }
            stored.push(Arc::new(lesson));
        }
        Ok(Self {
            lessons: stored,
            by_id,
        })
    }

    #[must_use]
    pub fn lessons(&self) -> &[Arc<Lesson>] {
        &self.lessons
    }

    #[must_use]
    pub fn get(&self, id: LessonId) -> Option<Arc<Lesson>> {
        self.by_id.get(&id).map(|&idx| Arc::clone(&self.lessons[idx]))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.lessons.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lessons.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use phrase_core::model::{LessonError, Question};

    #[test]
    fn bundled_dataset_loads() {
        let catalog = LessonCatalog::bundled().unwrap();
        assert!(!catalog.is_empty());
        for lesson in catalog.lessons() {
            assert!(!lesson.quizzes().is_empty(), "lesson {} has no quiz", lesson.id());
        }
        let first = catalog.lessons()[0].id();
        assert_eq!(catalog.get(first).unwrap().id(), first);
    }

    #[test]
    fn bundled_dataset_has_both_question_kinds() {
        let catalog = LessonCatalog::bundled().unwrap();
        let questions: Vec<&Question> = catalog
            .lessons()
            .iter()
            .flat_map(|l| l.quizzes())
            .collect();
        assert!(questions.iter().any(|q| matches!(q, Question::Speaking { .. })));
        assert!(
            questions
                .iter()
                .any(|q| matches!(q, Question::MultipleChoice { .. }))
        );
    }

    #[test]
    fn unknown_id_is_none() {
        let catalog = LessonCatalog::bundled().unwrap();
        assert!(catalog.get(LessonId::new(9_999)).is_none());
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let json = r#"[
            {"id":1,"title":{"ja":"一","en":"one"},"phrases":[],"quizzes":[]},
            {"id":1,"title":{"ja":"二","en":"two"},"phrases":[],"quizzes":[]}
        ]"#;
        let err = LessonCatalog::from_json(json).unwrap_err();
        assert!(matches!(err, CatalogError::DuplicateId(id) if id == LessonId::new(1)));
    }

    #[test]
    fn bad_correct_index_is_a_content_error() {
        let json = r#"[{"id":7,"title":{"ja":"七","en":"seven"},"phrases":[],"quizzes":[
            {"type":"multiple-choice","question":{"ja":"問","en":"q"},
             "options":[{"ja":"あ","en":"a"},{"ja":"い","en":"b"}],"correctIndex":2}
        ]}]"#;
        let err = LessonCatalog::from_json(json).unwrap_err();
        assert!(matches!(
            err,
            CatalogError::Lesson(LessonError::CorrectIndexOutOfRange { index: 2, len: 2, .. })
        ));
    }

    #[test]
    fn malformed_json_is_reported() {
        assert!(matches!(
            LessonCatalog::from_json("{").unwrap_err(),
            CatalogError::Json(_)
        ));
    }
}
