//! Persisted shape of learner progress on top of a [`KeyValueStore`].
//!
//! Two keys are used. `language` holds a bare language code. `completedLessons`
//! holds a versioned JSON envelope; a bare JSON array written by older builds
//! is still accepted on read.

use std::collections::BTreeSet;
use std::sync::Arc;

use phrase_core::model::{Language, LessonId};
use serde::{Deserialize, Serialize};

use crate::repository::{KeyValueStore, StorageError};

pub const LANGUAGE_KEY: &str = "language";
pub const COMPLETED_LESSONS_KEY: &str = "completedLessons";

/// Current version of the `completedLessons` envelope.
pub const COMPLETED_LESSONS_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CompletedLessonsRecord {
    version: u32,
    lesson_ids: Vec<LessonId>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum StoredCompletedLessons {
    Versioned(CompletedLessonsRecord),
    Legacy(Vec<LessonId>),
}

/// Encode the completed set as a versioned, sorted JSON envelope.
///
/// # Errors
///
/// Returns `StorageError::Serialization` if encoding fails.
pub fn encode_completed(ids: &BTreeSet<LessonId>) -> Result<String, StorageError> {
    let record = CompletedLessonsRecord {
        version: COMPLETED_LESSONS_VERSION,
        lesson_ids: ids.iter().copied().collect(),
    };
    serde_json::to_string(&record).map_err(|e| StorageError::Serialization(e.to_string()))
}

/// Decode either the versioned envelope or a legacy bare array.
///
/// Duplicate ids collapse.
///
/// # Errors
///
/// Returns `StorageError::Serialization` for malformed JSON or an unknown version.
pub fn decode_completed(raw: &str) -> Result<BTreeSet<LessonId>, StorageError> {
    let stored: StoredCompletedLessons =
        serde_json::from_str(raw).map_err(|e| StorageError::Serialization(e.to_string()))?;
    match stored {
        StoredCompletedLessons::Versioned(record) => {
            if record.version != COMPLETED_LESSONS_VERSION {
                return Err(StorageError::Serialization(format!(
                    "unsupported completedLessons version {}",
                    record.version
                )));
            }
            Ok(record.lesson_ids.into_iter().collect())
        }
        StoredCompletedLessons::Legacy(ids) => Ok(ids.into_iter().collect()),
    }
}

/// Typed access to the progress keys.
#[derive(Clone)]
pub struct ProgressStore {
    kv: Arc<dyn KeyValueStore>,
}

impl ProgressStore {
    #[must_use]
    pub fn new(kv: Arc<dyn KeyValueStore>) -> Self {
        Self { kv }
    }

    /// Load the persisted language, `None` if never saved.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Serialization` for an unknown language code.
    pub async fn load_language(&self) -> Result<Option<Language>, StorageError> {
        let Some(raw) = self.kv.get(LANGUAGE_KEY).await? else {
            return Ok(None);
        };
        raw.parse::<Language>()
            .map(Some)
            .map_err(|e| StorageError::Serialization(e.to_string()))
    }

    /// # Errors
    ///
    /// Returns `StorageError` if the write fails.
    pub async fn save_language(&self, language: Language) -> Result<(), StorageError> {
        self.kv.set(LANGUAGE_KEY, language.code()).await
    }

    /// Load the completed lesson set, `None` if never saved.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on read or decode failures.
    pub async fn load_completed(&self) -> Result<Option<BTreeSet<LessonId>>, StorageError> {
        match self.kv.get(COMPLETED_LESSONS_KEY).await? {
            Some(raw) => decode_completed(&raw).map(Some),
            None => Ok(None),
        }
    }

    /// # Errors
    ///
    /// Returns `StorageError` if encoding or the write fails.
    pub async fn save_completed(&self, ids: &BTreeSet<LessonId>) -> Result<(), StorageError> {
        let encoded = encode_completed(ids)?;
        self.kv.set(COMPLETED_LESSONS_KEY, &encoded).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::InMemoryStore;

    fn ids(values: &[u64]) -> BTreeSet<LessonId> {
        values.iter().copied().map(LessonId::new).collect()
    }

    #[test]
    fn envelope_is_versioned_and_sorted() {
        let encoded = encode_completed(&ids(&[5, 1, 3])).unwrap();
        assert_eq!(encoded, r#"{"version":1,"lessonIds":[1,3,5]}"#);
    }

    #[test]
    fn legacy_array_is_accepted() {
        assert_eq!(decode_completed("[3,1,3]").unwrap(), ids(&[1, 3]));
    }

    #[test]
    fn unknown_version_is_rejected() {
        let err = decode_completed(r#"{"version":9,"lessonIds":[1]}"#).unwrap_err();
        assert!(matches!(err, StorageError::Serialization(msg) if msg.contains("version 9")));
    }

    #[test]
    fn garbage_is_a_serialization_error() {
        assert!(matches!(
            decode_completed("not json").unwrap_err(),
            StorageError::Serialization(_)
        ));
    }

    #[tokio::test]
    async fn completed_set_round_trips_through_store() {
        let store = ProgressStore::new(Arc::new(InMemoryStore::new()));
        assert_eq!(store.load_completed().await.unwrap(), None);

        store.save_completed(&ids(&[1, 3, 5])).await.unwrap();

        assert_eq!(store.load_completed().await.unwrap(), Some(ids(&[5, 3, 1])));
    }

    #[tokio::test]
    async fn language_round_trips_and_rejects_unknown_codes() {
        let kv = Arc::new(InMemoryStore::new());
        let store = ProgressStore::new(kv.clone());
        store.save_language(Language::Ja).await.unwrap();
        assert_eq!(store.load_language().await.unwrap(), Some(Language::Ja));

        kv.set(LANGUAGE_KEY, "klingon").await.unwrap();
        assert!(store.load_language().await.is_err());
    }
}
