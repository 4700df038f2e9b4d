use std::sync::Arc;

use phrase_core::model::{AppProgress, Language, LessonId};
use storage::ProgressStore;
use tokio::sync::{Mutex, watch};

use crate::error::ProgressError;

/// App-wide language and lesson-completion state, written through to storage.
///
/// Cloning is cheap; every clone shares the same state. Mutations hold a
/// single lock across the in-memory update and the durable write, so writes
/// to each key land in the order they were made.
#[derive(Clone)]
pub struct ProgressService {
    inner: Arc<Inner>,
}

struct Inner {
    store: ProgressStore,
    state: Mutex<AppProgress>,
    updates: watch::Sender<AppProgress>,
}

impl ProgressService {
    /// Load persisted progress, falling back to defaults for anything missing
    /// or unreadable.
    pub async fn initialize(store: ProgressStore) -> Self {
        let language = match store.load_language().await {
            Ok(Some(language)) => language,
            Ok(None) => Language::FALLBACK,
            Err(err) => {
                tracing::warn!("could not read saved language, using default: {err}");
                Language::FALLBACK
            }
        };
        let completed = match store.load_completed().await {
            Ok(Some(completed)) => completed,
            Ok(None) => Default::default(),
            Err(err) => {
                tracing::warn!("could not read completed lessons, starting empty: {err}");
                Default::default()
            }
        };

        let progress = AppProgress::new(language, completed);
        tracing::info!(
            language = %progress.language(),
            completed = progress.completed().len(),
            "progress loaded"
        );
        Self::with_state(store, progress)
    }

    fn with_state(store: ProgressStore, progress: AppProgress) -> Self {
        let (updates, _rx) = watch::channel(progress.clone());
        Self {
            inner: Arc::new(Inner {
                store,
                state: Mutex::new(progress),
                updates,
            }),
        }
    }

    /// Latest in-memory progress.
    #[must_use]
    pub fn snapshot(&self) -> AppProgress {
        self.inner.updates.borrow().clone()
    }

    #[must_use]
    pub fn language(&self) -> Language {
        self.inner.updates.borrow().language()
    }

    #[must_use]
    pub fn is_completed(&self, id: LessonId) -> bool {
        self.inner.updates.borrow().is_completed(id)
    }

    /// Receiver that observes every progress change.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<AppProgress> {
        self.inner.updates.subscribe()
    }

    /// Switch the UI language, then persist it.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError::Storage` if the write fails. The new language
    /// stays active in memory either way.
    pub async fn set_language(&self, language: Language) -> Result<(), ProgressError> {
        let mut state = self.inner.state.lock().await;
        state.set_language(language);
        self.inner.updates.send_replace(state.clone());

        if let Err(err) = self.inner.store.save_language(language).await {
            tracing::warn!(%language, "language not persisted: {err}");
            return Err(err.into());
        }
        tracing::info!(%language, "language saved");
        Ok(())
    }

    /// Record a finished lesson and persist the set if it changed.
    ///
    /// Returns `false` when the lesson was already recorded.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError::Storage` if the write fails. The lesson stays
    /// completed in memory either way.
    pub async fn mark_lesson_complete(&self, id: LessonId) -> Result<bool, ProgressError> {
        let mut state = self.inner.state.lock().await;
        if !state.mark_completed(id) {
            return Ok(false);
        }
        self.inner.updates.send_replace(state.clone());

        if let Err(err) = self.inner.store.save_completed(state.completed()).await {
            tracing::warn!(lesson = %id, "completed lessons not persisted: {err}");
            return Err(err.into());
        }
        tracing::info!(lesson = %id, total = state.completed().len(), "lesson completed");
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use storage::progress::{COMPLETED_LESSONS_KEY, LANGUAGE_KEY};
    use storage::repository::{InMemoryStore, KeyValueStore, StorageError};

    /// Store whose reads and writes can be made to fail.
    #[derive(Default)]
    struct FlakyStore {
        inner: InMemoryStore,
        fail_reads: AtomicBool,
        fail_writes: AtomicBool,
        writes: AtomicUsize,
    }

    #[async_trait]
    impl KeyValueStore for FlakyStore {
        async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
            if self.fail_reads.load(Ordering::SeqCst) {
                return Err(StorageError::Connection("read failed".into()));
            }
            self.inner.get(key).await
        }

        async fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
            if self.fail_writes.load(Ordering::SeqCst) {
                return Err(StorageError::Connection("write failed".into()));
            }
            self.writes.fetch_add(1, Ordering::SeqCst);
            self.inner.set(key, value).await
        }

        async fn remove(&self, key: &str) -> Result<(), StorageError> {
            self.inner.remove(key).await
        }
    }

    async fn service_over(store: Arc<FlakyStore>) -> ProgressService {
        ProgressService::initialize(ProgressStore::new(store)).await
    }

    #[tokio::test]
    async fn empty_store_gives_defaults() {
        let service = service_over(Arc::new(FlakyStore::default())).await;
        assert_eq!(service.snapshot(), AppProgress::default());
    }

    #[tokio::test]
    async fn unreadable_store_gives_defaults() {
        let store = Arc::new(FlakyStore::default());
        store.inner.set(LANGUAGE_KEY, "ja").await.unwrap();
        store.fail_reads.store(true, Ordering::SeqCst);

        let service = service_over(store).await;

        assert_eq!(service.language(), Language::FALLBACK);
        assert!(service.snapshot().completed().is_empty());
    }

    #[tokio::test]
    async fn corrupt_values_degrade_independently() {
        let store = Arc::new(FlakyStore::default());
        store.inner.set(LANGUAGE_KEY, "ja").await.unwrap();
        store.inner.set(COMPLETED_LESSONS_KEY, "{oops").await.unwrap();

        let service = service_over(store).await;

        assert_eq!(service.language(), Language::Ja);
        assert!(service.snapshot().completed().is_empty());
    }

    #[tokio::test]
    async fn marking_twice_writes_once() {
        let store = Arc::new(FlakyStore::default());
        let service = service_over(Arc::clone(&store)).await;

        assert!(service.mark_lesson_complete(LessonId::new(3)).await.unwrap());
        assert!(!service.mark_lesson_complete(LessonId::new(3)).await.unwrap());

        assert_eq!(service.snapshot().completed().len(), 1);
        assert_eq!(store.writes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn progress_survives_reload() {
        let store = Arc::new(FlakyStore::default());
        let service = service_over(Arc::clone(&store)).await;
        for id in [5, 1, 3] {
            service.mark_lesson_complete(LessonId::new(id)).await.unwrap();
        }
        service.set_language(Language::Ja).await.unwrap();

        let reloaded = service_over(store).await;

        assert_eq!(reloaded.snapshot(), service.snapshot());
        assert!(reloaded.is_completed(LessonId::new(1)));
        assert_eq!(reloaded.language(), Language::Ja);
    }

    #[tokio::test]
    async fn failed_write_keeps_in_memory_change() {
        let store = Arc::new(FlakyStore::default());
        let service = service_over(Arc::clone(&store)).await;
        store.fail_writes.store(true, Ordering::SeqCst);

        let err = service.set_language(Language::Ja).await.unwrap_err();
        assert!(matches!(err, ProgressError::Storage(_)));
        assert_eq!(service.language(), Language::Ja);

        assert!(service.mark_lesson_complete(LessonId::new(2)).await.is_err());
        assert!(service.is_completed(LessonId::new(2)));
    }

    #[tokio::test]
    async fn concurrent_marks_are_not_lost() {
        let store = Arc::new(FlakyStore::default());
        let service = service_over(Arc::clone(&store)).await;

        let mut handles = Vec::new();
        for id in 1..=20 {
            let service = service.clone();
            handles.push(tokio::spawn(async move {
                service.mark_lesson_complete(LessonId::new(id)).await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let reloaded = service_over(store).await;
        assert_eq!(reloaded.snapshot().completed().len(), 20);
    }

    #[tokio::test]
    async fn subscribers_see_changes() {
        let service = service_over(Arc::new(FlakyStore::default())).await;
        let mut rx = service.subscribe();

        service.mark_lesson_complete(LessonId::new(8)).await.unwrap();

        rx.changed().await.unwrap();
        assert!(rx.borrow().is_completed(LessonId::new(8)));
    }
}
