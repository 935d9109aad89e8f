use std::sync::Arc;

use storage::repository::{ProgressRepository, RecordFilter, StorageError};
use study_core::model::{
    ChapterProgress, ProblemId, ProgressField, ProgressKey, ProgressRecord, validate_subject,
};
use tracing::{debug, warn};

use crate::error::ProgressServiceError;
use crate::keyed_lock::KeyedLocks;

/// The only write path for chapter progress.
///
/// Every mutation is a read-modify-write of the whole record. Mutations of the
/// same (subject, chapter) are serialized through a per-key lock so concurrent
/// toggles in one process cannot lose each other's updates.
#[derive(Clone)]
pub struct ProgressService {
    repo: Arc<dyn ProgressRepository>,
    locks: Arc<KeyedLocks>,
}

impl ProgressService {
    #[must_use]
    pub fn new(repo: Arc<dyn ProgressRepository>) -> Self {
        Self {
            repo,
            locks: Arc::new(KeyedLocks::new()),
        }
    }

    /// Progress for one chapter, empty when nothing has been stored yet.
    ///
    /// # Errors
    ///
    /// Returns `ProgressServiceError::InvalidKey` for an unusable subject or chapter.
    /// Returns `ProgressServiceError::Storage` if the store cannot be read.
    pub async fn get_progress(
        &self,
        subject: &str,
        chapter: &str,
    ) -> Result<ChapterProgress, ProgressServiceError> {
        let key = ProgressKey::new(subject, chapter)?;
        self.load(&key).await
    }

    /// Replace the chapter's record with exactly the given sets.
    ///
    /// # Errors
    ///
    /// Returns `ProgressServiceError::InvalidKey` for an unusable subject or chapter.
    /// Returns `ProgressServiceError::Storage` if the write fails; the previous
    /// record is then left as it was.
    pub async fn save_progress(
        &self,
        subject: &str,
        chapter: &str,
        completed_problems: impl IntoIterator<Item = ProblemId>,
        favourites: impl IntoIterator<Item = ProblemId>,
    ) -> Result<(), ProgressServiceError> {
        let key = ProgressKey::new(subject, chapter)?;
        let progress = ChapterProgress::new(completed_problems, favourites);
        let _guard = self.locks.lock(&key.encode()).await;
        self.store(key, progress).await
    }

    /// Mark a problem done or not done.
    ///
    /// Returns the chapter's progress after the change.
    ///
    /// # Errors
    ///
    /// See [`ProgressService::set_membership`].
    pub async fn set_problem_completed(
        &self,
        subject: &str,
        chapter: &str,
        problem_id: ProblemId,
        completed: bool,
    ) -> Result<ChapterProgress, ProgressServiceError> {
        self.set_membership(subject, chapter, ProgressField::Completed, problem_id, completed)
            .await
    }

    /// Star or unstar a problem.
    ///
    /// Returns the chapter's progress after the change.
    ///
    /// # Errors
    ///
    /// See [`ProgressService::set_membership`].
    pub async fn set_favourite(
        &self,
        subject: &str,
        chapter: &str,
        problem_id: ProblemId,
        is_favourite: bool,
    ) -> Result<ChapterProgress, ProgressServiceError> {
        self.set_membership(subject, chapter, ProgressField::Favourite, problem_id, is_favourite)
            .await
    }

    /// Add `problem_id` to, or remove it from, one set of a chapter's record.
    ///
    /// Idempotent. The write is skipped only when a well-formed record already
    /// exists and its membership already matches; otherwise the record is created
    /// or rewritten.
    ///
    /// # Errors
    ///
    /// Returns `ProgressServiceError::InvalidKey` for an unusable subject or chapter.
    /// Returns `ProgressServiceError::Storage` if the read or the write fails;
    /// the stored record is then unchanged.
    pub async fn set_membership(
        &self,
        subject: &str,
        chapter: &str,
        field: ProgressField,
        problem_id: ProblemId,
        present: bool,
    ) -> Result<ChapterProgress, ProgressServiceError> {
        let key = ProgressKey::new(subject, chapter)?;
        let _guard = self.locks.lock(&key.encode()).await;

        let (mut progress, stored) = self.load_stored(&key).await?;
        if !progress.set_membership(field, problem_id, present) && stored {
            return Ok(progress);
        }
        debug!(key = %key, field = field.as_str(), present, "toggled problem");
        self.store(key, progress.clone()).await?;
        Ok(progress)
    }

    /// Every stored record for `subject`, in no particular order.
    ///
    /// # Errors
    ///
    /// Returns `ProgressServiceError::InvalidKey` for an unusable subject.
    /// Returns `ProgressServiceError::Storage` if the store cannot be read.
    pub async fn get_all_for_subject(
        &self,
        subject: &str,
    ) -> Result<Vec<ProgressRecord>, ProgressServiceError> {
        validate_subject(subject)?;
        let records = self
            .repo
            .scan_records(&RecordFilter::Subject(subject.to_owned()))
            .await?;
        Ok(records)
    }

    async fn load(&self, key: &ProgressKey) -> Result<ChapterProgress, ProgressServiceError> {
        let (progress, _) = self.load_stored(key).await?;
        Ok(progress)
    }

    /// Current progress, and whether a well-formed record backs it.
    async fn load_stored(
        &self,
        key: &ProgressKey,
    ) -> Result<(ChapterProgress, bool), ProgressServiceError> {
        match self.repo.get_record(key).await {
            Ok(Some(record)) => Ok((record.into_progress(), true)),
            Ok(None) => Ok((ChapterProgress::default(), false)),
            Err(StorageError::MalformedRecord { id, reason }) => {
                warn!(%id, %reason, "treating malformed progress record as empty");
                Ok((ChapterProgress::default(), false))
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn store(
        &self,
        key: ProgressKey,
        progress: ChapterProgress,
    ) -> Result<(), ProgressServiceError> {
        self.repo
            .put_record(&ProgressRecord::new(key, progress))
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use async_trait::async_trait;
    use storage::repository::InMemoryRepository;

    fn service() -> ProgressService {
        ProgressService::new(Arc::new(InMemoryRepository::new()))
    }

    fn ids(raw: &[i64]) -> Vec<ProblemId> {
        raw.iter().copied().map(ProblemId::from).collect()
    }

    #[tokio::test]
    async fn unwritten_chapter_is_empty() {
        let service = service();
        let progress = service.get_progress("GK", "Dance").await.unwrap();
        assert_eq!(progress, ChapterProgress::default());
    }

    #[tokio::test]
    async fn save_then_get_returns_saved_sets() {
        let service = service();
        service
            .save_progress("GK", "Dance", ids(&[9]), ids(&[9]))
            .await
            .unwrap();
        service
            .save_progress("GK", "Dance", ids(&[1, 2]), ids(&[2]))
            .await
            .unwrap();

        let progress = service.get_progress("GK", "Dance").await.unwrap();
        assert_eq!(progress, ChapterProgress::new(ids(&[1, 2]), ids(&[2])));
    }

    #[tokio::test]
    async fn favourite_on_empty_chapter() {
        let service = service();
        service
            .set_favourite("GK", "Dance", ProblemId::from(3), true)
            .await
            .unwrap();

        let progress = service.get_progress("GK", "Dance").await.unwrap();
        assert_eq!(progress, ChapterProgress::new([], ids(&[3])));
    }

    #[tokio::test]
    async fn completing_twice_equals_once() {
        let service = service();
        let once = service
            .set_problem_completed("GK", "Dance", ProblemId::from(4), true)
            .await
            .unwrap();
        let twice = service
            .set_problem_completed("GK", "Dance", ProblemId::from(4), true)
            .await
            .unwrap();
        assert_eq!(once, twice);
        assert_eq!(service.get_progress("GK", "Dance").await.unwrap(), once);
    }

    #[tokio::test]
    async fn complete_then_uncomplete_restores_prior_set() {
        let service = service();
        service
            .save_progress("GK", "Dance", ids(&[1, 2]), ids(&[2]))
            .await
            .unwrap();
        let before = service.get_progress("GK", "Dance").await.unwrap();

        service
            .set_problem_completed("GK", "Dance", ProblemId::from(8), true)
            .await
            .unwrap();
        service
            .set_problem_completed("GK", "Dance", ProblemId::from(8), false)
            .await
            .unwrap();

        assert_eq!(service.get_progress("GK", "Dance").await.unwrap(), before);
    }

    #[tokio::test]
    async fn toggles_leave_the_other_set_alone() {
        let service = service();
        service
            .save_progress("GK", "Dance", ids(&[1]), ids(&[1]))
            .await
            .unwrap();
        service
            .set_favourite("GK", "Dance", ProblemId::from(1), false)
            .await
            .unwrap();

        let progress = service.get_progress("GK", "Dance").await.unwrap();
        assert_eq!(progress, ChapterProgress::new(ids(&[1]), []));
    }

    #[tokio::test]
    async fn no_op_toggle_still_creates_the_record() {
        let service = service();
        let progress = service
            .set_favourite("GK", "Dance", ProblemId::from(3), false)
            .await
            .unwrap();
        assert_eq!(progress, ChapterProgress::default());

        let records = service.get_all_for_subject("GK").await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].id(), "GK-Dance");
        assert!(records[0].progress().is_empty());
    }

    #[tokio::test]
    async fn all_for_subject_only_returns_that_subject() {
        let service = service();
        service.save_progress("GK", "Dance", ids(&[1]), []).await.unwrap();
        service.save_progress("GK", "Music", [], ids(&[2])).await.unwrap();
        service.save_progress("Maths", "Algebra", ids(&[3]), []).await.unwrap();

        let records = service.get_all_for_subject("GK").await.unwrap();
        assert_eq!(records.len(), 2);
        assert!(records.iter().all(|r| r.subject() == "GK"));
    }

    #[tokio::test]
    async fn invalid_keys_are_rejected() {
        let service = service();
        let err = service.get_progress("G-K", "Dance").await.unwrap_err();
        assert!(matches!(err, ProgressServiceError::InvalidKey(_)));
        let err = service.get_all_for_subject("").await.unwrap_err();
        assert!(matches!(err, ProgressServiceError::InvalidKey(_)));
    }

    /// Reads from an inner repository but fails every write.
    struct ReadOnlyRepository {
        inner: InMemoryRepository,
    }

    #[async_trait]
    impl ProgressRepository for ReadOnlyRepository {
        async fn put_record(&self, _record: &ProgressRecord) -> Result<(), StorageError> {
            Err(StorageError::Connection("disk full".into()))
        }

        async fn get_record(
            &self,
            key: &ProgressKey,
        ) -> Result<Option<ProgressRecord>, StorageError> {
            self.inner.get_record(key).await
        }

        async fn scan_records(
            &self,
            filter: &RecordFilter,
        ) -> Result<Vec<ProgressRecord>, StorageError> {
            self.inner.scan_records(filter).await
        }
    }

    #[tokio::test]
    async fn failed_write_fails_toggle_and_keeps_state() {
        let inner = InMemoryRepository::new();
        ProgressService::new(Arc::new(inner.clone()))
            .save_progress("GK", "Dance", ids(&[1]), [])
            .await
            .unwrap();

        let service = ProgressService::new(Arc::new(ReadOnlyRepository {
            inner: inner.clone(),
        }));
        let err = service
            .set_problem_completed("GK", "Dance", ProblemId::from(2), true)
            .await
            .unwrap_err();
        assert!(matches!(err, ProgressServiceError::Storage(_)));
        assert!(!err.is_unavailable());

        let progress = service.get_progress("GK", "Dance").await.unwrap();
        assert_eq!(progress, ChapterProgress::new(ids(&[1]), []));
    }

    /// Store that cannot be opened at all.
    struct ClosedRepository;

    #[async_trait]
    impl ProgressRepository for ClosedRepository {
        async fn put_record(&self, _record: &ProgressRecord) -> Result<(), StorageError> {
            Err(StorageError::Unavailable("quota exceeded".into()))
        }

        async fn get_record(
            &self,
            _key: &ProgressKey,
        ) -> Result<Option<ProgressRecord>, StorageError> {
            Err(StorageError::Unavailable("quota exceeded".into()))
        }

        async fn scan_records(
            &self,
            _filter: &RecordFilter,
        ) -> Result<Vec<ProgressRecord>, StorageError> {
            Err(StorageError::Unavailable("quota exceeded".into()))
        }
    }

    #[tokio::test]
    async fn unavailable_store_is_not_reported_as_empty() {
        let service = ProgressService::new(Arc::new(ClosedRepository));
        let err = service.get_progress("GK", "Dance").await.unwrap_err();
        assert!(err.is_unavailable());
        let err = service.get_all_for_subject("GK").await.unwrap_err();
        assert!(err.is_unavailable());
    }

    /// Store whose records cannot be decoded until they are rewritten.
    #[derive(Default)]
    struct CorruptRepository {
        writes: std::sync::Mutex<Vec<ProgressRecord>>,
    }

    #[async_trait]
    impl ProgressRepository for CorruptRepository {
        async fn put_record(&self, record: &ProgressRecord) -> Result<(), StorageError> {
            self.writes.lock().unwrap().push(record.clone());
            Ok(())
        }

        async fn get_record(
            &self,
            key: &ProgressKey,
        ) -> Result<Option<ProgressRecord>, StorageError> {
            let writes = self.writes.lock().unwrap();
            match writes.iter().rev().find(|r| r.key() == key) {
                Some(record) => Ok(Some(record.clone())),
                None => Err(StorageError::MalformedRecord {
                    id: key.encode(),
                    reason: "favourites missing".into(),
                }),
            }
        }

        async fn scan_records(
            &self,
            _filter: &RecordFilter,
        ) -> Result<Vec<ProgressRecord>, StorageError> {
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn malformed_record_reads_as_empty() {
        let service = ProgressService::new(Arc::new(CorruptRepository::default()));
        let progress = service.get_progress("GK", "Dance").await.unwrap();
        assert_eq!(progress, ChapterProgress::default());

        let progress = service
            .set_favourite("GK", "Dance", ProblemId::from(1), true)
            .await
            .unwrap();
        assert_eq!(progress, ChapterProgress::new([], ids(&[1])));
    }

    #[tokio::test]
    async fn no_op_toggle_rewrites_a_malformed_record() {
        let repo = Arc::new(CorruptRepository::default());
        let service = ProgressService::new(repo.clone());

        service
            .set_problem_completed("GK", "Dance", ProblemId::from(1), false)
            .await
            .unwrap();
        assert_eq!(repo.writes.lock().unwrap().len(), 1);

        // Now well-formed, so a second no-op is not written.
        service
            .set_problem_completed("GK", "Dance", ProblemId::from(1), false)
            .await
            .unwrap();
        assert_eq!(repo.writes.lock().unwrap().len(), 1);
        assert_eq!(
            service.get_progress("GK", "Dance").await.unwrap(),
            ChapterProgress::default()
        );
    }
}
