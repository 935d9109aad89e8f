use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use study_core::model::{ProgressKey, ProgressRecord};
use thiserror::Error;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    /// The backing store cannot be opened or initialized.
    #[error("storage unavailable: {0}")]
    Unavailable(String),

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    /// A stored record exists but cannot be decoded.
    #[error("malformed record {id:?}: {reason}")]
    MalformedRecord { id: String, reason: String },
}

impl StorageError {
    #[must_use]
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}

/// Predicate for [`ProgressRepository::scan_records`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordFilter {
    All,
    Subject(String),
    Chapter(String),
}

impl RecordFilter {
    #[must_use]
    pub fn matches(&self, record: &ProgressRecord) -> bool {
        match self {
            Self::All => true,
            Self::Subject(subject) => record.subject() == subject,
            Self::Chapter(chapter) => record.chapter() == chapter,
        }
    }
}

/// Durable key-value table of progress records keyed by `subject-chapter`.
#[async_trait]
pub trait ProgressRepository: Send + Sync {
    /// Insert or fully replace the record at its id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the record cannot be stored. The previously
    /// stored record, if any, is left intact.
    async fn put_record(&self, record: &ProgressRecord) -> Result<(), StorageError>;

    /// Point lookup. Returns `Ok(None)` when nothing is stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::MalformedRecord` if the stored row cannot be decoded,
    /// or other storage errors.
    async fn get_record(&self, key: &ProgressKey) -> Result<Option<ProgressRecord>, StorageError>;

    /// All records matching `filter`, in no particular order.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the store cannot be read.
    async fn scan_records(&self, filter: &RecordFilter) -> Result<Vec<ProgressRecord>, StorageError>;
}

/// Simple in-memory repository implementation for testing and prototyping.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    records: Arc<Mutex<HashMap<String, ProgressRecord>>>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self {
            records: Arc::new(Mutex::new(HashMap::new())),
        }
    }
}

#[async_trait]
impl ProgressRepository for InMemoryRepository {
    async fn put_record(&self, record: &ProgressRecord) -> Result<(), StorageError> {
        let mut guard = self
            .records
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard.insert(record.id(), record.clone());
        Ok(())
    }

    async fn get_record(&self, key: &ProgressKey) -> Result<Option<ProgressRecord>, StorageError> {
        let guard = self
            .records
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(guard.get(&key.encode()).cloned())
    }

    async fn scan_records(&self, filter: &RecordFilter) -> Result<Vec<ProgressRecord>, StorageError> {
        let guard = self
            .records
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(guard
            .values()
            .filter(|record| filter.matches(record))
            .cloned()
            .collect())
    }
}

/// Repositories behind trait objects for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub progress: Arc<dyn ProgressRepository>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        let progress: Arc<dyn ProgressRepository> = Arc::new(InMemoryRepository::new());
        Self { progress }
    }
}
