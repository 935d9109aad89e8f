use std::path::Path;
use std::sync::Arc;

use storage::repository::Storage;
use study_core::model::QuestionBank;

use crate::error::AppServicesError;
use crate::progress_service::ProgressService;

/// Assembles app-facing services over one storage backend.
#[derive(Clone)]
pub struct AppServices {
    progress: Arc<ProgressService>,
}

impl AppServices {
    /// Build services backed by `SQLite` storage.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError` if the database cannot be opened or migrated.
    pub async fn new_sqlite(db_url: &str) -> Result<Self, AppServicesError> {
        let storage = Storage::sqlite(db_url).await?;
        Ok(Self::from_storage(&storage))
    }

    /// Build services over volatile in-memory storage.
    #[must_use]
    pub fn in_memory() -> Self {
        Self::from_storage(&Storage::in_memory())
    }

    #[must_use]
    pub fn from_storage(storage: &Storage) -> Self {
        Self {
            progress: Arc::new(ProgressService::new(Arc::clone(&storage.progress))),
        }
    }

    #[must_use]
    pub fn progress(&self) -> Arc<ProgressService> {
        Arc::clone(&self.progress)
    }
}

/// Read a question bank file for `subject`.
///
/// # Errors
///
/// Returns `AppServicesError::BankIo` if the file cannot be read and
/// `AppServicesError::QuestionBank` if its contents cannot be parsed.
pub fn load_question_bank(
    subject: &str,
    path: impl AsRef<Path>,
) -> Result<QuestionBank, AppServicesError> {
    let path = path.as_ref();
    let json = std::fs::read_to_string(path).map_err(|source| AppServicesError::BankIo {
        path: path.display().to_string(),
        source,
    })?;
    Ok(QuestionBank::from_json_str(subject, &json)?)
}
