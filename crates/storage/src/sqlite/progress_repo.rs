use async_trait::async_trait;
use study_core::model::{ProgressKey, ProgressRecord};
use tracing::{debug, warn};

use super::mapping::{encode_set, map_progress_row};
use super::{SqliteRepository, query_error};
use crate::repository::{ProgressRepository, RecordFilter, StorageError};

const SELECT_ALL: &str = r"
    SELECT id, subject, chapter, completed_problems, favourites
    FROM progress
";

const SELECT_BY_ID: &str = r"
    SELECT id, subject, chapter, completed_problems, favourites
    FROM progress
    WHERE id = ?1
";

const SELECT_BY_SUBJECT: &str = r"
    SELECT id, subject, chapter, completed_problems, favourites
    FROM progress
    WHERE subject = ?1
";

const SELECT_BY_CHAPTER: &str = r"
    SELECT id, subject, chapter, completed_problems, favourites
    FROM progress
    WHERE chapter = ?1
";

#[async_trait]
impl ProgressRepository for SqliteRepository {
    async fn put_record(&self, record: &ProgressRecord) -> Result<(), StorageError> {
        self.ensure_schema().await?;
        let progress = record.progress();
        let completed = encode_set(&progress.completed_problems)?;
        let favourites = encode_set(&progress.favourites)?;

        // Single statement: either the new row lands or the old one stays.
        sqlx::query(
            r"
            INSERT INTO progress (id, subject, chapter, completed_problems, favourites)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT(id) DO UPDATE SET
                subject = excluded.subject,
                chapter = excluded.chapter,
                completed_problems = excluded.completed_problems,
                favourites = excluded.favourites
            ",
        )
        .bind(record.id())
        .bind(record.subject())
        .bind(record.chapter())
        .bind(completed)
        .bind(favourites)
        .execute(&self.pool)
        .await
        .map_err(query_error)?;

        debug!(id = %record.id(), "stored progress record");
        Ok(())
    }

    async fn get_record(&self, key: &ProgressKey) -> Result<Option<ProgressRecord>, StorageError> {
        self.ensure_schema().await?;
        let row = sqlx::query(SELECT_BY_ID)
            .bind(key.encode())
            .fetch_optional(&self.pool)
            .await
            .map_err(query_error)?;

        match row {
            Some(row) => map_progress_row(&row).map(Some),
            None => Ok(None),
        }
    }

    async fn scan_records(&self, filter: &RecordFilter) -> Result<Vec<ProgressRecord>, StorageError> {
        self.ensure_schema().await?;
        let query = match filter {
            RecordFilter::All => sqlx::query(SELECT_ALL),
            RecordFilter::Subject(subject) => sqlx::query(SELECT_BY_SUBJECT).bind(subject.as_str()),
            RecordFilter::Chapter(chapter) => sqlx::query(SELECT_BY_CHAPTER).bind(chapter.as_str()),
        };
        let rows = query.fetch_all(&self.pool).await.map_err(query_error)?;

        let mut records = Vec::with_capacity(rows.len());
        for row in rows {
            match map_progress_row(&row) {
                Ok(record) if filter.matches(&record) => records.push(record),
                Ok(_) => {}
                Err(StorageError::MalformedRecord { id, reason }) => {
                    warn!(%id, %reason, "skipping malformed progress record");
                }
                Err(err) => return Err(err),
            }
        }
        Ok(records)
    }
}
