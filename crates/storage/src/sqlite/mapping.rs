use std::collections::BTreeSet;

use sqlx::Row;
use sqlx::sqlite::SqliteRow;
use study_core::model::{ChapterProgress, ProblemId, ProgressKey, ProgressRecord};

use crate::repository::StorageError;

fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

fn malformed<E: core::fmt::Display>(id: &str) -> impl FnOnce(E) -> StorageError + '_ {
    move |e| StorageError::MalformedRecord {
        id: id.to_owned(),
        reason: e.to_string(),
    }
}

pub(crate) fn encode_set(set: &BTreeSet<ProblemId>) -> Result<String, StorageError> {
    serde_json::to_string(set).map_err(ser)
}

fn decode_set(id: &str, field: &str, raw: Option<String>) -> Result<BTreeSet<ProblemId>, StorageError> {
    let raw = raw.ok_or_else(|| StorageError::MalformedRecord {
        id: id.to_owned(),
        reason: format!("missing {field}"),
    })?;
    serde_json::from_str(&raw).map_err(malformed(id))
}

/// Decode a `progress` row.
///
/// Rows whose id does not match `subject-chapter`, or whose sets are not JSON
/// arrays of ids, come back as `StorageError::MalformedRecord`.
pub(crate) fn map_progress_row(row: &SqliteRow) -> Result<ProgressRecord, StorageError> {
    let id: String = row.try_get("id").map_err(ser)?;
    let subject: Option<String> = row.try_get("subject").map_err(malformed(&id))?;
    let chapter: Option<String> = row.try_get("chapter").map_err(malformed(&id))?;
    let (Some(subject), Some(chapter)) = (subject, chapter) else {
        return Err(StorageError::MalformedRecord {
            id,
            reason: "missing subject or chapter".into(),
        });
    };

    let key = ProgressKey::new(subject, chapter).map_err(malformed(&id))?;
    if key.encode() != id {
        return Err(StorageError::MalformedRecord {
            reason: format!("id does not match {:?}", key.encode()),
            id,
        });
    }

    let completed = decode_set(
        &id,
        "completed_problems",
        row.try_get("completed_problems").map_err(malformed(&id))?,
    )?;
    let favourites = decode_set(
        &id,
        "favourites",
        row.try_get("favourites").map_err(malformed(&id))?,
    )?;

    Ok(ProgressRecord::new(
        key,
        ChapterProgress {
            completed_problems: completed,
            favourites,
        },
    ))
}
