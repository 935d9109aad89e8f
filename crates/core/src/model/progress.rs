use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::model::ids::{ProblemId, ProgressKey, ProgressKeyError};

//
// ─── FIELDS ────────────────────────────────────────────────────────────────────
//

/// Selects one of the two membership sets kept per chapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProgressField {
    Completed,
    Favourite,
}

impl ProgressField {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::Favourite => "favourite",
        }
    }
}

//
// ─── CHAPTER PROGRESS ──────────────────────────────────────────────────────────
//

/// Completion and favourite sets for one (subject, chapter).
///
/// `Default` is the empty-default returned for chapters never written.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChapterProgress {
    pub completed_problems: BTreeSet<ProblemId>,
    pub favourites: BTreeSet<ProblemId>,
}

impl ChapterProgress {
    #[must_use]
    pub fn new(
        completed_problems: impl IntoIterator<Item = ProblemId>,
        favourites: impl IntoIterator<Item = ProblemId>,
    ) -> Self {
        Self {
            completed_problems: completed_problems.into_iter().collect(),
            favourites: favourites.into_iter().collect(),
        }
    }

    #[must_use]
    pub fn set(&self, field: ProgressField) -> &BTreeSet<ProblemId> {
        match field {
            ProgressField::Completed => &self.completed_problems,
            ProgressField::Favourite => &self.favourites,
        }
    }

    pub fn set_mut(&mut self, field: ProgressField) -> &mut BTreeSet<ProblemId> {
        match field {
            ProgressField::Completed => &mut self.completed_problems,
            ProgressField::Favourite => &mut self.favourites,
        }
    }

    #[must_use]
    pub fn contains(&self, field: ProgressField, id: &ProblemId) -> bool {
        self.set(field).contains(id)
    }

    /// Add or remove `id` from the selected set.
    ///
    /// Returns `true` if the set changed.
    pub fn set_membership(&mut self, field: ProgressField, id: ProblemId, present: bool) -> bool {
        let set = self.set_mut(field);
        if present {
            set.insert(id)
        } else {
            set.remove(&id)
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.completed_problems.is_empty() && self.favourites.is_empty()
    }
}

//
// ─── RECORD ────────────────────────────────────────────────────────────────────
//

/// Durable progress for one (subject, chapter), keyed by `subject-chapter`.
///
/// Serializes to `{ id, subject, chapter, completedProblems, favourites }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RecordRepr", into = "RecordRepr")]
pub struct ProgressRecord {
    key: ProgressKey,
    progress: ChapterProgress,
}

impl ProgressRecord {
    #[must_use]
    pub fn new(key: ProgressKey, progress: ChapterProgress) -> Self {
        Self { key, progress }
    }

    #[must_use]
    pub fn id(&self) -> String {
        self.key.encode()
    }

    #[must_use]
    pub fn key(&self) -> &ProgressKey {
        &self.key
    }

    #[must_use]
    pub fn subject(&self) -> &str {
        self.key.subject()
    }

    #[must_use]
    pub fn chapter(&self) -> &str {
        self.key.chapter()
    }

    #[must_use]
    pub fn progress(&self) -> &ChapterProgress {
        &self.progress
    }

    #[must_use]
    pub fn into_progress(self) -> ChapterProgress {
        self.progress
    }
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RecordRepr {
    id: String,
    subject: String,
    chapter: String,
    completed_problems: BTreeSet<ProblemId>,
    favourites: BTreeSet<ProblemId>,
}

impl TryFrom<RecordRepr> for ProgressRecord {
    type Error = ProgressKeyError;

    fn try_from(repr: RecordRepr) -> Result<Self, Self::Error> {
        let key = ProgressKey::new(repr.subject, repr.chapter)?;
        let expected = key.encode();
        if expected != repr.id {
            return Err(ProgressKeyError::IdMismatch {
                id: repr.id,
                expected,
            });
        }
        Ok(Self {
            key,
            progress: ChapterProgress {
                completed_problems: repr.completed_problems,
                favourites: repr.favourites,
            },
        })
    }
}

impl From<ProgressRecord> for RecordRepr {
    fn from(record: ProgressRecord) -> Self {
        Self {
            id: record.key.encode(),
            subject: record.key.subject().to_owned(),
            chapter: record.key.chapter().to_owned(),
            completed_problems: record.progress.completed_problems,
            favourites: record.progress.favourites,
        }
    }
}
