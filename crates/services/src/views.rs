//! Read-only views combining stored progress with a static question bank.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;
use study_core::model::{
    ChapterBank, ChapterProgress, ProblemId, ProgressField, ProgressRecord, Question,
    QuestionBank,
};

/// Completion of one chapter, counted over its distinct questions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChapterCompletion {
    pub chapter: String,
    pub completed: usize,
    pub total: usize,
}

impl ChapterCompletion {
    /// Share of questions completed, `0.0` for an empty chapter.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn percent(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        self.completed as f64 / self.total as f64 * 100.0
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.total > 0 && self.completed == self.total
    }
}

/// Count completed questions of `chapter`.
///
/// Stored ids that no longer exist in the bank are ignored.
#[must_use]
pub fn chapter_completion(chapter: &ChapterBank, progress: &ChapterProgress) -> ChapterCompletion {
    let questions = chapter.unique_questions();
    let completed = questions
        .iter()
        .filter(|q| progress.contains(ProgressField::Completed, &q.id))
        .count();
    ChapterCompletion {
        chapter: chapter.title.clone(),
        completed,
        total: questions.len(),
    }
}

/// Completion for every chapter of `bank`, in bank order.
#[must_use]
pub fn subject_completion(bank: &QuestionBank, records: &[ProgressRecord]) -> Vec<ChapterCompletion> {
    let empty = ChapterProgress::default();
    bank.chapters
        .iter()
        .map(|chapter| {
            let progress = records
                .iter()
                .find(|r| r.subject() == bank.subject && r.chapter() == chapter.title)
                .map_or(&empty, ProgressRecord::progress);
            chapter_completion(chapter, progress)
        })
        .collect()
}

/// Favourite ids per chapter, straight from the stored records.
#[must_use]
pub fn favourites_by_chapter(records: &[ProgressRecord]) -> BTreeMap<String, BTreeSet<ProblemId>> {
    records
        .iter()
        .filter(|r| !r.progress().favourites.is_empty())
        .map(|r| (r.chapter().to_owned(), r.progress().favourites.clone()))
        .collect()
}

/// Starred questions of one chapter, resolved against the bank.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RevisionChapter<'a> {
    pub chapter: &'a str,
    pub questions: Vec<&'a Question>,
}

/// Starred questions across the bank, in bank order. Chapters without any
/// favourite are left out, as are favourites of chapters the bank does not list.
#[must_use]
pub fn revision_set<'a>(bank: &'a QuestionBank, records: &[ProgressRecord]) -> Vec<RevisionChapter<'a>> {
    let favourites: BTreeMap<&str, &BTreeSet<ProblemId>> = records
        .iter()
        .filter(|r| r.subject() == bank.subject)
        .map(|r| (r.chapter(), &r.progress().favourites))
        .collect();

    bank.chapters
        .iter()
        .filter_map(|chapter| {
            let starred = favourites.get(chapter.title.as_str())?;
            let questions: Vec<&Question> = chapter
                .unique_questions()
                .into_iter()
                .filter(|q| starred.contains(&q.id))
                .collect();
            (!questions.is_empty()).then_some(RevisionChapter {
                chapter: &chapter.title,
                questions,
            })
        })
        .collect()
}
