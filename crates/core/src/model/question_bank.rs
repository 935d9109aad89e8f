//! Static question banks shipped with the portal.
//!
//! Bank files are JSON documents of the form
//!
//! ```json
//! {
//!   "chapters": [{ "id": 1, "title": "Indian Dance" }],
//!   "Indian_Dance": [
//!     { "Notes": "..." },
//!     {
//!       "Questions": [
//!         { "id": 1, "question": { "type": "text", "content": "..." }, "status": "Easy" }
//!       ]
//!     }
//!   ]
//! }
//! ```
//!
//! A chapter's dataset is looked up under its exact title first, then under the
//! title with whitespace replaced by `_`. Its questions live in the second section.
//! Progress only ever stores question ids; nothing here is validated beyond what
//! is needed to read those ids.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::warn;

use crate::model::ids::ProblemId;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum QuestionBankError {
    #[error("question bank is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("question bank has no `chapters` list")]
    MissingChapters,

    #[error("chapter dataset for {chapter:?} is malformed: {reason}")]
    MalformedChapter { chapter: String, reason: String },
}

/// How a question body is rendered. Anything other than `text` is an image URL.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    #[default]
    Text,
    #[serde(other)]
    Image,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionContent {
    #[serde(rename = "type", default)]
    pub kind: ContentKind,
    #[serde(default)]
    pub content: String,
}

/// One quiz question. Content is opaque to progress tracking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    pub id: ProblemId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub question: Option<QuestionContent>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

impl Question {
    /// The text body or image URL, empty when the question has no body.
    #[must_use]
    pub fn label(&self) -> &str {
        self.question.as_ref().map_or("", |q| q.content.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChapterBank {
    pub title: String,
    pub questions: Vec<Question>,
}

impl ChapterBank {
    /// Questions with duplicate ids removed, first occurrence wins.
    #[must_use]
    pub fn unique_questions(&self) -> Vec<&Question> {
        let mut seen = HashSet::new();
        self.questions
            .iter()
            .filter(|&q| seen.insert(&q.id))
            .collect()
    }

    #[must_use]
    pub fn question(&self, id: &ProblemId) -> Option<&Question> {
        self.questions.iter().find(|q| &q.id == id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuestionBank {
    pub subject: String,
    pub chapters: Vec<ChapterBank>,
}

#[derive(Deserialize)]
struct ChapterEntry {
    title: String,
}

impl QuestionBank {
    /// Parse a bank file for `subject`.
    ///
    /// Chapters listed without a dataset are kept with no questions.
    ///
    /// # Errors
    ///
    /// Returns `QuestionBankError` if the document is not JSON, lacks the chapter
    /// list, or a dataset has an unreadable `Questions` array.
    /// A dataset with fewer than two sections has no questions.
    pub fn from_json_str(subject: impl Into<String>, json: &str) -> Result<Self, QuestionBankError> {
        let root: Value = serde_json::from_str(json)?;
        let entries = root
            .get("chapters")
            .cloned()
            .ok_or(QuestionBankError::MissingChapters)?;
        let entries: Vec<ChapterEntry> = serde_json::from_value(entries)?;

        let mut chapters = Vec::with_capacity(entries.len());
        for entry in entries {
            let questions = match chapter_dataset(&root, &entry.title) {
                Some(dataset) => questions_from_dataset(&entry.title, dataset)?,
                None => {
                    warn!(chapter = %entry.title, "no dataset for chapter");
                    Vec::new()
                }
            };
            chapters.push(ChapterBank {
                title: entry.title,
                questions,
            });
        }

        Ok(Self {
            subject: subject.into(),
            chapters,
        })
    }

    #[must_use]
    pub fn chapter(&self, title: &str) -> Option<&ChapterBank> {
        self.chapters.iter().find(|c| c.title == title)
    }
}

fn chapter_dataset<'a>(root: &'a Value, title: &str) -> Option<&'a Value> {
    root.get(title).or_else(|| {
        let underscored: String = title
            .chars()
            .map(|c| if c.is_whitespace() { '_' } else { c })
            .collect();
        root.get(underscored.as_str())
    })
}

fn questions_from_dataset(title: &str, dataset: &Value) -> Result<Vec<Question>, QuestionBankError> {
    let sections = dataset
        .as_array()
        .ok_or_else(|| QuestionBankError::MalformedChapter {
            chapter: title.to_owned(),
            reason: "dataset is not an array".into(),
        })?;

    // Section 0 carries notes; questions are only ever read from section 1.
    let Some(list) = sections.get(1).and_then(|section| section.get("Questions")) else {
        return Ok(Vec::new());
    };
    Vec::<Question>::deserialize(list).map_err(|err| QuestionBankError::MalformedChapter {
        chapter: title.to_owned(),
        reason: err.to_string(),
    })
}
