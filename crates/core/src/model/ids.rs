use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Separator between subject and chapter in an encoded progress key.
pub const KEY_SEPARATOR: char = '-';

/// Identifier of a single problem inside a chapter's question bank.
///
/// Question banks use bare integers or strings. The two are never equal to each
/// other, so `1` and `"1"` name different problems.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ProblemId {
    Number(i64),
    Text(String),
}

impl ProblemId {
    /// Parse user input, preferring the numeric form.
    #[must_use]
    pub fn parse_lenient(raw: &str) -> Self {
        match raw.trim().parse::<i64>() {
            Ok(n) => Self::Number(n),
            Err(_) => Self::Text(raw.to_owned()),
        }
    }
}

impl From<i64> for ProblemId {
    fn from(value: i64) -> Self {
        Self::Number(value)
    }
}

impl From<&str> for ProblemId {
    fn from(value: &str) -> Self {
        Self::Text(value.to_owned())
    }
}

impl From<String> for ProblemId {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl fmt::Debug for ProblemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "ProblemId({n})"),
            Self::Text(s) => write!(f, "ProblemId({s:?})"),
        }
    }
}

impl fmt::Display for ProblemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

//
// ─── PROGRESS KEY ──────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ProgressKeyError {
    #[error("subject cannot be empty")]
    EmptySubject,

    #[error("chapter cannot be empty")]
    EmptyChapter,

    #[error("subject {0:?} contains the key separator '-'")]
    SubjectContainsSeparator(String),

    #[error("progress id {0:?} has no subject separator")]
    MissingSeparator(String),

    #[error("progress id {id:?} does not match its subject and chapter ({expected:?})")]
    IdMismatch { id: String, expected: String },
}

/// Composite (subject, chapter) key for a progress record.
///
/// The subject may not contain [`KEY_SEPARATOR`], so the first separator in an
/// encoded id always splits subject from chapter and `encode` is injective.
/// Chapter titles are kept verbatim, spaces included.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProgressKey {
    subject: String,
    chapter: String,
}

impl ProgressKey {
    /// Build a key from a subject code and a chapter title.
    ///
    /// # Errors
    ///
    /// Returns `ProgressKeyError` if either part is empty or the subject contains
    /// the separator.
    pub fn new(
        subject: impl Into<String>,
        chapter: impl Into<String>,
    ) -> Result<Self, ProgressKeyError> {
        let subject = subject.into();
        let chapter = chapter.into();
        validate_subject(&subject)?;
        if chapter.is_empty() {
            return Err(ProgressKeyError::EmptyChapter);
        }
        Ok(Self { subject, chapter })
    }

    /// Decode an id produced by [`ProgressKey::encode`].
    ///
    /// # Errors
    ///
    /// Returns `ProgressKeyError` if the id has no separator or an empty part.
    pub fn parse(id: &str) -> Result<Self, ProgressKeyError> {
        let (subject, chapter) = id
            .split_once(KEY_SEPARATOR)
            .ok_or_else(|| ProgressKeyError::MissingSeparator(id.to_owned()))?;
        Self::new(subject, chapter)
    }

    /// The persisted record id: `subject-chapter`.
    #[must_use]
    pub fn encode(&self) -> String {
        format!("{}{KEY_SEPARATOR}{}", self.subject, self.chapter)
    }

    #[must_use]
    pub fn subject(&self) -> &str {
        &self.subject
    }

    #[must_use]
    pub fn chapter(&self) -> &str {
        &self.chapter
    }
}

/// Check that a subject code can be used as the leading part of a key.
///
/// # Errors
///
/// Returns `ProgressKeyError` if the subject is empty or contains the separator.
pub fn validate_subject(subject: &str) -> Result<(), ProgressKeyError> {
    if subject.is_empty() {
        return Err(ProgressKeyError::EmptySubject);
    }
    if subject.contains(KEY_SEPARATOR) {
        return Err(ProgressKeyError::SubjectContainsSeparator(subject.to_owned()));
    }
    Ok(())
}

impl fmt::Display for ProgressKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

impl FromStr for ProgressKey {
    type Err = ProgressKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

// ─── Tests ─────────────────────────────────────────────────────────────────────
