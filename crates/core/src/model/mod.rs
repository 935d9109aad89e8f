mod ids;
mod progress;
pub mod question_bank;

pub use ids::{KEY_SEPARATOR, ProblemId, ProgressKey, ProgressKeyError, validate_subject};
pub use progress::{ChapterProgress, ProgressField, ProgressRecord};
pub use question_bank::{
    ChapterBank, ContentKind, Question, QuestionBank, QuestionBankError, QuestionContent,
};
