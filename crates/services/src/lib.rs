#![forbid(unsafe_code)]

pub mod app_services;
pub mod error;
mod keyed_lock;
pub mod progress_service;
pub mod views;

pub use app_services::{AppServices, load_question_bank};
pub use error::{AppServicesError, ProgressServiceError};
pub use progress_service::ProgressService;
pub use views::{ChapterCompletion, RevisionChapter};
