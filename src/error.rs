//! Error taxonomies for parsing and the dual-index store.
//!
//! Parsing failures abort a single document; store failures surface through
//! the tool layer as user-readable text rather than crashes. Everything else
//! in the crate uses `anyhow` at the command boundary.

use thiserror::Error;

/// Errors raised while parsing one raw course document.
#[derive(Debug, Error)]
pub enum DocumentError {
    /// The header block does not match the required
    /// `Title:` / `Link:` / `Instructor:` pattern.
    #[error("malformed document: {0}")]
    Malformed(String),

    /// The same lesson number appears twice within one course.
    #[error("duplicate lesson number {number} in course '{course}'")]
    DuplicateLesson { number: i64, course: String },
}

/// Errors raised by the dual-index store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// An exact catalog read referenced a title that is not indexed.
    #[error("course not found: '{0}'")]
    CourseNotFound(String),

    #[error("database error: {0}")]
    Db(#[from] sqlx::Error),

    #[error(transparent)]
    Embedding(#[from] anyhow::Error),
}
