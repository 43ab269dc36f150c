//! Core data models used throughout Lectern.
//!
//! These types represent the courses, lessons, chunks, and search results
//! that flow through the ingestion and retrieval pipeline.

use serde::Serialize;

/// A parsed course: the unit of ingestion and catalog identity.
///
/// Identity is the title; re-ingesting a title replaces the prior course
/// and all of its chunks.
#[derive(Debug, Clone)]
pub struct Course {
    pub title: String,
    pub link: Option<String>,
    pub instructor: Option<String>,
    /// Ordered by appearance in the source document.
    pub lessons: Vec<Lesson>,
}

/// One lesson within a course. Body text is consumed by chunking during
/// parsing and is not retained here.
#[derive(Debug, Clone)]
pub struct Lesson {
    /// Unique within the course; need not be contiguous.
    pub number: i64,
    pub title: String,
    pub link: Option<String>,
}

/// A bounded slice of lesson text: the unit of retrieval.
#[derive(Debug, Clone)]
pub struct Chunk {
    /// Deterministic id derived from provenance and text.
    pub id: String,
    pub course_title: String,
    pub lesson_number: i64,
    /// Position within the lesson's chunk stream, starting at 0.
    pub chunk_index: i64,
    pub text: String,
}

/// Catalog row returned by exact course listings.
#[derive(Debug, Clone, Serialize)]
pub struct CourseSummary {
    pub title: String,
    pub link: Option<String>,
    pub instructor: Option<String>,
    pub lesson_count: i64,
}

/// Lesson row within a [`CourseOutline`].
#[derive(Debug, Clone, Serialize)]
pub struct OutlineLesson {
    pub number: i64,
    pub title: String,
    pub link: Option<String>,
}

/// Full outline of one course: metadata plus its ordered lesson list.
#[derive(Debug, Clone, Serialize)]
pub struct CourseOutline {
    pub title: String,
    pub link: Option<String>,
    pub instructor: Option<String>,
    pub lessons: Vec<OutlineLesson>,
}

/// A scored content hit returned by the content index.
#[derive(Debug, Clone)]
pub struct SearchHit {
    pub course_title: String,
    pub lesson_number: i64,
    pub chunk_index: i64,
    pub text: String,
    pub score: f64,
}

/// Provenance of evidence a tool touched, cited alongside the final answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Source {
    pub course_title: String,
    pub lesson_number: Option<i64>,
}

impl Source {
    pub fn course(title: impl Into<String>) -> Self {
        Self {
            course_title: title.into(),
            lesson_number: None,
        }
    }

    pub fn lesson(title: impl Into<String>, number: i64) -> Self {
        Self {
            course_title: title.into(),
            lesson_number: Some(number),
        }
    }
}

impl std::fmt::Display for Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.lesson_number {
            Some(n) => write!(f, "{} - Lesson {}", self.course_title, n),
            None => write!(f, "{}", self.course_title),
        }
    }
}
