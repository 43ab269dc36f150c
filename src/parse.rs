//! Course document parser.
//!
//! A course document is plain text with a small metadata header followed by
//! lesson sections:
//!
//! ```text
//! Title: Introduction to Rust
//! Link: https://example.com/rust
//! Instructor: Ada Lovelace
//!
//! Lesson 1: Getting Started
//! Link: https://example.com/rust/lesson-1
//! Body text for lesson one...
//!
//! Lesson 2: Ownership
//! Body text for lesson two...
//! ```
//!
//! The header is read line by line from the top: `Title:`, `Link:`, and
//! `Instructor:` may appear in any order, each at most once, and the first
//! line matching none of them ends the header. Only the title is required.
//!
//! Lesson sections open with a `Lesson <number>: <title>` line. A `Link:`
//! line directly under the header becomes the lesson link and is excluded
//! from the body. Everything else up to the next lesson header is body text,
//! which is chunked on the spot. Text before the first lesson header is
//! ignored, and a document with no lesson sections still yields a valid
//! catalog-only course.

use crate::chunk::{chunk_text, make_chunk};
use crate::config::ChunkingConfig;
use crate::error::DocumentError;
use crate::models::{Chunk, Course, Lesson};

/// A fully parsed document: course metadata plus its chunked content,
/// ready for the store.
#[derive(Debug)]
pub struct ParsedDocument {
    pub course: Course,
    pub chunks: Vec<Chunk>,
}

/// Parse a raw course document into a course and its chunks.
pub fn parse_document(
    raw: &str,
    chunking: &ChunkingConfig,
) -> Result<ParsedDocument, DocumentError> {
    let mut lines = raw.lines().peekable();

    let mut title: Option<String> = None;
    let mut link: Option<String> = None;
    let mut instructor: Option<String> = None;

    // Header: consume matching lines until one breaks the pattern.
    while let Some(line) = lines.peek() {
        let trimmed = line.trim();
        let consumed = if let Some(value) = trimmed.strip_prefix("Title:") {
            match title {
                Some(_) => false,
                None => {
                    title = Some(value.trim().to_string());
                    true
                }
            }
        } else if let Some(value) = trimmed.strip_prefix("Link:") {
            match link {
                Some(_) => false,
                None => {
                    link = Some(value.trim().to_string());
                    true
                }
            }
        } else if let Some(value) = trimmed.strip_prefix("Instructor:") {
            match instructor {
                Some(_) => false,
                None => {
                    instructor = Some(value.trim().to_string());
                    true
                }
            }
        } else {
            false
        };

        if !consumed {
            break;
        }
        lines.next();
    }

    let course_title = match title {
        Some(t) if !t.is_empty() => t,
        _ => {
            return Err(DocumentError::Malformed(
                "missing or empty Title: header line".to_string(),
            ))
        }
    };

    let mut lessons: Vec<Lesson> = Vec::new();
    let mut chunks: Vec<Chunk> = Vec::new();

    // Body text of the lesson currently being collected, if any.
    let mut current: Option<LessonSection> = None;

    for line in lines {
        if let Some((number, lesson_title)) = parse_lesson_header(line) {
            if let Some(section) = current.take() {
                section.finish(&course_title, chunking, &mut lessons, &mut chunks);
            }
            if lessons.iter().any(|l| l.number == number) {
                return Err(DocumentError::DuplicateLesson {
                    number,
                    course: course_title.clone(),
                });
            }
            current = Some(LessonSection::new(number, lesson_title));
            continue;
        }

        match current.as_mut() {
            Some(section) => section.push_line(line),
            // Preamble before the first lesson header carries no content.
            None => {}
        }
    }

    if let Some(section) = current.take() {
        section.finish(&course_title, chunking, &mut lessons, &mut chunks);
    }

    Ok(ParsedDocument {
        course: Course {
            title: course_title,
            link: none_if_empty(link),
            instructor: none_if_empty(instructor),
            lessons,
        },
        chunks,
    })
}

/// Match a `Lesson <number>: <title>` line. The number must be a plain
/// run of digits.
fn parse_lesson_header(line: &str) -> Option<(i64, String)> {
    let rest = line.trim().strip_prefix("Lesson ")?;
    let colon = rest.find(':')?;
    let number_part = rest[..colon].trim();
    if number_part.is_empty() || !number_part.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let number: i64 = number_part.parse().ok()?;
    let title = rest[colon + 1..].trim().to_string();
    Some((number, title))
}

fn none_if_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

/// One lesson section mid-parse: header fields plus accumulated body lines.
struct LessonSection {
    number: i64,
    title: String,
    link: Option<String>,
    body: Vec<String>,
    /// True only for the line immediately after the header, where a
    /// `Link:` line is metadata rather than body.
    link_slot_open: bool,
}

impl LessonSection {
    fn new(number: i64, title: String) -> Self {
        Self {
            number,
            title,
            link: None,
            body: Vec::new(),
            link_slot_open: true,
        }
    }

    fn push_line(&mut self, line: &str) {
        if self.link_slot_open {
            self.link_slot_open = false;
            if let Some(value) = line.trim().strip_prefix("Link:") {
                let value = value.trim();
                if !value.is_empty() {
                    self.link = Some(value.to_string());
                }
                return;
            }
        }
        self.body.push(line.to_string());
    }

    fn finish(
        self,
        course_title: &str,
        chunking: &ChunkingConfig,
        lessons: &mut Vec<Lesson>,
        chunks: &mut Vec<Chunk>,
    ) {
        let body = self.body.join("\n");
        let body = body.trim();

        for (index, text) in chunk_text(body, chunking.chunk_size, chunking.chunk_overlap)
            .into_iter()
            .enumerate()
        {
            chunks.push(make_chunk(course_title, self.number, index as i64, text));
        }

        lessons.push(Lesson {
            number: self.number,
            title: self.title,
            link: self.link,
        });
    }
}
