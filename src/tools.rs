//! The retrieval tools exposed to the chat model.
//!
//! Exactly three tools exist, modeled as one closed enum rather than a
//! dynamic registry, so adding a tool is a compile-time change and the
//! orchestrator can never be handed a tool it does not know:
//!
//! | Tool | Arguments | Purpose |
//! |------|-----------|---------|
//! | `get_courses` | — | list the catalog |
//! | `get_lessons` | `course_name` | outline one course (fuzzy name) |
//! | `get_lesson_content` | `query`, `course_name?`, `lesson_number?` | search chunk content |
//!
//! Tool results are plain text for the model to read. Alongside the text,
//! every execution records the provenance it touched into a [`SourceLog`]
//! so the final answer can cite what the tools actually saw, in the order
//! they saw it.

use anyhow::{bail, Result};
use serde_json::{json, Value};

use crate::models::Source;
use crate::store::CourseStore;

/// One validated tool invocation.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolRequest {
    /// List every course in the catalog.
    GetCourses,
    /// Outline one course; the name may be partial or approximate.
    GetLessons { course_name: String },
    /// Search lesson content, optionally scoped to a course and lesson.
    GetLessonContent {
        query: String,
        course_name: Option<String>,
        lesson_number: Option<i64>,
    },
}

impl ToolRequest {
    /// Validate a named tool call against the closed tool set.
    pub fn parse(name: &str, arguments: &Value) -> Result<Self> {
        match name {
            "get_courses" => Ok(ToolRequest::GetCourses),
            "get_lessons" => {
                let course_name = arguments
                    .get("course_name")
                    .and_then(|v| v.as_str())
                    .ok_or_else(|| anyhow::anyhow!("get_lessons requires a course_name argument"))?;
                Ok(ToolRequest::GetLessons {
                    course_name: course_name.to_string(),
                })
            }
            "get_lesson_content" => {
                let query = arguments
                    .get("query")
                    .and_then(|v| v.as_str())
                    .ok_or_else(|| {
                        anyhow::anyhow!("get_lesson_content requires a query argument")
                    })?;
                let course_name = arguments
                    .get("course_name")
                    .and_then(|v| v.as_str())
                    .map(str::to_string);
                let lesson_number = arguments.get("lesson_number").and_then(|v| v.as_i64());
                Ok(ToolRequest::GetLessonContent {
                    query: query.to_string(),
                    course_name,
                    lesson_number,
                })
            }
            other => bail!("Unknown tool: {}", other),
        }
    }

    /// Run the tool against the store, appending touched provenance to
    /// `sources`. The returned string is the tool result text handed back
    /// to the model; "not found" outcomes are ordinary text, not errors.
    pub async fn execute(&self, store: &CourseStore, sources: &mut SourceLog) -> Result<String> {
        match self {
            ToolRequest::GetCourses => {
                let courses = store.list_courses().await?;
                if courses.is_empty() {
                    return Ok("No courses available.".to_string());
                }
                let mut out = format!("Available courses ({}):\n", courses.len());
                for course in &courses {
                    sources.push_unique(Source::course(&course.title));
                    out.push_str(&format!(
                        "  - {} ({} lessons)\n",
                        course.title, course.lesson_count
                    ));
                }
                Ok(out.trim_end().to_string())
            }

            ToolRequest::GetLessons { course_name } => {
                let resolved = match store.resolve_course_name(course_name).await? {
                    Some(title) => title,
                    None => return Ok(format!("No course found matching '{}'", course_name)),
                };
                let outline = store.list_lessons(&resolved).await?;
                sources.push_unique(Source::course(&outline.title));

                let mut out = format!("Course: {}\n", outline.title);
                if let Some(link) = &outline.link {
                    out.push_str(&format!("Link: {}\n", link));
                }
                if let Some(instructor) = &outline.instructor {
                    out.push_str(&format!("Instructor: {}\n", instructor));
                }
                out.push_str("Lessons:\n");
                if outline.lessons.is_empty() {
                    out.push_str("  (no lessons)\n");
                }
                for lesson in &outline.lessons {
                    out.push_str(&format!("  Lesson {}: {}\n", lesson.number, lesson.title));
                }
                Ok(out.trim_end().to_string())
            }

            ToolRequest::GetLessonContent {
                query,
                course_name,
                lesson_number,
            } => {
                let mut resolved_title: Option<String> = None;
                if let Some(name) = course_name {
                    match store.resolve_course_name(name).await? {
                        Some(title) => resolved_title = Some(title),
                        None => return Ok(format!("No course found matching '{}'", name)),
                    }
                }

                let hits = store
                    .search_content(query, resolved_title.as_deref(), *lesson_number, None)
                    .await?;

                if hits.is_empty() {
                    // Echo the caller's filters, not the resolved title.
                    let mut filter_info = String::new();
                    if let Some(name) = course_name {
                        filter_info.push_str(&format!(" in course '{}'", name));
                    }
                    if let Some(n) = lesson_number {
                        filter_info.push_str(&format!(" in lesson {}", n));
                    }
                    return Ok(format!("No relevant content found{}.", filter_info));
                }

                let mut blocks = Vec::with_capacity(hits.len());
                for hit in &hits {
                    sources.push_unique(Source::lesson(&hit.course_title, hit.lesson_number));
                    blocks.push(format!(
                        "[{} - Lesson {}]\n{}",
                        hit.course_title, hit.lesson_number, hit.text
                    ));
                }
                Ok(blocks.join("\n\n"))
            }
        }
    }
}

/// Tool definitions in the function-calling wire format chat providers
/// expect.
pub fn schemas() -> Vec<Value> {
    vec![
        json!({
            "type": "function",
            "function": {
                "name": "get_courses",
                "description": "List all available courses with their titles and lesson counts.",
                "parameters": {
                    "type": "object",
                    "properties": {},
                    "required": []
                }
            }
        }),
        json!({
            "type": "function",
            "function": {
                "name": "get_lessons",
                "description": "Get the lesson outline of one course. Partial course names match.",
                "parameters": {
                    "type": "object",
                    "properties": {
                        "course_name": {
                            "type": "string",
                            "description": "Course title; partial names are resolved against the catalog"
                        }
                    },
                    "required": ["course_name"]
                }
            }
        }),
        json!({
            "type": "function",
            "function": {
                "name": "get_lesson_content",
                "description": "Search course materials for content relevant to a query, optionally limited to one course and lesson.",
                "parameters": {
                    "type": "object",
                    "properties": {
                        "query": {
                            "type": "string",
                            "description": "What to look for in lesson content"
                        },
                        "course_name": {
                            "type": "string",
                            "description": "Course title to search within; partial names are resolved"
                        },
                        "lesson_number": {
                            "type": "integer",
                            "description": "Lesson number to search within"
                        }
                    },
                    "required": ["query"]
                }
            }
        }),
    ]
}

/// Ordered, deduplicated log of the provenance tools touched while
/// answering one query.
#[derive(Debug, Default)]
pub struct SourceLog {
    entries: Vec<Source>,
}

impl SourceLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a source unless an identical one was already recorded.
    /// First-touch order is preserved.
    pub fn push_unique(&mut self, source: Source) {
        if !self.entries.contains(&source) {
            self.entries.push(source);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn into_sources(self) -> Vec<Source> {
        self.entries
    }
}
