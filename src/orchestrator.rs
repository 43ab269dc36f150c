//! The retrieval orchestrator: one user query in, one cited answer out.
//!
//! Drives the chat model through a bounded tool loop:
//!
//! ```text
//! AwaitingModel ──tool calls──▶ ExecutingTools
//!      ▲                             │
//!      └──────── results ────────────┘
//!      │
//!      └──plain answer / budget spent──▶ Done
//! ```
//!
//! Tools are offered only while the round budget (`chat.max_rounds`) has
//! room; once it is spent the model is called one last time *without*
//! tools, so it must answer from what the tools already returned. A round
//! means one batch of tool executions, however many calls it contained.
//!
//! Failures inside a round never abort the loop: a failing tool call
//! becomes error text in that tool's result slot and the other calls of
//! the round still run. Only chat transport errors propagate to the
//! caller.
//!
//! The final answer text is paired with the sources every executed tool
//! touched, in first-touch order, and the exchange is recorded into the
//! session before returning.

use anyhow::Result;

use crate::chat::{ChatMessage, ChatProvider, ChatRequest, ToolCallRequest};
use crate::config::ChatConfig;
use crate::models::Source;
use crate::session::SessionStore;
use crate::store::CourseStore;
use crate::tools::{self, SourceLog, ToolRequest};

/// Instructions the model answers under. Kept tool-agnostic about
/// internals: the model sees tool names and when to reach for them.
const SYSTEM_PROMPT: &str = "\
You are an assistant for questions about course materials.

You can call three tools:
- get_courses: list every available course.
- get_lessons: show the lesson outline of one course. Partial course names are fine.
- get_lesson_content: search lesson content for a query, optionally limited to one course and lesson.

Tool usage:
- Use get_lesson_content for questions about specific course content.
- Use get_lessons for questions about what a course covers.
- Answer general knowledge questions directly, without tools.
- If a tool reports that nothing was found, say so plainly instead of guessing.

Responses must be brief, educational, and clear. Answer the question directly,
with no commentary about tools or searching.";

const QUERY_PREFIX: &str = "Answer this question about course materials: ";

/// Returned when the model yields no usable text on its final call.
const FALLBACK_ANSWER: &str =
    "I could not produce an answer for this question. Please try rephrasing it.";

/// A finished answer with the provenance behind it.
#[derive(Debug)]
pub struct Answer {
    pub text: String,
    pub sources: Vec<Source>,
}

enum LoopState {
    /// Waiting on the model's next reply.
    AwaitingModel,
    /// The model asked for these tool executions.
    ExecutingTools(Vec<ToolCallRequest>),
    /// The model produced its final content (possibly empty).
    Done(Option<String>),
}

/// Answer one user query within a session.
///
/// Session history is replayed into the transcript first, then the query
/// itself, wrapped in a course-materials framing. The recorded exchange
/// stores the raw query, not the wrapped one.
pub async fn answer(
    store: &CourseStore,
    chat: &dyn ChatProvider,
    sessions: &SessionStore,
    config: &ChatConfig,
    session_id: &str,
    user_query: &str,
) -> Result<Answer> {
    let mut messages: Vec<ChatMessage> = Vec::new();
    for exchange in sessions.history(session_id).await {
        messages.push(ChatMessage::user(exchange.user));
        messages.push(ChatMessage::assistant(exchange.assistant));
    }
    messages.push(ChatMessage::user(format!("{}{}", QUERY_PREFIX, user_query)));

    let mut sources = SourceLog::new();
    let mut rounds_used: u32 = 0;
    let mut state = LoopState::AwaitingModel;

    let text = loop {
        state = match state {
            LoopState::AwaitingModel => {
                let tools = if rounds_used < config.max_rounds {
                    tools::schemas()
                } else {
                    Vec::new()
                };
                let request = ChatRequest {
                    system: SYSTEM_PROMPT.to_string(),
                    messages: messages.clone(),
                    tools,
                };
                let response = chat.complete(&request).await?;

                // Past the budget the reply is final even if the model
                // still tried to call tools.
                if response.tool_calls.is_empty() || rounds_used >= config.max_rounds {
                    LoopState::Done(response.content)
                } else {
                    messages.push(ChatMessage::assistant_tool_calls(
                        response.content,
                        response.tool_calls.clone(),
                    ));
                    LoopState::ExecutingTools(response.tool_calls)
                }
            }

            LoopState::ExecutingTools(calls) => {
                for call in &calls {
                    let result = run_tool(store, call, &mut sources).await;
                    messages.push(ChatMessage::tool_result(&call.id, result));
                }
                rounds_used += 1;
                LoopState::AwaitingModel
            }

            LoopState::Done(content) => {
                break match content {
                    Some(text) if !text.trim().is_empty() => text,
                    _ => FALLBACK_ANSWER.to_string(),
                };
            }
        };
    };

    sessions.record(session_id, user_query, text.as_str()).await;

    Ok(Answer {
        text,
        sources: sources.into_sources(),
    })
}

/// Execute one tool call, turning any failure into result text the model
/// can read and recover from.
async fn run_tool(store: &CourseStore, call: &ToolCallRequest, sources: &mut SourceLog) -> String {
    let request = match ToolRequest::parse(&call.name, &call.arguments) {
        Ok(request) => request,
        Err(e) => return format!("Tool execution failed for {}: {}", call.name, e),
    };
    match request.execute(store, sources).await {
        Ok(text) => text,
        Err(e) => format!("Tool execution failed for {}: {}", call.name, e),
    }
}
