//! In-memory conversation sessions.
//!
//! Each session holds the last `max_history` user/assistant exchanges for
//! one conversation. Eviction is FIFO and always drops a whole exchange,
//! never half of one, so the transcript handed to the model stays
//! well-formed. Sessions live only as long as the process; nothing here
//! touches the database.

use std::collections::{HashMap, VecDeque};
use tokio::sync::Mutex;
use uuid::Uuid;

/// One completed question/answer turn.
#[derive(Debug, Clone)]
pub struct Exchange {
    pub user: String,
    pub assistant: String,
}

pub struct SessionStore {
    max_history: usize,
    sessions: Mutex<HashMap<String, VecDeque<Exchange>>>,
}

impl SessionStore {
    pub fn new(max_history: usize) -> Self {
        Self {
            max_history,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// Create a fresh session and return its id.
    pub async fn create_session(&self) -> String {
        let id = Uuid::new_v4().to_string();
        let mut sessions = self.sessions.lock().await;
        sessions.insert(id.clone(), VecDeque::new());
        id
    }

    /// The retained exchanges for a session, oldest first. Unknown ids
    /// read as empty history.
    pub async fn history(&self, session_id: &str) -> Vec<Exchange> {
        let sessions = self.sessions.lock().await;
        sessions
            .get(session_id)
            .map(|h| h.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Record a completed exchange, creating the session if needed and
    /// evicting the oldest exchanges beyond `max_history`.
    pub async fn record(&self, session_id: &str, user: impl Into<String>, assistant: impl Into<String>) {
        let mut sessions = self.sessions.lock().await;
        let history = sessions.entry(session_id.to_string()).or_default();
        history.push_back(Exchange {
            user: user.into(),
            assistant: assistant.into(),
        });
        while history.len() > self.max_history {
            history.pop_front();
        }
    }

    /// Drop a session entirely. Returns whether it existed.
    pub async fn clear(&self, session_id: &str) -> bool {
        let mut sessions = self.sessions.lock().await;
        sessions.remove(session_id).is_some()
    }
}
