//! In-memory conversation sessions.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::RwLock;
use tracing::debug;

/// One question and its answer.
#[derive(Debug, Clone, PartialEq)]
pub struct Exchange {
    pub user: String,
    pub assistant: String,
}

/// Keeps the most recent exchanges of each session.
pub struct SessionManager {
    max_history: usize,
    counter: AtomicU64,
    sessions: RwLock<HashMap<String, Vec<Exchange>>>,
}

impl SessionManager {
    /// Create a manager that keeps `max_history` exchanges per session.
    pub fn new(max_history: usize) -> Self {
        Self {
            max_history,
            counter: AtomicU64::new(0),
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Start a new, empty session and return its id.
    pub async fn create_session(&self) -> String {
        let n = self.counter.fetch_add(1, Ordering::Relaxed) + 1;
        let id = format!("session_{}", n);
        self.sessions.write().await.insert(id.clone(), Vec::new());
        debug!("Created {}", id);
        id
    }

    /// Record an exchange. Unknown ids start a new session under that id.
    pub async fn add_exchange(&self, session_id: &str, user: &str, assistant: &str) {
        let mut sessions = self.sessions.write().await;
        let history = sessions.entry(session_id.to_string()).or_default();
        history.push(Exchange {
            user: user.to_string(),
            assistant: assistant.to_string(),
        });

        let excess = history.len().saturating_sub(self.max_history);
        history.drain(..excess);
    }

    /// Recent exchanges formatted for the model, or `None` when there are none.
    pub async fn get_conversation_history(&self, session_id: &str) -> Option<String> {
        let sessions = self.sessions.read().await;
        let history = sessions.get(session_id)?;
        if history.is_empty() {
            return None;
        }

        Some(
            history
                .iter()
                .map(|e| format!("User: {}\nAssistant: {}", e.user, e.assistant))
                .collect::<Vec<_>>()
                .join("\n"),
        )
    }

    /// Forget a session. Returns whether it existed.
    pub async fn clear_session(&self, session_id: &str) -> bool {
        self.sessions.write().await.remove(session_id).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_session_ids_are_sequential() {
        let sessions = SessionManager::new(2);
        assert_eq!(sessions.create_session().await, "session_1");
        assert_eq!(sessions.create_session().await, "session_2");
    }

    #[tokio::test]
    async fn test_history_keeps_most_recent() {
        let sessions = SessionManager::new(2);
        let id = sessions.create_session().await;
        assert_eq!(sessions.get_conversation_history(&id).await, None);

        sessions.add_exchange(&id, "q1", "a1").await;
        sessions.add_exchange(&id, "q2", "a2").await;
        sessions.add_exchange(&id, "q3", "a3").await;

        assert_eq!(
            sessions.get_conversation_history(&id).await.as_deref(),
            Some("User: q2\nAssistant: a2\nUser: q3\nAssistant: a3")
        );
    }

    #[tokio::test]
    async fn test_clear_session() {
        let sessions = SessionManager::new(2);
        sessions.add_exchange("custom", "q", "a").await;
        assert!(sessions.get_conversation_history("custom").await.is_some());

        assert!(sessions.clear_session("custom").await);
        assert!(!sessions.clear_session("custom").await);
        assert_eq!(sessions.get_conversation_history("custom").await, None);
    }
}
