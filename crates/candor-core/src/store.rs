//! In-memory [`SessionStore`].

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::{EngineError, Result};
use crate::model::InterviewSession;
use crate::traits::SessionStore;

/// Process-local session storage. Sessions are lost when the process exits;
/// use [`InterviewSession::save_json`] to keep one.
#[derive(Debug, Default)]
pub struct InMemorySessionStore {
    sessions: RwLock<HashMap<Uuid, InterviewSession>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.sessions.read().map(|s| s.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn poisoned<T>(_: T) -> EngineError {
    EngineError::Storage("session store lock poisoned".into())
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn get(&self, id: Uuid) -> Result<InterviewSession> {
        let sessions = self.sessions.read().map_err(poisoned)?;
        sessions
            .get(&id)
            .cloned()
            .ok_or_else(|| EngineError::NotFound(format!("session {id}")))
    }

    async fn put(&self, session: InterviewSession) -> Result<()> {
        let mut sessions = self.sessions.write().map_err(poisoned)?;
        sessions.insert(session.id, session);
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> Result<()> {
        let mut sessions = self.sessions.write().map_err(poisoned)?;
        sessions
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| EngineError::NotFound(format!("session {id}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::QuestionType;

    #[tokio::test]
    async fn put_get_delete() {
        let store = InMemorySessionStore::new();
        let mut session = InterviewSession::new(Some("backend loop".into()));
        session
            .push_question("Design a rate limiter", QuestionType::Technical)
            .unwrap();
        let id = session.id;

        store.put(session.clone()).await.unwrap();
        assert_eq!(store.len(), 1);
        assert_eq!(store.get(id).await.unwrap(), session);
        assert_eq!(store.list_question_events(id).await.unwrap().len(), 1);

        store.delete(id).await.unwrap();
        assert!(store.is_empty());
        assert!(matches!(store.get(id).await, Err(EngineError::NotFound(_))));
        assert!(matches!(store.delete(id).await, Err(EngineError::NotFound(_))));
    }
}
