//! Session registry
//!
//! One snapshot per session, replaced atomically on every update so a
//! concurrent status poll never observes a half-written record.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::{Map, Value};
use tokio::sync::RwLock;

use video_dub_common::{ErrorType, PipelineError};

/// Lifecycle of one dubbing session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Queued,
    Processing,
    Completed,
    Error,
}

impl SessionStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Error => "error",
        }
    }
}

/// Classified failure recorded on a session
#[derive(Debug, Clone, Serialize)]
pub struct SessionError {
    pub stage: &'static str,
    pub error_type: ErrorType,
    pub message: String,
    pub retry_possible: bool,
}

impl From<PipelineError> for SessionError {
    fn from(err: PipelineError) -> Self {
        Self {
            stage: err.stage,
            error_type: err.error_type,
            message: err.message,
            retry_possible: err.retry_possible,
        }
    }
}

/// Point-in-time view of one session
#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub session_id: String,
    pub status: SessionStatus,
    pub current_stage: Option<String>,
    /// 0 to 100, never decreases
    pub progress: u8,
    /// Completed stage records keyed by stage name
    pub results: Map<String, Value>,
    pub error: Option<SessionError>,
}

impl SessionSnapshot {
    /// Fresh snapshot for a just-accepted session
    #[must_use]
    pub fn queued(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            status: SessionStatus::Queued,
            current_stage: None,
            progress: crate::progress::QUEUED,
            results: Map::new(),
            error: None,
        }
    }

    /// Raise progress to `to`; a lower checkpoint never winds it back
    pub fn advance_progress(&mut self, to: u8) {
        self.progress = self.progress.max(to);
    }

    /// Completed and error snapshots are final
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self.status, SessionStatus::Completed | SessionStatus::Error)
    }
}

/// Storage for session snapshots.
///
/// Kept behind a trait so the registry can move off process memory
/// without touching the runner or the handlers.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn insert(&self, snapshot: SessionSnapshot);

    async fn get(&self, session_id: &str) -> Option<SessionSnapshot>;

    /// Apply `apply` to the session's snapshot under the write lock.
    /// Returns false for unknown sessions and for terminal snapshots,
    /// which are never revisited.
    async fn update(
        &self,
        session_id: &str,
        apply: Box<dyn for<'a> FnOnce(&'a mut SessionSnapshot) + Send>,
    ) -> bool;
}

/// Process-local session store
#[derive(Default)]
pub struct InMemorySessionStore {
    sessions: RwLock<HashMap<String, SessionSnapshot>>,
}

impl InMemorySessionStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn insert(&self, snapshot: SessionSnapshot) {
        self.sessions
            .write()
            .await
            .insert(snapshot.session_id.clone(), snapshot);
    }

    async fn get(&self, session_id: &str) -> Option<SessionSnapshot> {
        self.sessions.read().await.get(session_id).cloned()
    }

    async fn update(
        &self,
        session_id: &str,
        apply: Box<dyn for<'a> FnOnce(&'a mut SessionSnapshot) + Send>,
    ) -> bool {
        let mut sessions = self.sessions.write().await;
        match sessions.get_mut(session_id) {
            Some(snapshot) if !snapshot.is_terminal() => {
                apply(snapshot);
                true
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_never_decreases() {
        let mut snapshot = SessionSnapshot::queued("s1");
        snapshot.advance_progress(55);
        snapshot.advance_progress(15);
        assert_eq!(snapshot.progress, 55);
        snapshot.advance_progress(100);
        assert_eq!(snapshot.progress, 100);
    }

    #[tokio::test]
    async fn test_insert_and_get() {
        let store = InMemorySessionStore::new();
        store.insert(SessionSnapshot::queued("s1")).await;

        let snapshot = store.get("s1").await.unwrap();
        assert_eq!(snapshot.status, SessionStatus::Queued);
        assert_eq!(snapshot.progress, 0);
        assert!(store.get("s2").await.is_none());
    }

    #[tokio::test]
    async fn test_update_unknown_session() {
        let store = InMemorySessionStore::new();
        let applied = store
            .update("missing", Box::new(|s| s.advance_progress(50)))
            .await;
        assert!(!applied);
    }

    #[tokio::test]
    async fn test_terminal_snapshot_never_revisited() {
        let store = InMemorySessionStore::new();
        store.insert(SessionSnapshot::queued("s1")).await;
        store
            .update(
                "s1",
                Box::new(|s| {
                    s.status = SessionStatus::Completed;
                    s.advance_progress(100);
                }),
            )
            .await;

        let applied = store
            .update(
                "s1",
                Box::new(|s| {
                    s.status = SessionStatus::Processing;
                    s.progress = 15;
                }),
            )
            .await;
        assert!(!applied);

        let snapshot = store.get("s1").await.unwrap();
        assert_eq!(snapshot.status, SessionStatus::Completed);
        assert_eq!(snapshot.progress, 100);
    }

    #[test]
    fn test_status_serializes_lowercase() {
        assert_eq!(
            serde_json::to_value(SessionStatus::Processing).unwrap(),
            serde_json::json!("processing")
        );
    }

    #[test]
    fn test_session_error_from_pipeline_error() {
        let err = PipelineError::new("translate", ErrorType::RateLimit, "slow down");
        let session_err = SessionError::from(err);
        assert_eq!(session_err.stage, "translate");
        assert_eq!(session_err.error_type, ErrorType::RateLimit);
        assert!(session_err.retry_possible);
    }
}
