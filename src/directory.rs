//! Session directory
//!
//! CRUD over the caller's stored conversations. Holds a cached listing,
//! ordered most recently active first, that is refreshed after every
//! mutation.

use crate::config::Credential;
use crate::conversation::Message;
use crate::error::ChatError;
use crate::protocol::{SessionId, SessionRecord};
use crate::transport::ChatTransport;
use chrono::{DateTime, NaiveDateTime};
use std::cmp::Reverse;
use std::sync::Arc;
use tokio::sync::RwLock;

const PREVIEW_CHARS: usize = 50;

/// A stored conversation as listed by the server
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub id: SessionId,
    pub created_at: Option<String>,
    pub last_active: Option<String>,
    pub preview: Option<String>,
}

impl Session {
    fn from_record(record: SessionRecord) -> Self {
        Self {
            id: record.session_id,
            created_at: record.created_at,
            last_active: record.last_active,
            preview: record.preview,
        }
    }

    /// Preview text for listings, cut to 50 characters
    pub fn display_preview(&self) -> String {
        let Some(preview) = self.preview.as_deref().filter(|p| !p.trim().is_empty()) else {
            return "New conversation".to_string();
        };
        let preview = preview.trim();
        if preview.chars().count() > PREVIEW_CHARS {
            let cut: String = preview.chars().take(PREVIEW_CHARS).collect();
            format!("{cut}...")
        } else {
            preview.to_string()
        }
    }

    pub fn last_active_at(&self) -> Option<NaiveDateTime> {
        self.last_active.as_deref().and_then(parse_timestamp)
    }
}

/// Parse the timestamp formats the backend emits
fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.naive_utc());
    }
    ["%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
}

/// Most recent first; sessions without a parseable time go last in
/// their original order
fn sort_by_recency(sessions: &mut [Session]) {
    sessions.sort_by_key(|s| match s.last_active_at() {
        Some(at) => (false, Reverse(Some(at))),
        None => (true, Reverse(None)),
    });
}

pub struct SessionDirectory<T: ChatTransport> {
    transport: Arc<T>,
    credential: Option<Credential>,
    cache: RwLock<Vec<Session>>,
}

impl<T: ChatTransport> SessionDirectory<T> {
    pub fn new(transport: Arc<T>, credential: Option<Credential>) -> Self {
        Self {
            transport,
            credential,
            cache: RwLock::new(Vec::new()),
        }
    }

    /// Last fetched listing
    pub async fn sessions(&self) -> Vec<Session> {
        self.cache.read().await.clone()
    }

    /// Fetch the listing from the server and cache it
    pub async fn refresh(&self) -> Result<Vec<Session>, ChatError> {
        let response = self
            .transport
            .list_sessions(self.credential.as_ref())
            .await?;
        if !response.success {
            return Err(ChatError::remote("Failed to list sessions"));
        }

        let mut sessions: Vec<Session> = response
            .sessions
            .into_iter()
            .map(Session::from_record)
            .collect();
        sort_by_recency(&mut sessions);
        tracing::debug!(count = sessions.len(), "Refreshed session list");

        *self.cache.write().await = sessions.clone();
        Ok(sessions)
    }

    /// Create an empty session on the server and return its id
    pub async fn create(&self) -> Result<SessionId, ChatError> {
        let response = self
            .transport
            .create_session(self.credential.as_ref())
            .await?;
        let id = match (response.success, response.session_id) {
            (true, Some(id)) => id,
            _ => {
                return Err(ChatError::remote(
                    response
                        .message
                        .unwrap_or_else(|| "Failed to create session".to_string()),
                ))
            }
        };
        tracing::info!(session_id = %id, "Created session");
        self.refresh_after_mutation().await;
        Ok(id)
    }

    /// Full message history of a stored session
    pub async fn load(&self, id: &SessionId) -> Result<Vec<Message>, ChatError> {
        let response = self
            .transport
            .load_session(id, self.credential.as_ref())
            .await?;
        if !response.success {
            return Err(ChatError::remote(format!("Failed to load session {id}")));
        }
        if response.session_id != *id {
            tracing::warn!(requested = %id, returned = %response.session_id, "Server returned a different session");
        }
        Ok(response
            .messages
            .into_iter()
            .filter_map(Message::from_history)
            .collect())
    }

    pub async fn delete(&self, id: &SessionId) -> Result<(), ChatError> {
        let response = self
            .transport
            .delete_session(id, self.credential.as_ref())
            .await?;
        if !response.success {
            return Err(ChatError::remote(
                response
                    .message
                    .unwrap_or_else(|| format!("Failed to delete session {id}")),
            ));
        }
        tracing::info!(session_id = %id, "Deleted session");
        self.refresh_after_mutation().await;
        Ok(())
    }

    /// Server-side history; `None` reads the server's active session
    pub async fn history(&self, id: Option<&SessionId>) -> Result<Vec<Message>, ChatError> {
        let response = self
            .transport
            .history(id, self.credential.as_ref())
            .await?;
        Ok(response
            .messages
            .into_iter()
            .filter_map(Message::from_history)
            .collect())
    }

    async fn refresh_after_mutation(&self) {
        if let Err(e) = self.refresh().await {
            tracing::warn!(error = %e, "Failed to refresh session list");
        }
    }
}
