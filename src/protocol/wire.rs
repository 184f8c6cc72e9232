//! Request and response bodies of the chatbot endpoints

use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque server-assigned conversation identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Body of `POST {prefix}/chat/stream`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StreamRequest {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<SessionId>,
}

/// Body of `POST {prefix}/chat`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<SessionId>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub symptom_checker_mode: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selected_option: Option<String>,
}

/// Response of `POST {prefix}/chat`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ChatResponse {
    pub response: String,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub timestamp: Option<String>,
    pub success: bool,
    #[serde(default)]
    pub session_id: Option<SessionId>,
    #[serde(default)]
    pub is_follow_up: bool,
    #[serde(default)]
    pub options: Option<Vec<String>>,
    #[serde(default)]
    pub symptom_step: Option<u32>,
    #[serde(default)]
    pub total_steps: Option<u32>,
}

/// One entry of the session list
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SessionRecord {
    pub session_id: SessionId,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub last_active: Option<String>,
    #[serde(default)]
    pub preview: Option<String>,
}

/// Response of `GET {prefix}/sessions`
#[derive(Debug, Clone, Deserialize)]
pub struct SessionListResponse {
    pub sessions: Vec<SessionRecord>,
    pub success: bool,
}

/// Response of `POST {prefix}/new`, `POST {prefix}/clear` and `DELETE {prefix}/sessions/{id}`
#[derive(Debug, Clone, Deserialize)]
pub struct GenericResponse {
    #[serde(default)]
    pub message: Option<String>,
    pub success: bool,
    #[serde(default)]
    pub session_id: Option<SessionId>,
}

/// A message as recorded by the server
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct HistoryMessage {
    pub role: String,
    pub content: String,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub timestamp: Option<String>,
}

/// Response of `GET {prefix}/sessions/{id}`
#[derive(Debug, Clone, Deserialize)]
pub struct LoadSessionResponse {
    pub messages: Vec<HistoryMessage>,
    pub session_id: SessionId,
    #[serde(default = "default_true")]
    pub success: bool,
}

/// Response of `GET {prefix}/history`
#[derive(Debug, Clone, Deserialize)]
pub struct HistoryResponse {
    pub messages: Vec<HistoryMessage>,
    pub success: bool,
}

/// Response of `GET {prefix}/health`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    #[serde(default)]
    pub service: Option<String>,
}

impl HealthResponse {
    pub fn is_healthy(&self) -> bool {
        self.status == "healthy"
    }
}

fn default_true() -> bool {
    true
}
