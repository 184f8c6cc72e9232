//! Scripted transport for tests
//!
//! Streams and chat replies are queued up front and replayed in order;
//! sessions live in a small in-memory store. Every request is recorded.

use super::{ChatTransport, FragmentStream};
use crate::config::Credential;
use crate::error::ChatError;
use crate::protocol::{
    ChatRequest, ChatResponse, GenericResponse, HealthResponse, HistoryMessage, HistoryResponse,
    LoadSessionResponse, SessionId, SessionListResponse, SessionRecord, StreamRequest,
};
use async_trait::async_trait;
use futures::StreamExt;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// What the next `open_stream` call does
enum StreamScript {
    /// Fail before any body arrives (connection refused, bad status)
    Refuse(ChatError),
    /// Yield the fragments in order, then end
    Fragments(Vec<Result<Vec<u8>, ChatError>>),
    /// Yield the fragments, then never produce anything again
    Stall(Vec<Vec<u8>>),
}

#[derive(Default)]
pub struct MockTransport {
    streams: Mutex<VecDeque<StreamScript>>,
    chats: Mutex<VecDeque<Result<ChatResponse, ChatError>>>,
    sessions: Mutex<Vec<SessionRecord>>,
    histories: Mutex<HashMap<SessionId, Vec<HistoryMessage>>>,
    list_failure: Mutex<Option<ChatError>>,
    created: AtomicUsize,
    /// Record of streaming requests with the credential they carried
    pub stream_requests: Mutex<Vec<(StreamRequest, Option<Credential>)>>,
    /// Record of non-streaming requests
    pub chat_requests: Mutex<Vec<ChatRequest>>,
    pub list_calls: AtomicUsize,
    pub clear_calls: AtomicUsize,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a stream delivering `fragments` as separate reads
    pub fn queue_stream(&self, fragments: &[&str]) {
        let fragments = fragments
            .iter()
            .map(|f| Ok(f.as_bytes().to_vec()))
            .collect();
        self.streams
            .lock()
            .unwrap()
            .push_back(StreamScript::Fragments(fragments));
    }

    /// Queue a stream that delivers `fragments` then breaks with `error`
    pub fn queue_stream_then_fail(&self, fragments: &[&str], error: ChatError) {
        let mut items: Vec<_> = fragments
            .iter()
            .map(|f| Ok(f.as_bytes().to_vec()))
            .collect();
        items.push(Err(error));
        self.streams
            .lock()
            .unwrap()
            .push_back(StreamScript::Fragments(items));
    }

    /// Queue a stream that cannot be opened
    pub fn queue_stream_refused(&self, error: ChatError) {
        self.streams
            .lock()
            .unwrap()
            .push_back(StreamScript::Refuse(error));
    }

    /// Queue a stream that delivers `fragments` and then hangs
    pub fn queue_stream_stall(&self, fragments: &[&str]) {
        let fragments = fragments.iter().map(|f| f.as_bytes().to_vec()).collect();
        self.streams
            .lock()
            .unwrap()
            .push_back(StreamScript::Stall(fragments));
    }

    pub fn queue_chat(&self, response: ChatResponse) {
        self.chats.lock().unwrap().push_back(Ok(response));
    }

    pub fn queue_chat_error(&self, error: ChatError) {
        self.chats.lock().unwrap().push_back(Err(error));
    }

    /// Make the next `list_sessions` call fail
    pub fn fail_next_list(&self, error: ChatError) {
        *self.list_failure.lock().unwrap() = Some(error);
    }

    /// Seed a stored session with its history
    pub fn add_session(&self, id: &str, last_active: &str, history: Vec<HistoryMessage>) {
        let preview = history
            .iter()
            .find(|m| m.role == "user")
            .map(|m| m.content.clone());
        self.sessions.lock().unwrap().push(SessionRecord {
            session_id: SessionId::new(id),
            created_at: Some(last_active.to_string()),
            last_active: Some(last_active.to_string()),
            preview,
        });
        self.histories
            .lock()
            .unwrap()
            .insert(SessionId::new(id), history);
    }

    pub fn session_ids(&self) -> Vec<String> {
        self.sessions
            .lock()
            .unwrap()
            .iter()
            .map(|s| s.session_id.to_string())
            .collect()
    }

    pub fn recorded_stream_requests(&self) -> Vec<(StreamRequest, Option<Credential>)> {
        self.stream_requests.lock().unwrap().clone()
    }

    pub fn recorded_chat_requests(&self) -> Vec<ChatRequest> {
        self.chat_requests.lock().unwrap().clone()
    }
}

/// Build a text frame the way the backend writes it
pub fn frame(payload: &serde_json::Value) -> String {
    format!("data: {payload}\n\n")
}

pub fn token_frame(content: &str) -> String {
    frame(&serde_json::json!({ "type": "token", "content": content }))
}

pub fn history_message(role: &str, content: &str) -> HistoryMessage {
    HistoryMessage {
        role: role.to_string(),
        content: content.to_string(),
        source: None,
        timestamp: None,
    }
}

/// A plain successful chat reply
pub fn chat_reply(response: &str, session_id: &str) -> ChatResponse {
    ChatResponse {
        response: response.to_string(),
        source: Some("AI Knowledge".to_string()),
        timestamp: Some("10:00 AM".to_string()),
        success: true,
        session_id: Some(SessionId::new(session_id)),
        is_follow_up: false,
        options: None,
        symptom_step: None,
        total_steps: None,
    }
}

#[async_trait]
impl ChatTransport for MockTransport {
    async fn open_stream(
        &self,
        request: &StreamRequest,
        credential: Option<&Credential>,
    ) -> Result<FragmentStream, ChatError> {
        self.stream_requests
            .lock()
            .unwrap()
            .push((request.clone(), credential.cloned()));

        let script = self
            .streams
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| StreamScript::Refuse(ChatError::network("No mock stream queued")));

        match script {
            StreamScript::Refuse(error) => Err(error),
            StreamScript::Fragments(items) => Ok(futures::stream::iter(items).boxed()),
            StreamScript::Stall(fragments) => Ok(futures::stream::iter(fragments.into_iter().map(Ok))
                .chain(futures::stream::pending())
                .boxed()),
        }
    }

    async fn chat(
        &self,
        request: &ChatRequest,
        _credential: Option<&Credential>,
    ) -> Result<ChatResponse, ChatError> {
        self.chat_requests.lock().unwrap().push(request.clone());
        self.chats
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(ChatError::network("No mock chat response queued")))
    }

    async fn list_sessions(
        &self,
        _credential: Option<&Credential>,
    ) -> Result<SessionListResponse, ChatError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(error) = self.list_failure.lock().unwrap().take() {
            return Err(error);
        }
        Ok(SessionListResponse {
            sessions: self.sessions.lock().unwrap().clone(),
            success: true,
        })
    }

    async fn create_session(
        &self,
        _credential: Option<&Credential>,
    ) -> Result<GenericResponse, ChatError> {
        let n = self.created.fetch_add(1, Ordering::SeqCst) + 1;
        let id = format!("new-{n}");
        self.add_session(&id, "2030-01-01 00:00:00", Vec::new());
        Ok(GenericResponse {
            message: Some("New chat created".to_string()),
            success: true,
            session_id: Some(SessionId::new(id)),
        })
    }

    async fn load_session(
        &self,
        id: &SessionId,
        _credential: Option<&Credential>,
    ) -> Result<LoadSessionResponse, ChatError> {
        let messages = self
            .histories
            .lock()
            .unwrap()
            .get(id)
            .cloned()
            .unwrap_or_default();
        Ok(LoadSessionResponse {
            messages,
            session_id: id.clone(),
            success: true,
        })
    }

    async fn delete_session(
        &self,
        id: &SessionId,
        _credential: Option<&Credential>,
    ) -> Result<GenericResponse, ChatError> {
        let mut sessions = self.sessions.lock().unwrap();
        let before = sessions.len();
        sessions.retain(|s| &s.session_id != id);
        if sessions.len() == before {
            return Err(ChatError::not_found(
                "Not found: Session not found or not owned by you",
            ));
        }
        self.histories.lock().unwrap().remove(id);
        Ok(GenericResponse {
            message: Some("Session deleted".to_string()),
            success: true,
            session_id: None,
        })
    }

    async fn history(
        &self,
        id: Option<&SessionId>,
        _credential: Option<&Credential>,
    ) -> Result<HistoryResponse, ChatError> {
        let messages = id
            .and_then(|id| self.histories.lock().unwrap().get(id).cloned())
            .unwrap_or_default();
        Ok(HistoryResponse {
            messages,
            success: true,
        })
    }

    async fn clear(&self, _credential: Option<&Credential>) -> Result<GenericResponse, ChatError> {
        self.clear_calls.fetch_add(1, Ordering::SeqCst);
        Ok(GenericResponse {
            message: Some("Conversation cleared".to_string()),
            success: true,
            session_id: None,
        })
    }

    async fn health(&self, _credential: Option<&Credential>) -> Result<HealthResponse, ChatError> {
        Ok(HealthResponse {
            status: "healthy".to_string(),
            service: Some("MediGenius".to_string()),
        })
    }
}
