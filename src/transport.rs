//! Transport seam between the chat engine and the backend
//!
//! The engine only talks to [`ChatTransport`]; `http` is the production
//! implementation and `testing` a scripted one for tests.

mod http;

#[cfg(test)]
pub mod testing;

pub use http::HttpTransport;

use crate::config::Credential;
use crate::error::ChatError;
use crate::protocol::{
    ChatRequest, ChatResponse, GenericResponse, HealthResponse, HistoryResponse,
    LoadSessionResponse, SessionId, SessionListResponse, StreamRequest,
};
use async_trait::async_trait;
use futures::stream::BoxStream;
use std::sync::Arc;

/// Raw body fragments of a streaming response, in arrival order
pub type FragmentStream = BoxStream<'static, Result<Vec<u8>, ChatError>>;

/// Backend operations the engine depends on.
///
/// Every call takes the caller's credential explicitly; `None` sends no
/// credential header.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// Open a streaming exchange. Resolves once response headers arrived
    /// with a success status.
    async fn open_stream(
        &self,
        request: &StreamRequest,
        credential: Option<&Credential>,
    ) -> Result<FragmentStream, ChatError>;

    /// Single request/response exchange
    async fn chat(
        &self,
        request: &ChatRequest,
        credential: Option<&Credential>,
    ) -> Result<ChatResponse, ChatError>;

    async fn list_sessions(
        &self,
        credential: Option<&Credential>,
    ) -> Result<SessionListResponse, ChatError>;

    async fn create_session(
        &self,
        credential: Option<&Credential>,
    ) -> Result<GenericResponse, ChatError>;

    async fn load_session(
        &self,
        id: &SessionId,
        credential: Option<&Credential>,
    ) -> Result<LoadSessionResponse, ChatError>;

    async fn delete_session(
        &self,
        id: &SessionId,
        credential: Option<&Credential>,
    ) -> Result<GenericResponse, ChatError>;

    /// Server-recorded history; `None` asks for the server's active session
    async fn history(
        &self,
        id: Option<&SessionId>,
        credential: Option<&Credential>,
    ) -> Result<HistoryResponse, ChatError>;

    /// Reset the server's in-memory conversation state (history is kept)
    async fn clear(&self, credential: Option<&Credential>) -> Result<GenericResponse, ChatError>;

    async fn health(&self, credential: Option<&Credential>) -> Result<HealthResponse, ChatError>;
}

// ============================================================================
// Arc implementation for shared transports
// ============================================================================

#[async_trait]
impl<T: ChatTransport + ?Sized> ChatTransport for Arc<T> {
    async fn open_stream(
        &self,
        request: &StreamRequest,
        credential: Option<&Credential>,
    ) -> Result<FragmentStream, ChatError> {
        (**self).open_stream(request, credential).await
    }

    async fn chat(
        &self,
        request: &ChatRequest,
        credential: Option<&Credential>,
    ) -> Result<ChatResponse, ChatError> {
        (**self).chat(request, credential).await
    }

    async fn list_sessions(
        &self,
        credential: Option<&Credential>,
    ) -> Result<SessionListResponse, ChatError> {
        (**self).list_sessions(credential).await
    }

    async fn create_session(
        &self,
        credential: Option<&Credential>,
    ) -> Result<GenericResponse, ChatError> {
        (**self).create_session(credential).await
    }

    async fn load_session(
        &self,
        id: &SessionId,
        credential: Option<&Credential>,
    ) -> Result<LoadSessionResponse, ChatError> {
        (**self).load_session(id, credential).await
    }

    async fn delete_session(
        &self,
        id: &SessionId,
        credential: Option<&Credential>,
    ) -> Result<GenericResponse, ChatError> {
        (**self).delete_session(id, credential).await
    }

    async fn history(
        &self,
        id: Option<&SessionId>,
        credential: Option<&Credential>,
    ) -> Result<HistoryResponse, ChatError> {
        (**self).history(id, credential).await
    }

    async fn clear(&self, credential: Option<&Credential>) -> Result<GenericResponse, ChatError> {
        (**self).clear(credential).await
    }

    async fn health(&self, credential: Option<&Credential>) -> Result<HealthResponse, ChatError> {
        (**self).health(credential).await
    }
}
