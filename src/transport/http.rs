//! HTTP transport over reqwest

use super::{ChatTransport, FragmentStream};
use crate::config::{ClientConfig, Credential, Role};
use crate::error::ChatError;
use crate::protocol::{
    ChatRequest, ChatResponse, GenericResponse, HealthResponse, HistoryResponse,
    LoadSessionResponse, SessionId, SessionListResponse, StreamRequest,
};
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::{Client, RequestBuilder, Response, Url};
use serde::de::DeserializeOwned;

/// Talks to the chatbot endpoints of the backend
pub struct HttpTransport {
    client: Client,
    base_url: String,
}

impl HttpTransport {
    pub fn new(config: &ClientConfig) -> Result<Self, ChatError> {
        let mut builder = Client::builder();
        if let Some(timeout) = config.request_timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| ChatError::unknown(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Endpoint URL under the credential's role prefix
    fn url(&self, credential: Option<&Credential>, path: &str) -> String {
        format!("{}{}{}", self.base_url, Role::of(credential).api_prefix(), path)
    }

    /// `{prefix}/sessions/{id}` with the id escaped as a single path segment
    fn session_url(&self, credential: Option<&Credential>, id: &SessionId) -> Result<Url, ChatError> {
        if matches!(id.as_str(), "" | "." | "..") {
            return Err(ChatError::invalid_request(format!("Invalid session id: {id:?}")));
        }
        let mut url = Url::parse(&self.url(credential, "/sessions"))
            .map_err(|e| ChatError::invalid_request(format!("Invalid backend URL: {e}")))?;
        url.path_segments_mut()
            .map_err(|()| ChatError::invalid_request("Backend URL cannot carry a path"))?
            .push(id.as_str());
        Ok(url)
    }

    fn authorize(builder: RequestBuilder, credential: Option<&Credential>) -> RequestBuilder {
        match credential {
            Some(credential) => builder.header(credential.header_name(), credential.token()),
            None => builder,
        }
    }

    async fn send(
        builder: RequestBuilder,
        credential: Option<&Credential>,
    ) -> Result<Response, ChatError> {
        let response = Self::authorize(builder, credential).send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(ChatError::from_status(status.as_u16(), &body))
    }

    async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T, ChatError> {
        let body = response
            .text()
            .await
            .map_err(|e| ChatError::network(format!("Failed to read response: {e}")))?;
        serde_json::from_str(&body)
            .map_err(|e| ChatError::unknown(format!("Failed to parse response: {e} - body: {body}")))
    }
}

#[async_trait]
impl ChatTransport for HttpTransport {
    async fn open_stream(
        &self,
        request: &StreamRequest,
        credential: Option<&Credential>,
    ) -> Result<FragmentStream, ChatError> {
        let role = Role::of(credential);
        if !role.supports_streaming() {
            return Err(ChatError::invalid_request(format!(
                "Streaming is not available for the {role} role"
            )));
        }
        let builder = self
            .client
            .post(self.url(credential, "/chat/stream"))
            .header(reqwest::header::ACCEPT, "text/event-stream")
            .json(request);
        let response = Self::send(builder, credential).await?;

        Ok(response
            .bytes_stream()
            .map(|chunk| chunk.map(|bytes| bytes.to_vec()).map_err(ChatError::from))
            .boxed())
    }

    async fn chat(
        &self,
        request: &ChatRequest,
        credential: Option<&Credential>,
    ) -> Result<ChatResponse, ChatError> {
        let builder = self.client.post(self.url(credential, "/chat")).json(request);
        Self::read_json(Self::send(builder, credential).await?).await
    }

    async fn list_sessions(
        &self,
        credential: Option<&Credential>,
    ) -> Result<SessionListResponse, ChatError> {
        let builder = self.client.get(self.url(credential, "/sessions"));
        Self::read_json(Self::send(builder, credential).await?).await
    }

    async fn create_session(
        &self,
        credential: Option<&Credential>,
    ) -> Result<GenericResponse, ChatError> {
        let builder = self.client.post(self.url(credential, "/new"));
        Self::read_json(Self::send(builder, credential).await?).await
    }

    async fn load_session(
        &self,
        id: &SessionId,
        credential: Option<&Credential>,
    ) -> Result<LoadSessionResponse, ChatError> {
        let builder = self.client.get(self.session_url(credential, id)?);
        Self::read_json(Self::send(builder, credential).await?).await
    }

    async fn delete_session(
        &self,
        id: &SessionId,
        credential: Option<&Credential>,
    ) -> Result<GenericResponse, ChatError> {
        let builder = self.client.delete(self.session_url(credential, id)?);
        Self::read_json(Self::send(builder, credential).await?).await
    }

    async fn history(
        &self,
        id: Option<&SessionId>,
        credential: Option<&Credential>,
    ) -> Result<HistoryResponse, ChatError> {
        let mut builder = self.client.get(self.url(credential, "/history"));
        if let Some(id) = id {
            builder = builder.query(&[("session_id", id.as_str())]);
        }
        Self::read_json(Self::send(builder, credential).await?).await
    }

    async fn clear(&self, credential: Option<&Credential>) -> Result<GenericResponse, ChatError> {
        let builder = self.client.post(self.url(credential, "/clear"));
        Self::read_json(Self::send(builder, credential).await?).await
    }

    async fn health(&self, credential: Option<&Credential>) -> Result<HealthResponse, ChatError> {
        let builder = self.client.get(self.url(credential, "/health"));
        Self::read_json(Self::send(builder, credential).await?).await
    }
}
