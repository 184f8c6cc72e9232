//! Conversation controller
//!
//! Owns the message log, the active session and the chat mode, and turns
//! user input into exchanges with the backend. Sends take `&mut self`, so
//! at most one exchange is in flight per controller.

use super::{
    ActiveSession, ConversationUpdate, GuidedMeta, Message, MessageId, MessageLog,
    OptimisticAppend,
};
use crate::config::{ClientConfig, Credential, Role};
use crate::directory::SessionDirectory;
use crate::driver::{StreamDriver, StreamObserver, StreamOutcome};
use crate::error::ChatError;
use crate::protocol::{ChatRequest, ChatResponse, HealthResponse, SessionId, StreamRequest};
use crate::transport::ChatTransport;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

const UPDATE_CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChatMode {
    #[default]
    FreeForm,
    /// Symptom assessment; input goes through [`ConversationController::send_guided`]
    Guided,
}

/// Payload of one guided-mode exchange
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuidedInput {
    /// Ask the backend for the first assessment question
    Start,
    /// One of the offered options
    Option(String),
    /// A typed answer instead of an offered option
    FreeText(String),
}

/// Cancels whichever exchange is in flight when [`cancel`](Self::cancel)
/// is called. Cheap to clone and safe to use from another task.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle {
    current: Arc<Mutex<CancellationToken>>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.lock().cancel();
    }

    /// Fresh token for a new exchange; earlier cancellations do not carry over
    fn begin(&self) -> CancellationToken {
        let token = CancellationToken::new();
        *self.lock() = token.clone();
        token
    }

    fn lock(&self) -> MutexGuard<'_, CancellationToken> {
        self.current.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

pub struct ConversationController<T: ChatTransport> {
    transport: Arc<T>,
    credential: Option<Credential>,
    driver: StreamDriver<T>,
    directory: Arc<SessionDirectory<T>>,
    log: MessageLog,
    session: ActiveSession,
    mode: ChatMode,
    streaming: bool,
    cancel: CancelHandle,
    updates: broadcast::Sender<ConversationUpdate>,
}

impl<T: ChatTransport> ConversationController<T> {
    pub fn new(transport: Arc<T>, credential: Option<Credential>, streaming: bool) -> Self {
        let (updates, _) = broadcast::channel(UPDATE_CHANNEL_CAPACITY);
        Self {
            driver: StreamDriver::new(transport.clone(), credential.clone()),
            directory: Arc::new(SessionDirectory::new(transport.clone(), credential.clone())),
            transport,
            credential,
            log: MessageLog::new(),
            session: ActiveSession::unassigned(),
            mode: ChatMode::FreeForm,
            streaming,
            cancel: CancelHandle::default(),
            updates,
        }
    }

    /// Build from configuration, resolving the credential for the configured role
    pub fn from_config(transport: Arc<T>, config: &ClientConfig) -> Self {
        Self::new(transport, config.credential(), config.streaming)
    }

    pub fn messages(&self) -> &[Message] {
        self.log.messages()
    }

    pub fn log(&self) -> &MessageLog {
        &self.log
    }

    pub fn session_id(&self) -> Option<&SessionId> {
        self.session.id()
    }

    pub fn mode(&self) -> ChatMode {
        self.mode
    }

    /// Whether streamed replies are requested. Roles without a streaming
    /// endpoint get whole replies regardless.
    pub fn streaming(&self) -> bool {
        self.streaming
    }

    /// Role whose endpoints this controller talks to
    pub fn role(&self) -> Role {
        Role::of(self.credential.as_ref())
    }

    pub fn supports_guided(&self) -> bool {
        self.role().supports_guided()
    }

    pub fn set_streaming(&mut self, enabled: bool) {
        self.streaming = enabled;
    }

    pub fn directory(&self) -> &Arc<SessionDirectory<T>> {
        &self.directory
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ConversationUpdate> {
        self.updates.subscribe()
    }

    /// Switch between free-form chat and guided assessment.
    ///
    /// Messages already in the log are kept as they are.
    pub fn set_mode(&mut self, mode: ChatMode) {
        if self.mode != mode {
            self.cancel.cancel();
            tracing::info!(from = ?self.mode, to = ?mode, "Switching chat mode");
            self.mode = mode;
        }
    }

    /// Send a free-form message.
    ///
    /// The user's message is appended before the exchange starts. A failed
    /// stream discards only the assistant placeholder; a failed
    /// request/response exchange also rolls back the user's message.
    pub async fn send(&mut self, text: &str) -> Result<(), ChatError> {
        if self.mode == ChatMode::Guided {
            return Err(ChatError::invalid_request(
                "A symptom assessment is in progress",
            ));
        }
        let text = text.trim();
        if text.is_empty() {
            return Err(ChatError::invalid_request("Message cannot be empty"));
        }

        let user = OptimisticAppend::apply(&mut self.log, Message::user(text));
        self.announce(user.id());

        if self.streaming && self.role().supports_streaming() {
            user.commit();
            self.send_streaming(text).await
        } else {
            self.send_single(text, user).await
        }
    }

    async fn send_streaming(&mut self, text: &str) -> Result<(), ChatError> {
        let placeholder = self.log.push(Message::placeholder());
        self.announce(placeholder);

        let cancel = self.cancel.begin();
        let request = StreamRequest {
            message: text.to_string(),
            session_id: self.session.id().cloned(),
        };
        let mut sink = LogSink {
            log: &mut self.log,
            session: &mut self.session,
            updates: &self.updates,
            id: placeholder,
        };

        let outcome = self.driver.run(request, &mut sink, &cancel).await;
        if outcome == StreamOutcome::Cancelled {
            self.discard(placeholder);
        }
        outcome.into_result()?;
        self.refresh_directory().await;
        Ok(())
    }

    async fn send_single(&mut self, text: &str, user: OptimisticAppend) -> Result<(), ChatError> {
        let request = ChatRequest {
            message: text.to_string(),
            session_id: self.session.id().cloned(),
            symptom_checker_mode: false,
            selected_option: None,
        };

        let result = self.exchange(&request).await;
        match result {
            Ok(response) => {
                user.commit();
                self.accept_reply(&response, None);
                self.refresh_directory().await;
                Ok(())
            }
            Err(e) => {
                self.roll_back(user, &e);
                Err(e)
            }
        }
    }

    /// Send one guided-mode exchange and return the reply's assessment metadata.
    ///
    /// The start request appends no user message. Failures roll back the
    /// user's answer so the same step can be retried.
    pub async fn send_guided(&mut self, input: GuidedInput) -> Result<GuidedMeta, ChatError> {
        if !self.supports_guided() {
            return Err(ChatError::invalid_request(format!(
                "Symptom assessment is not available for the {} role",
                self.role()
            )));
        }
        if self.mode != ChatMode::Guided {
            return Err(ChatError::invalid_request("Guided mode is not active"));
        }

        let (message, selected_option) = match input {
            GuidedInput::Start => (String::new(), None),
            GuidedInput::Option(option) => (option.clone(), Some(option)),
            GuidedInput::FreeText(text) => {
                let text = text.trim();
                if text.is_empty() {
                    return Err(ChatError::invalid_request("Answer cannot be empty"));
                }
                (text.to_string(), None)
            }
        };
        let is_start = message.is_empty() && selected_option.is_none();

        let user = if is_start {
            None
        } else {
            let user = OptimisticAppend::apply(&mut self.log, Message::user(&message));
            self.announce(user.id());
            Some(user)
        };

        let request = ChatRequest {
            message,
            session_id: self.session.id().cloned(),
            symptom_checker_mode: true,
            selected_option,
        };

        let result = self.exchange(&request).await;
        match result {
            Ok(response) => {
                if let Some(user) = user {
                    user.commit();
                }
                let meta = GuidedMeta::from_response(&response);
                self.accept_reply(&response, Some(meta.clone()));
                self.refresh_directory().await;
                Ok(meta)
            }
            Err(e) => {
                match user {
                    Some(user) => self.roll_back(user, &e),
                    None => self.notify_failure(&e),
                }
                Err(e)
            }
        }
    }

    /// Start a fresh local conversation with no session id
    pub fn new_session(&mut self) {
        self.replace(ActiveSession::unassigned(), Vec::new());
    }

    /// Create a session on the server and make it the active one
    pub async fn create_session(&mut self) -> Result<SessionId, ChatError> {
        let id = self.directory.create().await?;
        self.replace(ActiveSession::with_id(id.clone()), Vec::new());
        Ok(id)
    }

    /// Replace the active session and log with a stored session's history
    pub async fn load_session(&mut self, id: SessionId) -> Result<(), ChatError> {
        self.cancel.cancel();
        let messages = self.directory.load(&id).await?;
        tracing::info!(session_id = %id, messages = messages.len(), "Loaded session");
        self.replace(ActiveSession::with_id(id), messages);
        Ok(())
    }

    /// Delete a stored session. Returns true if it was the active one, in
    /// which case the active session and log have been cleared.
    pub async fn delete_session(&mut self, id: &SessionId) -> Result<bool, ChatError> {
        self.directory.delete(id).await?;
        if self.session.id() == Some(id) {
            self.new_session();
            return Ok(true);
        }
        Ok(false)
    }

    /// Reset the server's conversation memory; the local log is kept
    pub async fn clear_memory(&mut self) -> Result<(), ChatError> {
        let response = self.transport.clear(self.credential.as_ref()).await?;
        if !response.success {
            return Err(ChatError::remote(
                response
                    .message
                    .unwrap_or_else(|| "Failed to clear conversation".to_string()),
            ));
        }
        Ok(())
    }

    pub async fn health(&self) -> Result<HealthResponse, ChatError> {
        self.transport.health(self.credential.as_ref()).await
    }

    async fn exchange(&self, request: &ChatRequest) -> Result<ChatResponse, ChatError> {
        let cancel = self.cancel.begin();
        let result = tokio::select! {
            biased;
            () = cancel.cancelled() => Err(ChatError::cancelled()),
            result = self.transport.chat(request, self.credential.as_ref()) => result,
        };
        let response = result?;
        if !response.success {
            let message = if response.response.is_empty() {
                "Request failed".to_string()
            } else {
                response.response
            };
            return Err(ChatError::remote(message));
        }
        Ok(response)
    }

    fn accept_reply(&mut self, response: &ChatResponse, guided: Option<GuidedMeta>) -> MessageId {
        if let Some(id) = &response.session_id {
            if self.session.adopt(id.clone()) {
                self.publish(ConversationUpdate::SessionAdopted { id: id.clone() });
            }
        }

        let mut message = Message::assistant(response.response.clone());
        message.source.clone_from(&response.source);
        message.timestamp.clone_from(&response.timestamp);
        message.guided = guided;

        let id = self.log.push(message);
        self.announce(id);
        id
    }

    fn roll_back(&mut self, user: OptimisticAppend, error: &ChatError) {
        if let Some(message) = user.compensate(&mut self.log) {
            self.publish(ConversationUpdate::MessageDiscarded { id: message.id() });
        }
        self.notify_failure(error);
    }

    fn notify_failure(&self, error: &ChatError) {
        if error.is_cancelled() {
            return;
        }
        tracing::warn!(
            kind = ?error.kind,
            retryable = error.kind.is_retryable(),
            error = %error,
            "Exchange failed"
        );
        self.publish(ConversationUpdate::Notice {
            message: error.to_string(),
        });
    }

    fn discard(&mut self, id: MessageId) {
        if self.log.remove(id).is_some() {
            self.publish(ConversationUpdate::MessageDiscarded { id });
        }
    }

    fn replace(&mut self, session: ActiveSession, messages: Vec<Message>) {
        self.cancel.cancel();
        self.session = session;
        self.log.replace(messages);
        self.publish(ConversationUpdate::LogReplaced {
            session_id: self.session.id().cloned(),
            messages: self.log.messages().to_vec(),
        });
    }

    async fn refresh_directory(&self) {
        if let Err(e) = self.directory.refresh().await {
            tracing::warn!(error = %e, "Failed to refresh session list");
        }
    }

    fn announce(&self, id: MessageId) {
        if let Some(message) = self.log.get(id) {
            self.publish(ConversationUpdate::MessageAppended {
                message: message.clone(),
            });
        }
    }

    fn publish(&self, update: ConversationUpdate) {
        // No subscribers is fine
        let _ = self.updates.send(update);
    }
}

/// Binds one streaming exchange to its placeholder message
struct LogSink<'a> {
    log: &'a mut MessageLog,
    session: &'a mut ActiveSession,
    updates: &'a broadcast::Sender<ConversationUpdate>,
    id: MessageId,
}

impl LogSink<'_> {
    fn publish(&self, update: ConversationUpdate) {
        let _ = self.updates.send(update);
    }
}

impl StreamObserver for LogSink<'_> {
    fn on_token(&mut self, content: &str) {
        if let Some(message) = self.log.get_mut(self.id) {
            message.content.push_str(content);
        }
        self.publish(ConversationUpdate::TokenAppended {
            id: self.id,
            content: content.to_string(),
        });
    }

    fn on_source(&mut self, label: &str) {
        if let Some(message) = self.log.get_mut(self.id) {
            message.source = Some(label.to_string());
        }
        self.publish(ConversationUpdate::SourceLabeled {
            id: self.id,
            label: label.to_string(),
        });
    }

    fn on_session_id(&mut self, id: &SessionId) {
        if self.session.adopt(id.clone()) {
            self.publish(ConversationUpdate::SessionAdopted { id: id.clone() });
        }
    }

    fn on_complete(&mut self, source: Option<&str>) {
        if let Some(message) = self.log.get_mut(self.id) {
            if let Some(source) = source {
                message.source = Some(source.to_string());
            }
            message.streaming = false;
            message.timestamp = Some(chrono::Local::now().format("%I:%M %p").to_string());
        }
        self.publish(ConversationUpdate::MessageFrozen { id: self.id });
    }

    fn on_error(&mut self, error: &ChatError) {
        if self.log.remove(self.id).is_some() {
            self.publish(ConversationUpdate::MessageDiscarded { id: self.id });
        }
        self.publish(ConversationUpdate::Notice {
            message: error.to_string(),
        });
    }
}
