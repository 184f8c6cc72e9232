//! Streaming session driver
//!
//! Owns one in-flight streaming exchange: opens the stream, feeds fragments
//! to a [`FrameParser`] and dispatches the decoded events to a
//! [`StreamObserver`]. Exactly one terminal callback fires per exchange
//! unless the exchange is cancelled, in which case callbacks simply stop.

use crate::config::Credential;
use crate::error::ChatError;
use crate::protocol::{FrameParser, SessionId, StreamEvent, StreamRequest};
use crate::transport::ChatTransport;
use futures::StreamExt;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Receiver of one exchange's callbacks.
///
/// `on_complete` and `on_error` are terminal: after either, no other method
/// is called for the same exchange.
pub trait StreamObserver: Send {
    fn on_token(&mut self, content: &str);
    fn on_source(&mut self, label: &str);
    /// Fires at most once, and only when the request carried no session id
    fn on_session_id(&mut self, id: &SessionId);
    fn on_complete(&mut self, source: Option<&str>);
    fn on_error(&mut self, error: &ChatError);
}

/// How an exchange ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamOutcome {
    Completed { source: Option<String> },
    Failed(ChatError),
    /// The cancellation token fired; no terminal callback was invoked
    Cancelled,
}

impl StreamOutcome {
    pub fn into_result(self) -> Result<Option<String>, ChatError> {
        match self {
            StreamOutcome::Completed { source } => Ok(source),
            StreamOutcome::Failed(e) => Err(e),
            StreamOutcome::Cancelled => Err(ChatError::cancelled()),
        }
    }
}

/// Drives streaming exchanges on behalf of one credential.
///
/// The credential is resolved by the caller once and passed in here; the
/// driver never looks up the active role itself.
pub struct StreamDriver<T: ChatTransport> {
    transport: Arc<T>,
    credential: Option<Credential>,
}

impl<T: ChatTransport> StreamDriver<T> {
    pub fn new(transport: Arc<T>, credential: Option<Credential>) -> Self {
        Self {
            transport,
            credential,
        }
    }

    /// Run one exchange to its end.
    ///
    /// The token is checked before every callback; once it fires the
    /// exchange is abandoned and pending reads are dropped unobserved.
    pub async fn run(
        &self,
        request: StreamRequest,
        observer: &mut dyn StreamObserver,
        cancel: &CancellationToken,
    ) -> StreamOutcome {
        let exchange_id = Uuid::new_v4();
        let mut exchange = Exchange {
            id: exchange_id,
            observer,
            cancel,
            adopt_session: request.session_id.is_none(),
            session_reported: false,
            last_source: None,
            tokens: 0,
        };

        tracing::info!(
            exchange_id = %exchange_id,
            session_id = ?request.session_id.as_ref().map(SessionId::as_str),
            "Opening stream"
        );

        let opened = tokio::select! {
            biased;
            () = cancel.cancelled() => return exchange.cancelled(),
            result = self.transport.open_stream(&request, self.credential.as_ref()) => result,
        };
        let mut fragments = match opened {
            Ok(fragments) => fragments,
            Err(e) => return exchange.fail(e),
        };

        let mut parser = FrameParser::new();
        loop {
            let next = tokio::select! {
                biased;
                () = cancel.cancelled() => return exchange.cancelled(),
                next = fragments.next() => next,
            };

            match next {
                Some(Ok(bytes)) => {
                    for event in parser.feed(&bytes) {
                        if let Some(outcome) = exchange.dispatch(event) {
                            return outcome;
                        }
                    }
                    if parser.is_finished() {
                        return exchange.complete(None);
                    }
                }
                Some(Err(e)) => return exchange.fail(e),
                None => {
                    for event in parser.finish() {
                        if let Some(outcome) = exchange.dispatch(event) {
                            return outcome;
                        }
                    }
                    if parser.is_finished() {
                        return exchange.complete(None);
                    }
                    return exchange.fail(ChatError::stream_aborted(
                        "Stream closed before the reply completed",
                    ));
                }
            }
        }
    }
}

/// Per-exchange dispatch state
struct Exchange<'a> {
    id: Uuid,
    observer: &'a mut dyn StreamObserver,
    cancel: &'a CancellationToken,
    adopt_session: bool,
    session_reported: bool,
    last_source: Option<String>,
    tokens: usize,
}

impl Exchange<'_> {
    /// Deliver one event; returns the outcome if it ended the exchange
    fn dispatch(&mut self, event: StreamEvent) -> Option<StreamOutcome> {
        if self.cancel.is_cancelled() {
            return Some(self.cancelled());
        }

        match event {
            StreamEvent::Token { content } => {
                self.tokens += 1;
                self.observer.on_token(&content);
                None
            }
            StreamEvent::Source { label } => {
                self.observer.on_source(&label);
                self.last_source = Some(label);
                None
            }
            StreamEvent::SessionAssigned { id } => {
                if self.adopt_session && !self.session_reported {
                    self.session_reported = true;
                    self.observer.on_session_id(&id);
                } else {
                    tracing::trace!(exchange_id = %self.id, session_id = %id, "Ignoring repeated session frame");
                }
                None
            }
            StreamEvent::Done { source } => Some(self.complete(source)),
            StreamEvent::Error { message } => Some(self.fail(ChatError::remote(message))),
        }
    }

    fn complete(&mut self, source: Option<String>) -> StreamOutcome {
        if self.cancel.is_cancelled() {
            return self.cancelled();
        }
        let source = source.or_else(|| self.last_source.take());
        tracing::info!(exchange_id = %self.id, tokens = self.tokens, "Stream completed");
        self.observer.on_complete(source.as_deref());
        StreamOutcome::Completed { source }
    }

    fn fail(&mut self, error: ChatError) -> StreamOutcome {
        if self.cancel.is_cancelled() {
            return self.cancelled();
        }
        tracing::warn!(exchange_id = %self.id, kind = ?error.kind, error = %error, "Stream failed");
        self.observer.on_error(&error);
        StreamOutcome::Failed(error)
    }

    fn cancelled(&self) -> StreamOutcome {
        tracing::info!(exchange_id = %self.id, tokens = self.tokens, "Stream cancelled");
        StreamOutcome::Cancelled
    }
}
