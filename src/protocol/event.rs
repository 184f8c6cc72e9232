//! Events carried by a streamed assistant reply

use super::SessionId;

/// One decoded event frame.
///
/// Variants are `non_exhaustive` so that code outside this crate can only
/// obtain events from a [`FrameParser`](super::FrameParser).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// Next fragment of the assistant's answer
    #[non_exhaustive]
    Token { content: String },
    /// Label of the knowledge source backing the answer
    #[non_exhaustive]
    Source { label: String },
    /// Server assigned (or confirmed) the conversation's session
    #[non_exhaustive]
    SessionAssigned { id: SessionId },
    /// Answer finished; carries the final source label if the server sent one
    #[non_exhaustive]
    Done { source: Option<String> },
    /// Server reported a failure in-band
    #[non_exhaustive]
    Error { message: String },
}
