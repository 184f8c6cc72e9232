//! Notifications published by the conversation controller

use super::{Message, MessageId};
use crate::protocol::SessionId;

/// Incremental change to the conversation, for front ends to render
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConversationUpdate {
    MessageAppended { message: Message },
    TokenAppended { id: MessageId, content: String },
    SourceLabeled { id: MessageId, label: String },
    SessionAdopted { id: SessionId },
    /// A streamed message finished and will not change again
    MessageFrozen { id: MessageId },
    /// A message was removed (failed stream or rolled-back turn)
    MessageDiscarded { id: MessageId },
    /// The whole log changed (new or loaded session)
    LogReplaced {
        session_id: Option<SessionId>,
        messages: Vec<Message>,
    },
    /// Transient user-facing notice, usually a failure
    Notice { message: String },
}
