//! Message log and the optimistic append command

use crate::protocol::{ChatResponse, HistoryMessage};

/// Local identifier of a log entry, unique within one [`MessageLog`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MessageId(u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageRole {
    User,
    Assistant,
}

impl MessageRole {
    pub fn as_str(self) -> &'static str {
        match self {
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
        }
    }
}

/// Symptom assessment metadata carried by a guided assistant reply
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct GuidedMeta {
    pub is_follow_up: bool,
    pub options: Vec<String>,
    pub symptom_step: Option<u32>,
    pub total_steps: Option<u32>,
}

impl GuidedMeta {
    pub fn from_response(response: &ChatResponse) -> Self {
        Self {
            is_follow_up: response.is_follow_up,
            options: response.options.clone().unwrap_or_default(),
            symptom_step: response.symptom_step,
            total_steps: response.total_steps,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    id: MessageId,
    pub role: MessageRole,
    pub content: String,
    pub source: Option<String>,
    pub timestamp: Option<String>,
    pub guided: Option<GuidedMeta>,
    /// Content is still being streamed in
    pub streaming: bool,
}

impl Message {
    fn draft(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            id: MessageId(0),
            role,
            content: content.into(),
            source: None,
            timestamp: None,
            guided: None,
            streaming: false,
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::draft(MessageRole::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::draft(MessageRole::Assistant, content)
    }

    /// Empty assistant message that a stream will fill in
    pub fn placeholder() -> Self {
        Self {
            streaming: true,
            ..Self::draft(MessageRole::Assistant, String::new())
        }
    }

    /// Convert a server-recorded message; unknown roles are dropped
    pub fn from_history(record: HistoryMessage) -> Option<Self> {
        let role = match record.role.as_str() {
            "user" => MessageRole::User,
            "assistant" | "bot" => MessageRole::Assistant,
            other => {
                tracing::debug!(role = other, "Skipping history message with unknown role");
                return None;
            }
        };
        Some(Self {
            source: record.source,
            timestamp: record.timestamp,
            ..Self::draft(role, record.content)
        })
    }

    pub fn id(&self) -> MessageId {
        self.id
    }
}

/// Append-ordered messages of the active session
#[derive(Debug, Default)]
pub struct MessageLog {
    entries: Vec<Message>,
    next_id: u64,
}

impl MessageLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a message, assigning its id
    pub fn push(&mut self, mut message: Message) -> MessageId {
        self.next_id += 1;
        message.id = MessageId(self.next_id);
        self.entries.push(message);
        MessageId(self.next_id)
    }

    pub fn get(&self, id: MessageId) -> Option<&Message> {
        self.entries.iter().find(|m| m.id == id)
    }

    pub fn get_mut(&mut self, id: MessageId) -> Option<&mut Message> {
        self.entries.iter_mut().find(|m| m.id == id)
    }

    pub fn remove(&mut self, id: MessageId) -> Option<Message> {
        let index = self.entries.iter().position(|m| m.id == id)?;
        Some(self.entries.remove(index))
    }

    /// Replace every entry, e.g. with a loaded session's history
    pub fn replace(&mut self, messages: impl IntoIterator<Item = Message>) {
        self.entries.clear();
        for message in messages {
            self.push(message);
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn messages(&self) -> &[Message] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn last_assistant(&self) -> Option<&Message> {
        self.entries
            .iter()
            .rev()
            .find(|m| m.role == MessageRole::Assistant)
    }
}

/// A message appended before the server confirmed it.
///
/// Holds what is needed to undo the append; dropping it without calling
/// [`compensate`](Self::compensate) keeps the message.
#[derive(Debug)]
#[must_use = "an optimistic append must be committed or compensated"]
pub struct OptimisticAppend {
    id: MessageId,
}

impl OptimisticAppend {
    pub fn apply(log: &mut MessageLog, message: Message) -> Self {
        Self {
            id: log.push(message),
        }
    }

    pub fn id(&self) -> MessageId {
        self.id
    }

    /// Keep the message
    pub fn commit(self) -> MessageId {
        self.id
    }

    /// Undo the append, returning the removed message
    pub fn compensate(self, log: &mut MessageLog) -> Option<Message> {
        log.remove(self.id)
    }
}
