//! Identity of the active conversation

use crate::protocol::SessionId;

/// The session the controller is currently talking in.
///
/// The id starts unset and can be assigned once. Switching to another
/// conversation replaces the whole value rather than mutating the id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActiveSession {
    id: Option<SessionId>,
}

impl ActiveSession {
    /// A conversation the server has not assigned an id to yet
    pub fn unassigned() -> Self {
        Self::default()
    }

    pub fn with_id(id: SessionId) -> Self {
        Self { id: Some(id) }
    }

    pub fn id(&self) -> Option<&SessionId> {
        self.id.as_ref()
    }

    /// Adopt a server-assigned id. Returns false (and changes nothing) if
    /// an id is already held.
    pub fn adopt(&mut self, id: SessionId) -> bool {
        if let Some(current) = &self.id {
            if *current != id {
                tracing::warn!(current = %current, offered = %id, "Ignoring session id reassignment");
            }
            return false;
        }
        tracing::info!(session_id = %id, "Adopted session id");
        self.id = Some(id);
        true
    }
}
