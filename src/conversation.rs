//! Conversation state and the controller that drives it
//!
//! - `message` - the message log and the optimistic append command
//! - `session` - identity of the active conversation
//! - `update` - notifications published to front ends
//! - `controller` - send paths, session switching, mode switching

mod controller;
mod message;
mod session;
mod update;

pub use controller::{CancelHandle, ChatMode, ConversationController, GuidedInput};
pub use message::{GuidedMeta, Message, MessageId, MessageLog, MessageRole, OptimisticAppend};
pub use session::ActiveSession;
pub use update::ConversationUpdate;
