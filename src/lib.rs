//! HealthMate Assist - conversational assistant client engine
//!
//! Streams assistant replies from the HealthMate backend, keeps the
//! message log and session identity of the active conversation, manages
//! stored sessions, and drives the guided symptom assessment.

#![allow(clippy::missing_errors_doc, clippy::must_use_candidate)]

pub mod assessment;
pub mod config;
pub mod conversation;
pub mod directory;
pub mod driver;
pub mod error;
pub mod protocol;
pub mod transport;

pub use assessment::{Answer, SymptomAssessment, SymptomState, SymptomStep};
pub use config::{ClientConfig, ConfigError, Credential, Credentials, Role};
pub use conversation::{
    CancelHandle, ChatMode, ConversationController, ConversationUpdate, GuidedInput, Message,
    MessageRole,
};
pub use directory::{Session, SessionDirectory};
pub use driver::{StreamDriver, StreamObserver, StreamOutcome};
pub use error::{AssessmentError, ChatError, ChatErrorKind};
pub use protocol::{FrameParser, SessionId, StreamEvent};
pub use transport::{ChatTransport, HttpTransport};
