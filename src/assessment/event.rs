//! Events driving the assessment

use crate::conversation::{GuidedInput, GuidedMeta};

/// The user's answer to the current step.
///
/// Free text is accepted at every step, not only the offered options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Answer {
    Option(String),
    FreeText(String),
}

impl Answer {
    pub fn is_empty(&self) -> bool {
        match self {
            Answer::Option(text) | Answer::FreeText(text) => text.trim().is_empty(),
        }
    }

    pub fn into_input(self) -> GuidedInput {
        match self {
            Answer::Option(option) => GuidedInput::Option(option),
            Answer::FreeText(text) => GuidedInput::FreeText(text),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssessmentEvent {
    /// User asked to begin (or restart) the assessment
    Start,
    Answer(Answer),
    /// Backend replied to the in-flight exchange
    Reply(GuidedMeta),
    /// The in-flight exchange failed
    Failed,
    /// User left the assessment
    Cancel,
}
