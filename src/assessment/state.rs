//! Assessment state types

use crate::conversation::{GuidedMeta, MessageLog};

/// Flow length the backend uses when a reply does not say
pub const DEFAULT_TOTAL_STEPS: u32 = 5;

/// The question currently on screen
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymptomStep {
    pub step: u32,
    pub total_steps: u32,
    pub options: Vec<String>,
}

impl SymptomStep {
    /// Step described by a follow-up reply.
    ///
    /// A reply without `symptom_step` moves one past `previous` (or to the
    /// first step); one without `total_steps` keeps the previous total.
    pub fn from_reply(previous: Option<&SymptomStep>, meta: &GuidedMeta) -> Self {
        let step = meta
            .symptom_step
            .unwrap_or_else(|| previous.map_or(1, |p| p.step.saturating_add(1)));
        let total_steps = meta
            .total_steps
            .or_else(|| previous.map(|p| p.total_steps))
            .unwrap_or(DEFAULT_TOTAL_STEPS);
        Self {
            step,
            total_steps,
            options: meta.options.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SymptomState {
    #[default]
    NotStarted,

    /// Start request in flight
    Starting,

    /// Waiting for the user's answer to this step
    Active(SymptomStep),

    /// Answer to this step in flight; the step is kept for retry on failure
    Answering(SymptomStep),

    /// The backend gave its final assessment
    Completed,
}

impl SymptomState {
    /// An exchange is in flight
    pub fn is_busy(&self) -> bool {
        matches!(self, SymptomState::Starting | SymptomState::Answering(_))
    }

    pub fn step(&self) -> Option<&SymptomStep> {
        match self {
            SymptomState::Active(step) | SymptomState::Answering(step) => Some(step),
            _ => None,
        }
    }

    /// Whether the backend expects another answer
    pub fn is_follow_up(&self) -> bool {
        self.step().is_some()
    }

    /// Rebuild from the most recent assistant turn of a log
    pub fn resume_from(log: &MessageLog) -> Self {
        match log.last_assistant().and_then(|m| m.guided.as_ref()) {
            Some(meta) if meta.is_follow_up => {
                SymptomState::Active(SymptomStep::from_reply(None, meta))
            }
            Some(_) => SymptomState::Completed,
            None => SymptomState::NotStarted,
        }
    }
}
