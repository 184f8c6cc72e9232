//! Pure state transition function
//!
//! Given the same state and event this always yields the same result and
//! performs no I/O; the runner executes the returned effects.

use super::{AssessmentEffect, AssessmentEvent, SymptomState, SymptomStep};
use crate::conversation::{GuidedInput, GuidedMeta};
use crate::error::AssessmentError;

/// Result of a state transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionResult {
    pub new_state: SymptomState,
    pub effects: Vec<AssessmentEffect>,
}

impl TransitionResult {
    pub fn new(state: SymptomState) -> Self {
        Self {
            new_state: state,
            effects: vec![],
        }
    }

    pub fn with_effect(mut self, effect: AssessmentEffect) -> Self {
        self.effects.push(effect);
        self
    }
}

pub fn transition(
    state: &SymptomState,
    event: AssessmentEvent,
) -> Result<TransitionResult, AssessmentError> {
    match (state, event) {
        // ============================================================
        // Entry
        // ============================================================
        (SymptomState::NotStarted | SymptomState::Completed, AssessmentEvent::Start) => {
            Ok(TransitionResult::new(SymptomState::Starting)
                .with_effect(AssessmentEffect::EnterGuidedMode)
                .with_effect(AssessmentEffect::SendGuided(GuidedInput::Start)))
        }

        (SymptomState::Active(_), AssessmentEvent::Start) => Err(
            AssessmentError::InvalidTransition("assessment already in progress".to_string()),
        ),

        // ============================================================
        // Answers
        // ============================================================
        (SymptomState::Active(step), AssessmentEvent::Answer(answer)) => {
            if answer.is_empty() {
                return Err(AssessmentError::EmptyAnswer);
            }
            Ok(TransitionResult::new(SymptomState::Answering(step.clone()))
                .with_effect(AssessmentEffect::SendGuided(answer.into_input())))
        }

        (SymptomState::NotStarted | SymptomState::Completed, AssessmentEvent::Answer(_)) => Err(
            AssessmentError::InvalidTransition("no assessment in progress".to_string()),
        ),

        // Busy states reject new input until the exchange settles
        (
            SymptomState::Starting | SymptomState::Answering(_),
            AssessmentEvent::Start | AssessmentEvent::Answer(_),
        ) => Err(AssessmentError::Busy),

        // ============================================================
        // Replies
        // ============================================================
        (SymptomState::Starting, AssessmentEvent::Reply(meta)) => Ok(after_reply(None, &meta)),

        (SymptomState::Answering(step), AssessmentEvent::Reply(meta)) => {
            Ok(after_reply(Some(step), &meta))
        }

        // ============================================================
        // Failures: nothing advances
        // ============================================================
        (SymptomState::Starting, AssessmentEvent::Failed) => {
            Ok(TransitionResult::new(SymptomState::NotStarted)
                .with_effect(AssessmentEffect::LeaveGuidedMode))
        }

        (SymptomState::Answering(step), AssessmentEvent::Failed) => {
            Ok(TransitionResult::new(SymptomState::Active(step.clone())))
        }

        // ============================================================
        // Cancellation
        // ============================================================
        (SymptomState::NotStarted, AssessmentEvent::Cancel) => {
            Ok(TransitionResult::new(SymptomState::NotStarted))
        }

        (_, AssessmentEvent::Cancel) => Ok(TransitionResult::new(SymptomState::NotStarted)
            .with_effect(AssessmentEffect::LeaveGuidedMode)),

        (state, event) => Err(AssessmentError::InvalidTransition(format!(
            "{event:?} in state {state:?}"
        ))),
    }
}

fn after_reply(previous: Option<&SymptomStep>, meta: &GuidedMeta) -> TransitionResult {
    if meta.is_follow_up {
        TransitionResult::new(SymptomState::Active(SymptomStep::from_reply(previous, meta)))
    } else {
        TransitionResult::new(SymptomState::Completed)
            .with_effect(AssessmentEffect::LeaveGuidedMode)
    }
}
