//! Runs assessment transitions against a conversation controller

use super::{transition, Answer, AssessmentEffect, AssessmentEvent, SymptomState};
use crate::conversation::{ChatMode, ConversationController};
use crate::error::{AssessmentError, ChatError};
use crate::transport::ChatTransport;
use std::collections::VecDeque;

/// A symptom assessment layered on a conversation.
///
/// Exchanges go through the controller's guided send path, so the
/// questions and answers land in the same message log as free-form chat.
#[derive(Debug, Default)]
pub struct SymptomAssessment {
    state: SymptomState,
}

impl SymptomAssessment {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pick up an assessment left open in a loaded conversation
    pub fn resume<T: ChatTransport>(controller: &mut ConversationController<T>) -> Self {
        let state = SymptomState::resume_from(controller.log());
        controller.set_mode(if state.is_follow_up() {
            ChatMode::Guided
        } else {
            ChatMode::FreeForm
        });
        Self { state }
    }

    pub fn state(&self) -> &SymptomState {
        &self.state
    }

    pub async fn start<T: ChatTransport>(
        &mut self,
        controller: &mut ConversationController<T>,
    ) -> Result<&SymptomState, AssessmentError> {
        if !controller.supports_guided() {
            return Err(ChatError::invalid_request(format!(
                "Symptom assessment is not available for the {} role",
                controller.role()
            ))
            .into());
        }
        self.handle(controller, AssessmentEvent::Start).await
    }

    pub async fn answer<T: ChatTransport>(
        &mut self,
        controller: &mut ConversationController<T>,
        answer: Answer,
    ) -> Result<&SymptomState, AssessmentError> {
        self.handle(controller, AssessmentEvent::Answer(answer)).await
    }

    /// Leave the assessment; messages already in the log stay
    pub fn cancel<T: ChatTransport>(&mut self, controller: &mut ConversationController<T>) {
        match transition(&self.state, AssessmentEvent::Cancel) {
            Ok(result) => {
                self.state = result.new_state;
                for effect in result.effects {
                    apply_mode(controller, &effect);
                }
                tracing::info!("Symptom assessment cancelled");
            }
            Err(e) => tracing::warn!(error = %e, "Cancel rejected"),
        }
    }

    async fn handle<T: ChatTransport>(
        &mut self,
        controller: &mut ConversationController<T>,
        event: AssessmentEvent,
    ) -> Result<&SymptomState, AssessmentError> {
        let mut pending = VecDeque::from([event]);
        let mut failure: Option<ChatError> = None;

        while let Some(event) = pending.pop_front() {
            let result = transition(&self.state, event)?;
            tracing::debug!(from = ?self.state, to = ?result.new_state, "Assessment transition");
            self.state = result.new_state;

            for effect in result.effects {
                match effect {
                    AssessmentEffect::SendGuided(input) => {
                        match controller.send_guided(input).await {
                            Ok(meta) => pending.push_back(AssessmentEvent::Reply(meta)),
                            Err(e) => {
                                tracing::warn!(error = %e, "Assessment step failed");
                                failure = Some(e);
                                pending.push_back(AssessmentEvent::Failed);
                            }
                        }
                    }
                    effect => apply_mode(controller, &effect),
                }
            }
        }

        if let Some(step) = self.state.step() {
            tracing::info!(step = step.step, total_steps = step.total_steps, "Assessment step");
        }
        match failure {
            Some(e) => Err(e.into()),
            None => Ok(&self.state),
        }
    }
}

fn apply_mode<T: ChatTransport>(
    controller: &mut ConversationController<T>,
    effect: &AssessmentEffect,
) {
    match effect {
        AssessmentEffect::EnterGuidedMode => controller.set_mode(ChatMode::Guided),
        AssessmentEffect::LeaveGuidedMode => controller.set_mode(ChatMode::FreeForm),
        AssessmentEffect::SendGuided(_) => {}
    }
}
