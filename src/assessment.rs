//! Symptom assessment state machine
//!
//! A bounded question/option dialogue layered on the conversation's guided
//! send path. Transitions are pure ([`transition`]); the
//! [`SymptomAssessment`] runner executes their effects.

mod effect;
mod event;
mod runner;
mod state;
mod transition;

#[cfg(test)]
mod proptests;

pub use effect::AssessmentEffect;
pub use event::{Answer, AssessmentEvent};
pub use runner::SymptomAssessment;
pub use state::{SymptomState, SymptomStep, DEFAULT_TOTAL_STEPS};
pub use transition::{transition, TransitionResult};
