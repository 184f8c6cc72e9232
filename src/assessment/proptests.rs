//! Property-based tests for the assessment state machine
//!
//! These tests verify key invariants hold across all possible inputs.

use super::*;
use crate::conversation::{GuidedInput, GuidedMeta};
use crate::error::AssessmentError;
use proptest::prelude::*;

// ============================================================================
// Arbitrary Generators
// ============================================================================

fn arb_options() -> impl Strategy<Value = Vec<String>> {
    proptest::collection::vec("[A-Za-z/ ]{1,12}", 0..5)
}

fn arb_step() -> impl Strategy<Value = SymptomStep> {
    (1u32..20, 1u32..20, arb_options()).prop_map(|(step, total_steps, options)| SymptomStep {
        step,
        total_steps,
        options,
    })
}

fn arb_meta() -> impl Strategy<Value = GuidedMeta> {
    (
        any::<bool>(),
        arb_options(),
        proptest::option::of(1u32..20),
        proptest::option::of(1u32..20),
    )
        .prop_map(|(is_follow_up, options, symptom_step, total_steps)| GuidedMeta {
            is_follow_up,
            options,
            symptom_step,
            total_steps,
        })
}

fn arb_answer() -> impl Strategy<Value = Answer> {
    prop_oneof![
        "[a-zA-Z ]{0,16}".prop_map(Answer::Option),
        "[a-zA-Z ]{0,16}".prop_map(Answer::FreeText),
    ]
}

fn arb_state() -> impl Strategy<Value = SymptomState> {
    prop_oneof![
        Just(SymptomState::NotStarted),
        Just(SymptomState::Starting),
        arb_step().prop_map(SymptomState::Active),
        arb_step().prop_map(SymptomState::Answering),
        Just(SymptomState::Completed),
    ]
}

fn arb_event() -> impl Strategy<Value = AssessmentEvent> {
    prop_oneof![
        Just(AssessmentEvent::Start),
        arb_answer().prop_map(AssessmentEvent::Answer),
        arb_meta().prop_map(AssessmentEvent::Reply),
        Just(AssessmentEvent::Failed),
        Just(AssessmentEvent::Cancel),
    ]
}

fn sends(result: &TransitionResult) -> usize {
    result
        .effects
        .iter()
        .filter(|e| matches!(e, AssessmentEffect::SendGuided(_)))
        .count()
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    #[test]
    fn prop_transition_is_deterministic(state in arb_state(), event in arb_event()) {
        let a = transition(&state, event.clone());
        let b = transition(&state, event);
        prop_assert_eq!(a, b);
    }

    #[test]
    fn prop_busy_states_reject_input(
        state in prop_oneof![
            Just(SymptomState::Starting),
            arb_step().prop_map(SymptomState::Answering),
        ],
        answer in arb_answer(),
    ) {
        prop_assert_eq!(transition(&state, AssessmentEvent::Start), Err(AssessmentError::Busy));
        prop_assert_eq!(
            transition(&state, AssessmentEvent::Answer(answer)),
            Err(AssessmentError::Busy)
        );
    }

    #[test]
    fn prop_failure_never_advances(step in arb_step()) {
        let result = transition(&SymptomState::Answering(step.clone()), AssessmentEvent::Failed).unwrap();
        prop_assert_eq!(result.new_state, SymptomState::Active(step));
        prop_assert!(result.effects.is_empty());
    }

    #[test]
    fn prop_follow_up_step_metadata(step in arb_step(), mut meta in arb_meta()) {
        meta.is_follow_up = true;
        let result = transition(&SymptomState::Answering(step.clone()), AssessmentEvent::Reply(meta.clone())).unwrap();
        let next = result.new_state.step().cloned().unwrap();

        prop_assert_eq!(next.step, meta.symptom_step.unwrap_or(step.step + 1));
        prop_assert_eq!(next.total_steps, meta.total_steps.unwrap_or(step.total_steps));
        prop_assert_eq!(next.options, meta.options);
    }

    #[test]
    fn prop_any_answer_text_is_accepted(step in arb_step(), answer in arb_answer()) {
        let result = transition(&SymptomState::Active(step.clone()), AssessmentEvent::Answer(answer.clone()));
        if answer.is_empty() {
            prop_assert_eq!(result, Err(AssessmentError::EmptyAnswer));
        } else {
            let result = result.unwrap();
            prop_assert_eq!(result.new_state, SymptomState::Answering(step));
            prop_assert_eq!(result.effects, vec![AssessmentEffect::SendGuided(answer.into_input())]);
        }
    }

    #[test]
    fn prop_walk_sends_only_from_idle_and_settles_from_busy(
        events in proptest::collection::vec(arb_event(), 1..40),
    ) {
        let mut state = SymptomState::NotStarted;
        for event in events {
            let was_busy = state.is_busy();
            let is_settling = matches!(event, AssessmentEvent::Reply(_) | AssessmentEvent::Failed);
            let Ok(result) = transition(&state, event) else {
                continue;
            };

            // An exchange is started exactly when entering a busy state
            prop_assert_eq!(sends(&result) == 1, result.new_state.is_busy() && !was_busy);
            prop_assert!(sends(&result) <= 1);

            // Replies and failures only apply to an exchange in flight
            if is_settling {
                prop_assert!(was_busy);
                prop_assert!(!result.new_state.is_busy());
            }

            if let SymptomState::Starting = result.new_state {
                prop_assert!(result.effects.contains(&AssessmentEffect::SendGuided(GuidedInput::Start)));
            }
            state = result.new_state;
        }
    }
}
