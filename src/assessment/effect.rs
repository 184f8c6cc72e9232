//! Effects produced by assessment transitions

use crate::conversation::GuidedInput;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssessmentEffect {
    /// Switch the controller into guided mode
    EnterGuidedMode,
    /// Return the controller to free-form chat
    LeaveGuidedMode,
    /// Send one exchange through the controller's guided path
    SendGuided(GuidedInput),
}
