use super::{DialogEvent, DialogState, StateMachineError, StateMachineResult};

/// Determine the target state for an event against the current state.
///
/// Idempotent no-ops (closing a closed dialog, reopening an open one) return
/// the current state rather than an error; genuinely illegal transitions
/// (activity is the only thing that can leave `Closed` besides `Reopen`)
/// return `InvalidTransition`.
pub fn determine_target_state(
    current: DialogState,
    event: &DialogEvent,
) -> StateMachineResult<DialogState> {
    let target = match (current, event) {
        // Activity keeps a dialog open, clears escalation, reopens closed
        (_, DialogEvent::Activity) => DialogState::Open,

        // Escalation marks an open dialog; informational only
        (DialogState::Open | DialogState::Escalated, DialogEvent::Escalate) => {
            DialogState::Escalated
        }

        // Inactivity close and manual close collapse open-family states
        (s, DialogEvent::InactivityClose | DialogEvent::Close) if s.is_open() => DialogState::Closed,
        // Closing a closed dialog is an idempotent no-op
        (DialogState::Closed, DialogEvent::Close | DialogEvent::InactivityClose) => {
            DialogState::Closed
        }

        (DialogState::Closed, DialogEvent::Reopen) => DialogState::Open,
        // Reopening an open dialog is an idempotent no-op
        (s, DialogEvent::Reopen) if s.is_open() => s,

        (from, event) => {
            return Err(StateMachineError::InvalidTransition {
                from: from.to_string(),
                event: event.to_string(),
            })
        }
    };

    Ok(target)
}
