use relay_logging::relay_warn;

use crate::{AppState, Effect, Msg};

/// Pure update function: applies a message to state and returns any effects.
pub fn update(mut state: AppState, msg: Msg) -> (AppState, Vec<Effect>) {
    let effects = match msg {
        Msg::WorkflowStarted {
            workflow_id,
            prompt,
            now,
        } => state.start_workflow(&workflow_id, prompt.as_deref(), now),
        Msg::WorkflowResumed { workflow_id } => state.start_workflow(&workflow_id, None, 0),
        Msg::SnapshotReceived { poll, now } => state.apply_poll(poll, now),
        Msg::PollFailed {
            workflow_id,
            reason,
        } => {
            relay_warn!("poll for {} failed: {}", workflow_id, reason);
            Vec::new()
        }
        Msg::FeedbackSubmitted { answer, now } => state.submit_feedback(&answer, now),
        Msg::FeedbackResolved {
            workflow_id,
            outcome,
            now,
        } => state.resolve_feedback(&workflow_id, outcome, now),
        Msg::NotificationResponded {
            subnet_index,
            accepted,
            now,
        } => state.respond_to_notification(subnet_index, accepted, now),
        Msg::StopClicked => state.stop(),
        Msg::Reset => state.reset(),
        Msg::Tick | Msg::NoOp => Vec::new(),
    };

    (state, effects)
}
