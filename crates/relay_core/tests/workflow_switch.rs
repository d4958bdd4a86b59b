use std::sync::Once;

use pretty_assertions::assert_eq;
use relay_core::{update, AppState, Effect, Msg, StageSnapshot, StageStatus, StatusPoll, WorkflowStatus};

fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(relay_logging::initialize_for_tests);
}

fn start(state: AppState, workflow_id: &str) -> (AppState, Vec<Effect>) {
    update(
        state,
        Msg::WorkflowStarted {
            workflow_id: workflow_id.to_string(),
            prompt: Some(format!("prompt for {workflow_id}")),
            now: 0,
        },
    )
}

fn snapshot(workflow_id: &str, subnets: Vec<StageSnapshot>) -> Msg {
    Msg::SnapshotReceived {
        poll: StatusPoll {
            request_id: workflow_id.to_string(),
            workflow_status: WorkflowStatus::Running,
            subnets,
        },
        now: 1_000,
    }
}

fn done(text: &str) -> StageSnapshot {
    StageSnapshot::new(0, StageStatus::Done).with_data(format!(r#"{{"message":"{text}"}}"#))
}

#[test]
fn switching_stops_old_poller_and_forgets_its_state() {
    init_logging();
    let (state, _) = start(AppState::new(), "a");
    let (state, _) = update(state, snapshot("a", vec![done("result for a")]));
    assert!(state.cache().get("a", 0).is_some());

    let (state, effects) = start(state, "b");
    assert_eq!(
        effects,
        vec![
            Effect::StopPolling {
                workflow_id: "a".into()
            },
            Effect::StartPolling {
                workflow_id: "b".into()
            },
        ]
    );
    assert!(state.cache().get("a", 0).is_none());
    let view = state.view();
    assert_eq!(view.workflow_id.as_deref(), Some("b"));
    let contents: Vec<_> = view.transcript.into_iter().map(|m| m.content).collect();
    assert_eq!(contents, vec!["prompt for b", "Processing..."]);
}

#[test]
fn stale_snapshot_for_old_workflow_is_ignored() {
    init_logging();
    let (state, _) = start(AppState::new(), "a");
    let (state, _) = start(state, "b");

    let (next, effects) = update(state.clone(), snapshot("a", vec![done("late answer for a")]));
    assert!(effects.is_empty());
    assert_eq!(next, state);
}

#[test]
fn same_content_is_shown_again_for_a_new_workflow() {
    init_logging();
    let (state, _) = start(AppState::new(), "a");
    let (state, _) = update(state, snapshot("a", vec![done("shared output")]));
    let (state, _) = start(state, "b");
    let (state, _) = update(state, snapshot("b", vec![done("shared output")]));

    let contents: Vec<_> = state.view().transcript.into_iter().map(|m| m.content).collect();
    assert_eq!(contents, vec!["prompt for b", "shared output"]);
}

#[test]
fn stop_halts_and_is_idempotent() {
    init_logging();
    let (state, _) = start(AppState::new(), "a");
    let (state, effects) = update(state, Msg::StopClicked);
    assert_eq!(
        effects,
        vec![Effect::StopPolling {
            workflow_id: "a".into()
        }]
    );
    assert_eq!(state.view().status, Some(WorkflowStatus::Stopped));

    let (state, effects) = update(state, Msg::StopClicked);
    assert!(effects.is_empty());

    let (next, effects) = update(state.clone(), snapshot("a", vec![done("too late")]));
    assert!(effects.is_empty());
    assert_eq!(next, state);
}

#[test]
fn switching_away_from_halted_workflow_does_not_stop_it_again() {
    init_logging();
    let (state, _) = start(AppState::new(), "a");
    let (state, _) = update(state, Msg::StopClicked);
    let (_, effects) = start(state, "b");
    assert_eq!(
        effects,
        vec![Effect::StartPolling {
            workflow_id: "b".into()
        }]
    );
}

#[test]
fn reset_clears_everything() {
    init_logging();
    let (state, _) = start(AppState::new(), "a");
    let (state, _) = update(state, snapshot("a", vec![done("result for a")]));
    let (mut state, effects) = update(state, Msg::Reset);
    assert_eq!(
        effects,
        vec![Effect::StopPolling {
            workflow_id: "a".into()
        }]
    );
    assert!(state.session().is_none());
    assert!(state.cache().is_empty());
    assert!(state.consume_dirty());
    assert!(!state.consume_dirty());
}

#[test]
fn poll_failures_leave_state_alone() {
    init_logging();
    let (state, _) = start(AppState::new(), "a");
    let (next, effects) = update(
        state.clone(),
        Msg::PollFailed {
            workflow_id: "a".into(),
            reason: "timed out".into(),
        },
    );
    assert!(effects.is_empty());
    assert_eq!(next, state);
}
