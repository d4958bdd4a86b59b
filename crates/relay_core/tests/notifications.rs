use std::sync::Once;

use pretty_assertions::assert_eq;
use relay_core::{
    update, AppState, Effect, FeedbackRequest, MessageKind, Msg, Question, StageSnapshot,
    StageStatus, StatusPoll, WorkflowStatus,
};

const WF: &str = "wf-n";

fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(relay_logging::initialize_for_tests);
}

fn notified_state() -> AppState {
    let (state, _) = update(
        AppState::new(),
        Msg::WorkflowStarted {
            workflow_id: WF.to_string(),
            prompt: None,
            now: 0,
        },
    );
    let notice = Question {
        kind: "notification".into(),
        text: "Mint the NFT?".into(),
        item_id: None,
        expires_at: None,
    };
    let msg = Msg::SnapshotReceived {
        poll: StatusPoll {
            request_id: WF.to_string(),
            workflow_status: WorkflowStatus::WaitingResponse,
            subnets: vec![StageSnapshot::new(1, StageStatus::WaitingResponse).with_question(notice)],
        },
        now: 1_000,
    };
    let (state, _) = update(state, msg.clone());
    let (state, _) = update(state, msg);
    state
}

#[test]
fn notification_is_listed_once() {
    init_logging();
    let view = notified_state().view();
    assert_eq!(view.pending_notifications.len(), 1);
    assert_eq!(view.pending_notifications[0].content, "Mint the NFT?");
    assert_eq!(view.pending_notifications[0].subnet_index, Some(1));
    let in_transcript = view
        .transcript
        .iter()
        .filter(|m| m.kind == MessageKind::Notification)
        .count();
    assert_eq!(in_transcript, 1);
}

#[test]
fn accepting_submits_through_feedback() {
    init_logging();
    let (state, effects) = update(
        notified_state(),
        Msg::NotificationResponded {
            subnet_index: 1,
            accepted: true,
            now: 2_000,
        },
    );
    assert_eq!(
        effects,
        vec![Effect::SubmitFeedback(FeedbackRequest {
            workflow_id: WF.to_string(),
            subnet_index: 1,
            question: "Mint the NFT?".into(),
            answer: "accept".into(),
        })]
    );
    assert!(state.view().pending_notifications.is_empty());
}

#[test]
fn declining_answers_decline() {
    init_logging();
    let (_, effects) = update(
        notified_state(),
        Msg::NotificationResponded {
            subnet_index: 1,
            accepted: false,
            now: 2_000,
        },
    );
    let Some(Effect::SubmitFeedback(request)) = effects.first() else {
        panic!("expected a feedback request, got {effects:?}");
    };
    assert_eq!(request.answer, "decline");
}

#[test]
fn responding_to_unknown_notification_does_nothing() {
    init_logging();
    let state = notified_state();
    let (next, effects) = update(
        state.clone(),
        Msg::NotificationResponded {
            subnet_index: 4,
            accepted: true,
            now: 2_000,
        },
    );
    assert!(effects.is_empty());
    assert_eq!(next, state);
}

#[test]
fn notification_from_finished_stage_is_still_answered() {
    init_logging();
    let (state, _) = update(
        AppState::new(),
        Msg::WorkflowStarted {
            workflow_id: WF.to_string(),
            prompt: None,
            now: 0,
        },
    );
    let (state, _) = update(
        state,
        Msg::SnapshotReceived {
            poll: StatusPoll {
                request_id: WF.to_string(),
                workflow_status: WorkflowStatus::Running,
                subnets: vec![StageSnapshot::new(0, StageStatus::Done).with_data(
                    r#"{"message":"Artwork ready","question":{"type":"notification","text":"Publish it now?"}}"#,
                )],
            },
            now: 1_000,
        },
    );
    assert_eq!(state.view().pending_notifications.len(), 1);

    let (state, effects) = update(
        state,
        Msg::NotificationResponded {
            subnet_index: 0,
            accepted: true,
            now: 2_000,
        },
    );
    assert_eq!(
        effects,
        vec![Effect::SubmitFeedback(FeedbackRequest {
            workflow_id: WF.to_string(),
            subnet_index: 0,
            question: "Publish it now?".into(),
            answer: "accept".into(),
        })]
    );
    let view = state.view();
    assert!(view.pending_notifications.is_empty());
    assert!(view.feedback.is_submitting());
    assert!(!view.transcript.iter().any(|m| m.content == relay_core::NO_OPEN_QUESTION));
}

#[test]
fn notification_stays_pending_while_another_answer_is_in_flight() {
    init_logging();
    let state = notified_state();
    let (state, _) = update(
        state,
        Msg::FeedbackSubmitted {
            answer: "sure".into(),
            now: 1_500,
        },
    );
    let (state, effects) = update(
        state,
        Msg::NotificationResponded {
            subnet_index: 1,
            accepted: true,
            now: 2_000,
        },
    );
    assert!(effects.is_empty());
    assert_eq!(state.view().pending_notifications.len(), 1);
}
