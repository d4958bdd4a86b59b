use crate::{StatusPoll, Timestamp};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Msg {
    /// A new workflow was created; `prompt` is the user's opening text, if any.
    WorkflowStarted {
        workflow_id: String,
        prompt: Option<String>,
        now: Timestamp,
    },
    /// Attach to a workflow that already exists on the server.
    WorkflowResumed { workflow_id: String },
    /// One status poll arrived from the engine.
    SnapshotReceived { poll: StatusPoll, now: Timestamp },
    /// The engine could not fetch a status poll.
    PollFailed { workflow_id: String, reason: String },
    /// User typed an answer to the open question.
    FeedbackSubmitted { answer: String, now: Timestamp },
    /// Outcome of a feedback request.
    FeedbackResolved {
        workflow_id: String,
        outcome: Result<(), String>,
        now: Timestamp,
    },
    /// User accepted or declined a notification.
    NotificationResponded {
        subnet_index: usize,
        accepted: bool,
        now: Timestamp,
    },
    /// User clicked Stop.
    StopClicked,
    /// Drop the current workflow entirely.
    Reset,
    /// UI/render tick to coalesce rendering.
    Tick,
    /// Fallback for placeholder wiring.
    NoOp,
}
