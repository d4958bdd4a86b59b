use crate::{FeedbackRequest, WorkflowStatus};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    StartPolling { workflow_id: String },
    StopPolling { workflow_id: String },
    SubmitFeedback(FeedbackRequest),
    /// Feedback was accepted; keep polling with the given status.
    ResumePolling {
        workflow_id: String,
        status: WorkflowStatus,
    },
}
