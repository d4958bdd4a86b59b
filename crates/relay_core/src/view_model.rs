use crate::{FeedbackPhase, TranscriptMessage, WorkflowStatus};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenQuestion {
    pub subnet_index: usize,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AppViewModel {
    pub workflow_id: Option<String>,
    pub status: Option<WorkflowStatus>,
    pub halted: bool,
    pub transcript: Vec<TranscriptMessage>,
    pub pending_notifications: Vec<TranscriptMessage>,
    pub feedback: FeedbackPhase,
    /// The question an answer typed now would go to.
    pub open_question: Option<OpenQuestion>,
    pub dirty: bool,
}
