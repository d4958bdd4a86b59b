use crate::{StageSnapshot, StageStatus};

/// How a stage moved between the previous poll and this one.
///
/// Classified once per stage per snapshot, before the new status is recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Transition {
    /// `waiting_response -> in_progress`: the stage is re-running with user feedback.
    pub regenerating: bool,
    /// `in_progress -> waiting_response`: the question replaces the stage's prior content.
    pub showing_question: bool,
    /// First sighting of a stage already waiting with data, i.e. a reload mid-question.
    pub resuming_workflow: bool,
    /// Still waiting, but a question showed up without any data.
    pub question_arriving_later: bool,
}

impl Transition {
    pub fn classify(previous: Option<StageStatus>, stage: &StageSnapshot) -> Self {
        use StageStatus::{InProgress, WaitingResponse};

        let current = stage.status;
        Self {
            regenerating: previous == Some(WaitingResponse) && current == InProgress,
            showing_question: previous == Some(InProgress) && current == WaitingResponse,
            resuming_workflow: previous.is_none()
                && current == WaitingResponse
                && stage.has_data(),
            question_arriving_later: previous == Some(WaitingResponse)
                && current == WaitingResponse
                && stage.question.is_some()
                && !stage.has_data(),
        }
    }

    /// Synthesis is skipped entirely for this update.
    pub fn suppresses_synthesis(&self) -> bool {
        self.resuming_workflow
    }
}
