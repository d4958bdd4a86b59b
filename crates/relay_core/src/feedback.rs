//! The feedback round trip: answer a stage's question, then wait for the server to accept it.

use relay_logging::{relay_info, relay_warn};
use serde::{Deserialize, Serialize};

use crate::rules::{FEEDBACK_ACCEPTED, SUBMITTING_FEEDBACK};
use crate::session::WorkflowSession;
use crate::snapshot_cache::SnapshotCache;
use crate::{MessageKind, Timestamp, TranscriptMessage};

pub const NO_OPEN_QUESTION: &str = "There is no open question to answer right now.";

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum FeedbackPhase {
    #[default]
    Idle,
    Submitting {
        subnet_index: usize,
        /// Id of the "Submitting feedback..." message, removed once the outcome is known.
        transient_id: String,
    },
    Applied {
        subnet_index: usize,
    },
    Failed {
        subnet_index: usize,
        reason: String,
    },
}

impl FeedbackPhase {
    pub fn is_submitting(&self) -> bool {
        matches!(self, FeedbackPhase::Submitting { .. })
    }

    /// Stage whose accepted answer is still waiting for a poll to move it along.
    pub fn answered_stage(&self) -> Option<usize> {
        match self {
            FeedbackPhase::Applied { subnet_index } => Some(*subnet_index),
            _ => None,
        }
    }
}

/// Body of the feedback request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackRequest {
    pub workflow_id: String,
    pub subnet_index: usize,
    pub question: String,
    pub answer: String,
}

impl WorkflowSession {
    /// Records the answer and returns the request to send, or `None` when there is nothing
    /// to answer. The lowest waiting stage is answered, skipping one whose answer the server
    /// has accepted but no poll has reflected yet.
    pub(crate) fn begin_feedback(
        &mut self,
        cache: &SnapshotCache,
        answer: &str,
        now: Timestamp,
    ) -> Option<FeedbackRequest> {
        if self.feedback.is_submitting() {
            relay_warn!("feedback for {} already in flight", self.workflow_id());
            return None;
        }
        let answer = answer.trim();
        if answer.is_empty() {
            return None;
        }
        let Some((subnet_index, question)) =
            cache.next_awaiting_question(self.workflow_id(), self.feedback.answered_stage(), now)
        else {
            relay_warn!("no stage of {} is waiting for an answer", self.workflow_id());
            self.push_message(TranscriptMessage::new(
                MessageKind::Response,
                NO_OPEN_QUESTION,
                now,
            ));
            return None;
        };

        Some(self.submit(subnet_index, question.text, answer, true, now))
    }

    /// Answers the stage's pending notification. A notification raised outside a waiting
    /// stage is answered with its own text, and the stage is not treated as regenerating.
    pub(crate) fn answer_notification(
        &mut self,
        cache: &SnapshotCache,
        subnet_index: usize,
        answer: &str,
        now: Timestamp,
    ) -> Option<FeedbackRequest> {
        if self.feedback.is_submitting() {
            relay_warn!("feedback for {} already in flight", self.workflow_id());
            return None;
        }
        let notice = self.dismiss_notification(subnet_index)?;
        let request = match cache.awaiting_question(self.workflow_id(), Some(subnet_index), now) {
            Some((_, question)) => self.submit(subnet_index, question.text, answer, true, now),
            None => {
                let question = notice
                    .question_data
                    .map(|question| question.text)
                    .filter(|text| !text.trim().is_empty())
                    .unwrap_or(notice.content);
                self.submit(subnet_index, question, answer, false, now)
            }
        };
        Some(request)
    }

    fn submit(
        &mut self,
        subnet_index: usize,
        question: String,
        answer: &str,
        awaiting: bool,
        now: Timestamp,
    ) -> FeedbackRequest {
        self.tracker.mark_feedback(subnet_index);
        if awaiting {
            self.tracker.mark_processing_after_feedback(subnet_index);
        }

        let mut answer_message = TranscriptMessage::new(MessageKind::Answer, answer, now);
        answer_message.subnet_index = Some(subnet_index);
        self.push_message(answer_message);
        self.tracker
            .record_echo(subnet_index, MessageKind::Answer, answer);

        let transient_id = self.push_message(TranscriptMessage::new(
            MessageKind::Response,
            SUBMITTING_FEEDBACK,
            now,
        ));
        self.feedback = FeedbackPhase::Submitting {
            subnet_index,
            transient_id,
        };
        relay_info!(
            "submitting feedback for stage {} of {}",
            subnet_index,
            self.workflow_id()
        );

        FeedbackRequest {
            workflow_id: self.workflow_id().to_string(),
            subnet_index,
            question,
            answer: answer.to_string(),
        }
    }

    /// Applies the server's verdict. Returns true when polling should resume.
    ///
    /// On failure the stage keeps its feedback flags, so the user can retry.
    pub(crate) fn resolve_feedback(&mut self, outcome: Result<(), String>, now: Timestamp) -> bool {
        let FeedbackPhase::Submitting {
            subnet_index,
            transient_id,
        } = self.feedback.clone()
        else {
            relay_warn!("feedback outcome for {} without a submission", self.workflow_id());
            return false;
        };
        self.remove_message(&transient_id);

        match outcome {
            Ok(()) => {
                self.push_message(TranscriptMessage::new(
                    MessageKind::Response,
                    FEEDBACK_ACCEPTED,
                    now,
                ));
                self.feedback = FeedbackPhase::Applied { subnet_index };
                self.set_status(crate::WorkflowStatus::Running);
                true
            }
            Err(reason) => {
                relay_warn!("feedback for stage {} rejected: {}", subnet_index, reason);
                self.push_message(TranscriptMessage::new(
                    MessageKind::Response,
                    format!("Failed to submit feedback: {reason}"),
                    now,
                ));
                self.feedback = FeedbackPhase::Failed {
                    subnet_index,
                    reason,
                };
                false
            }
        }
    }
}
