use std::collections::BTreeMap;

use relay_logging::{relay_debug, relay_trace};

use crate::feedback::FeedbackPhase;
use crate::reconcile::{reconcile, retire_placeholders, MessageIds};
use crate::rules::WORKFLOW_PLACEHOLDER;
use crate::snapshot_cache::SnapshotCache;
use crate::synthesis::{synthesize, StageContext};
use crate::tracker::TransitionTracker;
use crate::transition::Transition;
use crate::{
    MessageKind, StageSnapshot, StageStatus, StatusPoll, Timestamp, TranscriptMessage,
    WorkflowStatus,
};

/// Everything tracked for the current workflow. Dropped wholesale on a workflow switch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkflowSession {
    workflow_id: String,
    status: WorkflowStatus,
    halted: bool,
    pub(crate) tracker: TransitionTracker,
    transcript: Vec<TranscriptMessage>,
    pending_notifications: Vec<TranscriptMessage>,
    ids: MessageIds,
    pub(crate) feedback: FeedbackPhase,
}

impl WorkflowSession {
    pub fn new(workflow_id: impl Into<String>) -> Self {
        let workflow_id = workflow_id.into();
        Self {
            ids: MessageIds::new(workflow_id.clone()),
            workflow_id,
            status: WorkflowStatus::Running,
            halted: false,
            tracker: TransitionTracker::new(),
            transcript: Vec::new(),
            pending_notifications: Vec::new(),
            feedback: FeedbackPhase::Idle,
        }
    }

    pub fn workflow_id(&self) -> &str {
        &self.workflow_id
    }

    pub fn status(&self) -> WorkflowStatus {
        self.status
    }

    /// Returns true when the status actually changed.
    pub(crate) fn set_status(&mut self, status: WorkflowStatus) -> bool {
        let changed = self.status != status;
        self.status = status;
        changed
    }

    /// No further snapshots are applied once halted.
    pub fn is_halted(&self) -> bool {
        self.halted
    }

    pub(crate) fn halt(&mut self) {
        self.halted = true;
    }

    pub fn tracker(&self) -> &TransitionTracker {
        &self.tracker
    }

    pub fn transcript(&self) -> &[TranscriptMessage] {
        &self.transcript
    }

    pub fn pending_notifications(&self) -> &[TranscriptMessage] {
        &self.pending_notifications
    }

    pub fn feedback_phase(&self) -> &FeedbackPhase {
        &self.feedback
    }

    /// The user's opening prompt, followed by a placeholder until the first stage reports.
    pub(crate) fn push_user_prompt(&mut self, prompt: &str, now: Timestamp) {
        self.push_message(TranscriptMessage::new(MessageKind::User, prompt, now));
        let mut placeholder =
            TranscriptMessage::new(MessageKind::WorkflowSubnet, WORKFLOW_PLACEHOLDER, now);
        placeholder.subnet_status = Some(StageStatus::InProgress);
        self.push_message(placeholder);
    }

    /// Appends a message outside of reconciliation and returns its id.
    pub(crate) fn push_message(&mut self, mut message: TranscriptMessage) -> String {
        message.id = self.ids.next_id();
        let id = message.id.clone();
        self.transcript.push(message);
        id
    }

    pub(crate) fn remove_message(&mut self, id: &str) -> bool {
        let before = self.transcript.len();
        self.transcript.retain(|message| message.id != id);
        self.transcript.len() != before
    }

    /// Removes the stage's pending notifications; returns the first one removed.
    pub(crate) fn dismiss_notification(&mut self, subnet_index: usize) -> Option<TranscriptMessage> {
        let mut dismissed = None;
        self.pending_notifications.retain(|message| {
            if message.subnet_index != Some(subnet_index) {
                return true;
            }
            if dismissed.is_none() {
                dismissed = Some(message.clone());
            }
            false
        });
        dismissed
    }

    /// Runs one poll through tracking, synthesis and reconciliation. Returns the number of
    /// transcript changes: messages added plus placeholders retired.
    pub(crate) fn apply_snapshot(
        &mut self,
        cache: &mut SnapshotCache,
        poll: &StatusPoll,
        now: Timestamp,
    ) -> usize {
        let mut stages: Vec<&StageSnapshot> = poll.subnets.iter().collect();
        stages.sort_by_key(|stage| stage.index);

        let mut candidates = Vec::new();
        let mut settled = BTreeMap::new();
        for stage in stages {
            let changed = cache.has_changed(&self.workflow_id, stage.index, stage);
            cache.cache(&self.workflow_id, stage.index, stage);
            if changed && self.feedback.answered_stage() == Some(stage.index) {
                self.feedback = FeedbackPhase::Idle;
            }

            let transition =
                Transition::classify(self.tracker.previous_status(stage.index), stage);
            if transition.regenerating {
                self.tracker.mark_processing_after_feedback(stage.index);
                self.tracker.mark_feedback(stage.index);
            }
            self.tracker.record_status(stage.index, stage.status);

            if transition.suppresses_synthesis() {
                relay_debug!(
                    "stage {} of {} first seen mid-question; not re-announcing",
                    stage.index,
                    self.workflow_id
                );
                continue;
            }
            if !changed && !transition.question_arriving_later {
                relay_trace!("stage {} unchanged", stage.index);
                continue;
            }

            let ctx = StageContext {
                workflow_id: &self.workflow_id,
                transition,
                tracker: &self.tracker,
                now,
            };
            let synthesis = synthesize(stage, &ctx);
            if matches!(
                stage.status,
                StageStatus::Done | StageStatus::Failed | StageStatus::WaitingResponse
            ) {
                settled.insert(stage.index, stage.status);
            }

            if matches!(stage.status, StageStatus::Done | StageStatus::Failed) {
                self.tracker.clear_processing_after_feedback(stage.index);
                self.tracker.clear_feedback(stage.index);
            }
            candidates.extend(synthesis.into_candidates());
        }

        let retired = retire_placeholders(&mut self.transcript, &settled);
        if retired > 0 {
            relay_debug!("retired {} placeholder(s) of {}", retired, self.workflow_id);
        }
        if candidates.is_empty() {
            return retired;
        }

        let reconciled = reconcile(
            &self.transcript,
            candidates,
            self.tracker.keys_mut(),
            &mut self.ids,
        );
        for message in &reconciled.accepted {
            if matches!(message.kind, MessageKind::Question | MessageKind::Notification) {
                if let Some(stage) = message.subnet_index {
                    self.tracker
                        .record_echo(stage, MessageKind::Question, &message.content);
                }
            }
        }
        self.transcript = reconciled.transcript;
        self.pending_notifications.extend(reconciled.notifications);
        retired + reconciled.accepted.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn poll(subnets: Vec<StageSnapshot>) -> StatusPoll {
        StatusPoll {
            request_id: "wf".into(),
            workflow_status: WorkflowStatus::Running,
            subnets,
        }
    }

    #[test]
    fn user_prompt_gets_placeholder() {
        let mut session = WorkflowSession::new("wf");
        session.push_user_prompt("mint me a cat", 1);
        let kinds: Vec<_> = session.transcript().iter().map(|m| m.kind).collect();
        assert_eq!(kinds, vec![MessageKind::User, MessageKind::WorkflowSubnet]);
        assert_eq!(session.transcript()[0].id, "wf-1");
    }

    #[test]
    fn status_is_recorded_even_when_suppressed() {
        let mut session = WorkflowSession::new("wf");
        let mut cache = SnapshotCache::new();
        let stage = StageSnapshot::new(0, StageStatus::WaitingResponse).with_data(r#"{"message":"partial"}"#);
        let added = session.apply_snapshot(&mut cache, &poll(vec![stage]), 0);
        assert_eq!(added, 0);
        assert_eq!(
            session.tracker().previous_status(0),
            Some(StageStatus::WaitingResponse)
        );
    }

    #[test]
    fn regenerating_marks_feedback_and_done_clears_it() {
        let mut session = WorkflowSession::new("wf");
        let mut cache = SnapshotCache::new();
        session.apply_snapshot(
            &mut cache,
            &poll(vec![StageSnapshot::new(0, StageStatus::WaitingResponse)]),
            0,
        );
        session.apply_snapshot(
            &mut cache,
            &poll(vec![StageSnapshot::new(0, StageStatus::InProgress)]),
            1,
        );
        assert!(session.tracker().has_feedback(0));
        assert!(session.tracker().is_processing_after_feedback(0));

        session.apply_snapshot(
            &mut cache,
            &poll(vec![StageSnapshot::new(0, StageStatus::Done).with_data(r#"{"message":"ok"}"#)]),
            2,
        );
        assert!(!session.tracker().has_feedback(0));
        assert!(!session.tracker().is_processing_after_feedback(0));
        let last = session.transcript().last().unwrap();
        assert!(last.is_regenerated);
    }

    #[test]
    fn dismissing_notifications_is_per_stage() {
        let mut session = WorkflowSession::new("wf");
        let mut note = TranscriptMessage::new(MessageKind::Notification, "Mint?", 0);
        note.subnet_index = Some(1);
        session.pending_notifications.push(note);
        assert!(session.dismiss_notification(0).is_none());
        assert_eq!(session.dismiss_notification(1).unwrap().content, "Mint?");
        assert!(session.pending_notifications().is_empty());
    }
}
