use relay_logging::{relay_debug, relay_info, relay_warn};

use crate::view_model::{AppViewModel, OpenQuestion};
use crate::{Effect, SnapshotCache, StatusPoll, Timestamp, WorkflowSession, WorkflowStatus};

const ACCEPT_ANSWER: &str = "accept";
const DECLINE_ANSWER: &str = "decline";

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AppState {
    session: Option<WorkflowSession>,
    cache: SnapshotCache,
    dirty: bool,
}

impl AppState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn view(&self) -> AppViewModel {
        let Some(session) = self.session.as_ref() else {
            return AppViewModel {
                dirty: self.dirty,
                ..AppViewModel::default()
            };
        };
        // Only the text is shown, so the clock does not matter for embedded questions.
        let open_question = self
            .cache
            .next_awaiting_question(
                session.workflow_id(),
                session.feedback_phase().answered_stage(),
                0,
            )
            .map(|(subnet_index, question)| OpenQuestion {
                subnet_index,
                text: question.text,
            });
        AppViewModel {
            workflow_id: Some(session.workflow_id().to_string()),
            status: Some(session.status()),
            halted: session.is_halted(),
            transcript: session.transcript().to_vec(),
            pending_notifications: session.pending_notifications().to_vec(),
            feedback: session.feedback_phase().clone(),
            open_question,
            dirty: self.dirty,
        }
    }

    /// Returns whether a render is due and clears the flag.
    pub fn consume_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    pub fn session(&self) -> Option<&WorkflowSession> {
        self.session.as_ref()
    }

    pub fn cache(&self) -> &SnapshotCache {
        &self.cache
    }

    pub(crate) fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    /// Drops everything known about the previous workflow before the next one is tracked.
    /// Returns the effects needed to silence the old poller.
    fn switch_workflow(&mut self, workflow_id: &str) -> Vec<Effect> {
        let mut effects = Vec::new();
        if let Some(previous) = self.session.take() {
            self.cache.forget_workflow(previous.workflow_id());
            relay_info!(
                "switching workflow {} -> {}",
                previous.workflow_id(),
                workflow_id
            );
            if !previous.is_halted() && previous.workflow_id() != workflow_id {
                effects.push(Effect::StopPolling {
                    workflow_id: previous.workflow_id().to_string(),
                });
            }
        }
        self.session = Some(WorkflowSession::new(workflow_id));
        self.mark_dirty();
        effects
    }

    pub(crate) fn start_workflow(
        &mut self,
        workflow_id: &str,
        prompt: Option<&str>,
        now: Timestamp,
    ) -> Vec<Effect> {
        let mut effects = self.switch_workflow(workflow_id);
        if let (Some(session), Some(prompt)) = (self.session.as_mut(), prompt) {
            let prompt = prompt.trim();
            if !prompt.is_empty() {
                session.push_user_prompt(prompt, now);
            }
        }
        effects.push(Effect::StartPolling {
            workflow_id: workflow_id.to_string(),
        });
        effects
    }

    pub(crate) fn reset(&mut self) -> Vec<Effect> {
        let Some(previous) = self.session.take() else {
            return Vec::new();
        };
        self.cache.forget_workflow(previous.workflow_id());
        self.mark_dirty();
        if previous.is_halted() {
            Vec::new()
        } else {
            vec![Effect::StopPolling {
                workflow_id: previous.workflow_id().to_string(),
            }]
        }
    }

    pub(crate) fn apply_poll(&mut self, poll: StatusPoll, now: Timestamp) -> Vec<Effect> {
        let Some(session) = self.session.as_mut() else {
            relay_debug!("snapshot for {} with no active workflow", poll.request_id);
            return Vec::new();
        };
        if poll.request_id != session.workflow_id() {
            relay_warn!(
                "ignoring stale snapshot for {} (active: {})",
                poll.request_id,
                session.workflow_id()
            );
            return Vec::new();
        }
        if session.is_halted() {
            relay_debug!("ignoring snapshot for halted workflow {}", poll.request_id);
            return Vec::new();
        }

        let changes = session.apply_snapshot(&mut self.cache, &poll, now);
        let status_changed = session.set_status(poll.workflow_status);
        relay_debug!(
            "poll {}: applied snapshot for {}: {} transcript change(s), status {}",
            relay_logging::poll_tick(),
            poll.request_id,
            changes,
            poll.workflow_status
        );

        let mut effects = Vec::new();
        if poll.workflow_status.is_terminal() {
            session.halt();
            relay_info!(
                "workflow {} finished as {}",
                poll.request_id,
                poll.workflow_status
            );
            effects.push(Effect::StopPolling {
                workflow_id: poll.request_id,
            });
        }
        if changes > 0 || status_changed || !effects.is_empty() {
            self.dirty = true;
        }
        effects
    }

    pub(crate) fn submit_feedback(&mut self, answer: &str, now: Timestamp) -> Vec<Effect> {
        let Some(session) = self.session.as_mut() else {
            relay_debug!("feedback with no active workflow");
            return Vec::new();
        };
        let request = session.begin_feedback(&self.cache, answer, now);
        self.dirty = true;
        request.map(Effect::SubmitFeedback).into_iter().collect()
    }

    pub(crate) fn resolve_feedback(
        &mut self,
        workflow_id: &str,
        outcome: Result<(), String>,
        now: Timestamp,
    ) -> Vec<Effect> {
        let Some(session) = self
            .session
            .as_mut()
            .filter(|session| session.workflow_id() == workflow_id)
        else {
            relay_debug!("feedback outcome for inactive workflow {}", workflow_id);
            return Vec::new();
        };
        let resume = session.resolve_feedback(outcome, now);
        self.dirty = true;
        if resume && !session.is_halted() {
            relay_info!("feedback accepted for {}", workflow_id);
            vec![Effect::ResumePolling {
                workflow_id: workflow_id.to_string(),
                status: WorkflowStatus::Running,
            }]
        } else {
            Vec::new()
        }
    }

    pub(crate) fn respond_to_notification(
        &mut self,
        subnet_index: usize,
        accepted: bool,
        now: Timestamp,
    ) -> Vec<Effect> {
        let Some(session) = self.session.as_mut() else {
            return Vec::new();
        };
        let answer = if accepted {
            ACCEPT_ANSWER
        } else {
            DECLINE_ANSWER
        };
        let Some(request) = session.answer_notification(&self.cache, subnet_index, answer, now)
        else {
            relay_debug!("no answerable notification for stage {}", subnet_index);
            return Vec::new();
        };
        self.dirty = true;
        vec![Effect::SubmitFeedback(request)]
    }

    pub(crate) fn stop(&mut self) -> Vec<Effect> {
        let Some(session) = self.session.as_mut().filter(|session| !session.is_halted()) else {
            return Vec::new();
        };
        session.set_status(WorkflowStatus::Stopped);
        session.halt();
        self.dirty = true;
        relay_info!("workflow {} stopped by user", session.workflow_id());
        vec![Effect::StopPolling {
            workflow_id: session.workflow_id().to_string(),
        }]
    }
}
