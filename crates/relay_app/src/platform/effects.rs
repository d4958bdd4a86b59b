use relay_core::{Effect, Msg, Timestamp};
use relay_engine::{EngineEvent, EngineHandle, EngineSettings, TransportError};
use relay_logging::{relay_debug, relay_info};

/// Executes core effects against the engine and turns engine events back into messages.
pub struct EffectRunner {
    engine: EngineHandle,
}

impl EffectRunner {
    pub fn new(settings: EngineSettings) -> Result<Self, TransportError> {
        Ok(Self {
            engine: EngineHandle::new(settings)?,
        })
    }

    pub fn run(&self, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::StartPolling { workflow_id } => {
                    relay_info!("StartPolling workflow_id={}", workflow_id);
                    self.engine.start_polling(workflow_id);
                }
                Effect::StopPolling { workflow_id } => {
                    relay_info!("StopPolling workflow_id={}", workflow_id);
                    self.engine.stop_polling(workflow_id);
                }
                Effect::SubmitFeedback(request) => {
                    relay_info!(
                        "SubmitFeedback workflow_id={} stage={} answer_len={}",
                        request.workflow_id,
                        request.subnet_index,
                        request.answer.len()
                    );
                    self.engine.submit_feedback(request);
                }
                Effect::ResumePolling {
                    workflow_id,
                    status,
                } => {
                    relay_debug!("ResumePolling workflow_id={} status={}", workflow_id, status);
                    self.engine.start_polling(workflow_id);
                }
            }
        }
    }

    /// Next pending engine event as a core message. A polling event first sets its tick on
    /// this thread, so the reducer's log lines for it carry the tick.
    pub fn next_msg(&self, now: Timestamp) -> Option<Msg> {
        let event = self.engine.try_recv()?;
        if let Some(tick) = event.tick() {
            relay_logging::set_poll_tick(tick);
        }
        Some(to_msg(event, now))
    }
}

fn to_msg(event: EngineEvent, now: Timestamp) -> Msg {
    match event {
        EngineEvent::Snapshot { poll, .. } => Msg::SnapshotReceived { poll, now },
        EngineEvent::PollFailed {
            workflow_id,
            error,
            ..
        } => Msg::PollFailed {
            workflow_id,
            reason: error.to_string(),
        },
        EngineEvent::FeedbackCompleted {
            workflow_id,
            result,
        } => Msg::FeedbackResolved {
            workflow_id,
            outcome: result.map_err(|err| err.to_string()),
            now,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relay_core::{StatusPoll, WorkflowStatus};
    use relay_engine::TransportFailure;

    #[test]
    fn snapshots_become_snapshot_messages() {
        let poll = StatusPoll {
            request_id: "wf".into(),
            workflow_status: WorkflowStatus::Running,
            subnets: Vec::new(),
        };
        let event = EngineEvent::Snapshot {
            workflow_id: "wf".into(),
            poll: poll.clone(),
            tick: 4,
        };
        assert_eq!(event.tick(), Some(4));
        assert_eq!(to_msg(event, 3), Msg::SnapshotReceived { poll, now: 3 });
    }

    #[test]
    fn feedback_failures_carry_the_reason() {
        let msg = to_msg(
            EngineEvent::FeedbackCompleted {
                workflow_id: "wf".into(),
                result: Err(TransportError {
                    kind: TransportFailure::HttpStatus(500),
                    message: "boom".into(),
                }),
            },
            9,
        );
        assert_eq!(
            msg,
            Msg::FeedbackResolved {
                workflow_id: "wf".into(),
                outcome: Err("http status 500: boom".into()),
                now: 9,
            }
        );
    }
}
