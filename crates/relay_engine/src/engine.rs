use std::sync::{mpsc, Arc};
use std::thread;
use std::time::Duration;

use relay_core::FeedbackRequest;
use relay_logging::{relay_debug, relay_error, relay_info, relay_warn};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::client::{FeedbackClient, HttpWorkflowClient, StatusClient, WorkflowClient};
use crate::{EngineEvent, EngineSettings, TransportError};

enum EngineCommand {
    StartPolling { workflow_id: String },
    StopPolling { workflow_id: String },
    SubmitFeedback(FeedbackRequest),
}

/// The single active polling task.
struct Poller {
    workflow_id: String,
    cancel: CancellationToken,
}

pub struct EngineHandle {
    cmd_tx: mpsc::Sender<EngineCommand>,
    event_rx: mpsc::Receiver<EngineEvent>,
}

impl EngineHandle {
    pub fn new(settings: EngineSettings) -> Result<Self, TransportError> {
        let poll_interval = settings.poll_interval;
        let client = HttpWorkflowClient::new(settings)?;
        Ok(Self::with_client(Arc::new(client), poll_interval))
    }

    pub fn with_client(client: Arc<dyn WorkflowClient>, poll_interval: Duration) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::channel();
        let (event_tx, event_rx) = mpsc::channel();

        thread::spawn(move || {
            let runtime = match tokio::runtime::Runtime::new() {
                Ok(runtime) => runtime,
                Err(err) => {
                    relay_error!("engine runtime failed to start: {}", err);
                    return;
                }
            };
            let mut poller: Option<Poller> = None;
            while let Ok(command) = cmd_rx.recv() {
                match command {
                    EngineCommand::StartPolling { workflow_id } => {
                        if let Some(active) = poller.as_ref() {
                            if active.workflow_id == workflow_id && !active.cancel.is_cancelled() {
                                relay_debug!("already polling {}", workflow_id);
                                continue;
                            }
                        }
                        if let Some(previous) = poller.take() {
                            previous.cancel.cancel();
                        }
                        relay_info!("polling {} every {:?}", workflow_id, poll_interval);
                        let cancel = CancellationToken::new();
                        runtime.spawn(poll_loop(
                            client.clone(),
                            workflow_id.clone(),
                            poll_interval,
                            cancel.clone(),
                            event_tx.clone(),
                        ));
                        poller = Some(Poller {
                            workflow_id,
                            cancel,
                        });
                    }
                    EngineCommand::StopPolling { workflow_id } => {
                        match poller.take() {
                            Some(active) if active.workflow_id == workflow_id => {
                                relay_info!("stopped polling {}", workflow_id);
                                active.cancel.cancel();
                            }
                            other => poller = other,
                        }
                    }
                    EngineCommand::SubmitFeedback(request) => {
                        let client = client.clone();
                        let event_tx = event_tx.clone();
                        runtime.spawn(async move {
                            let result = client.submit_feedback(&request).await;
                            if let Err(err) = &result {
                                relay_warn!("feedback for {} failed: {}", request.workflow_id, err);
                            }
                            let _ = event_tx.send(EngineEvent::FeedbackCompleted {
                                workflow_id: request.workflow_id,
                                result,
                            });
                        });
                    }
                }
            }
            if let Some(active) = poller {
                active.cancel.cancel();
            }
        });

        Self { cmd_tx, event_rx }
    }

    /// Starts polling `workflow_id`, cancelling any other workflow's poller. A no-op when
    /// that workflow is already being polled.
    pub fn start_polling(&self, workflow_id: impl Into<String>) {
        let _ = self.cmd_tx.send(EngineCommand::StartPolling {
            workflow_id: workflow_id.into(),
        });
    }

    pub fn stop_polling(&self, workflow_id: impl Into<String>) {
        let _ = self.cmd_tx.send(EngineCommand::StopPolling {
            workflow_id: workflow_id.into(),
        });
    }

    pub fn submit_feedback(&self, request: FeedbackRequest) {
        let _ = self.cmd_tx.send(EngineCommand::SubmitFeedback(request));
    }

    pub fn try_recv(&self) -> Option<EngineEvent> {
        self.event_rx.try_recv().ok()
    }

    pub fn recv_timeout(&self, timeout: Duration) -> Option<EngineEvent> {
        self.event_rx.recv_timeout(timeout).ok()
    }
}

async fn poll_loop(
    client: Arc<dyn WorkflowClient>,
    workflow_id: String,
    interval: Duration,
    cancel: CancellationToken,
    event_tx: mpsc::Sender<EngineEvent>,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut tick: u64 = 0;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }
        tick += 1;

        let result = tokio::select! {
            _ = cancel.cancelled() => break,
            result = client.fetch_status(&workflow_id) => result,
        };
        // A stop may land while the request is in flight; drop its answer.
        if cancel.is_cancelled() {
            break;
        }
        let event = match result {
            Ok(poll) => EngineEvent::Snapshot {
                workflow_id: workflow_id.clone(),
                poll,
                tick,
            },
            Err(error) => {
                relay_warn!("poll {} for {} failed: {}", tick, workflow_id, error);
                EngineEvent::PollFailed {
                    workflow_id: workflow_id.clone(),
                    error,
                    tick,
                }
            }
        };
        if event_tx.send(event).is_err() {
            break;
        }
    }
    relay_debug!("poll loop for {} ended after {} tick(s)", workflow_id, tick);
}
