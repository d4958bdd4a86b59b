use std::fmt;

use relay_core::StatusPoll;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    /// `tick` counts the poller's requests, starting at 1.
    Snapshot {
        workflow_id: String,
        poll: StatusPoll,
        tick: u64,
    },
    PollFailed {
        workflow_id: String,
        error: TransportError,
        tick: u64,
    },
    FeedbackCompleted {
        workflow_id: String,
        result: Result<(), TransportError>,
    },
}

impl EngineEvent {
    /// Poll tick of a polling event; feedback outcomes have none.
    pub fn tick(&self) -> Option<u64> {
        match self {
            EngineEvent::Snapshot { tick, .. } | EngineEvent::PollFailed { tick, .. } => Some(*tick),
            EngineEvent::FeedbackCompleted { .. } => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct TransportError {
    pub kind: TransportFailure,
    pub message: String,
}

impl TransportError {
    pub(crate) fn new(kind: TransportFailure, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportFailure {
    InvalidUrl,
    HttpStatus(u16),
    Timeout,
    Network,
    Decode,
}

impl fmt::Display for TransportFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportFailure::InvalidUrl => write!(f, "invalid url"),
            TransportFailure::HttpStatus(code) => write!(f, "http status {code}"),
            TransportFailure::Timeout => write!(f, "timeout"),
            TransportFailure::Network => write!(f, "network error"),
            TransportFailure::Decode => write!(f, "malformed response"),
        }
    }
}
