//! Relay engine: polls the workflow service and submits feedback on a background runtime.
mod client;
mod engine;
mod settings;
mod types;

pub use client::{FeedbackClient, HttpWorkflowClient, StatusClient, WorkflowClient};
pub use engine::EngineHandle;
pub use settings::EngineSettings;
pub use types::{EngineEvent, TransportError, TransportFailure};
