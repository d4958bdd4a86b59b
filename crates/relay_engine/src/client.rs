use relay_core::{FeedbackRequest, StatusPoll};
use relay_logging::relay_debug;

use crate::{EngineSettings, TransportError, TransportFailure};

#[async_trait::async_trait]
pub trait StatusClient: Send + Sync {
    async fn fetch_status(&self, workflow_id: &str) -> Result<StatusPoll, TransportError>;
}

#[async_trait::async_trait]
pub trait FeedbackClient: Send + Sync {
    /// Any 2xx response counts as accepted.
    async fn submit_feedback(&self, request: &FeedbackRequest) -> Result<(), TransportError>;
}

/// Both halves of the workflow service, as the engine needs them.
pub trait WorkflowClient: StatusClient + FeedbackClient {}

impl<T: StatusClient + FeedbackClient> WorkflowClient for T {}

#[derive(Debug, Clone)]
pub struct HttpWorkflowClient {
    settings: EngineSettings,
    client: reqwest::Client,
}

impl HttpWorkflowClient {
    pub fn new(settings: EngineSettings) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .connect_timeout(settings.connect_timeout)
            .timeout(settings.request_timeout)
            .build()
            .map_err(|err| TransportError::new(TransportFailure::Network, err.to_string()))?;
        Ok(Self { settings, client })
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }
}

#[async_trait::async_trait]
impl StatusClient for HttpWorkflowClient {
    async fn fetch_status(&self, workflow_id: &str) -> Result<StatusPoll, TransportError> {
        let url = self.settings.status_url(workflow_id)?;
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::new(
                TransportFailure::HttpStatus(status.as_u16()),
                status.to_string(),
            ));
        }

        let body = response.bytes().await.map_err(map_reqwest_error)?;
        let poll: StatusPoll = serde_json::from_slice(&body)
            .map_err(|err| TransportError::new(TransportFailure::Decode, err.to_string()))?;
        relay_debug!(
            "status for {}: {} with {} stage(s)",
            workflow_id,
            poll.workflow_status,
            poll.subnets.len()
        );
        Ok(poll)
    }
}

#[async_trait::async_trait]
impl FeedbackClient for HttpWorkflowClient {
    async fn submit_feedback(&self, request: &FeedbackRequest) -> Result<(), TransportError> {
        let url = self.settings.feedback_url()?;
        let response = self
            .client
            .post(url)
            .json(request)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = if body.trim().is_empty() {
                status.to_string()
            } else {
                format!("{status}: {}", body.trim())
            };
            return Err(TransportError::new(
                TransportFailure::HttpStatus(status.as_u16()),
                message,
            ));
        }
        Ok(())
    }
}

fn map_reqwest_error(err: reqwest::Error) -> TransportError {
    if err.is_timeout() {
        return TransportError::new(TransportFailure::Timeout, err.to_string());
    }
    if err.is_decode() {
        return TransportError::new(TransportFailure::Decode, err.to_string());
    }
    TransportError::new(TransportFailure::Network, err.to_string())
}
