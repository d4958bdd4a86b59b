use std::time::Duration;

use url::Url;

use crate::{TransportError, TransportFailure};

#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub base_url: String,
    pub status_path: String,
    pub feedback_path: String,
    pub poll_interval: Duration,
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8080".to_string(),
            status_path: "/api/workflow/status".to_string(),
            feedback_path: "/api/workflow/feedback".to_string(),
            poll_interval: Duration::from_secs(2),
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
        }
    }
}

impl EngineSettings {
    /// `{base}{status_path}/{workflow_id}`, with the id percent-encoded as one segment.
    pub fn status_url(&self, workflow_id: &str) -> Result<Url, TransportError> {
        self.endpoint(&self.status_path, Some(workflow_id))
    }

    pub fn feedback_url(&self) -> Result<Url, TransportError> {
        self.endpoint(&self.feedback_path, None)
    }

    // Appends segments instead of `Url::join`, which would drop a path prefix on the base.
    fn endpoint(&self, path: &str, tail: Option<&str>) -> Result<Url, TransportError> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|err| TransportError::new(TransportFailure::InvalidUrl, err.to_string()))?;
        {
            let mut segments = url.path_segments_mut().map_err(|()| {
                TransportError::new(
                    TransportFailure::InvalidUrl,
                    format!("{} cannot carry a path", self.base_url),
                )
            })?;
            segments.pop_if_empty();
            segments.extend(path.split('/').filter(|segment| !segment.is_empty()));
            if let Some(tail) = tail {
                segments.push(tail);
            }
        }
        Ok(url)
    }
}
