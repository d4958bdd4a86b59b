//! Dedup keys, one constructor per message kind.
//!
//! Every key carries the workflow id and the stage index, so keys never collide across
//! stages or workflows. Keys are rendered as JSON, which keeps arbitrary workflow ids and
//! payload prefixes unambiguous.

use std::fmt;

use serde::Serialize;

use crate::hashing::short_hash;
use crate::rules::FINGERPRINT_PREFIX_CHARS;
use crate::{MessageKind, Question, StageStatus};

const NO_DATA: &str = "no-data";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedbackPart {
    Response,
    Question,
    Answer,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DedupKey {
    PendingWithData {
        workflow: String,
        stage: usize,
        fingerprint: String,
    },
    WaitingResponseData {
        workflow: String,
        stage: usize,
        fingerprint: String,
    },
    Stage {
        workflow: String,
        stage: usize,
        kind: MessageKind,
        status: StageStatus,
        regenerated: bool,
        fingerprint: String,
    },
    FeedbackEntry {
        workflow: String,
        stage: usize,
        entry: usize,
        part: FeedbackPart,
    },
    Notification {
        workflow: String,
        stage: usize,
        text: String,
    },
}

impl DedupKey {
    pub fn pending_with_data(workflow: &str, stage: usize, data: &str) -> Self {
        DedupKey::PendingWithData {
            workflow: workflow.to_string(),
            stage,
            fingerprint: payload_fingerprint(Some(data)),
        }
    }

    pub fn waiting_response_data(workflow: &str, stage: usize, data: Option<&str>) -> Self {
        DedupKey::WaitingResponseData {
            workflow: workflow.to_string(),
            stage,
            fingerprint: payload_fingerprint(data),
        }
    }

    pub fn stage(
        workflow: &str,
        stage: usize,
        kind: MessageKind,
        status: StageStatus,
        regenerated: bool,
        data: Option<&str>,
    ) -> Self {
        DedupKey::Stage {
            workflow: workflow.to_string(),
            stage,
            kind,
            status,
            regenerated,
            fingerprint: payload_fingerprint(data),
        }
    }

    /// Question keys also fingerprint the question text, so a new question over the same
    /// payload is still announced.
    pub fn question(
        workflow: &str,
        stage: usize,
        status: StageStatus,
        data: Option<&str>,
        question: &Question,
    ) -> Self {
        if question.is_notification() {
            return DedupKey::Notification {
                workflow: workflow.to_string(),
                stage,
                text: question.text.clone(),
            };
        }
        DedupKey::Stage {
            workflow: workflow.to_string(),
            stage,
            kind: MessageKind::Question,
            status,
            regenerated: false,
            fingerprint: format!(
                "{}|{}",
                payload_fingerprint(data),
                payload_fingerprint(Some(&question.text))
            ),
        }
    }

    pub fn feedback_entry(workflow: &str, stage: usize, entry: usize, part: FeedbackPart) -> Self {
        DedupKey::FeedbackEntry {
            workflow: workflow.to_string(),
            stage,
            entry,
            part,
        }
    }

    pub fn stage_index(&self) -> usize {
        match self {
            DedupKey::PendingWithData { stage, .. }
            | DedupKey::WaitingResponseData { stage, .. }
            | DedupKey::Stage { stage, .. }
            | DedupKey::FeedbackEntry { stage, .. }
            | DedupKey::Notification { stage, .. } => *stage,
        }
    }
}

impl fmt::Display for DedupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match serde_json::to_string(self) {
            Ok(json) => f.write_str(&json),
            Err(_) => write!(f, "{self:?}"),
        }
    }
}

/// First characters of the serialized payload plus a digest of the whole payload, or
/// `no-data`. The digest keeps payloads with a shared prefix apart.
pub fn payload_fingerprint(data: Option<&str>) -> String {
    let Some(data) = data.filter(|data| !data.is_empty()) else {
        return NO_DATA.to_string();
    };
    let serialized = serde_json::to_string(data).unwrap_or_else(|_| data.to_string());
    let prefix: String = serialized.chars().take(FINGERPRINT_PREFIX_CHARS).collect();
    format!("{prefix}#{}", short_hash(&serialized))
}
