use serde::{Deserialize, Serialize};

use crate::rules::TRANSIENT_CONTENTS;
use crate::{Question, StageStatus, Timestamp};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    User,
    Response,
    Question,
    Answer,
    WorkflowSubnet,
    Notification,
}

impl MessageKind {
    pub fn as_str(self) -> &'static str {
        match self {
            MessageKind::User => "user",
            MessageKind::Response => "response",
            MessageKind::Question => "question",
            MessageKind::Answer => "answer",
            MessageKind::WorkflowSubnet => "workflow_subnet",
            MessageKind::Notification => "notification",
        }
    }
}

/// Atomic transcript unit. `id` is a render key only; equality of content is decided by
/// `source_key`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TranscriptMessage {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: MessageKind,
    pub content: String,
    pub timestamp: Timestamp,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subnet_status: Option<StageStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subnet_index: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_data: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub question_data: Option<Question>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_hash: Option<String>,
    pub is_regenerated: bool,
}

impl TranscriptMessage {
    pub fn new(kind: MessageKind, content: impl Into<String>, timestamp: Timestamp) -> Self {
        Self {
            id: String::new(),
            kind,
            content: content.into(),
            timestamp,
            subnet_status: None,
            tool_name: None,
            subnet_index: None,
            image_data: None,
            content_type: None,
            question_data: None,
            source_key: None,
            content_hash: None,
            is_regenerated: false,
        }
    }

    /// Stage-scoped message carrying the stage's index and tool name.
    pub fn for_stage(
        kind: MessageKind,
        content: impl Into<String>,
        timestamp: Timestamp,
        subnet_index: usize,
        tool_name: &str,
    ) -> Self {
        let mut message = Self::new(kind, content, timestamp);
        message.subnet_index = Some(subnet_index);
        if !tool_name.is_empty() {
            message.tool_name = Some(tool_name.to_string());
        }
        message
    }

    /// Stage placeholders stand in for state that a later poll resolves.
    pub fn is_transient(&self) -> bool {
        if self.kind != MessageKind::WorkflowSubnet {
            return false;
        }
        matches!(
            self.subnet_status,
            Some(StageStatus::Pending) | Some(StageStatus::InProgress)
        ) || TRANSIENT_CONTENTS.contains(&self.content.as_str())
    }

    /// A stage's rendered result, as opposed to a placeholder for it.
    pub fn is_stage_result(&self) -> bool {
        self.kind == MessageKind::WorkflowSubnet
            && self.subnet_status == Some(StageStatus::Done)
            && !self.is_transient()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_stage_messages_are_transient() {
        let mut message = TranscriptMessage::new(MessageKind::Response, "Processing...", 0);
        assert!(!message.is_transient());
        message.kind = MessageKind::WorkflowSubnet;
        assert!(message.is_transient());
    }

    #[test]
    fn in_progress_stage_message_is_transient() {
        let mut message =
            TranscriptMessage::for_stage(MessageKind::WorkflowSubnet, "Processing with x...", 0, 1, "x");
        message.subnet_status = Some(StageStatus::InProgress);
        assert!(message.is_transient());
        assert!(!message.is_stage_result());

        message.subnet_status = Some(StageStatus::Done);
        message.content = "result".into();
        assert!(!message.is_transient());
        assert!(message.is_stage_result());
    }

    #[test]
    fn serializes_with_wire_names() {
        let message = TranscriptMessage::for_stage(MessageKind::WorkflowSubnet, "42", 5, 0, "search");
        let json = serde_json::to_value(&message).unwrap();
        assert_eq!(json["type"], "workflow_subnet");
        assert_eq!(json["subnetIndex"], 0);
        assert_eq!(json["toolName"], "search");
        assert_eq!(json["isRegenerated"], false);
        assert!(json.get("imageData").is_none());
    }
}
