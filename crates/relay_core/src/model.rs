//! Wire shapes reported by the remote workflow service.
//!
//! Everything here is read-only input: the reducer never mutates a snapshot, it only
//! compares it against what it saw on the previous poll.

use std::fmt;

use chrono::DateTime;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Milliseconds since the Unix epoch.
pub type Timestamp = i64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    Pending,
    InProgress,
    WaitingResponse,
    Done,
    Failed,
}

impl StageStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            StageStatus::Pending => "pending",
            StageStatus::InProgress => "in_progress",
            StageStatus::WaitingResponse => "waiting_response",
            StageStatus::Done => "done",
            StageStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for StageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Workflow-level status signal used by the host to gate polling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStatus {
    Running,
    WaitingResponse,
    Completed,
    Failed,
    Stopped,
}

impl WorkflowStatus {
    /// Terminal statuses halt snapshot application for the workflow.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            WorkflowStatus::Completed | WorkflowStatus::Failed | WorkflowStatus::Stopped
        )
    }
}

impl fmt::Display for WorkflowStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            WorkflowStatus::Running => "running",
            WorkflowStatus::WaitingResponse => "waiting_response",
            WorkflowStatus::Completed => "completed",
            WorkflowStatus::Failed => "failed",
            WorkflowStatus::Stopped => "stopped",
        };
        f.write_str(label)
    }
}

/// Question identifiers arrive either as numbers or as strings.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ItemId {
    Number(i64),
    Text(String),
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ItemId::Number(n) => write!(f, "{n}"),
            ItemId::Text(s) => f.write_str(s),
        }
    }
}

/// Interactive prompt attached to a stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    #[serde(rename = "type", default = "default_question_kind")]
    pub kind: String,
    pub text: String,
    #[serde(default)]
    pub item_id: Option<ItemId>,
    #[serde(default, deserialize_with = "deserialize_timestamp")]
    pub expires_at: Option<Timestamp>,
}

pub const FEEDBACK_QUESTION_KIND: &str = "feedback";
pub const NOTIFICATION_QUESTION_KIND: &str = "notification";

fn default_question_kind() -> String {
    FEEDBACK_QUESTION_KIND.to_string()
}

impl Question {
    pub fn is_notification(&self) -> bool {
        self.kind.eq_ignore_ascii_case(NOTIFICATION_QUESTION_KIND)
    }
}

/// One past question/answer round for a stage.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackEntry {
    #[serde(default, deserialize_with = "deserialize_loose_text")]
    pub question: Option<String>,
    #[serde(default, deserialize_with = "deserialize_loose_text")]
    pub answer: Option<String>,
    #[serde(default, deserialize_with = "deserialize_loose_text")]
    pub response: Option<String>,
    #[serde(default, deserialize_with = "deserialize_timestamp")]
    pub asked_at: Option<Timestamp>,
    #[serde(default, deserialize_with = "deserialize_timestamp")]
    pub answered_at: Option<Timestamp>,
    #[serde(default, deserialize_with = "deserialize_timestamp")]
    pub responded_at: Option<Timestamp>,
}

/// One pipeline stage as reported at poll time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StageSnapshot {
    pub index: usize,
    #[serde(default)]
    pub tool_name: String,
    pub status: StageStatus,
    #[serde(default, deserialize_with = "deserialize_payload")]
    pub data: Option<String>,
    #[serde(default, deserialize_with = "deserialize_question")]
    pub question: Option<Question>,
    #[serde(default)]
    pub feedback_history: Vec<FeedbackEntry>,
    #[serde(default, deserialize_with = "deserialize_timestamp")]
    pub updated_at: Option<Timestamp>,
}

impl StageSnapshot {
    pub fn new(index: usize, status: StageStatus) -> Self {
        Self {
            index,
            tool_name: String::new(),
            status,
            data: None,
            question: None,
            feedback_history: Vec::new(),
            updated_at: None,
        }
    }

    pub fn with_tool(mut self, tool_name: impl Into<String>) -> Self {
        self.tool_name = tool_name.into();
        self
    }

    pub fn with_data(mut self, data: impl Into<String>) -> Self {
        self.data = Some(data.into());
        self
    }

    pub fn with_question(mut self, question: Question) -> Self {
        self.question = Some(question);
        self
    }

    pub fn with_updated_at(mut self, updated_at: Timestamp) -> Self {
        self.updated_at = Some(updated_at);
        self
    }

    /// Non-empty payload string.
    pub fn payload(&self) -> Option<&str> {
        self.data.as_deref().filter(|data| !data.is_empty())
    }

    pub fn has_data(&self) -> bool {
        self.payload().is_some()
    }
}

/// Full status document delivered on each poll tick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusPoll {
    pub request_id: String,
    pub workflow_status: WorkflowStatus,
    #[serde(default)]
    pub subnets: Vec<StageSnapshot>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawTimestamp {
    Millis(i64),
    Float(f64),
    Text(String),
}

fn parse_timestamp(raw: RawTimestamp) -> Option<Timestamp> {
    match raw {
        RawTimestamp::Millis(ms) => Some(ms),
        RawTimestamp::Float(ms) if ms.is_finite() => Some(ms as Timestamp),
        RawTimestamp::Float(_) => None,
        RawTimestamp::Text(text) => {
            let text = text.trim();
            text.parse::<Timestamp>().ok().or_else(|| {
                DateTime::parse_from_rfc3339(text)
                    .ok()
                    .map(|dt| dt.timestamp_millis())
            })
        }
    }
}

/// Accepts epoch milliseconds or RFC 3339 text; anything unreadable becomes `None`.
fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<Option<Timestamp>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Value>::deserialize(deserializer)?;
    Ok(raw
        .and_then(|value| serde_json::from_value::<RawTimestamp>(value).ok())
        .and_then(parse_timestamp))
}

/// Stage payloads are normally JSON text, but some stages send the object inline.
fn deserialize_payload<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Value>::deserialize(deserializer)?;
    Ok(match raw {
        None | Some(Value::Null) => None,
        Some(Value::String(text)) => Some(text),
        Some(other) => Some(other.to_string()),
    })
}

/// A bare string is a feedback question; an unreadable one is dropped with the stage kept.
fn deserialize_question<'de, D>(deserializer: D) -> Result<Option<Question>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Value>::deserialize(deserializer)?;
    Ok(match raw {
        Some(Value::String(text)) => Some(Question {
            kind: default_question_kind(),
            text,
            item_id: None,
            expires_at: None,
        }),
        Some(value @ Value::Object(_)) => serde_json::from_value::<Question>(value).ok(),
        _ => None,
    }
    .filter(|question| !question.text.trim().is_empty()))
}

fn deserialize_loose_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Value>::deserialize(deserializer)?;
    Ok(match raw {
        Some(Value::String(text)) => Some(text),
        Some(Value::Object(map)) => map
            .get("text")
            .and_then(Value::as_str)
            .map(ToOwned::to_owned),
        _ => None,
    })
}
