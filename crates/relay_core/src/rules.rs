//! Thresholds and fixed strings that drive message synthesis and reconciliation.

use crate::Timestamp;

/// Pending payloads at or below this many characters are treated as noise.
pub const SUBSTANTIAL_PAYLOAD_CHARS: usize = 50;

/// Pending payloads must yield more content than this to be shown early.
pub const RENDERABLE_CONTENT_CHARS: usize = 10;

/// Substrings marking a pending payload as a queue placeholder rather than a result.
pub const PLACEHOLDER_SENTINELS: &[&str] = &["Queued for processing", "Processing with"];

/// A question always sorts this long after the data message it accompanies.
pub const QUESTION_OFFSET_MS: Timestamp = 1_000;

/// Expiry given to questions that arrive as bare strings.
pub const DEFAULT_QUESTION_TTL_MS: Timestamp = 30 * 60 * 1_000;

/// Number of serialized payload characters carried verbatim in a dedup key.
pub const FINGERPRINT_PREFIX_CHARS: usize = 100;

/// Shown after the opening prompt until the first stage reports.
pub const WORKFLOW_PLACEHOLDER: &str = "Processing...";
/// Stands in for a waiting stage that has neither data nor a question yet.
pub const WAITING_PLACEHOLDER: &str = "Waiting for your response...";
/// Content of a failed stage's message.
pub const FAILED_CONTENT: &str = "Failed to process";
/// Shown while a stage reworks its result after an answer.
pub const FEEDBACK_PROCESSING: &str = "Processing with your feedback...";
/// Shown while an answer is on its way to the service; removed once the outcome is known.
pub const SUBMITTING_FEEDBACK: &str = "Submitting feedback...";
/// Appended once the service accepts an answer.
pub const FEEDBACK_ACCEPTED: &str = "Feedback submitted. Continuing the workflow...";
/// Result text for a finished stage that only rewrote the prompt.
pub const PROMPT_ENHANCEMENT: &str = "Prompt enhancement detected";

/// Stage message contents that only stand in for state a later poll will resolve.
pub const TRANSIENT_CONTENTS: &[&str] = &[
    WORKFLOW_PLACEHOLDER,
    "Waiting for response...",
    WAITING_PLACEHOLDER,
    FAILED_CONTENT,
];

/// In-progress placeholder naming the stage's tool, or a generic step when it has none.
pub fn processing_with(tool_name: &str) -> String {
    let tool = if tool_name.trim().is_empty() {
        "the next step"
    } else {
        tool_name
    };
    format!("Processing with {tool}...")
}
