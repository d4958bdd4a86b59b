//! Transcript reconciliation: merge synthesized candidates into the ordered transcript.

use std::collections::{BTreeMap, BTreeSet};

use relay_logging::relay_debug;

use crate::synthesis::{Candidate, Replaces};
use crate::tracker::MessageKeys;
use crate::{MessageKind, StageStatus, TranscriptMessage};

/// Render ids for one workflow: `{workflow}-{sequence}`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MessageIds {
    prefix: String,
    next: u64,
}

impl MessageIds {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            next: 1,
        }
    }

    pub fn next_id(&mut self) -> String {
        let id = format!("{}-{}", self.prefix, self.next);
        self.next += 1;
        id
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Reconciled {
    pub transcript: Vec<TranscriptMessage>,
    /// Accepted `notification` messages, for the pending-notifications list.
    pub notifications: Vec<TranscriptMessage>,
    pub accepted: Vec<TranscriptMessage>,
}

/// Merges `candidates` into `previous`.
///
/// Candidates whose key is already in `keys` are dropped; accepted keys are added. When
/// nothing is accepted the transcript is returned unchanged. Otherwise transient stage
/// placeholders superseded by an accepted message are removed, accepted messages are
/// appended in timestamp order, and a merge that would empty a non-empty transcript is
/// discarded.
pub fn reconcile(
    previous: &[TranscriptMessage],
    candidates: Vec<Candidate>,
    keys: &mut MessageKeys,
    ids: &mut MessageIds,
) -> Reconciled {
    let mut accepted = Vec::new();
    let mut placeholder_stages = BTreeSet::new();
    let mut result_stages = BTreeSet::new();

    for candidate in candidates {
        let key = candidate.key.to_string();
        if !keys.add(key.clone()) {
            relay_debug!("skipping duplicate message {}", key);
            continue;
        }
        let stage = candidate.key.stage_index();
        placeholder_stages.insert(stage);
        if candidate.replaces == Replaces::PriorResult {
            result_stages.insert(stage);
        }
        let mut message = candidate.message;
        message.id = ids.next_id();
        message.source_key = Some(key);
        accepted.push(message);
    }

    if accepted.is_empty() {
        return Reconciled {
            transcript: previous.to_vec(),
            ..Reconciled::default()
        };
    }

    let mut transcript: Vec<TranscriptMessage> = previous
        .iter()
        .filter(|message| !is_superseded(message, &placeholder_stages, &result_stages))
        .cloned()
        .collect();
    accepted.sort_by_key(|message| message.timestamp);
    transcript.extend(accepted.iter().cloned());

    if transcript.is_empty() && !previous.is_empty() {
        return Reconciled {
            transcript: previous.to_vec(),
            ..Reconciled::default()
        };
    }

    let notifications = accepted
        .iter()
        .filter(|message| message.kind == MessageKind::Notification)
        .cloned()
        .collect();

    Reconciled {
        transcript,
        notifications,
        accepted,
    }
}

/// Drops the placeholders of stages that settled in this poll, whether or not the stage
/// produced a message of its own. `settled` maps a stage to the status it settled in.
///
/// Pending and in-progress placeholders go for any settled stage; a waiting placeholder
/// only once the stage is done or failed. A workflow-level placeholder goes as soon as any
/// stage settles. Returns the number of messages removed.
pub fn retire_placeholders(
    transcript: &mut Vec<TranscriptMessage>,
    settled: &BTreeMap<usize, StageStatus>,
) -> usize {
    if settled.is_empty() {
        return 0;
    }
    let before = transcript.len();
    transcript.retain(|message| !is_retired(message, settled));
    before - transcript.len()
}

fn is_retired(message: &TranscriptMessage, settled: &BTreeMap<usize, StageStatus>) -> bool {
    if !message.is_transient() {
        return false;
    }
    let Some(stage) = message.subnet_index else {
        return true;
    };
    let Some(settled_as) = settled.get(&stage) else {
        return false;
    };
    match message.subnet_status {
        Some(StageStatus::Pending) | Some(StageStatus::InProgress) => true,
        Some(StageStatus::WaitingResponse) => {
            matches!(settled_as, StageStatus::Done | StageStatus::Failed)
        }
        _ => false,
    }
}

/// Sticky messages (anything but stage messages) always survive. A workflow-level
/// placeholder yields to any stage output.
fn is_superseded(
    message: &TranscriptMessage,
    placeholder_stages: &BTreeSet<usize>,
    result_stages: &BTreeSet<usize>,
) -> bool {
    if message.kind != MessageKind::WorkflowSubnet {
        return false;
    }
    match message.subnet_index {
        None => message.is_transient(),
        Some(stage) if message.is_transient() => placeholder_stages.contains(&stage),
        Some(stage) => message.is_stage_result() && result_stages.contains(&stage),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dedup::DedupKey;
    use crate::rules::{FAILED_CONTENT, WAITING_PLACEHOLDER, WORKFLOW_PLACEHOLDER};
    use crate::StageStatus;

    fn stage_message(stage: usize, status: StageStatus, content: &str, ts: i64) -> TranscriptMessage {
        let mut message =
            TranscriptMessage::for_stage(MessageKind::WorkflowSubnet, content, ts, stage, "tool");
        message.subnet_status = Some(status);
        message
    }

    fn candidate(stage: usize, status: StageStatus, content: &str, ts: i64) -> Candidate {
        Candidate {
            key: DedupKey::stage(
                "wf",
                stage,
                MessageKind::WorkflowSubnet,
                status,
                false,
                Some(content),
            ),
            message: stage_message(stage, status, content, ts),
            replaces: Replaces::Placeholders,
        }
    }

    #[test]
    fn duplicates_are_filtered_and_transcript_kept() {
        let mut keys = MessageKeys::default();
        let mut ids = MessageIds::new("wf");
        let first = reconcile(
            &[],
            vec![candidate(0, StageStatus::Done, "a", 1)],
            &mut keys,
            &mut ids,
        );
        assert_eq!(first.transcript.len(), 1);
        assert_eq!(first.transcript[0].id, "wf-1");

        let second = reconcile(
            &first.transcript,
            vec![candidate(0, StageStatus::Done, "a", 1)],
            &mut keys,
            &mut ids,
        );
        assert_eq!(second.transcript, first.transcript);
        assert!(second.accepted.is_empty());
    }

    #[test]
    fn placeholders_of_the_same_stage_are_replaced() {
        let previous = vec![
            TranscriptMessage::new(MessageKind::User, "do it", 0),
            stage_message(0, StageStatus::InProgress, "Processing with a...", 1),
            stage_message(1, StageStatus::InProgress, "Processing with b...", 2),
        ];
        let mut keys = MessageKeys::default();
        let mut ids = MessageIds::new("wf");
        let out = reconcile(
            &previous,
            vec![candidate(0, StageStatus::Done, "result", 3)],
            &mut keys,
            &mut ids,
        );
        let contents: Vec<_> = out.transcript.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["do it", "Processing with b...", "result"]);
    }

    #[test]
    fn workflow_placeholder_yields_to_any_stage_output() {
        let mut placeholder = TranscriptMessage::new(MessageKind::WorkflowSubnet, WORKFLOW_PLACEHOLDER, 0);
        placeholder.subnet_status = Some(StageStatus::InProgress);
        let mut keys = MessageKeys::default();
        let mut ids = MessageIds::new("wf");
        let out = reconcile(
            &[placeholder],
            vec![candidate(4, StageStatus::InProgress, "Processing with x...", 1)],
            &mut keys,
            &mut ids,
        );
        assert_eq!(out.transcript.len(), 1);
        assert_eq!(out.transcript[0].content, "Processing with x...");
    }

    #[test]
    fn prior_result_is_replaced_only_when_asked() {
        let previous = vec![stage_message(2, StageStatus::Done, "v1", 1)];
        let mut keys = MessageKeys::default();
        let mut ids = MessageIds::new("wf");

        let appended = reconcile(
            &previous,
            vec![candidate(2, StageStatus::Done, "v1 again", 2)],
            &mut keys,
            &mut ids,
        );
        assert_eq!(appended.transcript.len(), 2);

        let mut regenerated = candidate(2, StageStatus::Done, "v2", 3);
        regenerated.replaces = Replaces::PriorResult;
        regenerated.message.is_regenerated = true;
        let replaced = reconcile(&previous, vec![regenerated], &mut keys, &mut ids);
        assert_eq!(replaced.transcript.len(), 1);
        assert_eq!(replaced.transcript[0].content, "v2");
        assert!(replaced.transcript[0].is_regenerated);
    }

    #[test]
    fn accepted_messages_are_sorted_by_timestamp() {
        let mut keys = MessageKeys::default();
        let mut ids = MessageIds::new("wf");
        let out = reconcile(
            &[],
            vec![
                candidate(1, StageStatus::Done, "later", 20),
                candidate(0, StageStatus::Done, "earlier", 10),
            ],
            &mut keys,
            &mut ids,
        );
        let contents: Vec<_> = out.transcript.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["earlier", "later"]);
        assert!(out.transcript.iter().all(|m| m.source_key.is_some()));
    }

    #[test]
    fn settled_stage_retires_its_placeholders_only() {
        let mut transcript = vec![
            stage_message(0, StageStatus::InProgress, "Processing with a...", 1),
            stage_message(1, StageStatus::InProgress, "Processing with b...", 2),
            stage_message(2, StageStatus::WaitingResponse, WAITING_PLACEHOLDER, 3),
            stage_message(3, StageStatus::Failed, FAILED_CONTENT, 4),
        ];
        let settled = BTreeMap::from([
            (0, StageStatus::Done),
            (2, StageStatus::WaitingResponse),
            (3, StageStatus::Failed),
        ]);
        assert_eq!(retire_placeholders(&mut transcript, &settled), 1);
        let contents: Vec<_> = transcript.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(
            contents,
            vec!["Processing with b...", WAITING_PLACEHOLDER, FAILED_CONTENT]
        );

        let done = BTreeMap::from([(2, StageStatus::Done)]);
        assert_eq!(retire_placeholders(&mut transcript, &done), 1);
        assert_eq!(transcript.len(), 2);
    }

    #[test]
    fn nothing_settled_keeps_workflow_placeholder() {
        let mut placeholder = TranscriptMessage::new(MessageKind::WorkflowSubnet, WORKFLOW_PLACEHOLDER, 0);
        placeholder.subnet_status = Some(StageStatus::InProgress);
        let mut transcript = vec![placeholder];
        assert_eq!(retire_placeholders(&mut transcript, &BTreeMap::new()), 0);
        assert_eq!(retire_placeholders(&mut transcript, &BTreeMap::from([(0, StageStatus::Done)])), 1);
        assert!(transcript.is_empty());
    }

    #[test]
    fn notifications_are_reported_separately() {
        let mut keys = MessageKeys::default();
        let mut ids = MessageIds::new("wf");
        let mut notice = candidate(0, StageStatus::WaitingResponse, "Mint?", 5);
        notice.message.kind = MessageKind::Notification;
        let out = reconcile(&[], vec![notice], &mut keys, &mut ids);
        assert_eq!(out.notifications.len(), 1);
        assert_eq!(out.notifications[0].content, "Mint?");
    }
}
