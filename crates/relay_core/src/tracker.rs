use std::collections::{BTreeMap, BTreeSet, HashSet};

use crate::{MessageKind, StageStatus};

/// Dedup keys already emitted for one workflow.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MessageKeys {
    keys: HashSet<String>,
}

impl MessageKeys {
    pub fn has(&self, key: &str) -> bool {
        self.keys.contains(key)
    }

    /// Returns false when the key was already present.
    pub fn add(&mut self, key: impl Into<String>) -> bool {
        self.keys.insert(key.into())
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

/// Per-workflow transition bookkeeping: last status per stage, the feedback round trip
/// sets, and the emitted-key set.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TransitionTracker {
    statuses: BTreeMap<usize, StageStatus>,
    feedback_given: BTreeSet<usize>,
    processing_after_feedback: BTreeSet<usize>,
    message_keys: MessageKeys,
    // Question and answer texts already put in front of the user, per stage. History
    // replay skips these so a live round is not shown twice.
    echoes: BTreeSet<(usize, MessageKind, String)>,
}

impl TransitionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn previous_status(&self, stage_index: usize) -> Option<StageStatus> {
        self.statuses.get(&stage_index).copied()
    }

    pub fn record_status(&mut self, stage_index: usize, status: StageStatus) {
        self.statuses.insert(stage_index, status);
    }

    pub fn has_feedback(&self, stage_index: usize) -> bool {
        self.feedback_given.contains(&stage_index)
    }

    pub fn mark_feedback(&mut self, stage_index: usize) {
        self.feedback_given.insert(stage_index);
    }

    pub fn clear_feedback(&mut self, stage_index: usize) {
        self.feedback_given.remove(&stage_index);
    }

    pub fn is_processing_after_feedback(&self, stage_index: usize) -> bool {
        self.processing_after_feedback.contains(&stage_index)
    }

    pub fn mark_processing_after_feedback(&mut self, stage_index: usize) {
        self.processing_after_feedback.insert(stage_index);
    }

    pub fn clear_processing_after_feedback(&mut self, stage_index: usize) {
        self.processing_after_feedback.remove(&stage_index);
    }

    pub fn keys(&self) -> &MessageKeys {
        &self.message_keys
    }

    pub fn keys_mut(&mut self) -> &mut MessageKeys {
        &mut self.message_keys
    }

    pub fn record_echo(&mut self, stage_index: usize, kind: MessageKind, text: &str) {
        self.echoes.insert((stage_index, kind, text.trim().to_string()));
    }

    pub fn has_echo(&self, stage_index: usize, kind: MessageKind, text: &str) -> bool {
        self.echoes
            .contains(&(stage_index, kind, text.trim().to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unseen_stage_has_no_previous_status() {
        let mut tracker = TransitionTracker::new();
        assert_eq!(tracker.previous_status(4), None);
        tracker.record_status(4, StageStatus::InProgress);
        assert_eq!(tracker.previous_status(4), Some(StageStatus::InProgress));
    }

    #[test]
    fn feedback_sets_are_independent() {
        let mut tracker = TransitionTracker::new();
        tracker.mark_feedback(1);
        tracker.mark_processing_after_feedback(2);
        assert!(tracker.has_feedback(1));
        assert!(!tracker.has_feedback(2));
        assert!(tracker.is_processing_after_feedback(2));
        tracker.clear_feedback(1);
        tracker.clear_processing_after_feedback(2);
        assert!(!tracker.has_feedback(1));
        assert!(!tracker.is_processing_after_feedback(2));
    }

    #[test]
    fn message_keys_report_duplicates() {
        let mut tracker = TransitionTracker::new();
        assert!(tracker.keys_mut().add("k"));
        assert!(!tracker.keys_mut().add("k"));
        assert!(tracker.keys().has("k"));
        assert_eq!(tracker.keys().len(), 1);
    }

    #[test]
    fn echoes_are_scoped_by_stage_and_kind() {
        let mut tracker = TransitionTracker::new();
        tracker.record_echo(0, MessageKind::Answer, " yes ");
        assert!(tracker.has_echo(0, MessageKind::Answer, "yes"));
        assert!(!tracker.has_echo(1, MessageKind::Answer, "yes"));
        assert!(!tracker.has_echo(0, MessageKind::Question, "yes"));
    }
}
