use std::collections::HashMap;

use serde::Serialize;

use crate::hashing::fingerprint;
use crate::payload::Payload;
use crate::{Question, StageSnapshot, StageStatus, Timestamp};

/// Last-seen observable state of one stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedSnapshot {
    pub status: StageStatus,
    pub data: Option<String>,
    pub question: Option<Question>,
    pub content_hash: String,
}

impl CachedSnapshot {
    fn from_stage(stage: &StageSnapshot) -> Self {
        Self {
            status: stage.status,
            data: stage.data.clone(),
            question: stage.question.clone(),
            content_hash: observable_hash(stage),
        }
    }

    /// Direct question, else one embedded in the payload.
    pub fn resolved_question(&self, now: Timestamp) -> Option<Question> {
        self.question.clone().or_else(|| {
            self.data
                .as_deref()
                .filter(|data| !data.is_empty())
                .and_then(|data| Payload::new(data).question(now))
        })
    }
}

/// Hash of `{status, data, question}`; independent of the parsed-content hash.
fn observable_hash(stage: &StageSnapshot) -> String {
    #[derive(Serialize)]
    struct Observable<'a> {
        status: StageStatus,
        data: Option<&'a str>,
        question: Option<&'a Question>,
    }
    fingerprint(&Observable {
        status: stage.status,
        data: stage.data.as_deref(),
        question: stage.question.as_ref(),
    })
}

/// Per (workflow, stage) record of the last processed snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SnapshotCache {
    entries: HashMap<(String, usize), CachedSnapshot>,
}

impl SnapshotCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Must run before [`Self::cache`] for the same update; `cache` replaces the baseline.
    pub fn has_changed(&self, workflow_id: &str, stage_index: usize, stage: &StageSnapshot) -> bool {
        match self.get(workflow_id, stage_index) {
            Some(cached) => cached.content_hash != observable_hash(stage),
            None => true,
        }
    }

    pub fn cache(&mut self, workflow_id: &str, stage_index: usize, stage: &StageSnapshot) {
        self.entries.insert(
            (workflow_id.to_string(), stage_index),
            CachedSnapshot::from_stage(stage),
        );
    }

    pub fn get(&self, workflow_id: &str, stage_index: usize) -> Option<&CachedSnapshot> {
        self.entries.get(&(workflow_id.to_string(), stage_index))
    }

    /// Lowest-index stage of the workflow waiting on a question, or the given stage if it is.
    pub fn awaiting_question(
        &self,
        workflow_id: &str,
        target: Option<usize>,
        now: Timestamp,
    ) -> Option<(usize, Question)> {
        self.waiting_stages(workflow_id)
            .into_iter()
            .filter(|(index, _)| target.map_or(true, |target| target == *index))
            .find_map(|(index, cached)| cached.resolved_question(now).map(|q| (index, q)))
    }

    /// Like [`Self::awaiting_question`] with no target, passing over `blocked`.
    pub fn next_awaiting_question(
        &self,
        workflow_id: &str,
        blocked: Option<usize>,
        now: Timestamp,
    ) -> Option<(usize, Question)> {
        self.waiting_stages(workflow_id)
            .into_iter()
            .filter(|(index, _)| Some(*index) != blocked)
            .find_map(|(index, cached)| cached.resolved_question(now).map(|q| (index, q)))
    }

    fn waiting_stages(&self, workflow_id: &str) -> Vec<(usize, &CachedSnapshot)> {
        let mut stages: Vec<(usize, &CachedSnapshot)> = self
            .entries
            .iter()
            .filter(|((workflow, _), cached)| {
                workflow == workflow_id && cached.status == StageStatus::WaitingResponse
            })
            .map(|((_, index), cached)| (*index, cached))
            .collect();
        stages.sort_by_key(|(index, _)| *index);
        stages
    }

    pub fn forget_workflow(&mut self, workflow_id: &str) {
        self.entries.retain(|(workflow, _), _| workflow != workflow_id);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
