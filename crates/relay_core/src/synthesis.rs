//! Message synthesis: one stage snapshot in, candidate transcript messages out.
//!
//! Synthesis never touches the transcript. It proposes candidates, each with its dedup
//! key; the reconciler decides which ones are new.

use relay_logging::{relay_debug, relay_trace};

use crate::dedup::{DedupKey, FeedbackPart};
use crate::payload::{ParsedPayload, Payload};
use crate::rules::{
    processing_with, FAILED_CONTENT, FEEDBACK_PROCESSING, PLACEHOLDER_SENTINELS,
    QUESTION_OFFSET_MS, RENDERABLE_CONTENT_CHARS, SUBSTANTIAL_PAYLOAD_CHARS, WAITING_PLACEHOLDER,
};
use crate::tracker::TransitionTracker;
use crate::transition::Transition;
use crate::{MessageKind, Question, StageSnapshot, StageStatus, Timestamp, TranscriptMessage};

/// What an accepted candidate supersedes in the existing transcript.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Replaces {
    /// Transient placeholders of the same stage.
    Placeholders,
    /// Placeholders and earlier results of the same stage.
    PriorResult,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub key: DedupKey,
    pub message: TranscriptMessage,
    pub replaces: Replaces,
}

impl Candidate {
    fn new(key: DedupKey, message: TranscriptMessage) -> Self {
        Self {
            key,
            message,
            replaces: Replaces::Placeholders,
        }
    }

    fn replacing_prior_result(mut self, replace: bool) -> Self {
        if replace {
            self.replaces = Replaces::PriorResult;
        }
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Synthesis {
    pub data_messages: Vec<Candidate>,
    pub question_messages: Vec<Candidate>,
}

impl Synthesis {
    pub fn is_empty(&self) -> bool {
        self.data_messages.is_empty() && self.question_messages.is_empty()
    }

    pub fn into_candidates(self) -> Vec<Candidate> {
        let mut candidates = self.data_messages;
        candidates.extend(self.question_messages);
        candidates
    }
}

/// Inputs besides the snapshot itself.
#[derive(Debug, Clone, Copy)]
pub struct StageContext<'a> {
    pub workflow_id: &'a str,
    pub transition: Transition,
    pub tracker: &'a TransitionTracker,
    pub now: Timestamp,
}

pub fn synthesize(stage: &StageSnapshot, ctx: &StageContext<'_>) -> Synthesis {
    let mut out = Synthesis::default();
    let last_replayed = replay_feedback_history(stage, ctx, &mut out);
    match stage.status {
        StageStatus::Pending => synthesize_pending(stage, ctx, &mut out),
        StageStatus::InProgress => synthesize_in_progress(stage, ctx, &mut out),
        StageStatus::Done => synthesize_done(stage, ctx, &mut out),
        StageStatus::WaitingResponse => {
            synthesize_waiting(stage, ctx, last_replayed.as_deref(), &mut out)
        }
        StageStatus::Failed => synthesize_failed(stage, ctx, &mut out),
    }
    out
}

fn stage_time(stage: &StageSnapshot, ctx: &StageContext<'_>) -> Timestamp {
    stage.updated_at.unwrap_or(ctx.now)
}

fn result_message(
    stage: &StageSnapshot,
    parsed: &ParsedPayload,
    timestamp: Timestamp,
    regenerated: bool,
) -> TranscriptMessage {
    let mut message = TranscriptMessage::for_stage(
        MessageKind::WorkflowSubnet,
        parsed.content.clone().unwrap_or_default(),
        timestamp,
        stage.index,
        &stage.tool_name,
    );
    message.subnet_status = Some(StageStatus::Done);
    message.image_data = parsed.image_data.clone();
    message.content_type = parsed.content_type.clone();
    message.content_hash = Some(parsed.content_hash());
    message.is_regenerated = regenerated;
    message
}

fn status_message(
    stage: &StageSnapshot,
    content: impl Into<String>,
    status: StageStatus,
    timestamp: Timestamp,
) -> TranscriptMessage {
    let mut message = TranscriptMessage::for_stage(
        MessageKind::WorkflowSubnet,
        content,
        timestamp,
        stage.index,
        &stage.tool_name,
    );
    message.subnet_status = Some(status);
    message
}

fn question_candidate(
    stage: &StageSnapshot,
    ctx: &StageContext<'_>,
    question: Question,
    timestamp: Timestamp,
) -> Candidate {
    let kind = if question.is_notification() {
        MessageKind::Notification
    } else {
        MessageKind::Question
    };
    let key = DedupKey::question(
        ctx.workflow_id,
        stage.index,
        stage.status,
        stage.payload(),
        &question,
    );
    let mut message = TranscriptMessage::for_stage(
        kind,
        question.text.clone(),
        timestamp,
        stage.index,
        &stage.tool_name,
    );
    message.subnet_status = Some(stage.status);
    message.question_data = Some(question);
    Candidate::new(key, message)
}

fn is_placeholder_payload(raw: &str) -> bool {
    raw.chars().count() <= SUBSTANTIAL_PAYLOAD_CHARS
        || PLACEHOLDER_SENTINELS
            .iter()
            .any(|sentinel| raw.contains(sentinel))
}

/// Pending stages only speak up when they already carry a real result.
fn synthesize_pending(stage: &StageSnapshot, ctx: &StageContext<'_>, out: &mut Synthesis) {
    let Some(raw) = stage.payload() else {
        return;
    };
    if is_placeholder_payload(raw) {
        relay_trace!("stage {} pending payload is a placeholder", stage.index);
        return;
    }
    let payload = Payload::new(raw);
    let parsed = payload.result();
    if parsed.content_chars() <= RENDERABLE_CONTENT_CHARS {
        return;
    }

    let timestamp = stage_time(stage, ctx);
    out.data_messages.push(Candidate::new(
        DedupKey::pending_with_data(ctx.workflow_id, stage.index, raw),
        result_message(stage, &parsed, timestamp, false),
    ));
    if let Some(question) = payload.question(ctx.now) {
        out.question_messages.push(question_candidate(
            stage,
            ctx,
            question,
            timestamp + QUESTION_OFFSET_MS,
        ));
    }
}

fn synthesize_in_progress(stage: &StageSnapshot, ctx: &StageContext<'_>, out: &mut Synthesis) {
    let with_feedback = ctx.tracker.is_processing_after_feedback(stage.index);
    let content = if with_feedback {
        FEEDBACK_PROCESSING.to_string()
    } else {
        processing_with(&stage.tool_name)
    };
    let mut message = status_message(
        stage,
        content,
        StageStatus::InProgress,
        stage_time(stage, ctx),
    );
    message.is_regenerated = with_feedback;
    out.data_messages.push(Candidate::new(
        DedupKey::stage(
            ctx.workflow_id,
            stage.index,
            MessageKind::WorkflowSubnet,
            StageStatus::InProgress,
            with_feedback,
            stage.payload(),
        ),
        message,
    ));
}

fn synthesize_done(stage: &StageSnapshot, ctx: &StageContext<'_>, out: &mut Synthesis) {
    let Some(raw) = stage.payload() else {
        relay_debug!("stage {} finished without data", stage.index);
        return;
    };
    let payload = Payload::new(raw);
    let parsed = payload.result();
    let regenerated =
        ctx.transition.regenerating || ctx.tracker.is_processing_after_feedback(stage.index);
    let timestamp = stage_time(stage, ctx);

    if parsed.is_renderable() {
        out.data_messages.push(
            Candidate::new(
                DedupKey::stage(
                    ctx.workflow_id,
                    stage.index,
                    MessageKind::WorkflowSubnet,
                    StageStatus::Done,
                    regenerated,
                    Some(raw),
                ),
                result_message(stage, &parsed, timestamp, regenerated),
            )
            .replacing_prior_result(regenerated),
        );
    } else {
        relay_debug!("stage {} result has no renderable content", stage.index);
    }
    if let Some(question) = payload.question(ctx.now) {
        out.question_messages.push(question_candidate(
            stage,
            ctx,
            question,
            timestamp + QUESTION_OFFSET_MS,
        ));
    }
}

/// A waiting stage shows its partial result and its question. A question set directly on
/// the stage beats one embedded in the payload.
fn synthesize_waiting(
    stage: &StageSnapshot,
    ctx: &StageContext<'_>,
    last_replayed: Option<&str>,
    out: &mut Synthesis,
) {
    let payload = stage.payload().map(Payload::new);
    let embedded = payload
        .as_ref()
        .and_then(|payload| payload.question(ctx.now));
    let question = stage.question.clone().or(embedded);

    let mut data_time = None;
    if let Some(payload) = payload.as_ref() {
        let parsed = payload.result();
        if parsed.is_renderable() {
            let timestamp = stage_time(stage, ctx);
            out.data_messages.push(
                Candidate::new(
                    DedupKey::waiting_response_data(ctx.workflow_id, stage.index, stage.payload()),
                    result_message(stage, &parsed, timestamp, false),
                )
                .replacing_prior_result(ctx.transition.showing_question),
            );
            data_time = Some(timestamp);
        }
    }

    match question {
        Some(question) => {
            if last_replayed == Some(question.text.trim()) {
                relay_trace!("stage {} question already replayed from history", stage.index);
                return;
            }
            let timestamp = data_time.map_or(ctx.now, |t| t + QUESTION_OFFSET_MS);
            out.question_messages
                .push(question_candidate(stage, ctx, question, timestamp));
        }
        None if data_time.is_none() && !ctx.tracker.has_feedback(stage.index) => {
            out.data_messages.push(Candidate::new(
                DedupKey::stage(
                    ctx.workflow_id,
                    stage.index,
                    MessageKind::WorkflowSubnet,
                    StageStatus::WaitingResponse,
                    false,
                    stage.payload(),
                ),
                status_message(
                    stage,
                    WAITING_PLACEHOLDER,
                    StageStatus::WaitingResponse,
                    stage_time(stage, ctx),
                ),
            ));
        }
        None => {}
    }
}

fn synthesize_failed(stage: &StageSnapshot, ctx: &StageContext<'_>, out: &mut Synthesis) {
    out.data_messages.push(Candidate::new(
        DedupKey::stage(
            ctx.workflow_id,
            stage.index,
            MessageKind::WorkflowSubnet,
            StageStatus::Failed,
            false,
            stage.payload(),
        ),
        status_message(stage, FAILED_CONTENT, StageStatus::Failed, stage_time(stage, ctx)),
    ));
}

/// Replays past feedback rounds as response/question/answer triples. The trailing entry
/// is skipped when it is the live, still unanswered question. Returns the text of the
/// last replayed question.
fn replay_feedback_history(
    stage: &StageSnapshot,
    ctx: &StageContext<'_>,
    out: &mut Synthesis,
) -> Option<String> {
    let entries = &stage.feedback_history;
    let live = stage.question.as_ref().map(|question| question.text.trim());
    let replay_count = match entries.last() {
        Some(last)
            if last.answer.is_none()
                && live.is_some()
                && last.question.as_deref().map(str::trim) == live =>
        {
            entries.len() - 1
        }
        _ => entries.len(),
    };

    let anchor = stage_time(stage, ctx);
    let mut last_question = None;
    for (position, entry) in entries.iter().take(replay_count).enumerate() {
        let steps_back = (replay_count - position) as Timestamp * 3 * QUESTION_OFFSET_MS;
        let base = entry
            .responded_at
            .or(entry.asked_at)
            .unwrap_or(anchor - steps_back);
        let question_time = base + QUESTION_OFFSET_MS;

        if let Some(response) = non_empty(entry.response.as_deref()) {
            out.data_messages.push(Candidate::new(
                DedupKey::feedback_entry(ctx.workflow_id, stage.index, position, FeedbackPart::Response),
                TranscriptMessage::for_stage(
                    MessageKind::Response,
                    response,
                    base,
                    stage.index,
                    &stage.tool_name,
                ),
            ));
        }

        if let Some(question) = non_empty(entry.question.as_deref()) {
            if !ctx.tracker.has_echo(stage.index, MessageKind::Question, question) {
                out.question_messages.push(Candidate::new(
                    DedupKey::feedback_entry(ctx.workflow_id, stage.index, position, FeedbackPart::Question),
                    TranscriptMessage::for_stage(
                        MessageKind::Question,
                        question,
                        question_time,
                        stage.index,
                        &stage.tool_name,
                    ),
                ));
            }
            last_question = Some(question.trim().to_string());
        }

        if let Some(answer) = non_empty(entry.answer.as_deref()) {
            if !ctx.tracker.has_echo(stage.index, MessageKind::Answer, answer) {
                let answer_time = entry
                    .answered_at
                    .filter(|answered| *answered > question_time)
                    .unwrap_or(question_time + QUESTION_OFFSET_MS);
                out.data_messages.push(Candidate::new(
                    DedupKey::feedback_entry(ctx.workflow_id, stage.index, position, FeedbackPart::Answer),
                    TranscriptMessage::for_stage(
                        MessageKind::Answer,
                        answer,
                        answer_time,
                        stage.index,
                        &stage.tool_name,
                    ),
                ));
            }
        }
    }
    last_question
}

fn non_empty(text: Option<&str>) -> Option<&str> {
    text.filter(|text| !text.trim().is_empty())
}
