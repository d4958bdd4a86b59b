//! Relay core: turns polled workflow snapshots into an ordered, deduplicated transcript.
//!
//! Everything here is pure. The host feeds [`Msg`]s into [`update`] and executes the
//! returned [`Effect`]s; the clock comes in through the messages.
mod dedup;
mod effect;
mod feedback;
mod hashing;
mod message;
mod model;
mod msg;
mod payload;
mod reconcile;
pub mod rules;
mod session;
mod snapshot_cache;
mod state;
mod synthesis;
mod tracker;
mod transition;
mod update;
mod view_model;

pub use dedup::{payload_fingerprint, DedupKey, FeedbackPart};
pub use effect::Effect;
pub use feedback::{FeedbackPhase, FeedbackRequest, NO_OPEN_QUESTION};
pub use message::{MessageKind, TranscriptMessage};
pub use model::{
    FeedbackEntry, ItemId, Question, StageSnapshot, StageStatus, StatusPoll, Timestamp,
    WorkflowStatus, FEEDBACK_QUESTION_KIND, NOTIFICATION_QUESTION_KIND,
};
pub use msg::Msg;
pub use payload::{content_hash, parse_payload, ParsedPayload, Payload};
pub use reconcile::{reconcile, retire_placeholders, MessageIds, Reconciled};
pub use session::WorkflowSession;
pub use snapshot_cache::{CachedSnapshot, SnapshotCache};
pub use state::AppState;
pub use synthesis::{synthesize, Candidate, Replaces, StageContext, Synthesis};
pub use tracker::{MessageKeys, TransitionTracker};
pub use transition::Transition;
pub use update::update;
pub use view_model::{AppViewModel, OpenQuestion};
