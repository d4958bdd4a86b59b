//! Plain-text transcript output. Messages are printed once, in transcript order, as they
//! first appear.

use std::collections::HashSet;
use std::io::{self, Write};

use chrono::{DateTime, Local};
use relay_core::{AppViewModel, MessageKind, Timestamp, TranscriptMessage, WorkflowStatus};

pub struct TranscriptPrinter<W: Write> {
    out: W,
    printed: HashSet<String>,
    notified: HashSet<String>,
    last_status: Option<WorkflowStatus>,
    last_question: Option<String>,
}

impl<W: Write> TranscriptPrinter<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            printed: HashSet::new(),
            notified: HashSet::new(),
            last_status: None,
            last_question: None,
        }
    }

    pub fn line(&mut self, text: &str) -> io::Result<()> {
        writeln!(self.out, "{text}")?;
        self.out.flush()
    }

    pub fn render(&mut self, view: &AppViewModel) -> io::Result<()> {
        for message in &view.transcript {
            if self.printed.insert(message.id.clone()) {
                writeln!(self.out, "{}", format_message(message))?;
            }
        }

        for notice in &view.pending_notifications {
            if self.notified.insert(notice.id.clone()) {
                let stage = notice.subnet_index.unwrap_or_default();
                writeln!(
                    self.out,
                    "  -> /accept {stage} or /decline {stage} to answer \"{}\"",
                    notice.content
                )?;
            }
        }

        let question = view.open_question.as_ref().map(|q| q.text.clone());
        if question != self.last_question {
            if let Some(text) = question.as_deref() {
                let shown = view
                    .transcript
                    .iter()
                    .any(|m| m.kind == MessageKind::Question && m.content == text);
                if !shown {
                    writeln!(self.out, "pending question: {text}")?;
                }
            }
            self.last_question = question;
        }

        if view.status != self.last_status {
            if let Some(status) = view.status.filter(|status| status.is_terminal()) {
                writeln!(self.out, "workflow {status}")?;
            }
            self.last_status = view.status;
        }
        self.out.flush()
    }

    #[cfg(test)]
    fn into_inner(self) -> W {
        self.out
    }
}

pub fn format_message(message: &TranscriptMessage) -> String {
    let label = match message.kind {
        MessageKind::User | MessageKind::Answer => "you".to_string(),
        MessageKind::Response => "relay".to_string(),
        MessageKind::Question => "question".to_string(),
        MessageKind::Notification => "notice".to_string(),
        MessageKind::WorkflowSubnet => stage_label(message),
    };
    let regenerated = if message.is_regenerated { " (revised)" } else { "" };
    format!(
        "[{}] {label}{regenerated}: {}",
        format_time(message.timestamp),
        message.content
    )
}

fn stage_label(message: &TranscriptMessage) -> String {
    match (message.subnet_index, message.tool_name.as_deref()) {
        (Some(index), Some(tool)) => format!("stage {index} ({tool})"),
        (Some(index), None) => format!("stage {index}"),
        (None, _) => "workflow".to_string(),
    }
}

fn format_time(timestamp: Timestamp) -> String {
    DateTime::from_timestamp_millis(timestamp)
        .map(|time| time.with_timezone(&Local).format("%H:%M:%S").to_string())
        .unwrap_or_else(|| "--:--:--".to_string())
}
