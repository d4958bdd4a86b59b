//! Commands typed on stdin.

use relay_core::{Msg, Timestamp};

pub const HELP: &str = "Type an answer and press Enter. Commands: /accept N, /decline N, /stop, /quit, /help";

#[derive(Debug, PartialEq, Eq)]
pub enum Command {
    Dispatch(Msg),
    Help,
    Quit,
    Invalid(String),
}

/// Interprets one input line. Blank lines yield `None`.
pub fn parse_line(line: &str, now: Timestamp) -> Option<Command> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    let Some(command) = line.strip_prefix('/') else {
        return Some(Command::Dispatch(Msg::FeedbackSubmitted {
            answer: line.to_string(),
            now,
        }));
    };

    let mut words = command.split_whitespace();
    let name = words.next().unwrap_or_default();
    let parsed = match name {
        "quit" | "exit" => Command::Quit,
        "stop" => Command::Dispatch(Msg::StopClicked),
        "help" => Command::Help,
        "accept" | "decline" => match words.next().map(str::parse::<usize>) {
            Some(Ok(subnet_index)) => Command::Dispatch(Msg::NotificationResponded {
                subnet_index,
                accepted: name == "accept",
                now,
            }),
            _ => Command::Invalid(format!("usage: /{name} <stage>")),
        },
        other => Command::Invalid(format!("unknown command /{other}")),
    };
    Some(parsed)
}
