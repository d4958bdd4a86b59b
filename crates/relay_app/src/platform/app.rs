use std::io::{self, BufRead};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::Duration;

use anyhow::Context;
use chrono::Utc;
use log::LevelFilter;
use relay_core::{update, AppState, Msg, Timestamp};
use relay_logging::{relay_debug, relay_info};

use super::cli::Args;
use super::effects::EffectRunner;
use super::input::{self, Command};
use super::logging;
use super::render::TranscriptPrinter;

/// Render coalescing interval.
const TICK: Duration = Duration::from_millis(75);

pub fn run_app(args: Args) -> anyhow::Result<()> {
    let level = if args.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    logging::initialize(args.log.into(), level);

    let runner = EffectRunner::new(args.engine_settings())
        .with_context(|| format!("cannot use workflow service at {}", args.base_url))?;
    let mut inbox = Some(spawn_stdin_reader());
    let mut printer = TranscriptPrinter::new(io::stdout());
    printer.line(input::HELP)?;

    let mut host = Host {
        state: AppState::new(),
        runner,
    };
    host.dispatch(match args.prompt {
        Some(prompt) => Msg::WorkflowStarted {
            workflow_id: args.workflow,
            prompt: Some(prompt),
            now: now_millis(),
        },
        None => Msg::WorkflowResumed {
            workflow_id: args.workflow,
        },
    });

    loop {
        while let Some(msg) = host.runner.next_msg(now_millis()) {
            host.dispatch(msg);
        }

        let next = match inbox.as_ref() {
            Some(lines) => lines.recv_timeout(TICK),
            None => {
                thread::sleep(TICK);
                Err(RecvTimeoutError::Timeout)
            }
        };
        match next {
            Ok(line) => match input::parse_line(&line, now_millis()) {
                Some(Command::Dispatch(msg)) => host.dispatch(msg),
                Some(Command::Help) => printer.line(input::HELP)?,
                Some(Command::Invalid(reason)) => printer.line(&reason)?,
                Some(Command::Quit) => {
                    host.dispatch(Msg::StopClicked);
                    break;
                }
                None => {}
            },
            Err(RecvTimeoutError::Disconnected) => {
                relay_debug!("stdin closed; following until the workflow ends");
                inbox = None;
            }
            Err(RecvTimeoutError::Timeout) => host.dispatch(Msg::Tick),
        }

        if host.state.consume_dirty() {
            let view = host.state.view();
            printer.render(&view)?;
            if view.halted && !view.feedback.is_submitting() {
                relay_info!("workflow finished; exiting");
                break;
            }
        }
    }

    if host.state.consume_dirty() {
        printer.render(&host.state.view())?;
    }
    Ok(())
}

struct Host {
    state: AppState,
    runner: EffectRunner,
}

impl Host {
    fn dispatch(&mut self, msg: Msg) {
        let state = std::mem::take(&mut self.state);
        let (state, effects) = update(state, msg);
        self.state = state;
        self.runner.run(effects);
    }
}

/// Lines typed on stdin. The channel disconnects at end of input.
fn spawn_stdin_reader() -> mpsc::Receiver<String> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        for line in io::stdin().lock().lines() {
            let Ok(line) = line else {
                break;
            };
            if tx.send(line).is_err() {
                break;
            }
        }
    });
    rx
}

fn now_millis() -> Timestamp {
    Utc::now().timestamp_millis()
}
