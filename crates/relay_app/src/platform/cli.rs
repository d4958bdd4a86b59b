use std::time::Duration;

use clap::{Parser, ValueEnum};
use relay_engine::EngineSettings;

use super::logging::LogDestination;

#[derive(Debug, Parser)]
#[command(name = "relay")]
#[command(about = "Follow a remote workflow as a live transcript and answer its questions")]
pub struct Args {
    /// Workflow id to follow
    #[arg(short, long)]
    pub workflow: String,

    /// Opening prompt to show at the top of the transcript. Without it the workflow is
    /// treated as resumed, and stages already waiting on a question are not re-announced.
    pub prompt: Option<String>,

    /// Base URL of the workflow service
    #[arg(long, env = "RELAY_BASE_URL", default_value = "http://127.0.0.1:8080")]
    pub base_url: String,

    /// Milliseconds between status polls
    #[arg(long, default_value_t = 2_000)]
    pub poll_interval_ms: u64,

    /// Where log lines go
    #[arg(long, value_enum, default_value_t = LogTarget::File)]
    pub log: LogTarget,

    /// Log at debug level
    #[arg(short, long)]
    pub verbose: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogTarget {
    File,
    Terminal,
    Both,
}

impl From<LogTarget> for LogDestination {
    fn from(target: LogTarget) -> Self {
        match target {
            LogTarget::File => LogDestination::File,
            LogTarget::Terminal => LogDestination::Terminal,
            LogTarget::Both => LogDestination::Both,
        }
    }
}

impl Args {
    pub fn engine_settings(&self) -> EngineSettings {
        EngineSettings {
            base_url: self.base_url.clone(),
            poll_interval: Duration::from_millis(self.poll_interval_ms.max(1)),
            ..EngineSettings::default()
        }
    }
}
