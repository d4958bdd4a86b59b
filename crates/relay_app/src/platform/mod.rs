//! Terminal host: wires the pure core to the polling engine, stdin and stdout.
mod app;
pub mod cli;
mod effects;
mod input;
mod logging;
mod render;

pub use app::run_app;
