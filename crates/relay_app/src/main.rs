mod platform;

use clap::Parser;

fn main() -> anyhow::Result<()> {
    let args = platform::cli::Args::parse();
    platform::run_app(args)
}
