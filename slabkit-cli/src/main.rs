//! ## slabkit-cli
//! **Benchmark and self-test driver**
//! Runs the N-Queens search routines over pool- and arena-backed storage, writes
//! timing CSVs and, with tracking on, per-run memory and leak reports.

use clap::Parser;
use slabkit_telemetry::logging::EventLogger;

mod commands;

use commands::Cli;

fn main() -> anyhow::Result<()> {
    EventLogger::init();
    let cli = Cli::parse();
    commands::run_command(cli)
}
