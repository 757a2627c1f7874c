//! Filecolly CLI: ship files from a directory to Redis; use --dry-run to keep records in memory.

use anyhow::Result;
use clap::Parser;
use filecolly::engine::arg_parser::Cli;
use filecolly::engine::handle_run;
use std::time::Instant;

fn main() -> Result<()> {
    let start_time = Instant::now();
    let cli = Cli::parse();
    handle_run(&cli)?;
    log::debug!("Total time: {:?}", start_time.elapsed());
    Ok(())
}
