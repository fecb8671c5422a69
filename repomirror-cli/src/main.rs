//! repomirror CLI - mirror hub repositories to a local directory.
//!
//! Exit codes: 0 when the run completes (individual files may still have
//! failed), 1 on setup errors, 130 when interrupted.

mod args;
mod error;
mod logging;
mod progress;
mod runner;

use std::process::ExitCode;

use clap::Parser;

use crate::args::Cli;

fn main() -> ExitCode {
    let cli = Cli::parse();

    match runner::run(cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::from(runner::EXIT_FAILURE)
        }
    }
}
