//! Workflow Templater: tracker issues and emails from YAML templates.
//!
//! This is the main entry point for the `workflow-templater` CLI. It parses
//! arguments, runs the templates and maps errors to exit codes.

mod artifact;
mod cli;
mod commands;
mod config;
pub mod error;
mod expand;
pub mod exit_codes;
mod logging;
mod pretty;
mod resume;
mod run;
mod template;
mod transport;
mod vars;

use cli::Cli;
use std::process::ExitCode;

fn main() -> ExitCode {
    let cli = Cli::parse_args();

    match commands::cmd_run(&cli) {
        Ok(()) => ExitCode::from(exit_codes::SUCCESS as u8),
        Err(err) => {
            eprintln!("Error: {}", err);
            ExitCode::from(err.exit_code() as u8)
        }
    }
}
