//! `query-logs`: query agent session logs with a filter expression.

#![deny(unsafe_code)]

use std::process::ExitCode;

use clap::Parser;
use hub_cli::query_logs;

fn main() -> ExitCode {
    let cli = query_logs::Cli::parse();
    hub_cli::main_with(|env, out, err| query_logs::run(&cli, env, out, err))
}
