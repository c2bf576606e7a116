//! `cleanup-logs`: apply retention and compaction to a registry's logs.

#![deny(unsafe_code)]

use std::process::ExitCode;

use clap::Parser;
use hub_cli::cleanup_logs;

fn main() -> ExitCode {
    let cli = cleanup_logs::Cli::parse();
    hub_cli::main_with(|env, out, err| cleanup_logs::run(&cli, env, out, err))
}
