//! `init-project`: initialize a project-scoped registry root.

#![deny(unsafe_code)]

use std::process::ExitCode;

use clap::Parser;
use hub_cli::init_project;

fn main() -> ExitCode {
    let cli = init_project::Cli::parse();
    hub_cli::main_with(|env, out, err| init_project::run(&cli, env, out, err))
}
