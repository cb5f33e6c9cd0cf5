// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::path::PathBuf;

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};

#[derive(Parser, Debug)]
#[command(
    name = "lumo-agent",
    about = "An autonomous Linux operations assistant",
    version,
    long_about = None,
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to config file (overrides auto-discovery)
    #[arg(long, short = 'c', global = true)]
    pub config: Option<PathBuf>,

    /// Increase verbosity (-v = debug, -vv = trace)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a single goal to completion and exit.
    ///
    /// Prints each streamed event to stdout as it arrives, then exits with
    /// status 0 once the turn's `done` event is emitted.
    Run {
        /// The goal to accomplish, e.g. "install nginx and start it"
        goal: String,
    },

    /// Long-running turn driver: reads one goal per line from stdin as
    /// `{"goal": "..."}` JSON, runs it to completion, and writes every
    /// streamed event to stdout as a `{"kind": "...", "content": "..."}`
    /// JSON line. Exits when stdin closes.
    Serve,

    /// Print the effective configuration and exit
    ShowConfig,

    /// Generate a shell completion script
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

pub fn print_completions(shell: Shell) {
    let mut cmd = Cli::command();
    let name = cmd.get_name().to_string();
    generate(shell, &mut cmd, name, &mut std::io::stdout());
}
