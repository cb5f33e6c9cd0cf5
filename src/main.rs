// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
mod cli;

use std::io::{self, BufRead, Write};
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use serde::Serialize;
use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*};

use cli::{Cli, Commands};
use lumo_events::{ChannelEmit, EventKind};
use lumo_llm::{HttpLlmClient, LlmClient, Message};
use lumo_shell::ShellSession;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match &cli.command {
        Commands::Completions { shell } => {
            cli::print_completions(*shell);
            Ok(())
        }
        Commands::ShowConfig => {
            let config = lumo_config::load(cli.config.as_deref())?;
            println!("{}", serde_yaml::to_string(&config).unwrap_or_default());
            Ok(())
        }
        Commands::Run { goal } => run_once(cli.config.as_deref(), goal).await,
        Commands::Serve => serve(cli.config.as_deref()).await,
    }
}

/// Runs one goal to completion against stdout, then exits.
async fn run_once(config_path: Option<&std::path::Path>, goal: &str) -> anyhow::Result<()> {
    let config = lumo_config::load(config_path)?;
    let llm: Arc<dyn LlmClient> = Arc::new(HttpLlmClient::new(&config.llm));
    let shell = Arc::new(ShellSession::new(
        config.shell.shell_path.clone(),
        Duration::from_millis(config.shell.poll_chunk_ms),
    ));

    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    let emit = Arc::new(ChannelEmit::new(tx));
    let orchestrator = lumo_agents::Orchestrator::new(llm, shell, emit, config.agent.clone());

    let printer = tokio::spawn(async move {
        while let Some((kind, content)) = rx.recv().await {
            print_event(kind, &content);
        }
    });

    orchestrator.run_turn(goal.to_string(), Vec::new()).await;
    let _ = printer.await;
    Ok(())
}

/// Reads one JSON goal per stdin line, runs it, and writes every streamed
/// event back to stdout as a JSON line. Exits when stdin is closed.
async fn serve(config_path: Option<&std::path::Path>) -> anyhow::Result<()> {
    let config = lumo_config::load(config_path)?;
    let llm: Arc<dyn LlmClient> = Arc::new(HttpLlmClient::new(&config.llm));
    let shell = Arc::new(ShellSession::new(
        config.shell.shell_path.clone(),
        Duration::from_millis(config.shell.poll_chunk_ms),
    ));

    let stdin = io::stdin();
    let mut memory: Vec<Message> = Vec::new();

    for line in stdin.lock().lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let goal = parse_inbound(&line);
        if goal.trim().is_empty() {
            continue;
        }

        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let emit = Arc::new(ChannelEmit::new(tx));
        let orchestrator =
            lumo_agents::Orchestrator::new(llm.clone(), shell.clone(), emit, config.agent.clone());

        let printer = tokio::spawn(async move {
            while let Some((kind, content)) = rx.recv().await {
                emit_line(kind, &content);
            }
        });

        // Router appends the user goal to memory itself; passing it in
        // already-appended here would duplicate it.
        let outcome = orchestrator.run_turn(goal, memory).await;
        memory = outcome.memory;
        let _ = printer.await;
    }

    Ok(())
}

/// Accepts a JSON object with a `goal` or `message` key, or raw text.
/// Malformed JSON is treated as raw text rather than rejected, since a
/// bare-text line is a valid inbound message per the wire contract.
fn parse_inbound(line: &str) -> String {
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(line) {
        if let Some(obj) = value.as_object() {
            if let Some(s) = obj.get("goal").and_then(|v| v.as_str()) {
                return s.to_string();
            }
            if let Some(s) = obj.get("message").and_then(|v| v.as_str()) {
                return s.to_string();
            }
            return String::new();
        }
        if let Some(s) = value.as_str() {
            return s.to_string();
        }
    }
    line.to_string()
}

#[derive(Debug, Serialize)]
struct ServeEvent<'a> {
    kind: &'a str,
    content: &'a str,
}

fn emit_line(kind: EventKind, content: &str) {
    let kind_str = kind.to_string();
    let event = ServeEvent { kind: &kind_str, content };
    if let Ok(line) = serde_json::to_string(&event) {
        println!("{line}");
        let _ = io::stdout().flush();
    }
}

fn print_event(kind: EventKind, content: &str) {
    match kind {
        EventKind::Reply | EventKind::Summary => println!("{content}"),
        EventKind::Error => eprintln!("error: {content}"),
        EventKind::Terminal => print!("{content}"),
        EventKind::Tasks | EventKind::Log | EventKind::Done => {
            tracing::info!(kind = %kind, "{content}")
        }
    }
    let _ = io::stdout().flush();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_goal_key() {
        assert_eq!(parse_inbound(r#"{"goal": "show uptime"}"#), "show uptime");
    }

    #[test]
    fn parses_message_key() {
        assert_eq!(parse_inbound(r#"{"message": "hi there"}"#), "hi there");
    }

    #[test]
    fn parses_raw_text() {
        assert_eq!(parse_inbound("show uptime"), "show uptime");
    }

    #[test]
    fn object_without_known_key_is_empty() {
        assert_eq!(parse_inbound(r#"{"other": "x"}"#), "");
    }
}

fn init_logging(verbosity: u8) {
    let level = match verbosity {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let _ = tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .try_init();
}
