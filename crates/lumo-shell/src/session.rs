// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Persistent interactive PTY shell session with marker-based command
//! completion detection.
//!
//! A single shell (default `/bin/bash`) is spawned under a pseudo-terminal
//! and kept alive for the process lifetime. Prompt-regex matching is
//! deliberately not used — a user command may itself emit something that
//! looks like a prompt — so completion is instead detected by appending a
//! unique `echo` marker after every command and waiting for it to appear.

use std::io::{Read, Write};
use std::time::{Duration, Instant};

use regex::Regex;
use tokio::sync::{mpsc, Mutex};

use lumo_events::{Emit, EventKind};

use crate::error::ShellError;
use crate::sanitize::clean_output;

/// An interactive-prompt handler: first-match-wins pattern, with the
/// response line written back to the shell whenever it fires. A handler may
/// fire an unbounded number of times within a single command.
pub type Handler = (Regex, String);

const PTY_ROWS: u16 = 40;
const PTY_COLS: u16 = 200;

struct Inner {
    writer: Box<dyn Write + Send>,
    rx: mpsc::UnboundedReceiver<Vec<u8>>,
    child: Box<dyn portable_pty::Child + Send + Sync>,
}

/// Persistent, mutex-serialized interactive shell. Only one command may be
/// in flight at a time; the session is not reentrant.
pub struct ShellSession {
    shell_path: String,
    poll_chunk: Duration,
    inner: Mutex<Option<Inner>>,
}

impl ShellSession {
    pub fn new(shell_path: impl Into<String>, poll_chunk: Duration) -> Self {
        Self {
            shell_path: shell_path.into(),
            poll_chunk,
            inner: Mutex::new(None),
        }
    }

    /// Spawn the shell if it isn't already running, writing the shell-tamer
    /// init commands and draining the startup buffer.
    pub async fn start(&self) -> Result<(), ShellError> {
        let mut guard = self.inner.lock().await;
        if let Some(inner) = guard.as_mut() {
            if matches!(inner.child.try_wait(), Ok(None)) {
                return Ok(());
            }
        }
        *guard = Some(spawn_shell(&self.shell_path).await?);
        drop(guard);
        self.run_init_commands().await?;
        Ok(())
    }

    async fn run_init_commands(&self) -> Result<(), ShellError> {
        let init = "export TERM=dumb\nexport PS1=''\nexport PS2=''\nexport PROMPT_COMMAND=''\nunset MAILCHECK\nset +o history\n";
        {
            let mut guard = self.inner.lock().await;
            let inner = guard.as_mut().ok_or(ShellError::NotStarted)?;
            write_all(&mut inner.writer, init.as_bytes())?;
        }
        tokio::time::sleep(Duration::from_millis(300)).await;
        self.drain().await;
        Ok(())
    }

    /// Discard whatever bytes are currently buffered without blocking.
    async fn drain(&self) {
        let mut guard = self.inner.lock().await;
        if let Some(inner) = guard.as_mut() {
            while inner.rx.try_recv().is_ok() {}
        }
    }

    pub async fn is_alive(&self) -> bool {
        let mut guard = self.inner.lock().await;
        match guard.as_mut() {
            Some(inner) => matches!(inner.child.try_wait(), Ok(None)),
            None => false,
        }
    }

    /// Run `command` to completion, answering any interactive prompts from
    /// `handlers` as they appear, and enforcing `timeout`. Restarts the
    /// underlying shell transparently if it has died since the last call
    /// since a user command may itself exit the shell (e.g. `exec bash`).
    pub async fn run_command(
        &self,
        command: &str,
        handlers: &[Handler],
        timeout: Duration,
        emit: &dyn Emit,
    ) -> Result<String, ShellError> {
        if !self.is_alive().await {
            self.start().await?;
        }

        let marker = generate_marker();
        let full_command = format!("{command}; echo '{marker}'\n");

        let mut guard = self.inner.lock().await;
        let inner = guard.as_mut().ok_or(ShellError::NotStarted)?;

        while inner.rx.try_recv().is_ok() {}
        write_all(&mut inner.writer, full_command.as_bytes())?;

        let mut raw = String::new();
        let start = Instant::now();

        loop {
            let elapsed = start.elapsed();
            if elapsed >= timeout {
                return Err(ShellError::Timeout(timeout));
            }
            let remaining = timeout - elapsed;
            let window = self.poll_chunk.min(remaining);

            match tokio::time::timeout(window, inner.rx.recv()).await {
                Ok(Some(chunk)) => {
                    raw.push_str(&String::from_utf8_lossy(&chunk));

                    if let Some(pos) = raw.find(&marker) {
                        let output = raw[..pos].to_string();
                        return Ok(clean_output(&output, command, &marker));
                    }

                    if let Some((_, response)) =
                        handlers.iter().find(|(re, _)| re.is_match(&raw))
                    {
                        emit.emit(EventKind::Terminal, clean_output(&raw, command, &marker))
                            .await;
                        write_all(&mut inner.writer, format!("{response}\n").as_bytes())?;
                        raw.clear();
                    }
                }
                Ok(None) => {
                    return Err(ShellError::Eof);
                }
                Err(_elapsed) => continue,
            }
        }
    }

    /// Close the session, terminating the underlying shell process.
    pub async fn close(&self) {
        let mut guard = self.inner.lock().await;
        if let Some(inner) = guard.as_mut() {
            let _ = write_all(&mut inner.writer, b"exit\n");
            let _ = inner.child.kill();
        }
        *guard = None;
    }
}

fn write_all(writer: &mut Box<dyn Write + Send>, bytes: &[u8]) -> Result<(), ShellError> {
    writer.write_all(bytes).map_err(ShellError::SpawnFailed)?;
    writer.flush().map_err(ShellError::SpawnFailed)?;
    Ok(())
}

fn generate_marker() -> String {
    let id = uuid::Uuid::new_v4().simple().to_string();
    format!("<<::CMD_DONE_{}::>>", &id[..16])
}

async fn spawn_shell(shell_path: &str) -> Result<Inner, ShellError> {
    let shell_path = shell_path.to_string();
    tokio::task::spawn_blocking(move || -> Result<Inner, ShellError> {
        use portable_pty::{native_pty_system, CommandBuilder, PtySize};

        let pty_system = native_pty_system();
        let pair = pty_system
            .openpty(PtySize {
                rows: PTY_ROWS,
                cols: PTY_COLS,
                pixel_width: 0,
                pixel_height: 0,
            })
            .map_err(anyhow::Error::from)?;

        let mut cmd = CommandBuilder::new(&shell_path);
        cmd.env("TERM", "dumb");
        cmd.env("LC_ALL", "C");

        let child = pair
            .slave
            .spawn_command(cmd)
            .map_err(anyhow::Error::from)?;
        drop(pair.slave);

        let mut reader = pair.master.try_clone_reader().map_err(anyhow::Error::from)?;
        let writer = pair.master.take_writer().map_err(anyhow::Error::from)?;

        let (tx, rx) = mpsc::unbounded_channel();
        std::thread::spawn(move || {
            let mut buf = [0u8; 4096];
            loop {
                match reader.read(&mut buf) {
                    Ok(0) => break,
                    Ok(n) => {
                        if tx.send(buf[..n].to_vec()).is_err() {
                            break;
                        }
                    }
                    Err(ref e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                    Err(_) => break,
                }
            }
        });

        Ok(Inner { writer, rx, child })
    })
    .await
    .map_err(|e| ShellError::PtyFailed(anyhow::anyhow!(e)))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use lumo_events::RecordingEmit;

    fn bash_session() -> ShellSession {
        ShellSession::new("/bin/bash", Duration::from_millis(500))
    }

    #[tokio::test]
    async fn executes_simple_command_and_returns_output() {
        let session = bash_session();
        session.start().await.unwrap();
        let emit = RecordingEmit::new();
        let out = session
            .run_command("echo hello", &[], Duration::from_secs(5), &emit)
            .await
            .unwrap();
        assert_eq!(out, "hello");
    }

    #[tokio::test]
    async fn environment_persists_across_commands() {
        let session = bash_session();
        session.start().await.unwrap();
        let emit = RecordingEmit::new();
        session
            .run_command(
                "export LUMO_TEST_VAR=persisted",
                &[],
                Duration::from_secs(5),
                &emit,
            )
            .await
            .unwrap();
        let out = session
            .run_command("echo $LUMO_TEST_VAR", &[], Duration::from_secs(5), &emit)
            .await
            .unwrap();
        assert_eq!(out, "persisted");
    }

    #[tokio::test]
    async fn working_directory_persists_across_commands() {
        let session = bash_session();
        session.start().await.unwrap();
        let emit = RecordingEmit::new();
        session
            .run_command("cd /tmp", &[], Duration::from_secs(5), &emit)
            .await
            .unwrap();
        let out = session
            .run_command("pwd", &[], Duration::from_secs(5), &emit)
            .await
            .unwrap();
        assert_eq!(out, "/tmp");
    }

    #[tokio::test]
    async fn marker_never_appears_in_returned_output() {
        let session = bash_session();
        session.start().await.unwrap();
        let emit = RecordingEmit::new();
        let out = session
            .run_command("echo '<<::CMD_DONE_deadbeef::>>'", &[], Duration::from_secs(5), &emit)
            .await
            .unwrap();
        assert!(!out.contains("CMD_DONE"));
    }

    #[tokio::test]
    async fn command_timeout_is_enforced() {
        let session = bash_session();
        session.start().await.unwrap();
        let emit = RecordingEmit::new();
        let result = session
            .run_command("sleep 5", &[], Duration::from_millis(300), &emit)
            .await;
        assert!(matches!(result, Err(ShellError::Timeout(_))));
    }

    #[tokio::test]
    async fn interactive_handler_answers_prompt() {
        let session = bash_session();
        session.start().await.unwrap();
        let emit = RecordingEmit::new();
        let handlers = vec![(Regex::new(r"continue\? ").unwrap(), "yes".to_string())];
        let out = session
            .run_command(
                "read -p 'continue? ' ans; echo \"got:$ans\"",
                &handlers,
                Duration::from_secs(5),
                &emit,
            )
            .await
            .unwrap();
        assert!(out.contains("got:yes"));
    }

    #[tokio::test]
    async fn session_restarts_after_shell_death() {
        let session = bash_session();
        session.start().await.unwrap();
        let emit = RecordingEmit::new();
        session
            .run_command("exit", &[], Duration::from_secs(5), &emit)
            .await
            .ok();
        let out = session
            .run_command("echo revived", &[], Duration::from_secs(5), &emit)
            .await
            .unwrap();
        assert_eq!(out, "revived");
    }
}
