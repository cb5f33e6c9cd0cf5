// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Typed client events and the streaming-callback capability.
//!
//! Consumers (a CLI driver, a future transport) subscribe to [`EventKind`]
//! values emitted through an [`Emit`] implementation to render a turn's
//! progress.

use async_trait::async_trait;
use std::fmt;

/// One of the seven event kinds a turn may emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    /// JSON array of step snapshots, emitted on every status change.
    Tasks,
    /// A sanitized chunk of shell output.
    Terminal,
    /// A short informational note about agent progress.
    Log,
    /// Conversational text for the user.
    Reply,
    /// The final execution report.
    Summary,
    /// A fatal turn-level error.
    Error,
    /// End of turn.
    Done,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EventKind::Tasks => "tasks",
            EventKind::Terminal => "terminal",
            EventKind::Log => "log",
            EventKind::Reply => "reply",
            EventKind::Summary => "summary",
            EventKind::Error => "error",
            EventKind::Done => "done",
        };
        write!(f, "{s}")
    }
}

/// The streaming-callback capability injected into every `AgentContext`.
///
/// Implementations may be synchronous (returning immediately) or deferred
/// (awaiting an I/O write); the orchestrator yields to the scheduler after
/// every call regardless, so both shapes deliver promptly.
#[async_trait]
pub trait Emit: Send + Sync {
    async fn emit(&self, kind: EventKind, content: String);
}

/// An [`Emit`] that forwards to an `mpsc` channel as `{kind, content}` pairs.
/// The natural wiring for a CLI driver or test harness: the receiving end
/// decides how to render or assert on events.
pub struct ChannelEmit {
    sender: tokio::sync::mpsc::UnboundedSender<(EventKind, String)>,
}

impl ChannelEmit {
    pub fn new(sender: tokio::sync::mpsc::UnboundedSender<(EventKind, String)>) -> Self {
        Self { sender }
    }
}

#[async_trait]
impl Emit for ChannelEmit {
    async fn emit(&self, kind: EventKind, content: String) {
        // A closed receiver (turn driver gone) is not the orchestrator's problem.
        let _ = self.sender.send((kind, content));
    }
}

/// An [`Emit`] that records every call in order, for assertions in tests.
#[derive(Default)]
pub struct RecordingEmit {
    events: tokio::sync::Mutex<Vec<(EventKind, String)>>,
}

impl RecordingEmit {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn events(&self) -> Vec<(EventKind, String)> {
        self.events.lock().await.clone()
    }
}

#[async_trait]
impl Emit for RecordingEmit {
    async fn emit(&self, kind: EventKind, content: String) {
        self.events.lock().await.push((kind, content));
    }
}
