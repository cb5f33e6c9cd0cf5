// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! The shared data model passed between agents: [`Step`], [`AgentContext`],
//! [`AgentResult`], and the [`NextAgent`] handoff tag.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::json;

use lumo_config::TimeoutsConfig;
use lumo_events::Emit;
use lumo_llm::{LlmClient, Message};
use lumo_shell::ShellSession;

/// A step's position in its monotonic lifecycle. Never rewritten from
/// `Done`/`Failed` back to an earlier state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    Pending,
    Running,
    Done,
    Failed,
}

/// One planned shell command and its execution record.
#[derive(Debug, Clone)]
pub struct Step {
    pub title: String,
    pub command: String,
    pub status: StepStatus,
    pub output: String,
    pub error: Option<String>,
}

impl Step {
    pub fn new(title: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            command: command.into(),
            status: StepStatus::Pending,
            output: String::new(),
            error: None,
        }
    }

    /// The truncated-output JSON view used by the `tasks` event.
    pub fn to_task_snapshot(&self) -> serde_json::Value {
        let mut output = self.output.clone();
        if output.chars().count() > 200 {
            output = output.chars().take(200).collect();
        }
        json!({
            "title": self.title,
            "command": self.command,
            "status": self.status,
            "output": output,
            "error": self.error,
        })
    }
}

/// Names the agent that should run next, or terminates the turn when absent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NextAgent {
    Router,
    Chat,
    Planner,
    Executor,
    Repair,
    Summary,
}

/// The return value of one agent invocation.
#[derive(Debug, Clone)]
pub struct AgentResult {
    pub success: bool,
    pub next_agent: Option<NextAgent>,
    pub data: serde_json::Value,
    pub message: String,
}

impl AgentResult {
    pub fn handoff(next: NextAgent) -> Self {
        Self {
            success: true,
            next_agent: Some(next),
            data: serde_json::Value::Null,
            message: String::new(),
        }
    }

    pub fn terminal(success: bool, message: impl Into<String>) -> Self {
        Self {
            success,
            next_agent: None,
            data: serde_json::Value::Null,
            message: message.into(),
        }
    }

    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = data;
        self
    }
}

/// A captured step output retained for repair/summary context.
#[derive(Debug, Clone)]
pub struct OutputRecord {
    pub title: String,
    pub output: String,
}

/// Shared per-turn state. Owned by the Orchestrator and passed by mutable
/// reference to exactly one agent at a time; never shared across turns.
pub struct AgentContext {
    pub goal: String,
    pub memory: Vec<Message>,
    pub steps: Vec<Step>,
    pub current_step_idx: usize,
    pub outputs: Vec<OutputRecord>,
    pub retry_count: u32,
    pub replan_count: u32,
    pub max_retries: u32,
    pub max_replans: u32,
    pub completion_threshold: f32,
    pub last_failure_reason: Option<String>,
    pub timeouts: TimeoutsConfig,
    pub llm: Arc<dyn LlmClient>,
    pub shell: Arc<ShellSession>,
    pub emit: Arc<dyn Emit>,
}

impl AgentContext {
    pub fn new(
        goal: impl Into<String>,
        memory: Vec<Message>,
        llm: Arc<dyn LlmClient>,
        shell: Arc<ShellSession>,
        emit: Arc<dyn Emit>,
    ) -> Self {
        Self {
            goal: goal.into(),
            memory,
            steps: Vec::new(),
            current_step_idx: 0,
            outputs: Vec::new(),
            retry_count: 0,
            replan_count: 0,
            max_retries: 3,
            max_replans: 3,
            completion_threshold: 0.7,
            last_failure_reason: None,
            timeouts: TimeoutsConfig::default(),
            llm,
            shell,
            emit,
        }
    }

    /// Reset the plan for a re-plan round, keeping memory and counters.
    pub fn clear_plan(&mut self) {
        self.steps.clear();
        self.current_step_idx = 0;
        self.retry_count = 0;
    }

    pub fn tasks_snapshot(&self) -> serde_json::Value {
        serde_json::Value::Array(self.steps.iter().map(Step::to_task_snapshot).collect())
    }
}
