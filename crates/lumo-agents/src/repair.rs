// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Synthesizes up to two corrective steps for a failed step and inserts
//! them immediately after it, then returns control to the Executor.

use async_trait::async_trait;
use tracing::{info, warn};

use lumo_events::EventKind;
use lumo_llm::Message;

use crate::agent::Agent;
use crate::model::{AgentContext, AgentResult, NextAgent, Step};
use crate::parsing::{filter_repair_steps, parse_steps};
use crate::templates::{render, REPAIR_PROMPT, SYSTEM_IDENTITY};

const REPAIR_TITLE_MARKER: &str = "[repair] ";

pub struct Repair;

#[async_trait]
impl Agent for Repair {
    async fn run(&self, ctx: &mut AgentContext) -> AgentResult {
        ctx.retry_count += 1;

        let idx = ctx.current_step_idx;
        let failed = &ctx.steps[idx];
        let title = failed.title.clone();
        let command = failed.command.clone();
        let error = truncate_chars(failed.error.as_deref().unwrap_or(""), 200);

        let recent_output = ctx
            .outputs
            .iter()
            .rev()
            .take(5)
            .rev()
            .map(|o| o.output.clone())
            .collect::<Vec<_>>()
            .join("\n");

        let prompt = render(
            REPAIR_PROMPT,
            &[
                ("title", &title),
                ("command", &command),
                ("error", &error),
                ("recent_output", &recent_output),
            ],
        );

        let history = vec![Message::system(SYSTEM_IDENTITY)];
        let response = match ctx.llm.complete(&prompt, &history, 0.2).await {
            Ok(text) => text,
            Err(e) => {
                warn!(error = %e, "repair LLM call failed");
                String::new()
            }
        };

        let repair_steps = filter_repair_steps(parse_steps(&response));

        if repair_steps.is_empty() {
            info!("no repair steps survived, advancing past failed step");
            ctx.current_step_idx += 1;
            ctx.retry_count = 0;
            return AgentResult::handoff(NextAgent::Executor);
        }

        let new_steps: Vec<Step> = repair_steps
            .into_iter()
            .map(|s| Step::new(format!("{REPAIR_TITLE_MARKER}{}", s.title), s.command))
            .collect();

        info!(count = new_steps.len(), "inserting repair steps");
        let insert_at = idx + 1;
        for (offset, step) in new_steps.into_iter().enumerate() {
            ctx.steps.insert(insert_at + offset, step);
        }
        ctx.current_step_idx += 1;

        ctx.emit.emit(EventKind::Tasks, ctx.tasks_snapshot().to_string()).await;
        tokio::task::yield_now().await;

        AgentResult::handoff(NextAgent::Executor)
    }
}

fn truncate_chars(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        s.chars().take(max).collect()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use lumo_events::RecordingEmit;
    use lumo_llm::ScriptedLlmClient;
    use lumo_shell::ShellSession;

    use crate::model::StepStatus;

    use super::*;

    fn shell() -> Arc<ShellSession> {
        Arc::new(ShellSession::new("/bin/bash", Duration::from_millis(200)))
    }

    fn failed_ctx(reply: &str) -> AgentContext {
        let mut ctx = AgentContext::new(
            "install htop",
            Vec::new(),
            Arc::new(ScriptedLlmClient::always(reply)),
            shell(),
            Arc::new(RecordingEmit::new()),
        );
        let mut step = Step::new("安装 htop", "apt-get install -y htop");
        step.status = StepStatus::Failed;
        step.error = Some("apt-get: command not found".to_string());
        ctx.steps = vec![step];
        ctx.current_step_idx = 0;
        ctx
    }

    #[tokio::test]
    async fn inserts_repair_step_after_failed_one() {
        let mut ctx = failed_ctx("[修复] 使用 yum::yum install -y htop");
        let result = Repair.run(&mut ctx).await;
        assert_eq!(result.next_agent, Some(NextAgent::Executor));
        assert_eq!(ctx.steps.len(), 2);
        assert!(ctx.steps[1].title.starts_with(REPAIR_TITLE_MARKER));
        assert_eq!(ctx.steps[1].command, "yum install -y htop");
        assert_eq!(ctx.current_step_idx, 1);
        assert_eq!(ctx.retry_count, 1);
    }

    #[tokio::test]
    async fn caps_at_two_repair_steps() {
        let mut ctx = failed_ctx("a::echo 1\nb::echo 2\nc::echo 3");
        Repair.run(&mut ctx).await;
        assert_eq!(ctx.steps.len(), 3); // original failed + 2 repair steps
    }

    #[tokio::test]
    async fn zero_surviving_steps_advances_past_failure() {
        let mut ctx = failed_ctx("Copy file::cp /path/to/file /tmp");
        let result = Repair.run(&mut ctx).await;
        assert_eq!(ctx.steps.len(), 1);
        assert_eq!(ctx.current_step_idx, 1);
        assert_eq!(ctx.retry_count, 0);
        assert_eq!(result.next_agent, Some(NextAgent::Executor));
    }

    #[tokio::test]
    async fn increments_retry_count_before_generating() {
        let mut ctx = failed_ctx("fix::echo fixed");
        ctx.retry_count = 1;
        Repair.run(&mut ctx).await;
        assert_eq!(ctx.retry_count, 2);
    }

    #[tokio::test]
    async fn repair_call_history_is_identity_only_not_conversation_memory() {
        struct RecordingHistoryLen {
            calls: std::sync::Mutex<Vec<usize>>,
        }
        #[async_trait::async_trait]
        impl lumo_llm::LlmClient for RecordingHistoryLen {
            async fn complete(
                &self,
                _prompt: &str,
                history: &[Message],
                _temperature: f32,
            ) -> Result<String, lumo_llm::LlmError> {
                self.calls.lock().unwrap().push(history.len());
                Ok("fix::echo fixed".to_string())
            }
        }
        let llm = Arc::new(RecordingHistoryLen { calls: std::sync::Mutex::new(Vec::new()) });
        let mut ctx = AgentContext::new(
            "install htop",
            vec![Message::user("turn one"), Message::assistant("turn two")],
            llm.clone(),
            shell(),
            Arc::new(RecordingEmit::new()),
        );
        let mut step = Step::new("安装 htop", "apt-get install -y htop");
        step.status = StepStatus::Failed;
        step.error = Some("apt-get: command not found".to_string());
        ctx.steps = vec![step];
        ctx.current_step_idx = 0;

        Repair.run(&mut ctx).await;
        // identity message only, regardless of how much conversation memory exists.
        assert_eq!(llm.calls.lock().unwrap()[0], 1);
    }
}
