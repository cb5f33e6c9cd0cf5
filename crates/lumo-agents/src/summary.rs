// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Builds the final human-readable execution report. Terminal.

use async_trait::async_trait;
use tracing::warn;

use lumo_events::EventKind;
use lumo_llm::Message;

use crate::agent::Agent;
use crate::model::{AgentContext, AgentResult, Step, StepStatus};
use crate::templates::{render, SUMMARY_PROMPT};

pub struct Summary;

#[async_trait]
impl Agent for Summary {
    async fn run(&self, ctx: &mut AgentContext) -> AgentResult {
        let done = ctx.steps.iter().filter(|s| s.status == StepStatus::Done).count();
        let failed = ctx.steps.iter().filter(|s| s.status == StepStatus::Failed).count();
        let total = ctx.steps.len();

        let log = build_step_log(&ctx.steps);
        let prompt = render(SUMMARY_PROMPT, &[("goal", &ctx.goal), ("log", &log)]);

        let report = match ctx.llm.complete(&prompt, &[], 0.3).await {
            Ok(text) => text,
            Err(e) => {
                warn!(error = %e, "summary LLM call failed, using numeric fallback");
                format!("done {done}/{total}, failed {failed}")
            }
        };

        ctx.emit.emit(EventKind::Summary, report.clone()).await;
        tokio::task::yield_now().await;
        ctx.memory.push(Message::assistant(report.clone()));

        AgentResult::terminal(true, report)
    }
}

/// Per-step log: command, first 300 chars of output (or "(empty)"), and
/// error if any, truncated overall to ≤2500 chars.
fn build_step_log(steps: &[Step]) -> String {
    let mut out = String::new();
    for step in steps {
        let output_preview = if step.output.is_empty() {
            "(empty)".to_string()
        } else {
            step.output.chars().take(300).collect()
        };
        out.push_str(&format!(
            "- {} [{:?}]\n  command: {}\n  output: {}\n",
            step.title, step.status, step.command, output_preview
        ));
        if let Some(err) = &step.error {
            out.push_str(&format!("  error: {err}\n"));
        }
    }
    truncate_chars(&out, 2500)
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

    use lumo_events::{EventKind, RecordingEmit};
    use lumo_llm::{LlmClient, LlmError, ScriptedLlmClient};
    use lumo_shell::ShellSession;

    use super::*;

    fn shell() -> Arc<ShellSession> {
        Arc::new(ShellSession::new("/bin/bash", Duration::from_millis(200)))
    }

    fn ctx_with_steps(steps: Vec<Step>, reply: &str) -> AgentContext {
        let mut ctx = AgentContext::new(
            "show uptime",
            Vec::new(),
            Arc::new(ScriptedLlmClient::always(reply)),
            shell(),
            Arc::new(RecordingEmit::new()),
        );
        ctx.steps = steps;
        ctx
    }

    #[tokio::test]
    async fn emits_summary_event_and_appends_to_memory() {
        let mut step = Step::new("show uptime", "uptime");
        step.status = StepStatus::Done;
        step.output = "up 3 days".to_string();
        let mut ctx = ctx_with_steps(vec![step], "All done: uptime checked successfully.");
        let result = Summary.run(&mut ctx).await;
        assert!(result.success);
        assert_eq!(ctx.memory.len(), 1);
    }

    #[tokio::test]
    async fn llm_failure_falls_back_to_numeric_report() {
        struct Failing;
        #[async_trait::async_trait]
        impl LlmClient for Failing {
            async fn complete(&self, _: &str, _: &[Message], _: f32) -> Result<String, LlmError> {
                Err(LlmError::MalformedResponse("down".into()))
            }
        }
        let mut done_step = Step::new("a", "echo a");
        done_step.status = StepStatus::Done;
        let mut failed_step = Step::new("b", "false");
        failed_step.status = StepStatus::Failed;

        let emit = Arc::new(RecordingEmit::new());
        let mut ctx = AgentContext::new(
            "goal",
            Vec::new(),
            Arc::new(Failing),
            shell(),
            emit.clone(),
        );
        ctx.steps = vec![done_step, failed_step];
        let result = Summary.run(&mut ctx).await;
        assert!(result.success);
        let events = emit.events().await;
        let summary_event = events.iter().find(|(k, _)| *k == EventKind::Summary).unwrap();
        assert_eq!(summary_event.1, "done 1/2, failed 1");
    }

    #[test]
    fn step_log_shows_empty_marker_for_blank_output() {
        let step = Step::new("a", "echo a");
        let log = build_step_log(&[step]);
        assert!(log.contains("(empty)"));
    }

    #[test]
    fn step_log_truncates_to_2500_chars() {
        let mut step = Step::new("a", "echo a");
        step.output = "x".repeat(5000);
        let log = build_step_log(&[step]);
        assert!(log.chars().count() <= 2500);
    }

    #[tokio::test]
    async fn summary_call_ignores_conversation_memory() {
        struct RecordingHistoryLen {
            calls: std::sync::Mutex<Vec<usize>>,
        }
        #[async_trait::async_trait]
        impl LlmClient for RecordingHistoryLen {
            async fn complete(
                &self,
                _prompt: &str,
                history: &[Message],
                _temperature: f32,
            ) -> Result<String, LlmError> {
                self.calls.lock().unwrap().push(history.len());
                Ok("report".to_string())
            }
        }
        let llm = Arc::new(RecordingHistoryLen { calls: std::sync::Mutex::new(Vec::new()) });
        let mut ctx = AgentContext::new(
            "show uptime",
            vec![Message::user("earlier turn")],
            llm.clone(),
            shell(),
            Arc::new(RecordingEmit::new()),
        );
        ctx.steps = vec![Step::new("show uptime", "uptime")];
        Summary.run(&mut ctx).await;
        assert_eq!(llm.calls.lock().unwrap()[0], 0);
    }
}
