// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Executes steps in order, detects errors from output, evaluates overall
//! goal completion, and decides the next agent.

use async_trait::async_trait;
use tracing::{info, warn};

use lumo_events::EventKind;
use lumo_llm::Message;

use crate::agent::Agent;
use crate::handlers::{derive_handlers, derive_timeout};
use crate::model::{AgentContext, AgentResult, NextAgent, OutputRecord, Step, StepStatus};
use crate::safety::{is_catastrophic, scan_output_for_error};
use crate::templates::{render, EVALUATION_PROMPT};

pub struct Executor;

#[async_trait]
impl Agent for Executor {
    async fn run(&self, ctx: &mut AgentContext) -> AgentResult {
        while ctx.current_step_idx < ctx.steps.len() {
            let outcome = self.run_one_step(ctx).await;
            match outcome {
                StepOutcome::NeedsRepair => return AgentResult::handoff(NextAgent::Repair),
                StepOutcome::Advance => continue,
            }
        }

        self.evaluate_completion(ctx).await
    }
}

enum StepOutcome {
    /// The step failed and has retry budget left; hand off to Repair now.
    NeedsRepair,
    /// The step is resolved (done, blocked, or retries exhausted); keep
    /// looping within this invocation.
    Advance,
}

impl Executor {
    async fn run_one_step(&self, ctx: &mut AgentContext) -> StepOutcome {
        let idx = ctx.current_step_idx;
        ctx.steps[idx].status = StepStatus::Running;
        ctx.emit.emit(EventKind::Tasks, ctx.tasks_snapshot().to_string()).await;
        ctx.emit
            .emit(EventKind::Log, format!("running step: {}", ctx.steps[idx].title))
            .await;
        tokio::task::yield_now().await;

        let command = ctx.steps[idx].command.clone();
        let title = ctx.steps[idx].title.clone();

        if command.is_empty() {
            self.fail_step(ctx, idx, "missing command".to_string()).await;
            return self.advance_or_repair(ctx, idx).await;
        }

        if is_catastrophic(&command) {
            warn!(command = %command, "safety gate blocked command");
            self.fail_step(ctx, idx, "blocked by safety gate".to_string()).await;
            ctx.current_step_idx += 1;
            ctx.retry_count = 0;
            return StepOutcome::Advance;
        }

        let timeout = derive_timeout(&command, &ctx.timeouts);
        let handlers = derive_handlers(&command);

        match ctx.shell.run_command(&command, &handlers, timeout, ctx.emit.as_ref()).await {
            Ok(output) => {
                ctx.emit.emit(EventKind::Terminal, output.clone()).await;
                tokio::task::yield_now().await;

                match scan_output_for_error(&output) {
                    Some(error) => {
                        ctx.steps[idx].output = output;
                        self.fail_step(ctx, idx, error).await;
                        self.advance_or_repair(ctx, idx).await
                    }
                    None => {
                        ctx.steps[idx].status = StepStatus::Done;
                        ctx.steps[idx].output = output.clone();
                        ctx.outputs.push(OutputRecord { title, output });
                        ctx.current_step_idx += 1;
                        ctx.retry_count = 0;
                        ctx.emit.emit(EventKind::Tasks, ctx.tasks_snapshot().to_string()).await;
                        StepOutcome::Advance
                    }
                }
            }
            Err(e) => {
                let message = if matches!(e, lumo_shell::ShellError::Timeout(_)) {
                    "timeout".to_string()
                } else {
                    e.to_string()
                };
                self.fail_step(ctx, idx, message).await;
                self.advance_or_repair(ctx, idx).await
            }
        }
    }

    async fn fail_step(&self, ctx: &mut AgentContext, idx: usize, error: String) {
        ctx.steps[idx].status = StepStatus::Failed;
        ctx.steps[idx].error = Some(error.clone());
        ctx.emit.emit(EventKind::Tasks, ctx.tasks_snapshot().to_string()).await;
        ctx.emit
            .emit(EventKind::Log, format!("step failed: {}", error))
            .await;
        tokio::task::yield_now().await;
    }

    /// After a step has just been marked failed: hand off to Repair if
    /// retry budget remains, otherwise advance past it.
    async fn advance_or_repair(&self, ctx: &mut AgentContext, idx: usize) -> StepOutcome {
        debug_assert_eq!(ctx.current_step_idx, idx);
        if ctx.retry_count < ctx.max_retries {
            StepOutcome::NeedsRepair
        } else {
            ctx.current_step_idx += 1;
            ctx.retry_count = 0;
            StepOutcome::Advance
        }
    }

    async fn evaluate_completion(&self, ctx: &mut AgentContext) -> AgentResult {
        let summary = build_execution_summary(&ctx.steps);
        let prompt = render(EVALUATION_PROMPT, &[("goal", &ctx.goal), ("summary", &summary)]);

        let verdict = match ctx.llm.complete(&prompt, &[], 0.1).await {
            Ok(text) => parse_verdict(&text, &ctx.steps, ctx.completion_threshold),
            Err(e) => {
                warn!(error = %e, "evaluation LLM call failed, using heuristic fallback");
                heuristic_fallback(&ctx.steps, ctx.completion_threshold)
            }
        };

        match verdict {
            Verdict::Completed => AgentResult::handoff(NextAgent::Summary),
            Verdict::Blocked(reason) => {
                ctx.memory.push(Message::system(format!("blocked: {reason}")));
                AgentResult::handoff(NextAgent::Summary)
            }
            Verdict::Incomplete(reason) => {
                if ctx.last_failure_reason.as_deref() == Some(reason.as_str()) {
                    ctx.replan_count += 1;
                } else {
                    ctx.last_failure_reason = Some(reason.clone());
                    ctx.replan_count = 0;
                }

                if ctx.replan_count < ctx.max_replans {
                    info!(reason = %reason, replan_count = ctx.replan_count, "re-planning");
                    ctx.memory.push(Message::system(format!(
                        "Previous attempt was incomplete: {reason}. Re-planning."
                    )));
                    ctx.clear_plan();
                    AgentResult::handoff(NextAgent::Planner)
                } else {
                    info!("re-plan cap reached, routing to Summary");
                    AgentResult::handoff(NextAgent::Summary)
                }
            }
        }
    }
}

enum Verdict {
    Completed,
    Incomplete(String),
    Blocked(String),
}

fn parse_verdict(raw: &str, steps: &[Step], threshold: f32) -> Verdict {
    let trimmed = raw.trim();
    let upper = trimmed.to_uppercase();

    if upper == "COMPLETED" || upper.starts_with("COMPLETED:") {
        return Verdict::Completed;
    }
    if let Some(rest) = strip_prefix_case_insensitive(trimmed, "INCOMPLETE") {
        let reason = rest.trim_start_matches(':').trim();
        return Verdict::Incomplete(if reason.is_empty() {
            "unspecified".to_string()
        } else {
            reason.to_string()
        });
    }
    if let Some(rest) = strip_prefix_case_insensitive(trimmed, "BLOCKED") {
        let reason = rest.trim_start_matches(':').trim();
        return Verdict::Blocked(if reason.is_empty() {
            "unspecified".to_string()
        } else {
            reason.to_string()
        });
    }

    heuristic_fallback(steps, threshold)
}

fn strip_prefix_case_insensitive<'a>(s: &'a str, prefix: &str) -> Option<&'a str> {
    if s.len() >= prefix.len() && s[..prefix.len()].eq_ignore_ascii_case(prefix) {
        Some(&s[prefix.len()..])
    } else {
        None
    }
}

fn heuristic_fallback(steps: &[Step], threshold: f32) -> Verdict {
    let total = steps.len().max(1);
    let done = steps.iter().filter(|s| s.status == StepStatus::Done).count();
    let failed = steps.iter().filter(|s| s.status == StepStatus::Failed).count();

    if (done as f32 / total as f32) >= threshold || done > failed {
        Verdict::Completed
    } else {
        Verdict::Incomplete("partial failure".to_string())
    }
}

/// Build the ≤2000-char execution summary the evaluation prompt is given:
/// counts, per-step status, first 150 chars of each output, errors.
fn build_execution_summary(steps: &[Step]) -> String {
    let done = steps.iter().filter(|s| s.status == StepStatus::Done).count();
    let failed = steps.iter().filter(|s| s.status == StepStatus::Failed).count();

    let mut out = format!("{} steps, {} done, {} failed\n", steps.len(), done, failed);
    for step in steps {
        let output_preview: String = step.output.chars().take(150).collect();
        out.push_str(&format!(
            "- [{:?}] {}: {}",
            step.status, step.title, output_preview
        ));
        if let Some(err) = &step.error {
            out.push_str(&format!(" (error: {err})"));
        }
        out.push('\n');
    }
    truncate_chars(&out, 2000)
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

    use super::*;

    fn shell() -> Arc<ShellSession> {
        Arc::new(ShellSession::new("/bin/bash", Duration::from_millis(200)))
    }

    fn ctx_with(steps: Vec<Step>, llm_reply: &str) -> AgentContext {
        let mut ctx = AgentContext::new(
            "show uptime",
            Vec::new(),
            Arc::new(ScriptedLlmClient::always(llm_reply)),
            shell(),
            Arc::new(RecordingEmit::new()),
        );
        ctx.steps = steps;
        ctx
    }

    #[tokio::test]
    async fn single_successful_step_completes() {
        let mut ctx = ctx_with(vec![Step::new("show uptime", "echo up-3-days")], "COMPLETED");
        let result = Executor.run(&mut ctx).await;
        assert_eq!(result.next_agent, Some(NextAgent::Summary));
        assert_eq!(ctx.steps[0].status, StepStatus::Done);
        assert_eq!(ctx.outputs.len(), 1);
    }

    #[tokio::test]
    async fn empty_command_fails_without_running_shell() {
        let mut ctx = ctx_with(vec![Step::new("noop", "")], "COMPLETED");
        ctx.max_retries = 0;
        Executor.run(&mut ctx).await;
        assert_eq!(ctx.steps[0].status, StepStatus::Failed);
        assert_eq!(ctx.steps[0].error.as_deref(), Some("missing command"));
    }

    #[tokio::test]
    async fn catastrophic_command_is_blocked_without_repair() {
        let mut ctx = ctx_with(vec![Step::new("clean", "rm -rf /")], "INCOMPLETE:blocked");
        let result = Executor.run(&mut ctx).await;
        assert_eq!(ctx.steps[0].status, StepStatus::Failed);
        assert_eq!(ctx.steps[0].error.as_deref(), Some("blocked by safety gate"));
        // no repair attempted: retry_count was never incremented
        assert_eq!(ctx.retry_count, 0);
        assert_eq!(result.next_agent, Some(NextAgent::Planner));
    }

    #[tokio::test]
    async fn failing_step_with_retry_budget_hands_off_to_repair() {
        let mut ctx = ctx_with(vec![Step::new("install", "apt-get install -y htop")], "COMPLETED");
        let result = Executor.run(&mut ctx).await;
        assert_eq!(result.next_agent, Some(NextAgent::Repair));
        assert_eq!(ctx.steps[0].status, StepStatus::Failed);
    }

    #[tokio::test]
    async fn retries_exhausted_advances_past_failed_step() {
        let mut ctx = ctx_with(vec![Step::new("install", "apt-get install -y htop")], "INCOMPLETE:x");
        ctx.max_retries = 0;
        let result = Executor.run(&mut ctx).await;
        assert_eq!(ctx.current_step_idx, 1);
        assert_eq!(ctx.retry_count, 0);
        assert_eq!(result.next_agent, Some(NextAgent::Planner));
    }

    #[tokio::test]
    async fn completed_verdict_routes_to_summary() {
        let verdict = parse_verdict("COMPLETED", &[], 0.7);
        assert!(matches!(verdict, Verdict::Completed));
    }

    #[tokio::test]
    async fn incomplete_verdict_carries_reason() {
        let verdict = parse_verdict("INCOMPLETE:missing package", &[], 0.7);
        match verdict {
            Verdict::Incomplete(reason) => assert_eq!(reason, "missing package"),
            _ => panic!("expected Incomplete"),
        }
    }

    #[tokio::test]
    async fn blocked_verdict_carries_reason() {
        let verdict = parse_verdict("BLOCKED:safety", &[], 0.7);
        match verdict {
            Verdict::Blocked(reason) => assert_eq!(reason, "safety"),
            _ => panic!("expected Blocked"),
        }
    }

    #[tokio::test]
    async fn unparseable_response_falls_back_to_heuristic() {
        let steps = vec![Step::new("a", "echo a"), Step::new("b", "echo b")];
        let mut steps = steps;
        steps[0].status = StepStatus::Done;
        steps[1].status = StepStatus::Done;
        let verdict = parse_verdict("I'm not sure what happened", &steps, 0.7);
        assert!(matches!(verdict, Verdict::Completed));
    }

    #[tokio::test]
    async fn heuristic_incomplete_when_below_threshold_and_not_majority_done() {
        let mut steps = vec![Step::new("a", "echo a"), Step::new("b", "echo b"), Step::new("c", "echo c")];
        steps[0].status = StepStatus::Done;
        steps[1].status = StepStatus::Failed;
        steps[2].status = StepStatus::Failed;
        let verdict = heuristic_fallback(&steps, 0.7);
        assert!(matches!(verdict, Verdict::Incomplete(_)));
    }

    #[tokio::test]
    async fn same_incomplete_reason_twice_increments_replan_count_and_caps_at_summary() {
        let mut ctx = ctx_with(vec![Step::new("a", "apt-get install -y x")], "INCOMPLETE:same reason");
        ctx.max_replans = 1;
        ctx.last_failure_reason = Some("same reason".to_string());
        ctx.replan_count = 1;
        let result = Executor.evaluate_completion(&mut ctx).await;
        assert_eq!(result.next_agent, Some(NextAgent::Summary));
    }

    #[tokio::test]
    async fn new_incomplete_reason_resets_replan_count_and_replans() {
        let mut ctx = ctx_with(vec![Step::new("a", "apt-get install -y x")], "INCOMPLETE:new reason");
        ctx.last_failure_reason = Some("old reason".to_string());
        ctx.replan_count = 2;
        let result = Executor.evaluate_completion(&mut ctx).await;
        assert_eq!(ctx.replan_count, 0);
        assert_eq!(ctx.last_failure_reason.as_deref(), Some("new reason"));
        assert_eq!(result.next_agent, Some(NextAgent::Planner));
        assert!(ctx.steps.is_empty());
    }

    #[tokio::test]
    async fn evaluation_call_ignores_conversation_memory() {
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
                Ok("COMPLETED".to_string())
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
        Executor.evaluate_completion(&mut ctx).await;
        assert_eq!(llm.calls.lock().unwrap()[0], 0);
    }
}
