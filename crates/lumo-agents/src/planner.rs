// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Generates an ordered list of steps from the goal, honouring the
//! placeholder and catastrophic-literal pre-filters, then hands off to the
//! Executor.

use async_trait::async_trait;
use tracing::{info, warn};

use lumo_events::EventKind;
use lumo_llm::Message;

use crate::agent::Agent;
use crate::model::{AgentContext, AgentResult, NextAgent, Step};
use crate::parsing::{filter_planner_steps, parse_steps};
use crate::templates::{render, PLANNER_PROMPT, PLAN_INTRO_PROMPT, SYSTEM_IDENTITY};

pub struct Planner;

#[async_trait]
impl Agent for Planner {
    async fn run(&self, ctx: &mut AgentContext) -> AgentResult {
        if let Err(e) = ctx.shell.start().await {
            warn!(error = %e, "failed to start shell session");
            return AgentResult::terminal(
                false,
                format!("cannot start a shell session: {e}"),
            );
        }

        let prompt = render(PLANNER_PROMPT, &[("goal", &ctx.goal)]);
        let mut history = Vec::with_capacity(ctx.memory.len() + 1);
        history.push(Message::system(SYSTEM_IDENTITY));
        history.extend(ctx.memory.iter().cloned());
        let response = match ctx.llm.complete(&prompt, &history, 0.2).await {
            Ok(text) => text,
            Err(e) => {
                warn!(error = %e, "planner LLM call failed");
                return AgentResult::terminal(
                    false,
                    format!("cannot plan for {}", ctx.goal),
                );
            }
        };

        let parsed = filter_planner_steps(parse_steps(&response));
        if parsed.is_empty() {
            warn!(goal = %ctx.goal, "planner produced no usable steps");
            return AgentResult::terminal(false, format!("cannot plan for {}", ctx.goal));
        }

        info!(count = parsed.len(), "planner produced steps");
        ctx.steps = parsed
            .iter()
            .map(|s| Step::new(s.title.clone(), s.command.clone()))
            .collect();
        ctx.current_step_idx = 0;

        let intro = self.introduce_plan(ctx).await;
        ctx.emit.emit(EventKind::Reply, intro.clone()).await;
        tokio::task::yield_now().await;
        ctx.memory.push(Message::assistant(intro));

        ctx.emit.emit(EventKind::Tasks, ctx.tasks_snapshot().to_string()).await;
        tokio::task::yield_now().await;

        AgentResult::handoff(NextAgent::Executor)
    }
}

impl Planner {
    async fn introduce_plan(&self, ctx: &AgentContext) -> String {
        let steps_list = ctx
            .steps
            .iter()
            .map(|s| format!("- {}", s.title))
            .collect::<Vec<_>>()
            .join("\n");
        let prompt = render(PLAN_INTRO_PROMPT, &[("goal", &ctx.goal), ("steps", &steps_list)]);

        match ctx.llm.complete(&prompt, &ctx.memory, 0.5).await {
            Ok(text) => text,
            Err(e) => {
                warn!(error = %e, "plan introduction call failed, using fallback sentence");
                format!("Okay, I will complete this in {} steps.", ctx.steps.len())
            }
        }
    }
}
