// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Classifies each user turn as conversational (`Chat`) or actionable
//! (`Planner`).

use async_trait::async_trait;
use tracing::warn;

use lumo_events::EventKind;
use lumo_llm::Message;

use crate::agent::Agent;
use crate::model::{AgentContext, AgentResult, NextAgent};
use crate::templates::{render, ROUTER_PROMPT};

pub struct Router;

#[async_trait]
impl Agent for Router {
    async fn run(&self, ctx: &mut AgentContext) -> AgentResult {
        ctx.memory.push(Message::user(ctx.goal.clone()));

        let prompt = render(ROUTER_PROMPT, &[("goal", &ctx.goal)]);
        let next = match ctx.llm.complete(&prompt, &ctx.memory, 0.1).await {
            Ok(reply) => {
                if reply.to_uppercase().contains("CHAT") {
                    NextAgent::Chat
                } else {
                    NextAgent::Planner
                }
            }
            Err(e) => {
                warn!(error = %e, "router LLM call failed, defaulting to Planner");
                NextAgent::Planner
            }
        };

        ctx.emit
            .emit(EventKind::Log, format!("routed to {next:?}"))
            .await;
        tokio::task::yield_now().await;

        AgentResult::handoff(next)
    }
}
