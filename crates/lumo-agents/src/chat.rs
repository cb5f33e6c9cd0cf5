// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Produces a conversational reply without touching the shell. Terminal.

use async_trait::async_trait;
use tracing::warn;

use lumo_events::EventKind;
use lumo_llm::Message;

use crate::agent::Agent;
use crate::model::{AgentContext, AgentResult};
use crate::templates::{render, CHAT_PROMPT, SYSTEM_IDENTITY};

const FALLBACK_REPLY: &str =
    "Sorry, I couldn't reach the language model just now. Please try again.";

pub struct Chat;

#[async_trait]
impl Agent for Chat {
    async fn run(&self, ctx: &mut AgentContext) -> AgentResult {
        let mut history = Vec::with_capacity(ctx.memory.len() + 1);
        history.push(Message::system(SYSTEM_IDENTITY));
        history.extend(ctx.memory.iter().cloned());

        let prompt = render(CHAT_PROMPT, &[("goal", &ctx.goal)]);
        let (reply, success) = match ctx.llm.complete(&prompt, &history, 0.7).await {
            Ok(text) => (text, true),
            Err(e) => {
                warn!(error = %e, "chat LLM call failed, using fallback reply");
                (FALLBACK_REPLY.to_string(), false)
            }
        };

        ctx.emit.emit(EventKind::Reply, reply.clone()).await;
        tokio::task::yield_now().await;
        ctx.memory.push(Message::assistant(reply.clone()));

        AgentResult::terminal(success, reply)
    }
}
