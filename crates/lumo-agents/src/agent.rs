// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! The single-capability `Agent` trait every node in the handoff graph
//! implements: value types, no inheritance, one `run` method.

use async_trait::async_trait;

use crate::model::{AgentContext, AgentResult};

#[async_trait]
pub trait Agent: Send + Sync {
    /// Run this agent's turn against the shared context, mutating it in
    /// place, and return the result naming the next agent (if any).
    async fn run(&self, ctx: &mut AgentContext) -> AgentResult;
}
