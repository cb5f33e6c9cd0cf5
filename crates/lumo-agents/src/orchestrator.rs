// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Drives the six-agent handoff graph: creates the context, starts at
//! `Router`, and loops on `nextAgent` until a terminal result, the hard
//! iteration cap, or an agent panic ends the turn.

use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tracing::{error, info};

use lumo_config::AgentConfig;
use lumo_events::{Emit, EventKind};
use lumo_llm::{LlmClient, Message};
use lumo_shell::ShellSession;

use crate::agent::Agent;
use crate::chat::Chat;
use crate::executor::Executor;
use crate::model::{AgentContext, NextAgent, Step};
use crate::planner::Planner;
use crate::repair::Repair;
use crate::router::Router;
use crate::summary::Summary;

/// Drives one user turn through the agent handoff graph against shared,
/// process-lifetime dependencies (LLM client, shell session, emit sink).
pub struct Orchestrator {
    dispatch: HashMap<NextAgentKey, Box<dyn Agent>>,
    llm: Arc<dyn LlmClient>,
    shell: Arc<ShellSession>,
    emit: Arc<dyn Emit>,
    agent_config: AgentConfig,
}

/// `NextAgent` doesn't implement `Hash` (it's a plain handoff tag used in
/// `AgentResult`); this newtype gives the dispatch table a hashable key
/// without widening the public enum's derive surface.
#[derive(PartialEq, Eq, Hash, Clone, Copy)]
struct NextAgentKey(NextAgent);

fn key(agent: NextAgent) -> NextAgentKey {
    NextAgentKey(agent)
}

impl Orchestrator {
    pub fn new(
        llm: Arc<dyn LlmClient>,
        shell: Arc<ShellSession>,
        emit: Arc<dyn Emit>,
        agent_config: AgentConfig,
    ) -> Self {
        let mut dispatch: HashMap<NextAgentKey, Box<dyn Agent>> = HashMap::new();
        dispatch.insert(key(NextAgent::Router), Box::new(Router));
        dispatch.insert(key(NextAgent::Chat), Box::new(Chat));
        dispatch.insert(key(NextAgent::Planner), Box::new(Planner));
        dispatch.insert(key(NextAgent::Executor), Box::new(Executor));
        dispatch.insert(key(NextAgent::Repair), Box::new(Repair));
        dispatch.insert(key(NextAgent::Summary), Box::new(Summary));

        Self { dispatch, llm, shell, emit, agent_config }
    }

    /// Process one user turn to completion, returning the final step list and
    /// the updated conversation memory. `memory` is the only cross-turn
    /// persistent field (§3); the caller is responsible for passing the
    /// returned value back in as `memory` on the next turn.
    pub async fn run_turn(&self, goal: impl Into<String>, memory: Vec<Message>) -> TurnOutcome {
        let mut ctx = AgentContext::new(goal, memory, self.llm.clone(), self.shell.clone(), self.emit.clone());
        ctx.max_retries = self.agent_config.max_retries;
        ctx.max_replans = self.agent_config.max_replans;
        ctx.completion_threshold = self.agent_config.completion_threshold;

        let mut current = NextAgent::Router;
        let mut iterations = 0u32;

        loop {
            if iterations >= self.agent_config.max_iterations {
                error!(iterations, "orchestrator hit the hard iteration cap");
                self.emit.emit(EventKind::Error, "turn exceeded the iteration cap".to_string()).await;
                break;
            }
            iterations += 1;

            let Some(agent) = self.dispatch.get(&key(current)) else {
                error!(?current, "no agent registered for handoff target");
                self.emit.emit(EventKind::Error, "internal routing error".to_string()).await;
                break;
            };

            info!(?current, iterations, "dispatching agent");
            let outcome = AssertUnwindSafe(agent.run(&mut ctx)).catch_unwind().await;

            match outcome {
                Ok(result) => match result.next_agent {
                    Some(next) => {
                        current = next;
                        tokio::task::yield_now().await;
                    }
                    None => {
                        if !result.success {
                            self.emit.emit(EventKind::Error, result.message.clone()).await;
                        }
                        break;
                    }
                },
                Err(panic) => {
                    let message = panic_message(&panic);
                    error!(?current, panic = %message, "agent panicked, ending turn");
                    self.emit.emit(EventKind::Error, format!("internal error in {current:?}: {message}")).await;
                    break;
                }
            }
        }

        self.emit
            .emit(EventKind::Done, format!("done, {} steps", ctx.steps.len()))
            .await;
        tokio::task::yield_now().await;

        TurnOutcome { steps: ctx.steps, memory: ctx.memory }
    }
}

/// The result of one completed turn: the final step list, and the
/// conversation memory as grown by whichever agents ran (the user's goal,
/// any replies, re-plan notes, and the final summary). The caller keeps this
/// and passes it back in as the next turn's `memory`.
#[derive(Debug, Clone, Default)]
pub struct TurnOutcome {
    pub steps: Vec<Step>,
    pub memory: Vec<Message>,
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
