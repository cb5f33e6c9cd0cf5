// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::sync::Mutex;

use async_trait::async_trait;

use crate::{error::LlmError, LlmClient, Message};

/// Deterministic mock: always echoes the prompt back prefixed `"MOCK: "`.
#[derive(Default)]
pub struct MockLlmClient;

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn complete(
        &self,
        prompt: &str,
        _history: &[Message],
        _temperature: f32,
    ) -> Result<String, LlmError> {
        Ok(format!("MOCK: {prompt}"))
    }
}

/// A pre-scripted client. Each call to `complete` pops the next canned
/// response from the front of the queue, recording the request it was
/// called with so tests can assert on prompts and temperatures without
/// touching the network.
pub struct ScriptedLlmClient {
    scripts: Mutex<Vec<String>>,
    pub last_prompt: Mutex<Option<String>>,
    pub last_temperature: Mutex<Option<f32>>,
}

impl ScriptedLlmClient {
    pub fn new(scripts: Vec<String>) -> Self {
        Self {
            scripts: Mutex::new(scripts),
            last_prompt: Mutex::new(None),
            last_temperature: Mutex::new(None),
        }
    }

    /// Convenience: a client that always returns the same response.
    pub fn always(reply: impl Into<String>) -> Self {
        Self::new(vec![reply.into()])
    }
}

#[async_trait]
impl LlmClient for ScriptedLlmClient {
    async fn complete(
        &self,
        prompt: &str,
        _history: &[Message],
        temperature: f32,
    ) -> Result<String, LlmError> {
        *self.last_prompt.lock().unwrap() = Some(prompt.to_string());
        *self.last_temperature.lock().unwrap() = Some(temperature);

        let mut scripts = self.scripts.lock().unwrap();
        if scripts.is_empty() {
            Ok("[no more scripts]".to_string())
        } else if scripts.len() == 1 {
            Ok(scripts[0].clone())
        } else {
            Ok(scripts.remove(0))
        }
    }
}
