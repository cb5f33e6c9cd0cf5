// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
mod error;
mod http;
mod mock;
mod types;

pub use error::LlmError;
pub use http::HttpLlmClient;
pub use mock::{MockLlmClient, ScriptedLlmClient};
pub use types::{Message, Role};

use async_trait::async_trait;

/// The opaque `Complete(prompt, history, temperature) -> string` dependency
/// every agent calls through. Callers never match on the error variant —
/// every call site has its own fallback — but propagating a real error type
/// rather than a bare string lets tests assert on failure modes precisely.
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(
        &self,
        prompt: &str,
        history: &[Message],
        temperature: f32,
    ) -> Result<String, LlmError>;
}
